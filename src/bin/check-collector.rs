use std::process::ExitCode;

use health_probes::{
    config::{CollectorArgs, parse_args},
    error::CheckError,
    runner::{CheckRunner, Outcome},
    util::init_logging,
};
use tracing::trace;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: CollectorArgs = match parse_args() {
        Ok(args) => args,
        Err(code) => return code,
    };
    init_logging("check_collector", args.verbose);
    trace!("started with args: {args:?}");

    // thresholds are checked before the collector is ever started
    let runner = match args.thresholds.spec().and_then(|spec| {
        args.probe()
            .map(|probe| CheckRunner::new(probe).with_thresholds(spec))
    }) {
        Ok(runner) => runner,
        Err(e) => return Outcome::from_error(&CheckError::from(e)).emit(),
    };

    runner.run().await.emit()
}
