use std::process::ExitCode;

use health_probes::{
    config::{HttpArgs, parse_args},
    error::CheckError,
    runner::{CheckRunner, Outcome},
    util::init_logging,
};
use tracing::trace;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: HttpArgs = match parse_args() {
        Ok(args) => args,
        Err(code) => return code,
    };
    init_logging("check_http", args.verbose);
    trace!("started with args: {args:?}");

    let probe = match args.probe() {
        Ok(probe) => probe,
        Err(e) => return Outcome::from_error(&CheckError::from(e)).emit(),
    };

    CheckRunner::new(probe).run().await.emit()
}
