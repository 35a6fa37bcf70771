use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::ConfigurationError;

/// Set up logging on stderr. Stdout is reserved for the status line.
pub fn init_logging(binary: &'static str, verbose: bool) {
    dotenv::dotenv().ok();

    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let filter =
        filter::Targets::new().with_targets(vec![("health_probes", level), (binary, level)]);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Pick `ip:port` when an ip is given, otherwise the full address.
pub fn host_port(
    ip: Option<&str>,
    port: u16,
    address: Option<&str>,
) -> Result<String, ConfigurationError> {
    match (non_empty(ip), non_empty(address)) {
        (Some(ip), _) => Ok(format!("{ip}:{port}")),
        (None, Some(address)) => Ok(address.to_string()),
        (None, None) => Err(ConfigurationError::MissingAddress),
    }
}

/// Treat empty strings like absent values, since the probes are often
/// invoked from templates that leave unused flags blank.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
