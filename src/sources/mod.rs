//! Metric sources
//!
//! Each backend a probe can read from implements [`MetricSource`]. A source
//! yields exactly one [`Reading`] per invocation or fails with an
//! [`AcquisitionError`](crate::error::AcquisitionError).
//!
//! ## Backends
//!
//! - [`process::ProcessProbe`] - runs a metrics collector and scrapes its stdout
//! - [`http::HttpProbe`] - issues a GET and inspects the status
//! - [`socket::SocketProbe`] - writes a command to a socket and matches the reply
//! - [`influx::TimeSeriesQuery`] - queries an InfluxDB 0.8 series endpoint

pub mod http;
pub mod influx;
pub mod process;
pub mod socket;

use async_trait::async_trait;

use crate::{Reading, error::AcquireResult};

/// Something that can produce one reading per run.
///
/// Implementations do not retry and do not cache; every call performs the
/// full exchange with the backend, bounded by the source's own timeout.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Short backend name used in log output
    fn kind(&self) -> &'static str;

    /// Whether readings from this source have to be judged against
    /// thresholds. Such a source is never queried without them.
    fn needs_thresholds(&self) -> bool {
        false
    }

    /// Perform the acquisition
    async fn acquire(&self) -> AcquireResult<Reading>;
}
