//! Error types for probe configuration and metric acquisition
//!
//! Every failure is terminal for the invocation. Helpers never exit the
//! process themselves; they return one of these errors and the runner turns
//! it into a diagnostic and an exit code.

use std::fmt;
use std::time::Duration;

/// Result type alias for a whole check
pub type CheckOutcome<T> = Result<T, CheckError>;

/// Result type alias for a single acquisition
pub type AcquireResult<T> = Result<T, AcquisitionError>;

/// Exit code used for every configuration error and for recoverable
/// acquisition failures
pub const EXIT_RECOVERABLE: u8 = 1;

/// Exit code used for unrecoverable probe failures
pub const EXIT_UNRECOVERABLE: u8 = 2;

/// Problems with what the caller asked for, detected before any I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No critical bound was supplied
    MissingCritical,

    /// Neither a series nor a custom query was supplied
    MissingQuery,

    /// A series was supplied without an aggregate function
    MissingFunction { series: String },

    /// None of ip, address or socket path was supplied
    MissingAddress,

    /// A required argument was empty
    MissingArgument(&'static str),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingCritical => {
                write!(f, "critical threshold must be specified")
            }
            ConfigurationError::MissingQuery => {
                write!(f, "series or custom query not given, one is required")
            }
            ConfigurationError::MissingFunction { series } => write!(
                f,
                "an aggregate function is required when querying series '{series}'"
            ),
            ConfigurationError::MissingAddress => {
                write!(f, "either ip or address is required, ip wins if both are given")
            }
            ConfigurationError::MissingArgument(name) => write!(f, "{name} must be declared"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Failures while obtaining a reading from a backend
#[derive(Debug)]
pub enum AcquisitionError {
    /// The collector configuration artifact could not be written
    Artifact(std::io::Error),

    /// The collector could not be launched or its output could not be read
    Collector(anyhow::Error),

    /// The collector did not finish within the timeout
    CollectorTimeout(Duration),

    /// The requested series does not appear in the collector output
    SeriesNotFound { series: String },

    /// The HTTP request failed before a response arrived
    Request {
        address: String,
        source: reqwest::Error,
    },

    /// The time-series store answered with a non-success status
    UnexpectedStatus { address: String, status: u16 },

    /// The response body could not be understood
    Malformed(String),

    /// The response parsed but carried no usable point
    NoData(String),

    /// The backend produced NaN or an infinity
    NonFinite { name: String },

    /// The socket address could not be resolved
    Resolve {
        address: String,
        source: std::io::Error,
    },

    /// The socket connection could not be established
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Writing to or reading from an established socket failed
    Socket(std::io::Error),

    /// The socket exchange did not complete before the deadline
    Timeout { address: String, timeout: Duration },
}

impl AcquisitionError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AcquisitionError::Artifact(_)
            | AcquisitionError::Resolve { .. }
            | AcquisitionError::Connect { .. }
            | AcquisitionError::Socket(_)
            | AcquisitionError::Timeout { .. } => EXIT_UNRECOVERABLE,
            AcquisitionError::Collector(_)
            | AcquisitionError::CollectorTimeout(_)
            | AcquisitionError::SeriesNotFound { .. }
            | AcquisitionError::Request { .. }
            | AcquisitionError::UnexpectedStatus { .. }
            | AcquisitionError::Malformed(_)
            | AcquisitionError::NoData(_)
            | AcquisitionError::NonFinite { .. } => EXIT_RECOVERABLE,
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::Artifact(err) => {
                write!(f, "failed to write collector configuration: {err}")
            }
            AcquisitionError::Collector(err) => write!(f, "collector failed: {err:#}"),
            AcquisitionError::CollectorTimeout(timeout) => {
                write!(f, "collector did not finish within {}s", timeout.as_secs_f64())
            }
            AcquisitionError::SeriesNotFound { series } => {
                write!(f, "series '{series}' not found in collector output")
            }
            AcquisitionError::Request { address, source } => {
                write!(f, "error occurred on GET {address}: {source}")
            }
            AcquisitionError::UnexpectedStatus { address, status } => {
                write!(f, "{address} returned status code {status}")
            }
            AcquisitionError::Malformed(msg) => write!(f, "malformed response: {msg}"),
            AcquisitionError::NoData(msg) => write!(f, "no values found: {msg}"),
            AcquisitionError::NonFinite { name } => {
                write!(f, "value of '{name}' is not a finite number")
            }
            AcquisitionError::Resolve { address, source } => {
                write!(f, "could not resolve {address}: {source}")
            }
            AcquisitionError::Connect { address, source } => {
                write!(f, "error connecting to {address}: {source}")
            }
            AcquisitionError::Socket(err) => write!(f, "socket error: {err}"),
            AcquisitionError::Timeout { address, timeout } => write!(
                f,
                "no reply from {address} within {}s",
                timeout.as_secs_f64()
            ),
        }
    }
}

impl std::error::Error for AcquisitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcquisitionError::Artifact(err) | AcquisitionError::Socket(err) => Some(err),
            AcquisitionError::Request { source, .. } => Some(source),
            AcquisitionError::Resolve { source, .. } | AcquisitionError::Connect { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Everything that can stop a check from producing a verdict
#[derive(Debug)]
pub enum CheckError {
    Configuration(ConfigurationError),
    Acquisition(AcquisitionError),
}

impl CheckError {
    /// The process exit code this error maps to
    pub fn exit_code(&self) -> u8 {
        match self {
            CheckError::Configuration(_) => EXIT_RECOVERABLE,
            CheckError::Acquisition(err) => err.exit_code(),
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::Configuration(err) => write!(f, "configuration error: {err}"),
            CheckError::Acquisition(err) => write!(f, "acquisition error: {err}"),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckError::Configuration(err) => Some(err),
            CheckError::Acquisition(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for CheckError {
    fn from(err: ConfigurationError) -> Self {
        CheckError::Configuration(err)
    }
}

impl From<AcquisitionError> for CheckError {
    fn from(err: AcquisitionError) -> Self {
        CheckError::Acquisition(err)
    }
}
