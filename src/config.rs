//! Command-line configuration shared by the probe binaries
//!
//! Every probe is configured from flags; a few values (credentials and
//! locations) can also come from the environment or a `.env` file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser};
use tracing::trace;

use crate::{
    error::ConfigurationError,
    sources::{
        http::{HttpProbe, build_address},
        influx::{
            AggregateFunction, InfluxConnection, QuerySpec, TimeSeriesQuery, series_from_fqdn,
        },
        process::{PluginConfig, ProcessProbe, ServiceEndpoint},
        socket::{SocketProbe, SocketTarget},
    },
    threshold::{Direction, ThresholdSpec},
    util::{host_port, non_empty},
};

/// Parse the command line. Usage errors exit 1, `--help` and `--version`
/// exit 0.
pub fn parse_args<P: Parser>() -> Result<P, ExitCode> {
    P::try_parse().map_err(|e| {
        let _ = e.print();
        if e.use_stderr() {
            ExitCode::from(crate::error::EXIT_RECOVERABLE)
        } else {
            ExitCode::SUCCESS
        }
    })
}

pub fn default_http_port() -> u16 {
    80
}

pub fn default_service_port() -> u16 {
    8000
}

pub fn default_influx_port() -> u16 {
    8086
}

pub fn default_timeout_secs() -> u64 {
    3
}

pub fn default_collector_timeout_secs() -> u64 {
    10
}

pub fn default_delta_secs() -> u64 {
    60
}

pub fn default_collector_location() -> PathBuf {
    PathBuf::from("/usr/bin/telegraphite")
}

pub fn default_working_location() -> PathBuf {
    PathBuf::from("/tmp/")
}

/// Warning/critical bounds and their direction
#[derive(Debug, Clone, Args)]
pub struct ThresholdArgs {
    /// Warning and critical fire when the value is less than the bound
    #[arg(long)]
    pub lessthan: bool,

    /// Exits with code 1 if exceeded, optional
    #[arg(long, allow_hyphen_values = true)]
    pub warning: Option<f64>,

    /// Exits with code 2 if exceeded, required
    #[arg(long, allow_hyphen_values = true)]
    pub critical: Option<f64>,
}

impl ThresholdArgs {
    pub fn spec(&self) -> Result<ThresholdSpec, ConfigurationError> {
        ThresholdSpec::new(
            self.warning,
            self.critical,
            Direction::from_lessthan(self.lessthan),
        )
    }
}

/// check-collector: run a telegraf-style collector and judge one series
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Run a metrics collector once and check a series against thresholds")]
pub struct CollectorArgs {
    /// IP of the service the plugin talks to
    #[arg(long, default_value = "localhost")]
    pub ip: String,

    /// Port of the service the plugin talks to
    #[arg(long, default_value_t = default_service_port())]
    pub port: u16,

    /// Protocol prefix of the service, e.g. tcp:// or http://
    #[arg(long, default_value = "")]
    pub protocol: String,

    /// Emit a `servers = [...]` line for the plugin
    #[arg(long)]
    pub service: bool,

    /// Series to check, e.g. some.example.com.cpu.cpu1.cpu_usage_idle
    #[arg(long)]
    pub series: String,

    /// Collector plugin name
    #[arg(long)]
    pub plugin: String,

    /// Plugin parameters, separated by '|'
    #[arg(long, default_value = "")]
    pub plugin_parameters: String,

    /// Path of the collector binary
    #[arg(
        long,
        alias = "telegraphite-location",
        env = "PROBE_COLLECTOR_LOCATION",
        default_value_os_t = default_collector_location()
    )]
    pub collector_location: PathBuf,

    /// Directory for the temporary plugin configuration
    #[arg(
        long,
        env = "PROBE_WORKING_LOCATION",
        default_value_os_t = default_working_location()
    )]
    pub working_location: PathBuf,

    /// Seconds to wait for the collector
    #[arg(long, default_value_t = default_collector_timeout_secs())]
    pub timeout: u64,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl CollectorArgs {
    pub fn plugin_config(&self) -> PluginConfig {
        PluginConfig {
            plugin: self.plugin.clone(),
            parameters: PluginConfig::split_parameters(&self.plugin_parameters),
            service: self.service.then(|| ServiceEndpoint {
                protocol: self.protocol.clone(),
                ip: self.ip.clone(),
                port: self.port,
            }),
        }
    }

    pub fn probe(&self) -> Result<ProcessProbe, ConfigurationError> {
        trace!("collector args: {self:?}");
        ProcessProbe::new(
            self.plugin_config(),
            &self.series,
            &self.collector_location,
            &self.working_location,
            Duration::from_secs(self.timeout),
        )
    }
}

/// check-http: GET an address and require a 200
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Check that an HTTP endpoint answers with status 200")]
pub struct HttpArgs {
    /// IP of the service
    #[arg(long)]
    pub ip: Option<String>,

    /// Port of the service, used with --ip
    #[arg(long, default_value_t = default_http_port())]
    pub port: u16,

    /// Endpoint of the service, used with --ip
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Full address, port and endpoint; --ip wins if both are given
    #[arg(long)]
    pub address: Option<String>,

    /// Seconds to wait for the response
    #[arg(long, default_value_t = default_timeout_secs())]
    pub timeout: u64,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl HttpArgs {
    pub fn probe(&self) -> Result<HttpProbe, ConfigurationError> {
        let address = build_address(
            self.ip.as_deref(),
            self.port,
            self.endpoint.as_deref(),
            self.address.as_deref(),
        )?;
        Ok(HttpProbe::new(address, Duration::from_secs(self.timeout)))
    }
}

/// check-socket: send a command and look for the expected reply
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Send a command to a socket and match the reply")]
pub struct SocketArgs {
    /// IP of the service
    #[arg(long)]
    pub ip: Option<String>,

    /// Port of the service, used with --ip
    #[arg(long, default_value_t = default_http_port())]
    pub port: u16,

    /// Full address and port; --ip wins if both are given
    #[arg(long)]
    pub address: Option<String>,

    /// Path of a unix socket; wins over --ip and --address
    #[arg(long)]
    pub unix: Option<PathBuf>,

    /// Seconds until the exchange is abandoned
    #[arg(long, default_value_t = default_timeout_secs())]
    pub timeout: u64,

    /// Command to send, a newline is appended
    #[arg(long, default_value = "")]
    pub input: String,

    /// Text expected somewhere in the reply
    #[arg(long, default_value = "")]
    pub output: String,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl SocketArgs {
    pub fn target(&self) -> Result<SocketTarget, ConfigurationError> {
        if let Some(path) = &self.unix {
            return Ok(SocketTarget::Unix(path.clone()));
        }
        host_port(self.ip.as_deref(), self.port, self.address.as_deref()).map(SocketTarget::Tcp)
    }

    pub fn probe(&self) -> Result<SocketProbe, ConfigurationError> {
        // the exchange is validated before the address
        if self.input.is_empty() {
            return Err(ConfigurationError::MissingArgument("input"));
        }
        if self.output.is_empty() {
            return Err(ConfigurationError::MissingArgument("output"));
        }
        SocketProbe::new(
            self.target()?,
            &self.input,
            &self.output,
            Duration::from_secs(self.timeout),
        )
    }
}

/// check-influxdb: aggregate a series over a window and judge the value
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Query InfluxDB 0.8 and check the result against thresholds")]
#[command(group(
    ArgGroup::new("aggregate")
        .args(["function", "count", "min", "max", "mean", "mode", "derivative", "sum", "stddev", "first"])
        .multiple(false)
))]
pub struct InfluxArgs {
    /// IP of the InfluxDB service
    #[arg(long, default_value = "")]
    pub ip: String,

    /// Port of the InfluxDB service
    #[arg(long, default_value_t = default_influx_port())]
    pub port: u16,

    /// Database to query
    #[arg(long, env = "INFLUXDB_DATABASE", default_value = "")]
    pub database: String,

    /// User with access to the database
    #[arg(long, env = "INFLUXDB_USER", default_value = "root")]
    pub user: String,

    /// Password of that user
    #[arg(long, env = "INFLUXDB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub password: String,

    /// Full series name; either --series or --custom is required
    #[arg(long)]
    pub series: Option<String>,

    /// Custom query, sent verbatim
    #[arg(long)]
    pub custom: Option<String>,

    /// Host name to embed in the series as <prefix>.<fqdn>.<series>
    #[arg(long)]
    pub fqdn: Option<String>,

    /// Series prefix used with --fqdn
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Replacement for the dots of --fqdn
    #[arg(long, default_value = "_")]
    pub replace: String,

    /// Window in seconds: time > now() - delta
    #[arg(long, default_value_t = default_delta_secs())]
    pub delta: u64,

    /// Aggregate function to compare against the thresholds
    #[arg(long, value_enum)]
    pub function: Option<AggregateFunction>,

    /// Same as --function count
    #[arg(long)]
    pub count: bool,
    /// Same as --function min
    #[arg(long)]
    pub min: bool,
    /// Same as --function max
    #[arg(long)]
    pub max: bool,
    /// Same as --function mean
    #[arg(long)]
    pub mean: bool,
    /// Same as --function mode
    #[arg(long)]
    pub mode: bool,
    /// Same as --function derivative
    #[arg(long)]
    pub derivative: bool,
    /// Same as --function sum
    #[arg(long)]
    pub sum: bool,
    /// Same as --function stddev
    #[arg(long)]
    pub stddev: bool,
    /// Same as --function first
    #[arg(long)]
    pub first: bool,

    /// Seconds to wait for the database
    #[arg(long, default_value_t = default_timeout_secs())]
    pub timeout: u64,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// Log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl InfluxArgs {
    /// The selected aggregate. At most one selector can be set, clap rejects
    /// the rest.
    pub fn function(&self) -> Option<AggregateFunction> {
        let flags = [
            (self.count, AggregateFunction::Count),
            (self.min, AggregateFunction::Min),
            (self.max, AggregateFunction::Max),
            (self.mean, AggregateFunction::Mean),
            (self.mode, AggregateFunction::Mode),
            (self.derivative, AggregateFunction::Derivative),
            (self.sum, AggregateFunction::Sum),
            (self.stddev, AggregateFunction::Stddev),
            (self.first, AggregateFunction::First),
        ];

        self.function.or_else(|| {
            flags
                .into_iter()
                .find_map(|(selected, function)| selected.then_some(function))
        })
    }

    pub fn series(&self) -> Option<String> {
        let series = non_empty(self.series.as_deref())?;
        match non_empty(self.fqdn.as_deref()) {
            Some(fqdn) => Some(series_from_fqdn(&self.prefix, fqdn, &self.replace, series)),
            None => Some(series.to_string()),
        }
    }

    pub fn query(&self) -> Result<QuerySpec, ConfigurationError> {
        QuerySpec::resolve(
            self.custom.as_deref(),
            self.series().as_deref(),
            self.function(),
            self.delta,
        )
    }

    pub fn probe(&self) -> Result<TimeSeriesQuery, ConfigurationError> {
        let connection = InfluxConnection {
            ip: self.ip.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        };
        TimeSeriesQuery::new(connection, self.query()?, Duration::from_secs(self.timeout))
    }
}
