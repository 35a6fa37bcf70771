//! Collector-process probe
//!
//! Renders a telegraf-style plugin configuration into a temporary file, runs
//! the collector once in test mode against it and scrapes the requested
//! series out of its stdout.
//!
//! ```text
//! render config → temp file → <collector> -config <file> -filter <plugin> -test → "<series> <number>"
//! ```
//!
//! The temporary file is owned by a [`NamedTempFile`] guard created right
//! after the file, so it is removed on every path out of [`ProcessProbe::acquire`].

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use regex::Regex;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument, trace, warn};

use crate::{
    MetricValue, Reading,
    error::{AcquireResult, AcquisitionError, ConfigurationError},
    sources::MetricSource,
};

/// Separator between key/value lines in the `--plugin-parameters` flag
pub const PARAMETER_SEPARATOR: char = '|';

const CONFIG_HEADER: &str = r#"# Telegraf configuration

[tags]

# Configuration for telegraf agent
[agent]
	# Default data collection interval for all plugins
	interval = "10s"

	# If utc = false, uses local time (utc is highly recommended)
	utc = true

	# Precision of writes, valid values are n, u, ms, s, m, and h
	precision = "s"

	# run telegraf in debug mode
	debug = false

	# Override default hostname, if empty use os.Hostname()
	hostname = ""

[outputs]

"#;

/// Network endpoint of the service a plugin should talk to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Scheme prefix such as `tcp://`, may be empty
    pub protocol: String,
    pub ip: String,
    pub port: u16,
}

/// Contents of the generated collector configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub plugin: String,
    /// Raw `key = value` lines, inserted verbatim under the plugin header
    pub parameters: Vec<String>,
    /// When set, a `servers = [...]` line is emitted for the plugin
    pub service: Option<ServiceEndpoint>,
}

impl PluginConfig {
    /// Split the `|`-separated parameter flag into lines, dropping empty
    /// segments.
    pub fn split_parameters(raw: &str) -> Vec<String> {
        raw.split(PARAMETER_SEPARATOR)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn render(&self) -> String {
        let mut rendered = String::from(CONFIG_HEADER);

        // writing into a String cannot fail
        let _ = writeln!(rendered, "[{}]", self.plugin);
        if let Some(ServiceEndpoint { protocol, ip, port }) = &self.service {
            let _ = writeln!(rendered, "servers = [\"{protocol}{ip}:{port}\"]");
        }
        for line in &self.parameters {
            let _ = writeln!(rendered, "{line}");
        }

        rendered
    }
}

/// Find the number following the first literal occurrence of `series`.
pub fn extract_series(output: &str, series: &str) -> AcquireResult<f64> {
    let pattern = format!(r"{} (-?\d*\.?\d+)", regex::escape(series));
    let re = Regex::new(&pattern)
        .map_err(|e| AcquisitionError::Collector(anyhow!(e).context("invalid series pattern")))?;

    re.captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse::<f64>().ok())
        .ok_or_else(|| AcquisitionError::SeriesNotFound {
            series: series.to_string(),
        })
}

/// Runs an external collector and scrapes a single series from its output.
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    config: PluginConfig,
    series: String,
    collector: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessProbe {
    pub fn new(
        config: PluginConfig,
        series: impl Into<String>,
        collector: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<ProcessProbe, ConfigurationError> {
        let series = series.into();
        if config.plugin.is_empty() {
            return Err(ConfigurationError::MissingArgument("plugin"));
        }
        if series.is_empty() {
            return Err(ConfigurationError::MissingArgument("series"));
        }

        Ok(ProcessProbe {
            config,
            series,
            collector: collector.into(),
            working_dir: working_dir.into(),
            timeout,
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Write the rendered configuration. The file lives as long as the
    /// returned guard.
    fn write_artifact(&self) -> AcquireResult<NamedTempFile> {
        let mut artifact = tempfile::Builder::new()
            .prefix(&format!("{}-", self.config.plugin))
            .suffix(".conf")
            .tempfile_in(&self.working_dir)
            .map_err(AcquisitionError::Artifact)?;

        artifact
            .write_all(self.config.render().as_bytes())
            .and_then(|_| artifact.flush())
            .map_err(AcquisitionError::Artifact)?;

        trace!("wrote collector configuration to {}", artifact.path().display());
        Ok(artifact)
    }

    async fn run_collector(&self, artifact: &Path) -> AcquireResult<String> {
        let mut command = Command::new(&self.collector);
        command
            .arg("-config")
            .arg(artifact)
            .arg("-filter")
            .arg(&self.config.plugin)
            .arg("-test")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "running {} -config {} -filter {} -test",
            self.collector.display(),
            artifact.display(),
            self.config.plugin
        );

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| AcquisitionError::CollectorTimeout(self.timeout))?
            .with_context(|| format!("failed to run collector {}", self.collector.display()))
            .map_err(AcquisitionError::Collector)?;

        if !output.status.success() {
            warn!(
                "collector exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MetricSource for ProcessProbe {
    fn kind(&self) -> &'static str {
        "collector"
    }

    fn needs_thresholds(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(plugin = %self.config.plugin, series = %self.series))]
    async fn acquire(&self) -> AcquireResult<Reading> {
        let artifact = self.write_artifact()?;
        let output = self.run_collector(artifact.path()).await;

        // remove the artifact before looking at the result
        drop(artifact);

        let value = extract_series(&output?, &self.series)?;
        let metric = MetricValue::new(&self.series, value).ok_or_else(|| {
            AcquisitionError::NonFinite {
                name: self.series.clone(),
            }
        })?;

        Ok(Reading::Metric(metric))
    }
}
