//! Check orchestration
//!
//! The runner is the single place where a reading turns into a status line
//! and an exit code:
//!
//! ```text
//! MetricSource::acquire → Reading::Metric → ThresholdSpec::evaluate → "Threshold Event:..." → 0/1/2
//!                       → Reading::Probe  → report summary                                → 0/2
//!                       → Err(..)         → diagnostic on stderr                          → 1/2
//! ```

use std::process::ExitCode;

use tracing::{debug, instrument};

use crate::{
    ProbeReport, Reading,
    error::{CheckError, CheckOutcome, ConfigurationError},
    sources::MetricSource,
    threshold::{CheckResult, ThresholdSpec, Verdict},
};

/// What a successful check produced
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Threshold(CheckResult),
    Probe(ProbeReport),
}

impl Report {
    pub fn verdict(&self) -> Verdict {
        match self {
            Report::Threshold(result) => result.verdict,
            // a self-judging observation is either fine or critical
            Report::Probe(report) if report.healthy => Verdict::Ok,
            Report::Probe(_) => Verdict::Critical,
        }
    }

    pub fn status_line(&self) -> String {
        match self {
            Report::Threshold(result) => result.to_string(),
            Report::Probe(report) => report.summary.clone(),
        }
    }
}

/// The text and exit code of one invocation, ready to be emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: u8,
}

impl Outcome {
    pub fn from_report(report: &Report) -> Outcome {
        Outcome {
            stdout: Some(report.status_line()),
            stderr: None,
            exit_code: report.verdict().exit_code(),
        }
    }

    pub fn from_error(err: &CheckError) -> Outcome {
        Outcome {
            stdout: None,
            stderr: Some(err.to_string()),
            exit_code: err.exit_code(),
        }
    }

    /// Print the status line or diagnostic and hand back the exit code.
    pub fn emit(self) -> ExitCode {
        if let Some(line) = &self.stdout {
            println!("{line}");
        }
        if let Some(line) = &self.stderr {
            eprintln!("{line}");
        }
        ExitCode::from(self.exit_code)
    }
}

impl From<CheckOutcome<Report>> for Outcome {
    fn from(result: CheckOutcome<Report>) -> Self {
        match result {
            Ok(report) => Outcome::from_report(&report),
            Err(err) => Outcome::from_error(&err),
        }
    }
}

/// Wires one metric source to the threshold evaluator.
pub struct CheckRunner<S> {
    source: S,
    thresholds: Option<ThresholdSpec>,
}

impl<S: MetricSource> CheckRunner<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            thresholds: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSpec) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Acquire once and judge the reading.
    #[instrument(skip(self), fields(source = self.source.kind()))]
    pub async fn check(&self) -> CheckOutcome<Report> {
        if self.source.needs_thresholds() && self.thresholds.is_none() {
            return Err(ConfigurationError::MissingCritical.into());
        }

        let reading = self.source.acquire().await?;
        debug!("acquired {reading:?}");

        match reading {
            Reading::Metric(value) => {
                let thresholds = self
                    .thresholds
                    .as_ref()
                    .ok_or(ConfigurationError::MissingCritical)?;
                Ok(Report::Threshold(thresholds.evaluate(value)))
            }
            Reading::Probe(report) => Ok(Report::Probe(report)),
        }
    }

    /// Run the check and turn the result into printable output.
    pub async fn run(&self) -> Outcome {
        let result = self.check().await;
        if let Err(err) = &result {
            debug!("{} check failed: {err:?}", self.source.kind());
        }
        Outcome::from(result)
    }
}
