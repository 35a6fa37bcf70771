use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{MetricValue, error::ConfigurationError};

/// Which side of a bound counts as a breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Exceeded when the value is greater than the bound
    #[default]
    GreaterExceeds,
    /// Exceeded when the value is less than the bound
    LessExceeds,
}

impl Direction {
    /// `lessthan` is how the probes spell the direction on the command line.
    pub fn from_lessthan(lessthan: bool) -> Direction {
        if lessthan {
            Direction::LessExceeds
        } else {
            Direction::GreaterExceeds
        }
    }

    pub fn exceeded(self, bound: f64, value: f64) -> bool {
        match self {
            Direction::GreaterExceeds => value > bound,
            Direction::LessExceeds => value < bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Ok,
    Warning,
    Critical,
}

impl Verdict {
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Ok => 0,
            Verdict::Warning => 1,
            Verdict::Critical => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Ok => "PASSING",
            Verdict::Warning => "WARNING",
            Verdict::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundKind {
    Warning,
    Critical,
}

/// Warning and critical bounds plus the comparison direction.
///
/// Presence is explicit: a bound that was not supplied is `None` and is never
/// compared against anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    warning: Option<f64>,
    critical: f64,
    direction: Direction,
}

impl ThresholdSpec {
    /// Validates the bounds before any I/O happens. A check without a
    /// critical bound is a configuration error, even if a warning is set.
    pub fn new(
        warning: Option<f64>,
        critical: Option<f64>,
        direction: Direction,
    ) -> Result<ThresholdSpec, ConfigurationError> {
        let Some(critical) = critical else {
            return Err(ConfigurationError::MissingCritical);
        };

        Ok(ThresholdSpec {
            warning,
            critical,
            direction,
        })
    }

    pub fn warning(&self) -> Option<f64> {
        self.warning
    }

    pub fn critical(&self) -> f64 {
        self.critical
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Judge a metric. Critical dominates warning regardless of which bound
    /// is numerically larger.
    pub fn evaluate(&self, value: MetricValue) -> CheckResult {
        let current = value.value;

        let (verdict, triggering_bound, bound_kind) =
            if self.direction.exceeded(self.critical, current) {
                (Verdict::Critical, Some(self.critical), Some(BoundKind::Critical))
            } else if let Some(warning) = self.warning
                && self.direction.exceeded(warning, current)
            {
                (Verdict::Warning, Some(warning), Some(BoundKind::Warning))
            } else {
                (Verdict::Ok, None, None)
            };

        trace!(
            "{}: {current} (warning: {:?}, critical: {}, {:?}) -> {verdict:?}",
            value.name, self.warning, self.critical, self.direction
        );

        CheckResult {
            verdict,
            reported_bound: triggering_bound.unwrap_or(self.warning.unwrap_or(self.critical)),
            value,
            triggering_bound,
            bound_kind,
        }
    }
}

/// The outcome of judging one metric, produced once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub verdict: Verdict,
    pub value: MetricValue,
    pub triggering_bound: Option<f64>,
    pub bound_kind: Option<BoundKind>,
    /// Bound shown in the status line: the triggering one, or on a pass the
    /// warning bound if configured, else the critical bound
    pub reported_bound: f64,
}

impl CheckResult {
    pub fn exit_code(&self) -> u8 {
        self.verdict.exit_code()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Threshold Event:{} ThresholdValue:{:.6} CurrentValue:{:.6} Series:{}",
            self.verdict, self.reported_bound, self.value.value, self.value.name
        )
    }
}
