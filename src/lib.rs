pub mod config;
pub mod error;
pub mod runner;
pub mod sources;
pub mod threshold;
pub mod util;

use serde::{Deserialize, Serialize};

/// A single scalar acquired from a backend, tagged with the series it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

impl MetricValue {
    /// Returns `None` for NaN and infinities; a metric is always finite.
    pub fn new(name: impl Into<String>, value: f64) -> Option<MetricValue> {
        value.is_finite().then(|| MetricValue {
            name: name.into(),
            value,
        })
    }
}

/// An observation that already carries its own health judgement, such as an
/// HTTP status or a socket reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub healthy: bool,
    pub summary: String,
}

/// What a metric source hands back after a successful acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// A scalar that still has to be judged against thresholds
    Metric(MetricValue),
    /// A self-judging observation that bypasses threshold evaluation
    Probe(ProbeReport),
}
