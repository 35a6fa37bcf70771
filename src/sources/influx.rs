//! InfluxDB 0.8 series query
//!
//! Builds an aggregate query (or takes a custom one verbatim), sends it to
//! the `/db/<database>/series` endpoint and takes the value column of the
//! first point of the first returned series.

use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{
    MetricValue, Reading,
    error::{AcquireResult, AcquisitionError, ConfigurationError},
    sources::MetricSource,
    util::non_empty,
};

/// Column holding the timestamp in every point
pub const TIME_COLUMN: usize = 0;

/// Column holding the value in every point
pub const VALUE_COLUMN: usize = 1;

/// Aggregate applied to the series over the time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Mean,
    Mode,
    Derivative,
    Sum,
    Stddev,
    First,
}

impl AggregateFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Mean => "MEAN",
            AggregateFunction::Mode => "MODE",
            AggregateFunction::Derivative => "DERIVATIVE",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Stddev => "STDDEV",
            AggregateFunction::First => "FIRST",
        }
    }
}

/// What to ask the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySpec {
    /// A caller-supplied query, sent verbatim
    Custom(String),
    /// `select <FUNCTION>(value) from "<series>" where time > now() - <delta>s`
    Aggregate {
        function: AggregateFunction,
        series: String,
        delta_secs: u64,
    },
}

impl QuerySpec {
    /// A custom query wins over a series. A series needs a function.
    pub fn resolve(
        custom: Option<&str>,
        series: Option<&str>,
        function: Option<AggregateFunction>,
        delta_secs: u64,
    ) -> Result<QuerySpec, ConfigurationError> {
        if let Some(custom) = non_empty(custom) {
            return Ok(QuerySpec::Custom(custom.to_string()));
        }

        let Some(series) = non_empty(series) else {
            return Err(ConfigurationError::MissingQuery);
        };

        let Some(function) = function else {
            return Err(ConfigurationError::MissingFunction {
                series: series.to_string(),
            });
        };

        Ok(QuerySpec::Aggregate {
            function,
            series: series.to_string(),
            delta_secs,
        })
    }

    pub fn query_string(&self) -> String {
        match self {
            QuerySpec::Custom(query) => query.clone(),
            QuerySpec::Aggregate {
                function,
                series,
                delta_secs,
            } => format!(
                "select {}(value) from \"{series}\" where time > now() - {delta_secs}s",
                function.as_str()
            ),
        }
    }
}

/// Compose `<prefix>.<fqdn>.<series>` where the dots of the fqdn are
/// replaced, so a host name stays one segment of the series path.
pub fn series_from_fqdn(prefix: &str, fqdn: &str, replace: &str, series: &str) -> String {
    let host = fqdn.replace('.', replace);
    [prefix, host.as_str(), series]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// One element of the columnar JSON response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InfluxSeries {
    pub columns: Vec<String>,
    pub name: String,
    pub points: Vec<Vec<Option<f64>>>,
}

/// Value column of the first point of the first series.
pub fn first_value(response: &[InfluxSeries]) -> AcquireResult<MetricValue> {
    let Some(series) = response.first() else {
        return Err(AcquisitionError::NoData(
            "query returned no series".to_string(),
        ));
    };

    let value = series
        .points
        .first()
        .and_then(|point| point.get(VALUE_COLUMN).copied().flatten())
        .ok_or_else(|| {
            AcquisitionError::NoData(format!("series '{}' has no points", series.name))
        })?;

    MetricValue::new(&series.name, value).ok_or_else(|| AcquisitionError::NonFinite {
        name: series.name.clone(),
    })
}

/// Where the database lives and who to log in as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxConnection {
    pub ip: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl InfluxConnection {
    pub fn series_url(&self) -> String {
        format!("http://{}:{}/db/{}/series", self.ip, self.port, self.database)
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesQuery {
    connection: InfluxConnection,
    query: QuerySpec,
    timeout: Duration,
}

impl TimeSeriesQuery {
    pub fn new(
        connection: InfluxConnection,
        query: QuerySpec,
        timeout: Duration,
    ) -> Result<TimeSeriesQuery, ConfigurationError> {
        if connection.ip.is_empty() {
            return Err(ConfigurationError::MissingArgument("ip"));
        }
        if connection.database.is_empty() {
            return Err(ConfigurationError::MissingArgument("database"));
        }

        Ok(TimeSeriesQuery {
            connection,
            query,
            timeout,
        })
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    async fn execute_request(&self, query: &str) -> AcquireResult<String> {
        let address = self.connection.series_url();
        let request_failed = |source| AcquisitionError::Request {
            address: address.clone(),
            source,
        };

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(request_failed)?;

        let response = client
            .get(&address)
            .query(&[
                ("u", self.connection.user.as_str()),
                ("p", self.connection.password.as_str()),
                ("q", query),
            ])
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::UnexpectedStatus {
                address: address.clone(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(request_failed)
    }
}

#[async_trait]
impl MetricSource for TimeSeriesQuery {
    fn kind(&self) -> &'static str {
        "influxdb"
    }

    fn needs_thresholds(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(database = %self.connection.database))]
    async fn acquire(&self) -> AcquireResult<Reading> {
        let query = self.query.query_string();
        debug!("querying {}: {query}", self.connection.series_url());

        let body = self.execute_request(&query).await?;
        trace!("received {body}");

        let response: Vec<InfluxSeries> = serde_json::from_str(&body)
            .map_err(|e| AcquisitionError::Malformed(format!("{e} (query: {query})")))?;

        first_value(&response).map(Reading::Metric)
    }
}
