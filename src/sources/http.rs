//! HTTP endpoint probe
//!
//! Issues a single GET and reports the status line. Only a `200` counts as
//! healthy; any other status is still a valid observation and is reported
//! with its full status text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, trace};

use crate::{
    ProbeReport, Reading,
    error::{AcquireResult, AcquisitionError, ConfigurationError},
    sources::MetricSource,
    util::non_empty,
};

/// Build the request URL. The ip form wins over the address form when both
/// are given; the endpoint only applies to the ip form.
pub fn build_address(
    ip: Option<&str>,
    port: u16,
    endpoint: Option<&str>,
    address: Option<&str>,
) -> Result<String, ConfigurationError> {
    if let Some(ip) = non_empty(ip) {
        let endpoint = endpoint.unwrap_or_default();
        return Ok(format!("http://{ip}:{port}{endpoint}"));
    }

    match non_empty(address) {
        Some(address) if address.starts_with("http://") || address.starts_with("https://") => {
            Ok(address.to_string())
        }
        Some(address) => Ok(format!("http://{address}")),
        None => Err(ConfigurationError::MissingAddress),
    }
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    address: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> HttpProbe {
        HttpProbe {
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn execute_request(&self) -> Result<StatusCode, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client.get(&self.address).send().await?;
        Ok(response.status())
    }
}

#[async_trait]
impl MetricSource for HttpProbe {
    fn kind(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn acquire(&self) -> AcquireResult<Reading> {
        trace!("GET {} (timeout {:?})", self.address, self.timeout);

        let status = self
            .execute_request()
            .await
            .map_err(|source| AcquisitionError::Request {
                address: self.address.clone(),
                source,
            })?;

        let healthy = status == StatusCode::OK;
        if !healthy {
            debug!("{} answered {status}", self.address);
        }

        Ok(Reading::Probe(ProbeReport {
            healthy,
            summary: format!("Address: {}, Response: {status}", self.address),
        }))
    }
}
