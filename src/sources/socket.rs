//! Raw socket probe
//!
//! Writes `<input>\n` to a TCP (or unix) socket, performs exactly one read
//! and checks whether the expected text appears anywhere in it. The single
//! read is authoritative: partial replies are not accumulated or retried.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, trace};

use crate::{
    ProbeReport, Reading,
    error::{AcquireResult, AcquisitionError, ConfigurationError},
    sources::MetricSource,
};

/// Size of the buffer for the single read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Where the probe connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketTarget {
    /// `host:port`, resolved at acquisition time
    Tcp(String),
    /// Path of a unix domain socket
    Unix(PathBuf),
}

impl std::fmt::Display for SocketTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketTarget::Tcp(address) => write!(f, "{address}"),
            SocketTarget::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SocketProbe {
    target: SocketTarget,
    input: String,
    expected: String,
    timeout: Duration,
}

impl SocketProbe {
    pub fn new(
        target: SocketTarget,
        input: impl Into<String>,
        expected: impl Into<String>,
        timeout: Duration,
    ) -> Result<SocketProbe, ConfigurationError> {
        let input = input.into();
        let expected = expected.into();
        if input.is_empty() {
            return Err(ConfigurationError::MissingArgument("input"));
        }
        if expected.is_empty() {
            return Err(ConfigurationError::MissingArgument("output"));
        }

        Ok(SocketProbe {
            target,
            input,
            expected,
            timeout,
        })
    }

    pub fn target(&self) -> &SocketTarget {
        &self.target
    }

    /// Judge a reply. Only the bytes actually read take part in the match.
    pub fn evaluate_reply(&self, reply: &[u8]) -> ProbeReport {
        let reply = String::from_utf8_lossy(reply);
        ProbeReport {
            healthy: reply.contains(&self.expected),
            summary: format!(
                "Returned output: {}, Expected output:{}",
                reply.trim_end(),
                self.expected
            ),
        }
    }

    fn timed_out(&self) -> AcquisitionError {
        AcquisitionError::Timeout {
            address: self.target.to_string(),
            timeout: self.timeout,
        }
    }

    async fn connect_tcp(&self, address: &str, deadline: Instant) -> AcquireResult<TcpStream> {
        let resolved = timeout_at(deadline, tokio::net::lookup_host(address))
            .await
            .map_err(|_| self.timed_out())?
            .and_then(|mut addrs| {
                addrs
                    .next()
                    .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
            })
            .map_err(|source| AcquisitionError::Resolve {
                address: address.to_string(),
                source,
            })?;
        trace!("resolved {address} to {resolved}");

        timeout_at(deadline, TcpStream::connect(resolved))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|source| AcquisitionError::Connect {
                address: address.to_string(),
                source,
            })
    }

    /// Write the command and perform the one read.
    async fn exchange<S>(&self, stream: &mut S, deadline: Instant) -> AcquireResult<Vec<u8>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let command = format!("{}\n", self.input);
        timeout_at(deadline, stream.write_all(command.as_bytes()))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(AcquisitionError::Socket)?;

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let read = timeout_at(deadline, stream.read(&mut buffer))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(AcquisitionError::Socket)?;

        buffer.truncate(read);
        debug!("read {read} bytes from {}", self.target);
        Ok(buffer)
    }
}

#[async_trait]
impl MetricSource for SocketProbe {
    fn kind(&self) -> &'static str {
        "socket"
    }

    #[instrument(skip(self), fields(target = %self.target))]
    async fn acquire(&self) -> AcquireResult<Reading> {
        // one deadline bounds the whole exchange
        let deadline = Instant::now() + self.timeout;

        let reply = match &self.target {
            SocketTarget::Tcp(address) => {
                let mut stream = self.connect_tcp(address, deadline).await?;
                self.exchange(&mut stream, deadline).await?
            }
            #[cfg(unix)]
            SocketTarget::Unix(path) => {
                let mut stream = timeout_at(deadline, tokio::net::UnixStream::connect(path))
                    .await
                    .map_err(|_| self.timed_out())?
                    .map_err(|source| AcquisitionError::Connect {
                        address: self.target.to_string(),
                        source,
                    })?;
                self.exchange(&mut stream, deadline).await?
            }
            #[cfg(not(unix))]
            SocketTarget::Unix(_) => {
                return Err(AcquisitionError::Connect {
                    address: self.target.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::Unsupported),
                });
            }
        };

        Ok(Reading::Probe(self.evaluate_reply(&reply)))
    }
}
