//! Outbound connection to the backend named by SNI.

use crate::error::DialError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub const DEFAULT_BACKEND_PORT: u16 = 443;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens one fresh backend stream per client connection.
#[async_trait]
pub trait Dial: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn dial(&self, host: &str) -> Result<Self::Stream, DialError>;
}

/// Dials `host:port` over TCP. No pooling, no DNS caching, no retries.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    port: u16,
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_PORT, DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Dial for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, host: &str) -> Result<TcpStream, DialError> {
        // Resolution happens inside connect, so the timeout covers DNS too
        let connect = TcpStream::connect((host, self.port));
        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| DialError::Timeout {
                host: host.to_string(),
                port: self.port,
                timeout: self.connect_timeout,
            })?
            .map_err(|source| DialError::Connect {
                host: host.to_string(),
                port: self.port,
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", host, e);
        }

        Ok(stream)
    }
}
