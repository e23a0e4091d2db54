//! Per-connection pipeline: peek hello, inject faults, dial, splice.
//!
//! Stages run strictly in order and each one may end the connection:
//! `Accepted -> HelloPending -> FaultCheck -> Dialing -> Splicing -> Closed`.
//! The client and backend streams are owned by `handle`, so every exit path
//! releases them exactly once.

use crate::dial::Dial;
use crate::error::{DialError, HelloError, ProxyError};
use crate::fault::{self, FaultConfig, FaultDecision};
use crate::hello::peek_client_hello;
use crate::splice::{splice, SpliceSummary};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub const DEFAULT_HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// How a connection ended when nothing went wrong.
#[derive(Debug)]
pub enum Outcome {
    /// A fault dropped the connection before any backend was dialed.
    Aborted,
    Spliced(SpliceSummary),
}

/// Shared by every connection task; holds only immutable settings.
#[derive(Debug)]
pub struct Handler<D> {
    faults: FaultConfig,
    dialer: D,
    hello_timeout: Duration,
}

impl<D: Dial> Handler<D> {
    pub fn new(faults: FaultConfig, dialer: D) -> Self {
        Self {
            faults,
            dialer,
            hello_timeout: DEFAULT_HELLO_TIMEOUT,
        }
    }

    pub fn with_hello_timeout(mut self, hello_timeout: Duration) -> Self {
        self.hello_timeout = hello_timeout;
        self
    }

    /// Run one client connection to completion.
    pub async fn handle<S>(&self, client: S) -> Result<Outcome, ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (client_reader, client_writer) = tokio::io::split(client);

        // Only the hello is deadline-bound; the tunnel may be idle for as long as it likes
        let (hello, client_reader) =
            tokio::time::timeout(self.hello_timeout, peek_client_hello(client_reader))
                .await
                .map_err(|_| HelloError::Timeout(self.hello_timeout))??;

        tracing::info!(
            "Received request for server: {}",
            hello.server_name.as_deref().unwrap_or("-")
        );
        if !hello.alpn.is_empty() {
            tracing::debug!("ALPN offered: {}", hello.alpn.join(","));
        }

        let decision = self.faults.decide(&mut rand::thread_rng());
        match decision {
            FaultDecision::Abort => {
                tracing::info!("Fault injected: closing connection");
                return Ok(Outcome::Aborted);
            }
            FaultDecision::Delay(delay) => {
                tracing::info!("Fault injected: sleeping for {}s", delay.as_secs_f64());
            }
            FaultDecision::None => tracing::info!("No fault injected"),
        }
        fault::apply_delay(decision).await;

        let host = hello.server_name.ok_or(DialError::MissingServerName)?;
        let backend = self.dialer.dial(&host).await?;
        tracing::debug!(
            "Connected to {}, replaying {} peeked bytes",
            host,
            client_reader.peeked().len()
        );

        let summary = splice(client_reader, client_writer, backend).await;
        tracing::debug!(
            "Connection to {} closed: up {}, down {}",
            host,
            display_direction(&summary.client_to_backend),
            display_direction(&summary.backend_to_client),
        );

        Ok(Outcome::Spliced(summary))
    }
}

fn display_direction(result: &std::io::Result<u64>) -> String {
    match result {
        Ok(bytes) => format!("{} bytes", bytes),
        Err(e) => format!("error ({})", e),
    }
}
