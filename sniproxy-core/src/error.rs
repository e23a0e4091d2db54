//! Error taxonomy for the connection pipeline and startup configuration.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The ClientHello could not be captured from the client stream.
#[derive(Error, Debug)]
pub enum HelloError {
    /// The client did not deliver a complete ClientHello in time
    #[error("client hello not received within {0:?}")]
    Timeout(Duration),

    /// The stream closed or carried something other than a TLS ClientHello
    #[error("failed to read client hello: {0}")]
    Parse(#[source] io::Error),
}

/// The backend connection could not be established.
#[derive(Error, Debug)]
pub enum DialError {
    /// The ClientHello had no SNI, so there is nothing to route on
    #[error("client hello carried no server name")]
    MissingServerName,

    /// Name resolution or TCP connect failed
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Resolution plus connect did not finish within the dial timeout
    #[error("connect to {host}:{port} timed out after {timeout:?}")]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },
}

/// Per-connection failure. Always handled by logging and closing the client.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error(transparent)]
    Hello(#[from] HelloError),

    #[error(transparent)]
    Dial(#[from] DialError),
}

/// Invalid startup configuration. Fatal before the listener binds.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid fault injection rate {0}: must be within [0, 1]")]
    InvalidFaultRate(f64),

    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),
}
