//! Startup configuration: optional TOML file, overridden by flags and env.
use crate::dial::TcpDialer;
use crate::error::ConfigError;
use crate::fault::FaultConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub fault: FaultSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProxySettings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,
    #[serde(default = "default_timeout")]
    pub hello_timeout_sec: u64,
    #[serde(default = "default_timeout")]
    pub connect_timeout_sec: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backend_port: default_backend_port(),
            hello_timeout_sec: default_timeout(),
            connect_timeout_sec: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FaultSettings {
    /// Probability in [0, 1] that a connection gets a fault.
    #[serde(default = "default_fault_rate")]
    pub rate: f64,
    /// Seconds to stall a faulted connection; 0 drops it instead.
    #[serde(default)]
    pub sleep_sec: u64,
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            rate: default_fault_rate(),
            sleep_sec: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_listen() -> String {
    "0.0.0.0:443".into()
}
fn default_backend_port() -> u16 {
    443
}
fn default_timeout() -> u64 {
    5
}
fn default_fault_rate() -> f64 {
    0.1
}
fn default_log_level() -> String {
    "info".into()
}

// ── Loaders ──────────────────────────────────────────────────────────

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&content)
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.proxy
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.proxy.listen.clone()))
    }

    pub fn fault_config(&self) -> Result<FaultConfig, ConfigError> {
        FaultConfig::new(self.fault.rate, Duration::from_secs(self.fault.sleep_sec))
    }

    pub fn dialer(&self) -> TcpDialer {
        TcpDialer::new(
            self.proxy.backend_port,
            Duration::from_secs(self.proxy.connect_timeout_sec),
        )
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy.hello_timeout_sec)
    }
}
