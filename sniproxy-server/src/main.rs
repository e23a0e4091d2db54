mod proxy;

use clap::Parser;
use sniproxy_core::config::{load_config, Config};
use sniproxy_core::Handler;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "sniproxy",
    version,
    about = "SNI proxy — routes TLS by server name and injects faults for resilience testing"
)]
struct Cli {
    /// Path to an optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept TLS connections on
    #[arg(long, env = "SNIPROXY_LISTEN")]
    listen: Option<String>,

    /// Port dialed on the SNI host
    #[arg(long, env = "SNIPROXY_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Probability in [0, 1] that a connection gets a fault
    #[arg(long, env = "FAULT_INJECTION_RATE")]
    fault_rate: Option<f64>,

    /// Seconds to stall a faulted connection; 0 drops it instead
    #[arg(long, env = "FAULT_INJECTION_SLEEP")]
    fault_sleep: Option<u64>,

    /// Override log level
    #[arg(short, long, env = "SNIPROXY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Flags and environment win over the config file.
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.proxy.listen = listen.clone();
        }
        if let Some(port) = self.backend_port {
            config.proxy.backend_port = port;
        }
        if let Some(rate) = self.fault_rate {
            config.fault.rate = rate;
        }
        if let Some(sleep) = self.fault_sleep {
            config.fault.sleep_sec = sleep;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load config
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    cli.apply(&mut config);

    // Setup logging
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Everything is validated before the listener binds
    let faults = config.fault_config()?;
    let listen_addr = config.listen_addr()?;

    tracing::info!(
        "SNI proxy starting (fault rate {}, fault sleep {}s, backend port {})",
        faults.rate(),
        faults.delay().as_secs(),
        config.proxy.backend_port
    );

    let handler = Arc::new(
        Handler::new(faults, config.dialer()).with_hello_timeout(config.hello_timeout()),
    );

    let listener = proxy::bind(listen_addr)?;
    tracing::info!("Listening on {}", listen_addr);

    tokio::select! {
        _ = proxy::run_proxy(listener, handler) => {}
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("SNI proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to setup SIGTERM handler");

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm.recv() => {},
    }
}
