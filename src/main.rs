//! relay-gate
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────┐
//!                  │                       RELAY GATE                       │
//!   Client ────────┼─▶ net::listener ──▶ http::server ──▶ headers::rewrite  │
//!                  │                                            │           │
//!                  │                                            ▼           │
//!                  │            load_balancer::select ◀── http::forwarder ──┼──▶ Upstream
//!                  │                                            │           │
//!   Client ◀───────┼──────────────── streamed response ◀────────┘◀──────────┼─── Upstream
//!                  │                                                        │
//!                  │  config · health · resilience · lifecycle · observability
//!                  └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_gate::config::loader::{read_config, ConfigError};
use relay_gate::config::validation::validate_config;
use relay_gate::config::{ProxyConfig, UpstreamConfig};
use relay_gate::lifecycle::startup;
use relay_gate::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "relay-gate")]
#[command(about = "Round-robin HTTP reverse proxy for a static upstream pool", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream address; repeat to build the pool (replaces configured upstreams)
    #[arg(short, long = "upstream")]
    upstreams: Vec<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if !self.upstreams.is_empty() {
            config.upstreams = self.upstreams.into_iter().map(UpstreamConfig::new).collect();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("relay-gate v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config).await
}
