//! Airdrop campaign host binary.
//!
//! Restores the campaign stored under the data directory, or starts a new one
//! from a parameter file, then serves claims over JSON-RPC until Ctrl+C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use airdrop_node_lib::{start_rpc_server, Node, NodeConfig};

#[derive(Parser, Debug)]
#[command(
    name = "airdrop-node",
    version,
    about = "Merkle-gated, epoch-tiered airdrop campaign host with JSON-RPC"
)]
struct Args {
    /// Data directory for campaign storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// Campaign parameter file (TOML or JSON); required on first start
    #[arg(long)]
    params: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind: String,

    /// RPC server port
    #[arg(long, default_value_t = airdrop_core::constants::DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Expose escrow administration methods over RPC
    #[arg(long)]
    admin_rpc: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn into_config(self) -> NodeConfig {
        let defaults = NodeConfig::default();
        NodeConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            rpc_bind: self.rpc_bind,
            rpc_port: self.rpc_port,
            log_level: self.log_level,
            log_format: self.log_format,
            params_file: self.params,
            admin_rpc: self.admin_rpc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config();
    init_logging(&config.log_level, &config.log_format);

    info!("Airdrop Node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());

    let node = Node::new(config.clone()).context("failed to start campaign host")?;
    let (addr, rpc_handle) = start_rpc_server(&config.rpc_addr(), node.clone())
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {addr}");
    info!("airdrop node running (Ctrl+C to stop)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("received Ctrl+C, shutting down...");

    rpc_handle.stop().ok();
    node.shutdown();
    info!("airdrop node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `format = "json"` emits one JSON object per event; anything else is
/// human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_node_config() {
        let config = Args::parse_from(["airdrop-node"]).into_config();
        let defaults = NodeConfig::default();
        assert_eq!(config.rpc_port, defaults.rpc_port);
        assert_eq!(config.data_dir, defaults.data_dir);
        assert!(!config.admin_rpc);
        assert!(config.params_file.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Args::parse_from([
            "airdrop-node",
            "--data-dir",
            "/tmp/drop",
            "--params",
            "campaign.toml",
            "--rpc-port",
            "9000",
            "--admin-rpc",
            "--log-format",
            "json",
        ])
        .into_config();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/drop"));
        assert_eq!(config.params_file, Some(PathBuf::from("campaign.toml")));
        assert_eq!(config.rpc_port, 9000);
        assert!(config.admin_rpc);
        assert_eq!(config.log_format, "json");
    }
}
