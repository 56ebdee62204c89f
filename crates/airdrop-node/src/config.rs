//! Node configuration for the airdrop campaign host.
//!
//! [`NodeConfig`] carries defaults for the data directory, RPC binding and
//! logging. Campaign parameters live in a separate file loaded by
//! [`load_campaign_params`], with `AIRDROP_`-prefixed environment variables
//! overriding individual fields.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use airdrop_core::constants::DEFAULT_RPC_PORT;
use airdrop_core::params::CampaignParams;

use crate::error::NodeError;

/// Prefix of environment variables overriding campaign parameters,
/// e.g. `AIRDROP_INITIAL_ESCROW=5000`.
pub const ENV_PREFIX: &str = "AIRDROP";

/// Configuration for a campaign host instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "airdrop_campaign=trace").
    pub log_level: String,
    /// Log output format, "text" or "json".
    pub log_format: String,
    /// Campaign parameter file (TOML or JSON). Only required for a first start.
    pub params_file: Option<PathBuf>,
    /// Expose `airdrop_depositEscrow` and `airdrop_createPayment`.
    pub admin_rpc: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("airdrop");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            params_file: None,
            admin_rpc: false,
        }
    }
}

impl NodeConfig {
    /// Path to the RocksDB campaign data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("campaign")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}

/// Load and validate campaign parameters from `path`, applying
/// `AIRDROP_*` environment overrides.
pub fn load_campaign_params(path: &Path) -> Result<CampaignParams, NodeError> {
    let params: CampaignParams = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()?;
    params.validate()?;
    Ok(params)
}
