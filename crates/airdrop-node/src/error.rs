//! Host-level failures.

use thiserror::Error;

use airdrop_core::error::{AirdropError, ParamsError};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("config: {0}")] Config(String),
    #[error("invalid campaign parameters: {0}")] Params(#[from] ParamsError),
    #[error(transparent)] Airdrop(#[from] AirdropError),
    #[error("rpc: {0}")] Rpc(String),
}

impl From<config::ConfigError> for NodeError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
