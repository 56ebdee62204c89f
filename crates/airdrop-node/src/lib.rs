//! # airdrop-node
//! Campaign host: RocksDB storage, wall-clock timer, JSON-RPC and orchestration.
//!
//! Composes a running airdrop campaign:
//! - [`storage::RocksStore`] - persistent campaign snapshot and claim records
//! - [`timer::TokioTimer`] - wall-clock wakeups on the tokio runtime
//! - [`node::Node`] - wiring of store, timer and collaborators to a campaign
//! - [`rpc`] - JSON-RPC server for claimants and operators
//! - [`config::NodeConfig`] - node configuration and campaign parameter loading

pub mod config;
pub mod error;
pub mod node;
pub mod rpc;
pub mod storage;
pub mod timer;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
pub use timer::TokioTimer;
