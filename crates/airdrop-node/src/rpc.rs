//! JSON-RPC server for the campaign host.
//!
//! Uses jsonrpsee 0.24. Claimant methods live in the `airdrop` namespace;
//! the escrow administration methods are only registered when the node is
//! configured with `admin_rpc`.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use airdrop_campaign::campaign::{CampaignInfo, Withdrawal};
use airdrop_core::error::{ClaimError, EscrowError};
use airdrop_core::merkle::MerkleProof;
use airdrop_core::state::CampaignState;
use airdrop_core::types::{ClaimReceipt, ClaimRecord, Identity, Tier};

use crate::error::NodeError;
use crate::node::Node;

// --- Error codes ---

pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const CLAIM_WINDOW_CLOSED: i32 = -32001;
pub const ALREADY_CLAIMED: i32 = -32002;
pub const INELIGIBLE_CLAIM: i32 = -32003;
pub const VERIFICATION_UNAVAILABLE: i32 = -32004;
pub const TIER_OUT_OF_BOUNDS: i32 = -32005;
pub const EPOCH_OUT_OF_BOUNDS: i32 = -32006;
pub const INSUFFICIENT_ESCROW: i32 = -32007;
pub const TRANSFER_FAILED: i32 = -32008;
pub const STORAGE_FAILURE: i32 = -32010;
pub const ESCROW_REJECTED: i32 = -32020;

/// Lightweight campaign status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusJson {
    /// Lifecycle state, e.g. "claim-window-open".
    pub state: CampaignState,
    /// Whether claims are currently accepted.
    pub claim_window_open: bool,
    pub current_epoch: u64,
    pub total_epochs: u64,
    /// Host wall-clock time, RFC 3339.
    pub server_time: String,
}

/// Parameters of `airdrop_claim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Claimant identity as 64 hex characters.
    pub identity: String,
    pub tier: Tier,
    pub proof: MerkleProof,
}

/// Parse a 64-character hex string into an Identity.
pub fn parse_identity(hex_str: &str) -> Result<Identity, ErrorObjectOwned> {
    if hex_str.len() != 64 {
        return Err(rpc_error(INVALID_PARAMS, "identity must be 64 hex characters"));
    }
    Identity::from_hex(hex_str).map_err(|e| rpc_error(INVALID_PARAMS, &e.to_string()))
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

/// JSON-RPC error code for a claim rejection.
pub fn claim_error_code(e: &ClaimError) -> i32 {
    match e {
        ClaimError::ClaimWindowClosed { .. } => CLAIM_WINDOW_CLOSED,
        ClaimError::AlreadyClaimed(_) => ALREADY_CLAIMED,
        ClaimError::IneligibleClaim(_) => INELIGIBLE_CLAIM,
        ClaimError::ProofVerificationUnavailable(_) => VERIFICATION_UNAVAILABLE,
        ClaimError::TierOutOfBounds { .. } => TIER_OUT_OF_BOUNDS,
        ClaimError::EpochOutOfBounds { .. } => EPOCH_OUT_OF_BOUNDS,
        ClaimError::InsufficientEscrow { .. } => INSUFFICIENT_ESCROW,
        ClaimError::TransferFailed(_) => TRANSFER_FAILED,
        ClaimError::Storage(_) => STORAGE_FAILURE,
    }
}

fn claim_error(e: ClaimError) -> ErrorObjectOwned {
    rpc_error(claim_error_code(&e), &e.to_string())
}

fn escrow_error(e: EscrowError) -> ErrorObjectOwned {
    let code = match e {
        EscrowError::Storage(_) => STORAGE_FAILURE,
        EscrowError::InsufficientEscrow { .. } => INSUFFICIENT_ESCROW,
        _ => ESCROW_REJECTED,
    };
    rpc_error(code, &e.to_string())
}

/// Claimant-facing interface.
#[rpc(server, namespace = "airdrop")]
pub trait AirdropRpc {
    /// Returns the lifecycle state and current epoch.
    #[method(name = "getStatus")]
    async fn get_status(&self) -> Result<StatusJson, ErrorObjectOwned>;

    /// Returns the full campaign view.
    #[method(name = "getInfo")]
    async fn get_info(&self) -> Result<CampaignInfo, ErrorObjectOwned>;

    /// Returns the stored claim record for an identity, if any.
    #[method(name = "getClaim")]
    async fn get_claim(&self, identity: String) -> Result<Option<ClaimRecord>, ErrorObjectOwned>;

    /// Redeems an allowlist allocation.
    #[method(name = "claim")]
    async fn claim(&self, request: ClaimRequest) -> Result<ClaimReceipt, ErrorObjectOwned>;
}

/// Operator interface for escrow administration.
#[rpc(server, namespace = "airdrop")]
pub trait AirdropAdminRpc {
    /// Tops up escrow; returns the new balance.
    #[method(name = "depositEscrow")]
    async fn deposit_escrow(&self, amount: u64) -> Result<u64, ErrorObjectOwned>;

    /// Withdraws unreserved escrow.
    #[method(name = "createPayment")]
    async fn create_payment(&self, amount: u64) -> Result<Withdrawal, ErrorObjectOwned>;
}

/// Implementation of both RPC interfaces over a running node.
#[derive(Clone)]
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl AirdropRpcServer for RpcServerImpl {
    async fn get_status(&self) -> Result<StatusJson, ErrorObjectOwned> {
        let campaign = self.node.campaign();
        let state = campaign.status();
        Ok(StatusJson {
            state,
            claim_window_open: state == CampaignState::Open,
            current_epoch: campaign.current_epoch(),
            total_epochs: campaign.params().total_epochs,
            server_time: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn get_info(&self) -> Result<CampaignInfo, ErrorObjectOwned> {
        Ok(self.node.campaign().info())
    }

    async fn get_claim(&self, identity: String) -> Result<Option<ClaimRecord>, ErrorObjectOwned> {
        let identity = parse_identity(&identity)?;
        Ok(self.node.campaign().claim_record(&identity))
    }

    async fn claim(&self, request: ClaimRequest) -> Result<ClaimReceipt, ErrorObjectOwned> {
        let identity = parse_identity(&request.identity)?;
        let campaign = Arc::clone(self.node.campaign());
        // A dropped connection must not cancel a claim midway through its
        // transfer, so the claim runs on its own task.
        let task = tokio::spawn(async move {
            campaign.make_claim(identity, request.tier, &request.proof).await
        });
        match task.await {
            Ok(result) => result.map_err(claim_error),
            Err(e) => {
                warn!(%identity, "claim task failed: {e}");
                Err(rpc_error(INTERNAL_ERROR, "claim task failed"))
            }
        }
    }
}

#[async_trait]
impl AirdropAdminRpcServer for RpcServerImpl {
    async fn deposit_escrow(&self, amount: u64) -> Result<u64, ErrorObjectOwned> {
        self.node.campaign().deposit_escrow(amount).map_err(escrow_error)
    }

    async fn create_payment(&self, amount: u64) -> Result<Withdrawal, ErrorObjectOwned> {
        self.node.campaign().create_payment(amount).map_err(escrow_error)
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns the bound address and a [`ServerHandle`] that can be used to stop
/// the server.
pub async fn start_rpc_server(
    addr: &str,
    node: Arc<Node>,
) -> Result<(SocketAddr, ServerHandle), NodeError> {
    let admin = node.config().admin_rpc;
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| NodeError::Rpc(format!("bind {addr}: {e}")))?;
    let local_addr = server
        .local_addr()
        .map_err(|e| NodeError::Rpc(e.to_string()))?;

    let rpc_impl = RpcServerImpl::new(node);
    let mut module = AirdropRpcServer::into_rpc(rpc_impl.clone());
    if admin {
        module
            .merge(AirdropAdminRpcServer::into_rpc(rpc_impl))
            .map_err(|e| NodeError::Rpc(e.to_string()))?;
    }
    info!(%local_addr, admin, "RPC server started");
    Ok((local_addr, server.start(module)))
}
