//! Error types for airdrop campaigns.
use thiserror::Error;

use crate::state::CampaignState;
use crate::types::{Amount, Identity, Tier};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: expected {expected}, got {got}")] InvalidLength { expected: usize, got: usize },
    #[error("invalid public key bytes")] InvalidPublicKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid transition: {from} -> {to}")] InvalidTransition { from: CampaignState, to: CampaignState },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierError {
    #[error("tier {tier} out of bounds for row of length {len}")] TierOutOfBounds { tier: Tier, len: usize },
    #[error("epoch {epoch} out of bounds: total epochs {total}")] EpochOutOfBounds { epoch: u64, total: u64 },
}

/// Construction-time validation failures. A campaign is never partially built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("tier table is empty")] EmptyTierTable,
    #[error("tier table has no row for epoch {0}")] MissingTierRow(u64),
    #[error("tier row for epoch {0} is empty")] EmptyTierRow(u64),
    #[error("total epochs must be non-zero")] ZeroTotalEpochs,
    #[error("epoch length must be non-zero")] ZeroEpochLength,
    #[error("root hash must be non-zero")] ZeroRootHash,
    #[error("too many epochs: {got} > {max}")] TooManyEpochs { got: u64, max: u64 },
    #[error("too many tiers in epoch {epoch}: {got} > {max}")] TooManyTiers { epoch: u64, got: usize, max: usize },
    #[error("tier amount overflow in epoch {0}")] AmountOverflow(u64),
    #[error("invalid parameter {name}: {reason}")] Invalid { name: &'static str, reason: String },
}

/// Fault raised by the merkle proof oracle itself (not a failed proof).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("verifier unavailable: {0}")]
pub struct VerifierFault(pub String);

/// Fault raised by the asset transfer facility.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferFault {
    #[error("transfer rejected: {0}")] Rejected(String),
    #[error("transfer facility unavailable: {0}")] Unavailable(String),
}

/// Claim-path failures. Every variant except `Storage` leaves ledger, escrow
/// and state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("claim window closed: campaign is {state}")] ClaimWindowClosed { state: CampaignState },
    #[error("allocation for {0} has already been claimed")] AlreadyClaimed(Identity),
    #[error("{0} is not on the allowlist for the asserted tier")] IneligibleClaim(Identity),
    #[error("proof verification unavailable: {0}")] ProofVerificationUnavailable(String),
    #[error("tier {tier} out of bounds for row of length {len}")] TierOutOfBounds { tier: Tier, len: usize },
    #[error("epoch {epoch} out of bounds: total epochs {total}")] EpochOutOfBounds { epoch: u64, total: u64 },
    #[error("insufficient escrow: have {have}, need {need}")] InsufficientEscrow { have: Amount, need: Amount },
    #[error("payout transfer failed: {0}")] TransferFailed(String),
    #[error("storage: {0}")] Storage(String),
}

impl From<TierError> for ClaimError {
    fn from(e: TierError) -> Self {
        match e {
            TierError::TierOutOfBounds { tier, len } => Self::TierOutOfBounds { tier, len },
            TierError::EpochOutOfBounds { epoch, total } => Self::EpochOutOfBounds { epoch, total },
        }
    }
}

impl From<VerifierFault> for ClaimError {
    fn from(e: VerifierFault) -> Self {
        Self::ProofVerificationUnavailable(e.0)
    }
}

impl From<TransferFault> for ClaimError {
    fn from(e: TransferFault) -> Self {
        Self::TransferFailed(e.to_string())
    }
}

/// Epoch-scheduler failures. `EpochOutOfBounds` halts the scheduling loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("epoch {epoch} out of bounds: total epochs {total}")] EpochOutOfBounds { epoch: u64, total: u64 },
    #[error("scheduler halted")] Halted,
    #[error(transparent)] State(#[from] StateError),
    #[error("storage: {0}")] Storage(String),
}

/// Administrative escrow failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("insufficient escrow: have {have}, need {need}")] InsufficientEscrow { have: Amount, need: Amount },
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("escrow balance overflow")] Overflow,
    #[error("campaign has expired")] CampaignExpired,
    #[error("storage: {0}")] Storage(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version: {0}")] UnsupportedVersion(u32),
    #[error("corrupted snapshot: {0}")] Corrupted(String),
    #[error("no snapshot stored")] Missing,
    #[error("campaign already initialized (incarnation {0})")] AlreadyInitialized(u32),
}

/// Umbrella error for hosts composing a campaign.
#[derive(Error, Debug)]
pub enum AirdropError {
    #[error(transparent)] Encoding(#[from] EncodingError),
    #[error(transparent)] State(#[from] StateError),
    #[error(transparent)] Tier(#[from] TierError),
    #[error(transparent)] Params(#[from] ParamsError),
    #[error(transparent)] Claim(#[from] ClaimError),
    #[error(transparent)] Schedule(#[from] ScheduleError),
    #[error(transparent)] Escrow(#[from] EscrowError),
    #[error(transparent)] Snapshot(#[from] SnapshotError),
    #[error("storage: {0}")] Storage(String),
}

impl From<AirdropError> for ClaimError {
    fn from(e: AirdropError) -> Self {
        match e {
            AirdropError::Claim(e) => e,
            AirdropError::Storage(msg) => Self::Storage(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<AirdropError> for ScheduleError {
    fn from(e: AirdropError) -> Self {
        match e {
            AirdropError::Schedule(e) => e,
            AirdropError::State(e) => Self::State(e),
            AirdropError::Storage(msg) => Self::Storage(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<AirdropError> for EscrowError {
    fn from(e: AirdropError) -> Self {
        match e {
            AirdropError::Escrow(e) => e,
            AirdropError::Storage(msg) => Self::Storage(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}
