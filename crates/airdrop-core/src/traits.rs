//! Collaborator interfaces consumed by a campaign.
//!
//! A campaign never reaches for ambient services. Its host injects:
//! - [`TimerService`]: absolute time and one-shot wakeups (manual in tests,
//!   tokio-backed in the node)
//! - [`MerkleVerifier`]: allowlist membership oracle
//! - [`AssetTransfer`]: credits a claimant's destination with paid-out tokens

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{TransferFault, VerifierFault};
use crate::merkle::MerkleProof;
use crate::types::{Amount, CancelToken, Hash256, Identity, Timestamp};

/// Callback invoked when a scheduled wakeup fires.
///
/// `fired_at` is the timer's actual time at firing, which may be later than
/// the requested time.
pub trait TimerWaker: Send + Sync {
    fn wake(&self, fired_at: Timestamp);
}

/// Source of absolute time and one-shot wakeups.
///
/// Implementations must never invoke a waker from inside
/// [`set_wakeup`](Self::set_wakeup); callers may hold their own locks there.
pub trait TimerService: Send + Sync {
    /// Current absolute time in seconds.
    fn current_timestamp(&self) -> Timestamp;

    /// Register `waker` to fire once at or after `at`.
    ///
    /// The wakeup is identified by `token` until it fires or is cancelled.
    fn set_wakeup(&self, at: Timestamp, waker: Arc<dyn TimerWaker>, token: CancelToken);

    /// Cancel a pending wakeup. Returns `true` if one was removed.
    fn cancel(&self, token: &CancelToken) -> bool;
}

/// Allowlist membership oracle.
///
/// `Ok(false)` means the proof does not establish membership of `leaf` under
/// `root`. `Err` means the oracle itself could not answer.
pub trait MerkleVerifier: Send + Sync {
    fn verify(
        &self,
        proof: &MerkleProof,
        leaf: &Hash256,
        root: &Hash256,
    ) -> Result<bool, VerifierFault>;
}

/// Delivers paid-out tokens to a claimant.
///
/// Escrow accounting stays with the campaign; this facility only credits the
/// destination resolved for `identity`. It is all-or-nothing: on `Err` nothing
/// was credited.
#[async_trait]
pub trait AssetTransfer: Send + Sync {
    async fn transfer(&self, identity: &Identity, amount: Amount) -> Result<(), TransferFault>;
}
