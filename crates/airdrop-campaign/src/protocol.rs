//! Claim protocol: the single externally callable claim operation.
//!
//! Gates, in order, each failing closed:
//!
//! 1. campaign is `Open`, else `ClaimWindowClosed`
//! 2. identity has no record and no claim in flight, else `AlreadyClaimed`
//! 3. proof verifies `derive_leaf(identity, tier)` against the root, else
//!    `IneligibleClaim` (or `ProofVerificationUnavailable` on oracle fault)
//! 4. payout for `tier` in the current epoch, else `TierOutOfBounds`
//! 5. escrow debit and asset transfer, else `InsufficientEscrow` / `TransferFailed`
//! 6. ledger record and escrow settlement, persisted in one commit
//!
//! Gate 2 reserves the identity in the same critical section as the check,
//! so concurrent claims for one identity cannot both pass it. Any failure
//! after gate 2 releases the reservation and refunds a debit, except when the
//! claim is abandoned while its transfer is outstanding: the outcome of that
//! transfer is unknown, so the identity stays reserved and the debit stays in
//! flight.

use tracing::{debug, error, info, warn};

use airdrop_core::error::ClaimError;
use airdrop_core::merkle::{derive_leaf, MerkleProof};
use airdrop_core::state::CampaignState;
use airdrop_core::types::{Amount, ClaimReceipt, ClaimRecord, Identity, Tier};

use crate::campaign::{Campaign, Inner};

/// Undoes a claim's reservation and escrow debit unless disarmed.
struct ClaimGuard<'a> {
    campaign: &'a Campaign,
    identity: Identity,
    debited: Amount,
    transferring: bool,
    armed: bool,
}

impl<'a> ClaimGuard<'a> {
    fn new(campaign: &'a Campaign, identity: Identity) -> Self {
        Self {
            campaign,
            identity,
            debited: 0,
            transferring: false,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.transferring {
            warn!(
                identity = %self.identity,
                amount = self.debited,
                "claim dropped during transfer; reservation and debit held"
            );
            return;
        }
        let mut inner = self.campaign.inner.lock();
        if self.debited > 0 {
            inner.payout.refund(self.debited);
        }
        inner.ledger.release(&self.identity);
    }
}

fn require_open(inner: &Inner) -> Result<(), ClaimError> {
    match inner.machine.status() {
        CampaignState::Open => Ok(()),
        state => Err(ClaimError::ClaimWindowClosed { state }),
    }
}

impl Campaign {
    /// Redeem `identity`'s allocation at `tier`.
    ///
    /// On success exactly one transfer and one ledger record were made; on
    /// any error before the transfer completes, none were.
    ///
    /// Not cancellation safe once the transfer has started: if the future is
    /// dropped while awaiting it, the identity stays reserved and the amount
    /// stays in flight until the campaign is restored. Hosts that may drop
    /// callers should drive claims on their own task.
    pub async fn make_claim(
        &self,
        identity: Identity,
        tier: Tier,
        proof: &MerkleProof,
    ) -> Result<ClaimReceipt, ClaimError> {
        let reserved = {
            let mut inner = self.inner.lock();
            require_open(&inner).and_then(|()| inner.ledger.reserve(identity))
        };
        if let Err(e) = reserved {
            debug!(%identity, tier, "claim rejected: {e}");
            return Err(e);
        }
        let mut guard = ClaimGuard::new(self, identity);

        let leaf = derive_leaf(&identity, tier);
        match self.verifier.verify(proof, &leaf, &self.params.root_hash) {
            Ok(true) => {}
            Ok(false) => {
                debug!(%identity, tier, "claim rejected: proof does not verify");
                return Err(ClaimError::IneligibleClaim(identity));
            }
            Err(fault) => {
                warn!(%identity, "proof verification unavailable: {fault}");
                return Err(fault.into());
            }
        }

        let priced = {
            let mut inner = self.inner.lock();
            require_open(&inner).and_then(|()| {
                let epoch = inner.scheduler.current_epoch();
                let amount = inner.payout.get_payout_amount(epoch, tier)?;
                inner.payout.debit(amount)?;
                Ok((epoch, amount))
            })
        };
        let (epoch, amount) = match priced {
            Ok(v) => v,
            Err(e) => {
                debug!(%identity, tier, "claim rejected: {e}");
                return Err(e);
            }
        };
        guard.debited = amount;

        guard.transferring = true;
        let transferred = self.transfer.transfer(&identity, amount).await;
        guard.transferring = false;
        if let Err(fault) = transferred {
            warn!(%identity, amount, "payout transfer failed: {fault}");
            return Err(fault.into());
        }

        let record = ClaimRecord {
            identity,
            tier,
            amount_paid: amount,
            epoch,
            claimed_at: self.timer.current_timestamp(),
        };
        let persisted = {
            let mut inner = self.inner.lock();
            inner.payout.settle(amount);
            inner.ledger.record(record.clone()).and_then(|()| {
                inner.unpersisted.push(record.clone());
                let snapshot = self.capture(&inner, inner.machine.status(), &inner.scheduler);
                self.persist(&mut inner, &snapshot).map_err(ClaimError::from)
            })
        };
        guard.disarm();
        if let Err(e) = persisted {
            error!(%identity, amount, "claim paid but not persisted: {e}");
            return Err(e);
        }

        info!(%identity, tier, epoch, amount, "claim paid");
        Ok(ClaimReceipt::from(&record))
    }
}
