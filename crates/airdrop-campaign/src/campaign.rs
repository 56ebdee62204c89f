//! The campaign aggregate.
//!
//! A [`Campaign`] owns one allowlist root, one tier table, one escrow and one
//! claim ledger. All mutable state sits behind a single mutex and every
//! mutation (state transition, epoch advance, escrow change, ledger write) is
//! one critical section. The lock is never held across an `.await`; the claim
//! path in [`crate::protocol`] re-enters it between suspension points.
//!
//! Lock order is campaign, then timer/store. Timers must not invoke wakers
//! from inside `set_wakeup`.
//!
//! Every transition is persisted before it becomes observable: the new state
//! is validated with [`StateMachine::check`], written to the store, and only
//! then applied.
//!
//! A claim that was paid but could not be written stays in memory as an
//! unpersisted record. Every later write carries those records in the same
//! batch as its snapshot, so the stored ledger and the stored escrow totals
//! never disagree. An epoch wakeup whose state cannot be written is retried
//! after [`STORAGE_RETRY_SECS`] rather than dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use airdrop_core::constants::STORAGE_RETRY_SECS;
use airdrop_core::error::{AirdropError, EscrowError, ScheduleError, SnapshotError};
use airdrop_core::params::CampaignParams;
use airdrop_core::state::{CampaignState, StateMachine};
use airdrop_core::traits::{AssetTransfer, MerkleVerifier, TimerService, TimerWaker};
use airdrop_core::types::{Amount, CancelToken, ClaimRecord, Hash256, Identity, Timestamp};

use crate::ledger::ClaimLedger;
use crate::payout::{EscrowAccount, PayoutEngine};
use crate::scheduler::{EpochScheduler, Step};
use crate::snapshot::CampaignSnapshot;
use crate::store::CampaignStore;

/// Services injected into a campaign by its host.
#[derive(Clone)]
pub struct Collaborators {
    pub timer: Arc<dyn TimerService>,
    pub verifier: Arc<dyn MerkleVerifier>,
    pub transfer: Arc<dyn AssetTransfer>,
    pub store: Arc<dyn CampaignStore>,
}

pub(crate) struct Inner {
    pub(crate) machine: StateMachine,
    pub(crate) scheduler: EpochScheduler,
    pub(crate) payout: PayoutEngine,
    pub(crate) ledger: ClaimLedger,
    pub(crate) incarnation: u32,
    /// Paid claims whose records have not reached the store yet.
    pub(crate) unpersisted: Vec<ClaimRecord>,
}

/// Read-only view of a campaign.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CampaignInfo {
    pub token_name: String,
    pub root_hash: Hash256,
    pub state: CampaignState,
    pub incarnation: u32,
    pub current_epoch: u64,
    pub total_epochs: u64,
    pub epoch_length_secs: u64,
    pub claim_window_start: Option<Timestamp>,
    pub next_wakeup: Option<Timestamp>,
    pub halted: bool,
    /// Tier row of the current epoch.
    pub active_tiers: Vec<Amount>,
    pub escrow: EscrowAccount,
    /// Debited for transfers that have not settled yet.
    pub in_flight: Amount,
    pub claim_count: usize,
    /// Paid claims still waiting to be written to the store.
    pub unpersisted_claims: usize,
}

/// Result of an administrative escrow withdrawal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Withdrawal {
    pub amount: Amount,
    pub escrow_remaining: Amount,
}

pub struct Campaign {
    pub(crate) params: CampaignParams,
    pub(crate) timer: Arc<dyn TimerService>,
    pub(crate) verifier: Arc<dyn MerkleVerifier>,
    pub(crate) transfer: Arc<dyn AssetTransfer>,
    pub(crate) store: Arc<dyn CampaignStore>,
    pub(crate) inner: Mutex<Inner>,
    this: Weak<Campaign>,
}

impl Campaign {
    /// Start a new campaign: validate parameters, persist it as `Prepared`
    /// and register the window-open wakeup at `now + start_delay_secs`.
    ///
    /// Fails without side effects if the parameters are invalid or the store
    /// already holds a campaign.
    pub fn start(params: CampaignParams, collab: Collaborators) -> Result<Arc<Self>, AirdropError> {
        params.validate()?;
        if let Some(existing) = collab.store.load_snapshot()? {
            return Err(SnapshotError::AlreadyInitialized(existing.incarnation).into());
        }
        let incarnation = 1;
        let inner = Inner {
            machine: StateMachine::new(),
            scheduler: EpochScheduler::new(params.total_epochs, params.epoch_length_secs, incarnation),
            payout: PayoutEngine::new(
                params.tier_table.clone(),
                EscrowAccount::funded(params.initial_escrow),
            ),
            ledger: ClaimLedger::new(),
            incarnation,
            unpersisted: Vec::new(),
        };
        let campaign = Self::assemble(params, collab, inner);
        campaign.prepare()?;
        Ok(campaign)
    }

    /// Reload a campaign from its store after a restart or upgrade.
    ///
    /// Bumps the incarnation, cancels the wakeup of the previous incarnation
    /// and re-registers the pending one. A campaign found `Open` passes
    /// through `Restarting` on the way back.
    pub fn restore(collab: Collaborators) -> Result<Arc<Self>, AirdropError> {
        let snapshot = collab.store.load_snapshot()?.ok_or(SnapshotError::Missing)?;
        snapshot.params.validate()?;
        let incarnation = snapshot
            .incarnation
            .checked_add(1)
            .ok_or_else(|| SnapshotError::Corrupted("incarnation overflow".into()))?;

        let ledger = ClaimLedger::from_records(collab.store.claims()?)?;
        if ledger.total_paid() != snapshot.escrow.total_paid {
            return Err(SnapshotError::Corrupted(format!(
                "ledger pays {} but escrow records {}",
                ledger.total_paid(),
                snapshot.escrow.total_paid
            ))
            .into());
        }

        let params = snapshot.params.clone();
        let inner = Inner {
            machine: StateMachine::restore(snapshot.state),
            scheduler: EpochScheduler::restore(
                params.total_epochs,
                params.epoch_length_secs,
                incarnation,
                snapshot.schedule.clone(),
            ),
            payout: PayoutEngine::new(params.tier_table.clone(), snapshot.escrow),
            ledger,
            incarnation,
            unpersisted: Vec::new(),
        };
        let campaign = Self::assemble(params, collab, inner);
        campaign.resume(snapshot.schedule.live_token)?;
        Ok(campaign)
    }

    /// Restore the stored campaign if there is one, otherwise start `params`.
    pub fn open_or_start(
        params: CampaignParams,
        collab: Collaborators,
    ) -> Result<Arc<Self>, AirdropError> {
        if collab.store.load_snapshot()?.is_some() {
            let campaign = Self::restore(collab)?;
            if campaign.params != params {
                warn!("stored campaign parameters differ from configured ones; using stored");
            }
            Ok(campaign)
        } else {
            Self::start(params, collab)
        }
    }

    fn assemble(params: CampaignParams, collab: Collaborators, inner: Inner) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            params,
            timer: collab.timer,
            verifier: collab.verifier,
            transfer: collab.transfer,
            store: collab.store,
            inner: Mutex::new(inner),
            this: this.clone(),
        })
    }

    fn prepare(&self) -> Result<(), AirdropError> {
        let mut inner = self.inner.lock();
        inner.machine.check(CampaignState::Prepared)?;

        let mut scheduler = inner.scheduler.clone();
        let token = scheduler.issue_token();
        let now = self.timer.current_timestamp();
        let at = scheduler.arm_window(now, self.params.start_delay_secs, token);

        let snapshot = self.capture(&inner, CampaignState::Prepared, &scheduler);
        self.persist(&mut inner, &snapshot)?;
        inner.scheduler = scheduler;
        inner.machine.transition_to(CampaignState::Prepared)?;
        self.timer.set_wakeup(at, self.waker(0, token), token);

        info!(
            root = %self.params.root_hash,
            total_epochs = self.params.total_epochs,
            escrow = self.params.initial_escrow,
            window_start = at,
            "campaign prepared"
        );
        Ok(())
    }

    fn resume(&self, stale_token: Option<CancelToken>) -> Result<(), AirdropError> {
        let mut inner = self.inner.lock();
        if let Some(token) = stale_token {
            self.timer.cancel(&token);
        }
        let state = inner.machine.status();
        match state {
            CampaignState::Initialized => {
                Err(SnapshotError::Corrupted("stored campaign was never prepared".into()).into())
            }
            CampaignState::Expired => {
                let snapshot = self.capture(&inner, state, &inner.scheduler);
                self.persist(&mut inner, &snapshot)?;
                info!(incarnation = inner.incarnation, "restored expired campaign (read-only)");
                Ok(())
            }
            CampaignState::Prepared => {
                let mut scheduler = inner.scheduler.clone();
                let token = scheduler.issue_token();
                let pending = scheduler.rearm(token);
                let snapshot = self.capture(&inner, state, &scheduler);
                self.persist(&mut inner, &snapshot)?;
                inner.scheduler = scheduler;
                if let Some((at, boundary)) = pending {
                    self.timer.set_wakeup(at, self.waker(boundary, token), token);
                }
                info!(incarnation = inner.incarnation, "restored prepared campaign");
                Ok(())
            }
            CampaignState::Open | CampaignState::Restarting => {
                if state == CampaignState::Open {
                    inner.machine.check(CampaignState::Restarting)?;
                    let snapshot =
                        self.capture(&inner, CampaignState::Restarting, &inner.scheduler);
                    self.persist(&mut inner, &snapshot)?;
                    inner.machine.transition_to(CampaignState::Restarting)?;
                    info!(incarnation = inner.incarnation, "campaign restarting");
                }

                let mut scheduler = inner.scheduler.clone();
                let token = scheduler.issue_token();
                let pending = scheduler.rearm(token);
                inner.machine.check(CampaignState::Open)?;
                let snapshot = self.capture(&inner, CampaignState::Open, &scheduler);
                self.persist(&mut inner, &snapshot)?;
                inner.scheduler = scheduler;
                inner.machine.transition_to(CampaignState::Open)?;
                match pending {
                    Some((at, boundary)) => {
                        self.timer.set_wakeup(at, self.waker(boundary, token), token)
                    }
                    None => warn!("reopened campaign has no pending epoch wakeup"),
                }
                info!(
                    incarnation = inner.incarnation,
                    epoch = inner.scheduler.current_epoch(),
                    "campaign reopened"
                );
                Ok(())
            }
        }
    }

    fn waker(&self, boundary: u64, token: CancelToken) -> Arc<dyn TimerWaker> {
        Arc::new(EpochWaker {
            campaign: self.this.clone(),
            boundary,
            token,
        })
    }

    pub(crate) fn capture(
        &self,
        inner: &Inner,
        state: CampaignState,
        scheduler: &EpochScheduler,
    ) -> CampaignSnapshot {
        CampaignSnapshot {
            incarnation: inner.incarnation,
            params: self.params.clone(),
            state,
            schedule: scheduler.state().clone(),
            escrow: inner.payout.committed(),
        }
    }

    /// Write `snapshot`, together with any unpersisted claim records.
    pub(crate) fn persist(
        &self,
        inner: &mut Inner,
        snapshot: &CampaignSnapshot,
    ) -> Result<(), AirdropError> {
        if inner.unpersisted.is_empty() {
            return self.store.save_snapshot(snapshot);
        }
        self.store.commit_claims(&inner.unpersisted, snapshot)?;
        let flushed = inner.unpersisted.len();
        inner.unpersisted.clear();
        info!(flushed, "unpersisted claim records written");
        Ok(())
    }

    // --- Epoch scheduling ---

    /// Handle a timer firing for `boundary`.
    ///
    /// Duplicate and superseded deliveries are ignored. Exhausting the tier
    /// schedule halts the scheduler, expires the campaign and returns
    /// [`ScheduleError::EpochOutOfBounds`].
    pub fn on_wakeup(
        &self,
        boundary: u64,
        token: CancelToken,
        fired_at: Timestamp,
    ) -> Result<(), ScheduleError> {
        let mut inner = self.inner.lock();
        match inner.scheduler.plan(boundary, fired_at) {
            Ok(None) | Err(ScheduleError::Halted) => {
                debug!(
                    boundary,
                    fired_at,
                    epoch = inner.scheduler.current_epoch(),
                    "ignoring already handled wakeup"
                );
                Ok(())
            }
            _ if inner.scheduler.live_token() != Some(token) => {
                debug!(%token, boundary, "ignoring superseded wakeup");
                Ok(())
            }
            Ok(Some(step)) => {
                let advanced = self.advance(&mut inner, step);
                if let Err(ScheduleError::Storage(_)) = &advanced {
                    self.retry_wakeup(&inner, boundary, fired_at);
                }
                advanced
            }
            Err(ScheduleError::EpochOutOfBounds { epoch, total }) => {
                if let Err(e) = self.expire(&mut inner) {
                    if matches!(e, ScheduleError::Storage(_)) {
                        self.retry_wakeup(&inner, boundary, fired_at);
                    }
                    return Err(e);
                }
                Err(ScheduleError::EpochOutOfBounds { epoch, total })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-register the live wakeup for `boundary` after its state change
    /// could not be persisted. The scheduler is unchanged, so the retry is
    /// planned exactly like the original delivery.
    fn retry_wakeup(&self, inner: &Inner, boundary: u64, fired_at: Timestamp) {
        let Some(token) = inner.scheduler.live_token() else {
            return;
        };
        let at = fired_at.saturating_add(STORAGE_RETRY_SECS);
        self.timer.cancel(&token);
        self.timer.set_wakeup(at, self.waker(boundary, token), token);
        warn!(boundary, retry_at = at, "epoch wakeup not persisted; retrying");
    }

    fn advance(&self, inner: &mut Inner, step: Step) -> Result<(), ScheduleError> {
        let opening = matches!(step, Step::OpenWindow { .. });
        let state = if opening {
            inner.machine.check(CampaignState::Open)?;
            CampaignState::Open
        } else {
            inner.machine.status()
        };

        let prev = inner.scheduler.live_token();
        let mut scheduler = inner.scheduler.clone();
        let token = scheduler.issue_token();
        scheduler.apply(step, token);
        let snapshot = self.capture(inner, state, &scheduler);
        self.persist(inner, &snapshot)?;
        inner.scheduler = scheduler;
        if opening {
            inner.machine.transition_to(CampaignState::Open)?;
        }
        if let Some(prev) = prev {
            self.timer.cancel(&prev);
        }
        self.timer.set_wakeup(
            step.next_at(),
            self.waker(step.following_boundary(), token),
            token,
        );

        let epoch = inner.scheduler.current_epoch();
        if opening {
            info!(epoch, next_wakeup = step.next_at(), "claim window opened");
        } else {
            info!(epoch, next_wakeup = step.next_at(), "advanced epoch");
        }
        Ok(())
    }

    fn expire(&self, inner: &mut Inner) -> Result<(), ScheduleError> {
        inner.machine.check(CampaignState::Expired)?;
        let prev = inner.scheduler.live_token();
        let mut scheduler = inner.scheduler.clone();
        scheduler.halt();
        let snapshot = self.capture(inner, CampaignState::Expired, &scheduler);
        self.persist(inner, &snapshot)?;
        inner.scheduler = scheduler;
        inner.machine.transition_to(CampaignState::Expired)?;
        if let Some(prev) = prev {
            self.timer.cancel(&prev);
        }
        info!(
            epoch = inner.scheduler.current_epoch(),
            escrow = inner.payout.balance(),
            claims = inner.ledger.len(),
            "claim window expired"
        );
        Ok(())
    }

    // --- Read surface ---

    /// Current lifecycle state. Pure read.
    pub fn status(&self) -> CampaignState {
        self.inner.lock().machine.status()
    }

    pub fn current_epoch(&self) -> u64 {
        self.inner.lock().scheduler.current_epoch()
    }

    pub fn params(&self) -> &CampaignParams {
        &self.params
    }

    pub fn incarnation(&self) -> u32 {
        self.inner.lock().incarnation
    }

    pub fn escrow_balance(&self) -> Amount {
        self.inner.lock().payout.balance()
    }

    /// Stored record of `identity`'s claim, if any.
    pub fn claim_record(&self, identity: &Identity) -> Option<ClaimRecord> {
        self.inner.lock().ledger.get(identity).cloned()
    }

    pub fn info(&self) -> CampaignInfo {
        let inner = self.inner.lock();
        let schedule = inner.scheduler.state();
        CampaignInfo {
            token_name: self.params.token_name.clone(),
            root_hash: self.params.root_hash,
            state: inner.machine.status(),
            incarnation: inner.incarnation,
            current_epoch: schedule.current_epoch,
            total_epochs: self.params.total_epochs,
            epoch_length_secs: self.params.epoch_length_secs,
            claim_window_start: schedule.window_start,
            next_wakeup: schedule.next_wakeup,
            halted: schedule.halted,
            active_tiers: inner.payout.active_row(schedule.current_epoch),
            escrow: inner.payout.committed(),
            in_flight: inner.payout.in_flight(),
            claim_count: inner.ledger.len(),
            unpersisted_claims: inner.unpersisted.len(),
        }
    }

    // --- Administration ---

    /// Top up escrow. Rejected once the campaign has expired.
    pub fn deposit_escrow(&self, amount: Amount) -> Result<Amount, EscrowError> {
        let mut inner = self.inner.lock();
        if inner.machine.status() == CampaignState::Expired {
            return Err(EscrowError::CampaignExpired);
        }
        let before = inner.payout.account();
        let balance = inner.payout.deposit(amount)?;
        let snapshot = self.capture(&inner, inner.machine.status(), &inner.scheduler);
        if let Err(e) = self.persist(&mut inner, &snapshot) {
            inner.payout.reset_account(before);
            return Err(e.into());
        }
        info!(amount, balance, "escrow topped up");
        Ok(balance)
    }

    /// Privileged withdrawal of unreserved escrow. Allowed in every state so
    /// that unclaimed supply can be recovered after expiry.
    pub fn create_payment(&self, amount: Amount) -> Result<Withdrawal, EscrowError> {
        let mut inner = self.inner.lock();
        let before = inner.payout.account();
        let remaining = inner.payout.withdraw(amount)?;
        let snapshot = self.capture(&inner, inner.machine.status(), &inner.scheduler);
        if let Err(e) = self.persist(&mut inner, &snapshot) {
            inner.payout.reset_account(before);
            return Err(e.into());
        }
        info!(amount, remaining, "escrow payment created");
        Ok(Withdrawal {
            amount,
            escrow_remaining: remaining,
        })
    }

    /// Cancel the live wakeup. The campaign stops advancing until restored.
    ///
    /// Makes a last attempt to write unpersisted claim records.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if !inner.unpersisted.is_empty() {
            let snapshot = self.capture(&inner, inner.machine.status(), &inner.scheduler);
            if let Err(e) = self.persist(&mut inner, &snapshot) {
                error!(
                    count = inner.unpersisted.len(),
                    "claim records lost at shutdown: {e}"
                );
            }
        }
        if let Some(token) = inner.scheduler.disarm() {
            let cancelled = self.timer.cancel(&token);
            info!(%token, cancelled, "campaign timer cancelled");
        }
    }
}

struct EpochWaker {
    campaign: Weak<Campaign>,
    boundary: u64,
    token: CancelToken,
}

impl TimerWaker for EpochWaker {
    fn wake(&self, fired_at: Timestamp) {
        let Some(campaign) = self.campaign.upgrade() else {
            debug!(boundary = self.boundary, "campaign dropped before wakeup");
            return;
        };
        if let Err(e) = campaign.on_wakeup(self.boundary, self.token, fired_at) {
            error!(boundary = self.boundary, fired_at, "epoch wakeup failed: {e}");
        }
    }
}
