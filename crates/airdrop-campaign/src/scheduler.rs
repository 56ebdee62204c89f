//! Epoch scheduler.
//!
//! Wakeups are numbered by *boundary*: boundary 0 opens the claim window,
//! boundary `k > 0` advances into epoch `k`. The scheduler only accepts the
//! boundary it is waiting for, so a timer that delivers the same wakeup twice
//! (at-least-once) is a no-op the second time.
//!
//! The next wakeup is always computed from the *observed* fire time, never
//! from an ideal schedule:
//!
//! ```text
//! start:       window_start = now + start_delay
//! boundary 0:  epoch = 0,   next = fired_at + epoch_length
//! boundary k:  epoch = k,   next = fired_at + epoch_length   (k < total)
//! boundary k:  EpochOutOfBounds, halt                        (k >= total)
//! ```
//!
//! The scheduler is pure bookkeeping. The campaign owns the timer, persists
//! the result of [`plan`](EpochScheduler::plan) and only then
//! [`apply`](EpochScheduler::apply)s it.

use serde::{Deserialize, Serialize};

use airdrop_core::error::ScheduleError;
use airdrop_core::types::{CancelToken, Timestamp};

/// Persisted scheduler position.
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ScheduleState {
    pub current_epoch: u64,
    /// Boundary the pending wakeup will deliver.
    pub next_boundary: u64,
    pub window_start: Option<Timestamp>,
    pub next_wakeup: Option<Timestamp>,
    pub live_token: Option<CancelToken>,
    pub halted: bool,
}

/// What a wakeup should do, decided before anything is mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    OpenWindow { next_at: Timestamp },
    Advance { epoch: u64, next_at: Timestamp },
}

impl Step {
    pub fn next_at(&self) -> Timestamp {
        match *self {
            Step::OpenWindow { next_at } | Step::Advance { next_at, .. } => next_at,
        }
    }

    /// Boundary the wakeup registered after this step will deliver.
    pub fn following_boundary(&self) -> u64 {
        match *self {
            Step::OpenWindow { .. } => 1,
            Step::Advance { epoch, .. } => epoch + 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EpochScheduler {
    total_epochs: u64,
    epoch_length: u64,
    incarnation: u32,
    token_counter: u32,
    state: ScheduleState,
}

impl EpochScheduler {
    pub fn new(total_epochs: u64, epoch_length: u64, incarnation: u32) -> Self {
        Self::restore(total_epochs, epoch_length, incarnation, ScheduleState::default())
    }

    pub fn restore(
        total_epochs: u64,
        epoch_length: u64,
        incarnation: u32,
        state: ScheduleState,
    ) -> Self {
        Self {
            total_epochs,
            epoch_length,
            incarnation,
            token_counter: 0,
            state,
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn current_epoch(&self) -> u64 {
        self.state.current_epoch
    }

    pub fn live_token(&self) -> Option<CancelToken> {
        self.state.live_token
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// A token unique to this incarnation.
    pub fn issue_token(&mut self) -> CancelToken {
        self.token_counter = self.token_counter.wrapping_add(1);
        CancelToken((u64::from(self.incarnation) << 32) | u64::from(self.token_counter))
    }

    /// Schedule the window-open wakeup at `now + start_delay`.
    pub fn arm_window(&mut self, now: Timestamp, start_delay: u64, token: CancelToken) -> Timestamp {
        let at = now.saturating_add(start_delay);
        self.state.window_start = Some(at);
        self.state.next_wakeup = Some(at);
        self.state.next_boundary = 0;
        self.state.live_token = Some(token);
        at
    }

    /// Re-attach the pending wakeup to a fresh token after a restart.
    ///
    /// Returns `(at, boundary)` of the wakeup to register, or `None` if
    /// nothing is pending.
    pub fn rearm(&mut self, token: CancelToken) -> Option<(Timestamp, u64)> {
        if self.state.halted {
            return None;
        }
        let at = self.state.next_wakeup?;
        self.state.live_token = Some(token);
        Some((at, self.state.next_boundary))
    }

    /// Decide what a wakeup for `boundary` fired at `fired_at` should do.
    ///
    /// `Ok(None)` means the wakeup was already handled (duplicate delivery).
    pub fn plan(&self, boundary: u64, fired_at: Timestamp) -> Result<Option<Step>, ScheduleError> {
        if self.state.halted {
            return Err(ScheduleError::Halted);
        }
        if boundary != self.state.next_boundary {
            return Ok(None);
        }
        let next_at = fired_at.saturating_add(self.epoch_length);
        if boundary == 0 {
            return Ok(Some(Step::OpenWindow { next_at }));
        }
        let epoch = self.state.current_epoch + 1;
        if epoch >= self.total_epochs {
            return Err(ScheduleError::EpochOutOfBounds {
                epoch,
                total: self.total_epochs,
            });
        }
        Ok(Some(Step::Advance { epoch, next_at }))
    }

    /// Commit a planned step; `token` identifies the wakeup registered for
    /// the following boundary.
    pub fn apply(&mut self, step: Step, token: CancelToken) {
        if let Step::Advance { epoch, .. } = step {
            self.state.current_epoch = self.state.current_epoch.max(epoch);
        }
        self.state.next_boundary = step.following_boundary();
        self.state.next_wakeup = Some(step.next_at());
        self.state.live_token = Some(token);
    }

    /// Stop scheduling for good. The epoch stays where it is.
    pub fn halt(&mut self) {
        self.state.halted = true;
        self.state.next_wakeup = None;
        self.state.live_token = None;
    }

    /// Forget the live token, returning it for cancellation.
    pub fn disarm(&mut self) -> Option<CancelToken> {
        self.state.live_token.take()
    }
}
