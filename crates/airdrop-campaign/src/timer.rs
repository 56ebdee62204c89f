//! Manually driven timer service for tests and simulations.
//!
//! Time only moves when [`ManualTimer::advance_to`] or
//! [`ManualTimer::advance_by`] is called. Due wakeups fire in time order with
//! the timer's current time as `fired_at`, after the timer's own lock has been
//! released, so a waker may register further wakeups.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use airdrop_core::traits::{TimerService, TimerWaker};
use airdrop_core::types::{CancelToken, Timestamp};

struct Pending {
    token: CancelToken,
    waker: Arc<dyn TimerWaker>,
}

struct Delivered {
    waker: Arc<dyn TimerWaker>,
    fired_at: Timestamp,
}

#[derive(Default)]
struct TimerState {
    now: Timestamp,
    seq: u64,
    /// Keyed by `(at, registration order)`.
    pending: BTreeMap<(Timestamp, u64), Pending>,
    last: Option<Delivered>,
    fired: u64,
}

#[derive(Default)]
pub struct ManualTimer {
    state: Mutex<TimerState>,
}

impl ManualTimer {
    pub fn new(now: Timestamp) -> Self {
        Self {
            state: Mutex::new(TimerState {
                now,
                ..TimerState::default()
            }),
        }
    }

    /// Move time forward by `secs` and fire everything that became due.
    pub fn advance_by(&self, secs: u64) {
        let target = self.state.lock().now.saturating_add(secs);
        self.advance_to(target);
    }

    /// Move time to `at` (never backwards) and fire everything that became due.
    pub fn advance_to(&self, at: Timestamp) {
        {
            let mut state = self.state.lock();
            state.now = state.now.max(at);
        }
        while let Some((waker, fired_at)) = self.pop_due() {
            waker.wake(fired_at);
        }
    }

    /// Deliver the most recently fired wakeup again, as an at-least-once
    /// timer may. Returns `false` if nothing has fired yet.
    pub fn redeliver_last(&self) -> bool {
        let last = {
            let state = self.state.lock();
            state
                .last
                .as_ref()
                .map(|d| (Arc::clone(&d.waker), d.fired_at))
        };
        match last {
            Some((waker, fired_at)) => {
                waker.wake(fired_at);
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Earliest pending wakeup time.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.state.lock().pending.keys().next().map(|(at, _)| *at)
    }

    /// Total number of wakeups fired so far.
    pub fn fired_count(&self) -> u64 {
        self.state.lock().fired
    }

    fn pop_due(&self) -> Option<(Arc<dyn TimerWaker>, Timestamp)> {
        let mut state = self.state.lock();
        let key = *state.pending.keys().next()?;
        if key.0 > state.now {
            return None;
        }
        let pending = state.pending.remove(&key)?;
        let fired_at = state.now;
        state.fired += 1;
        state.last = Some(Delivered {
            waker: Arc::clone(&pending.waker),
            fired_at,
        });
        Some((pending.waker, fired_at))
    }
}

impl TimerService for ManualTimer {
    fn current_timestamp(&self) -> Timestamp {
        self.state.lock().now
    }

    fn set_wakeup(&self, at: Timestamp, waker: Arc<dyn TimerWaker>, token: CancelToken) {
        let mut state = self.state.lock();
        state.seq += 1;
        let key = (at, state.seq);
        state.pending.insert(key, Pending { token, waker });
    }

    fn cancel(&self, token: &CancelToken) -> bool {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.retain(|_, p| p.token != *token);
        before != state.pending.len()
    }
}
