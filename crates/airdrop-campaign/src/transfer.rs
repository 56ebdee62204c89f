//! In-memory asset transfer facility.
//!
//! Credits claimant seats in a local map. Used by tests and by hosts that
//! settle payouts out of band. Faults and suspension can be injected to
//! exercise the claim path's rollback and concurrency handling.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use airdrop_core::error::TransferFault;
use airdrop_core::traits::AssetTransfer;
use airdrop_core::types::{Amount, Identity};

#[derive(Default)]
struct SeatState {
    seats: HashMap<Identity, Amount>,
    fail_next: Option<TransferFault>,
    transfers: u64,
}

#[derive(Default)]
pub struct SeatLedger {
    state: Mutex<SeatState>,
    delay: Option<Duration>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend every transfer for `delay` before crediting.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the next transfer fail with `fault`.
    pub fn fail_next(&self, fault: TransferFault) {
        self.state.lock().fail_next = Some(fault);
    }

    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.state.lock().seats.get(identity).copied().unwrap_or(0)
    }

    /// Sum credited across all seats.
    pub fn total_credited(&self) -> Amount {
        self.state.lock().seats.values().sum()
    }

    /// Number of successful transfers.
    pub fn transfer_count(&self) -> u64 {
        self.state.lock().transfers
    }
}

#[async_trait]
impl AssetTransfer for SeatLedger {
    async fn transfer(&self, identity: &Identity, amount: Amount) -> Result<(), TransferFault> {
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        let mut state = self.state.lock();
        if let Some(fault) = state.fail_next.take() {
            return Err(fault);
        }
        let seat = state.seats.entry(*identity).or_insert(0);
        *seat = seat
            .checked_add(amount)
            .ok_or_else(|| TransferFault::Rejected("seat balance overflow".into()))?;
        state.transfers += 1;
        Ok(())
    }
}
