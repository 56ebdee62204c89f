//! Claim ledger: at-most-once payout per identity.
//!
//! Uniqueness is scoped to the campaign: an identity that has claimed once can
//! never claim again, whichever epoch is active.
//!
//! A claim in flight holds a *reservation* on its identity. Reservations are
//! taken in the same critical section as the existence check, so a duplicate
//! arriving while the first claim is suspended on verification or transfer
//! fails with [`ClaimError::AlreadyClaimed`] instead of racing it.

use std::collections::{HashMap, HashSet};

use airdrop_core::error::ClaimError;
use airdrop_core::types::{Amount, ClaimRecord, Identity};

#[derive(Debug, Default)]
pub struct ClaimLedger {
    records: HashMap<Identity, ClaimRecord>,
    pending: HashSet<Identity>,
    total_paid: Amount,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records.
    pub fn from_records(records: impl IntoIterator<Item = ClaimRecord>) -> Result<Self, ClaimError> {
        let mut ledger = Self::new();
        for record in records {
            ledger.record(record)?;
        }
        Ok(ledger)
    }

    /// Whether `identity` has a recorded claim.
    pub fn has(&self, identity: &Identity) -> bool {
        self.records.contains_key(identity)
    }

    /// Whether a claim for `identity` is in flight.
    pub fn is_pending(&self, identity: &Identity) -> bool {
        self.pending.contains(identity)
    }

    /// Check-and-reserve. Fails if the identity is recorded or already reserved.
    pub fn reserve(&mut self, identity: Identity) -> Result<(), ClaimError> {
        if self.has(&identity) || !self.pending.insert(identity) {
            return Err(ClaimError::AlreadyClaimed(identity));
        }
        Ok(())
    }

    /// Drop a reservation after a failed claim. No-op if none is held.
    pub fn release(&mut self, identity: &Identity) {
        self.pending.remove(identity);
    }

    /// Append a record, consuming any reservation for its identity.
    pub fn record(&mut self, record: ClaimRecord) -> Result<(), ClaimError> {
        if self.has(&record.identity) {
            return Err(ClaimError::AlreadyClaimed(record.identity));
        }
        let total_paid = self
            .total_paid
            .checked_add(record.amount_paid)
            .ok_or_else(|| ClaimError::Storage("ledger total overflow".into()))?;
        self.pending.remove(&record.identity);
        self.total_paid = total_paid;
        self.records.insert(record.identity, record);
        Ok(())
    }

    pub fn get(&self, identity: &Identity) -> Option<&ClaimRecord> {
        self.records.get(identity)
    }

    /// Number of recorded claims.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sum of `amount_paid` over all records.
    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }
}
