//! Campaign storage interface and in-memory implementation.
//!
//! The [`CampaignStore`] trait persists the campaign snapshot and the claim
//! records. [`MemoryCampaignStore`] is suitable for testing; the node uses
//! RocksDB (airdrop-node).
//!
//! [`CampaignStore::commit_claims`] writes claim records and the snapshot
//! carrying their escrow settlement as one unit: either all are durable or
//! none. Re-committing a record identical to a stored one is a no-op, so a
//! batch may be retried after an ambiguous write failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use airdrop_core::error::AirdropError;
use airdrop_core::types::{ClaimRecord, Identity};

use crate::snapshot::CampaignSnapshot;

/// Durable storage for one campaign.
///
/// Implementations use interior mutability; the campaign calls them while
/// holding its own lock, so they must not call back into the campaign.
pub trait CampaignStore: Send + Sync {
    /// Load and migrate the stored snapshot. `None` if the campaign was never started.
    fn load_snapshot(&self) -> Result<Option<CampaignSnapshot>, AirdropError>;

    /// Replace the stored snapshot.
    fn save_snapshot(&self, snapshot: &CampaignSnapshot) -> Result<(), AirdropError>;

    /// Atomically append `records` and replace the snapshot.
    ///
    /// Fails without writing anything if a stored record for one of the
    /// identities differs from the one given.
    fn commit_claims(
        &self,
        records: &[ClaimRecord],
        snapshot: &CampaignSnapshot,
    ) -> Result<(), AirdropError>;

    fn get_claim(&self, identity: &Identity) -> Result<Option<ClaimRecord>, AirdropError>;

    /// All stored claim records, in no particular order.
    fn claims(&self) -> Result<Vec<ClaimRecord>, AirdropError>;

    /// Whether a record exists for `identity`.
    ///
    /// Default implementation delegates to [`get_claim`](Self::get_claim).
    fn has_claim(&self, identity: &Identity) -> Result<bool, AirdropError> {
        Ok(self.get_claim(identity)?.is_some())
    }
}

#[derive(Default)]
struct MemoryState {
    snapshot: Option<Vec<u8>>,
    claims: HashMap<Identity, ClaimRecord>,
}

/// In-memory store. Snapshots are kept encoded so that every save and load
/// goes through the persisted schema.
#[derive(Default)]
pub struct MemoryCampaignStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for exercising storage faults.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored claim records.
    pub fn claim_count(&self) -> usize {
        self.state.read().claims.len()
    }

    /// Store raw snapshot bytes, bypassing encoding.
    pub fn put_raw_snapshot(&self, bytes: Vec<u8>) {
        self.state.write().snapshot = Some(bytes);
    }

    fn check_writable(&self) -> Result<(), AirdropError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AirdropError::Storage("injected write failure".into()));
        }
        Ok(())
    }
}

impl CampaignStore for MemoryCampaignStore {
    fn load_snapshot(&self) -> Result<Option<CampaignSnapshot>, AirdropError> {
        let state = self.state.read();
        match &state.snapshot {
            Some(bytes) => Ok(Some(CampaignSnapshot::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &CampaignSnapshot) -> Result<(), AirdropError> {
        self.check_writable()?;
        let bytes = snapshot.encode()?;
        self.state.write().snapshot = Some(bytes);
        Ok(())
    }

    fn commit_claims(
        &self,
        records: &[ClaimRecord],
        snapshot: &CampaignSnapshot,
    ) -> Result<(), AirdropError> {
        self.check_writable()?;
        let bytes = snapshot.encode()?;
        let mut state = self.state.write();
        for record in records {
            match state.claims.get(&record.identity) {
                Some(stored) if stored != record => {
                    return Err(AirdropError::Storage(format!(
                        "conflicting claim record for {}",
                        record.identity
                    )));
                }
                _ => {}
            }
        }
        for record in records {
            state.claims.insert(record.identity, record.clone());
        }
        state.snapshot = Some(bytes);
        Ok(())
    }

    fn get_claim(&self, identity: &Identity) -> Result<Option<ClaimRecord>, AirdropError> {
        Ok(self.state.read().claims.get(identity).cloned())
    }

    fn claims(&self) -> Result<Vec<ClaimRecord>, AirdropError> {
        Ok(self.state.read().claims.values().cloned().collect())
    }
}
