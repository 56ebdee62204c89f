//! Shared fixtures for scenario and adversarial tests.

use std::sync::Arc;
use std::time::Duration;

use airdrop_campaign::campaign::{Campaign, Collaborators};
use airdrop_campaign::store::{CampaignStore, MemoryCampaignStore};
use airdrop_campaign::timer::ManualTimer;
use airdrop_campaign::transfer::SeatLedger;
use airdrop_core::merkle::{Blake3Verifier, MerkleProof, MerkleTree};
use airdrop_core::params::CampaignParams;
use airdrop_core::tier::TierTable;
use airdrop_core::types::{Amount, Identity, Tier};

pub const START: u64 = 1_700_000_000;
pub const DELAY: u64 = 300;
pub const EPOCH: u64 = 86_400;

/// Identity from a seed byte.
pub fn id(seed: u8) -> Identity {
    Identity([seed; 32])
}

/// Tier of `id(seed)` in [`default_allowlist`].
pub fn tier_of(seed: u8) -> Tier {
    u32::from((seed - 1) % 5)
}

/// Identities 1..=20, tier `(seed - 1) % 5`.
pub fn default_allowlist() -> Vec<(Identity, Tier)> {
    (1..=20u8).map(|b| (id(b), tier_of(b))).collect()
}

/// Five epochs; rows 0 and 1 as published for the reference campaign.
pub fn scenario_table() -> TierTable {
    TierTable::new(vec![
        vec![1000, 800, 650, 500, 350],
        vec![600, 480, 384, 307, 245],
        vec![300, 240, 192, 153, 122],
        vec![150, 120, 96, 76, 61],
        vec![75, 60, 48, 38, 30],
    ])
    .unwrap()
}

/// One campaign's collaborators plus the allowlist it was built from.
pub struct World {
    pub timer: Arc<ManualTimer>,
    pub store: Arc<dyn CampaignStore>,
    pub seats: Arc<SeatLedger>,
    pub tree: MerkleTree,
    pub params: CampaignParams,
}

impl World {
    pub fn new(escrow: Amount) -> Self {
        Self::with_allowlist(&default_allowlist(), escrow)
    }

    pub fn with_allowlist(entries: &[(Identity, Tier)], escrow: Amount) -> Self {
        let tree = MerkleTree::from_allowlist(entries);
        let tier_table = scenario_table();
        let params = CampaignParams {
            total_epochs: tier_table.len() as u64,
            tier_table,
            epoch_length_secs: EPOCH,
            start_delay_secs: DELAY,
            root_hash: tree.root(),
            initial_escrow: escrow,
            token_name: "DROP".into(),
        };
        Self {
            timer: Arc::new(ManualTimer::new(START)),
            store: Arc::new(MemoryCampaignStore::new()),
            seats: Arc::new(SeatLedger::new()),
            tree,
            params,
        }
    }

    /// Replace the campaign store.
    pub fn with_store(mut self, store: Arc<dyn CampaignStore>) -> Self {
        self.store = store;
        self
    }

    /// Suspend every payout transfer for `delay`.
    pub fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.seats = Arc::new(SeatLedger::with_delay(delay));
        self
    }

    pub fn collab(&self) -> Collaborators {
        Collaborators {
            timer: self.timer.clone(),
            verifier: Arc::new(Blake3Verifier),
            transfer: self.seats.clone(),
            store: self.store.clone(),
        }
    }

    pub fn start(&self) -> Arc<Campaign> {
        Campaign::start(self.params.clone(), self.collab()).unwrap()
    }

    /// Reload the campaign from its store, as after a host restart.
    pub fn restart(&self) -> Arc<Campaign> {
        Campaign::restore(self.collab()).unwrap()
    }

    /// Fire the window-open wakeup.
    pub fn open_window(&self) {
        self.timer.advance_by(DELAY);
    }

    /// Move one epoch length forward.
    pub fn advance_epoch(&self) {
        self.timer.advance_by(EPOCH);
    }

    pub fn proof(&self, who: Identity, tier: Tier) -> MerkleProof {
        self.tree.proof_for(&who, tier).unwrap()
    }
}
