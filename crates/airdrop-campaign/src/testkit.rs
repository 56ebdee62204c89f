//! Shared fixtures for unit tests.

use std::sync::Arc;

use airdrop_core::merkle::{Blake3Verifier, MerkleProof, MerkleTree};
use airdrop_core::params::CampaignParams;
use airdrop_core::tier::TierTable;
use airdrop_core::types::{Identity, Tier};

use crate::campaign::{Campaign, Collaborators};
use crate::store::MemoryCampaignStore;
use crate::timer::ManualTimer;
use crate::transfer::SeatLedger;

pub const START: u64 = 1_000;
pub const DELAY: u64 = 60;
pub const EPOCH: u64 = 3_600;

pub struct Harness {
    pub timer: Arc<ManualTimer>,
    pub store: Arc<MemoryCampaignStore>,
    pub seats: Arc<SeatLedger>,
    pub tree: MerkleTree,
    pub params: CampaignParams,
}

pub fn id(b: u8) -> Identity {
    Identity([b; 32])
}

impl Harness {
    /// Allowlist: identities 1..=8 at tier `(b - 1) % 5`, escrow `escrow`.
    pub fn new(escrow: u64) -> Self {
        let entries: Vec<(Identity, Tier)> = (1..=8u8).map(|b| (id(b), u32::from((b - 1) % 5))).collect();
        let tree = MerkleTree::from_allowlist(&entries);
        let params = CampaignParams {
            tier_table: TierTable::new(vec![
                vec![1000, 800, 650, 500, 350],
                vec![600, 480, 384, 307, 245],
                vec![300, 240, 192, 153, 122],
            ])
            .unwrap(),
            total_epochs: 3,
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

    /// Start and fire the window-open wakeup.
    pub fn start_open(&self) -> Arc<Campaign> {
        let c = self.start();
        self.timer.advance_by(DELAY);
        c
    }

    pub fn proof(&self, b: u8, tier: Tier) -> MerkleProof {
        self.tree.proof_for(&id(b), tier).unwrap()
    }
}
