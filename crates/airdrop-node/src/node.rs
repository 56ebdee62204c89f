//! Campaign host composition.
//!
//! The [`Node`] opens the RocksDB store, builds the tokio timer and the other
//! collaborators, and either restores the stored campaign or starts a new one
//! from the configured parameter file.

use std::sync::Arc;

use tracing::{info, warn};

use airdrop_campaign::campaign::{Campaign, Collaborators};
use airdrop_campaign::store::CampaignStore;
use airdrop_campaign::transfer::SeatLedger;
use airdrop_core::merkle::Blake3Verifier;

use crate::config::{load_campaign_params, NodeConfig};
use crate::error::NodeError;
use crate::storage::RocksStore;
use crate::timer::TokioTimer;

/// A running campaign host.
pub struct Node {
    campaign: Arc<Campaign>,
    store: Arc<RocksStore>,
    timer: Arc<TokioTimer>,
    /// Payout destination; seats are credited in process and settled out of band.
    seats: Arc<SeatLedger>,
    config: NodeConfig,
}

impl Node {
    /// Open storage and bring the campaign up.
    ///
    /// Must be called from within a tokio runtime. A stored campaign always
    /// wins over the parameter file; without either, start-up fails.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            NodeError::Config(format!("create {}: {e}", config.data_dir.display()))
        })?;
        let store = Arc::new(RocksStore::open(config.db_path())?);
        let timer = Arc::new(TokioTimer::from_current()?);
        let seats = Arc::new(SeatLedger::new());

        let collab = Collaborators {
            timer: timer.clone(),
            verifier: Arc::new(Blake3Verifier),
            transfer: seats.clone(),
            store: store.clone(),
        };

        let stored = store.load_snapshot()?.is_some();
        let campaign = match (&config.params_file, stored) {
            (Some(path), _) => {
                let params = load_campaign_params(path)?;
                Campaign::open_or_start(params, collab)?
            }
            (None, true) => Campaign::restore(collab)?,
            (None, false) => {
                return Err(NodeError::Config(
                    "no stored campaign and no campaign parameter file".into(),
                ));
            }
        };

        let info = campaign.info();
        info!(
            state = %info.state,
            epoch = info.current_epoch,
            incarnation = info.incarnation,
            claims = info.claim_count,
            escrow = info.escrow.balance,
            "campaign loaded"
        );

        Ok(Arc::new(Self {
            campaign,
            store,
            timer,
            seats,
            config,
        }))
    }

    pub fn campaign(&self) -> &Arc<Campaign> {
        &self.campaign
    }

    pub fn seats(&self) -> &Arc<SeatLedger> {
        &self.seats
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Stop the campaign timer and flush storage.
    pub fn shutdown(&self) {
        self.campaign.shutdown();
        self.timer.cancel_all();
        if let Err(e) = self.store.flush() {
            warn!("failed to flush campaign store: {e}");
        }
        info!("campaign host stopped");
    }
}
