//! Campaign construction parameters.
//!
//! Parameters are validated once, at construction. A campaign is never built
//! from a parameter set that fails [`CampaignParams::validate`].

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TOKEN_NAME, MAX_EPOCHS};
use crate::error::ParamsError;
use crate::tier::TierTable;
use crate::types::{Amount, Hash256};

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct CampaignParams {
    /// Payout per tier for every epoch.
    pub tier_table: TierTable,
    /// Number of epochs in the claim window.
    pub total_epochs: u64,
    /// Length of one epoch in seconds.
    pub epoch_length_secs: u64,
    /// Delay between campaign start and the claim window opening, in seconds.
    pub start_delay_secs: u64,
    /// Allowlist commitment.
    pub root_hash: Hash256,
    /// Escrow funded at campaign start.
    pub initial_escrow: Amount,
    #[serde(default = "default_token_name")]
    pub token_name: String,
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

impl CampaignParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.tier_table.validate()?;
        if self.total_epochs == 0 {
            return Err(ParamsError::ZeroTotalEpochs);
        }
        if self.total_epochs > MAX_EPOCHS {
            return Err(ParamsError::TooManyEpochs {
                got: self.total_epochs,
                max: MAX_EPOCHS,
            });
        }
        if self.tier_table.len() < self.total_epochs {
            return Err(ParamsError::MissingTierRow(self.tier_table.len()));
        }
        if self.epoch_length_secs == 0 {
            return Err(ParamsError::ZeroEpochLength);
        }
        if self.root_hash.is_zero() {
            return Err(ParamsError::ZeroRootHash);
        }
        self.epoch_length_secs
            .checked_mul(self.total_epochs)
            .and_then(|window| window.checked_add(self.start_delay_secs))
            .ok_or_else(|| ParamsError::Invalid {
                name: "epoch_length_secs",
                reason: "claim window end overflows u64 seconds".to_string(),
            })?;
        if self.token_name.trim().is_empty() {
            return Err(ParamsError::Invalid {
                name: "token_name",
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}
