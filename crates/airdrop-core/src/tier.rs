//! Epoch-indexed payout schedule.
//!
//! Row `e` holds the payout per tier while epoch `e` is active. The table is
//! immutable once a campaign is constructed.
//!
//! ```text
//! epoch 0: [1000, 800, 650, 500, 350]
//! epoch 1: [ 600, 480, 384, 307, 245]
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_PRECISION, MAX_EPOCHS, MAX_TIERS};
use crate::error::{ParamsError, TierError};
use crate::types::{Amount, Tier};

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
#[serde(transparent)]
pub struct TierTable(Vec<Vec<Amount>>);

impl TierTable {
    /// Build a table, rejecting empty tables, empty rows and oversized rows.
    pub fn new(rows: Vec<Vec<Amount>>) -> Result<Self, ParamsError> {
        let table = Self(rows);
        table.validate()?;
        Ok(table)
    }

    /// Structural checks independent of the campaign's epoch count.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.0.is_empty() {
            return Err(ParamsError::EmptyTierTable);
        }
        let epochs = self.0.len() as u64;
        if epochs > MAX_EPOCHS {
            return Err(ParamsError::TooManyEpochs {
                got: epochs,
                max: MAX_EPOCHS,
            });
        }
        for (epoch, row) in self.0.iter().enumerate() {
            let epoch = epoch as u64;
            if row.is_empty() {
                return Err(ParamsError::EmptyTierRow(epoch));
            }
            if row.len() > MAX_TIERS {
                return Err(ParamsError::TooManyTiers {
                    epoch,
                    got: row.len(),
                    max: MAX_TIERS,
                });
            }
            row.iter()
                .try_fold(0u64, |acc, &a| acc.checked_add(a))
                .ok_or(ParamsError::AmountOverflow(epoch))?;
        }
        Ok(())
    }

    /// Build a decaying schedule from a base row.
    ///
    /// Each epoch's row is the previous row scaled by
    /// `(BPS_PRECISION - decay_bps) / BPS_PRECISION`, truncating.
    pub fn with_epoch_decay(
        base_row: Vec<Amount>,
        decay_bps: u64,
        epochs: u64,
    ) -> Result<Self, ParamsError> {
        if decay_bps > BPS_PRECISION {
            return Err(ParamsError::Invalid {
                name: "decay_bps",
                reason: format!("{decay_bps} exceeds {BPS_PRECISION}"),
            });
        }
        if epochs == 0 {
            return Err(ParamsError::ZeroTotalEpochs);
        }
        if epochs > MAX_EPOCHS {
            return Err(ParamsError::TooManyEpochs {
                got: epochs,
                max: MAX_EPOCHS,
            });
        }
        let keep = BPS_PRECISION - decay_bps;
        let mut rows = Vec::with_capacity(epochs as usize);
        let mut row = base_row;
        for _ in 0..epochs {
            let next = row
                .iter()
                .map(|&a| ((a as u128 * keep as u128) / BPS_PRECISION as u128) as Amount)
                .collect();
            rows.push(std::mem::replace(&mut row, next));
        }
        Self::new(rows)
    }

    /// Number of epoch rows.
    pub fn len(&self) -> u64 {
        self.0.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The active row for `epoch`.
    pub fn row(&self, epoch: u64) -> Result<&[Amount], TierError> {
        usize::try_from(epoch)
            .ok()
            .and_then(|e| self.0.get(e))
            .map(Vec::as_slice)
            .ok_or(TierError::EpochOutOfBounds {
                epoch,
                total: self.len(),
            })
    }

    /// Payout for `tier` while `epoch` is active.
    pub fn amount(&self, epoch: u64, tier: Tier) -> Result<Amount, TierError> {
        let row = self.row(epoch)?;
        row.get(tier as usize)
            .copied()
            .ok_or(TierError::TierOutOfBounds {
                tier,
                len: row.len(),
            })
    }

    /// Largest single payout anywhere in the table.
    pub fn max_amount(&self) -> Amount {
        self.0.iter().flatten().copied().max().unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<Amount>] {
        &self.0
    }
}
