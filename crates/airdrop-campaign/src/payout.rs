//! Payout engine: tier lookup and escrow accounting.
//!
//! Escrow is the authoritative pool backing every claim. A payout moves funds
//! in two steps so that the asset transfer can run outside the campaign lock:
//!
//! ```text
//! balance --debit--> in_flight --settle--> paid
//!                    in_flight --refund--> balance
//! ```
//!
//! At every point `balance + in_flight + paid + withdrawn == deposited`.

use serde::{Deserialize, Serialize};

use airdrop_core::error::{ClaimError, EscrowError};
use airdrop_core::tier::TierTable;
use airdrop_core::types::{Amount, Tier};

/// Persisted escrow totals.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct EscrowAccount {
    /// Funds available for new payouts.
    pub balance: Amount,
    /// Initial funding plus every top-up.
    pub total_deposited: Amount,
    /// Sum of settled claim payouts.
    pub total_paid: Amount,
    /// Sum of administrative withdrawals.
    pub total_withdrawn: Amount,
}

impl EscrowAccount {
    pub fn funded(initial: Amount) -> Self {
        Self {
            balance: initial,
            total_deposited: initial,
            ..Self::default()
        }
    }

    /// Whether the conservation identity holds with nothing in flight.
    pub fn is_balanced(&self) -> bool {
        [self.balance, self.total_paid, self.total_withdrawn]
            .iter()
            .try_fold(0u64, |acc, &v| acc.checked_add(v))
            == Some(self.total_deposited)
    }
}

#[derive(Debug)]
pub struct PayoutEngine {
    tiers: TierTable,
    account: EscrowAccount,
    in_flight: Amount,
}

impl PayoutEngine {
    pub fn new(tiers: TierTable, account: EscrowAccount) -> Self {
        Self {
            tiers,
            account,
            in_flight: 0,
        }
    }

    /// Payout owed to `tier` while `epoch` is active.
    pub fn get_payout_amount(&self, epoch: u64, tier: Tier) -> Result<Amount, ClaimError> {
        Ok(self.tiers.amount(epoch, tier)?)
    }

    pub fn active_row(&self, epoch: u64) -> Vec<Amount> {
        self.tiers.row(epoch).map(<[Amount]>::to_vec).unwrap_or_default()
    }

    /// Funds available for new payouts.
    pub fn balance(&self) -> Amount {
        self.account.balance
    }

    pub fn in_flight(&self) -> Amount {
        self.in_flight
    }

    /// Live totals, excluding in-flight funds from the balance.
    pub fn account(&self) -> EscrowAccount {
        self.account
    }

    /// Roll back an administrative change that could not be persisted.
    pub(crate) fn reset_account(&mut self, account: EscrowAccount) {
        self.account = account;
    }

    /// Escrow totals as they should be persisted: in-flight funds are still
    /// owned by escrow until their transfer settles.
    pub fn committed(&self) -> EscrowAccount {
        EscrowAccount {
            balance: self.account.balance + self.in_flight,
            ..self.account
        }
    }

    /// Move `amount` out of the spendable balance for a pending transfer.
    pub fn debit(&mut self, amount: Amount) -> Result<(), ClaimError> {
        if amount > self.account.balance {
            return Err(ClaimError::InsufficientEscrow {
                have: self.account.balance,
                need: amount,
            });
        }
        self.account.balance -= amount;
        self.in_flight += amount;
        Ok(())
    }

    /// Return a debited amount after its transfer failed.
    pub fn refund(&mut self, amount: Amount) {
        let amount = amount.min(self.in_flight);
        self.in_flight -= amount;
        self.account.balance += amount;
    }

    /// Mark a debited amount as paid after its transfer completed.
    pub fn settle(&mut self, amount: Amount) {
        let amount = amount.min(self.in_flight);
        self.in_flight -= amount;
        self.account.total_paid += amount;
    }

    /// Administrative top-up.
    pub fn deposit(&mut self, amount: Amount) -> Result<Amount, EscrowError> {
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        let balance = self.account.balance.checked_add(amount).ok_or(EscrowError::Overflow)?;
        let deposited = self
            .account
            .total_deposited
            .checked_add(amount)
            .ok_or(EscrowError::Overflow)?;
        self.account.balance = balance;
        self.account.total_deposited = deposited;
        Ok(balance)
    }

    /// Administrative withdrawal of unreserved escrow.
    pub fn withdraw(&mut self, amount: Amount) -> Result<Amount, EscrowError> {
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        if amount > self.account.balance {
            return Err(EscrowError::InsufficientEscrow {
                have: self.account.balance,
                need: amount,
            });
        }
        self.account.balance -= amount;
        self.account.total_withdrawn += amount;
        Ok(self.account.balance)
    }
}
