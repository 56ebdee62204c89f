//! # airdrop-campaign
//! The claim-eligibility-and-payout engine: campaign lifecycle, epoch
//! scheduling, at-most-once claim ledger and escrow-backed payouts.
//!
//! A host builds a [`campaign::Campaign`] from validated
//! [`CampaignParams`](airdrop_core::params::CampaignParams) and a set of
//! [`campaign::Collaborators`], then drives it with timer wakeups and
//! [`make_claim`](campaign::Campaign::make_claim) calls.

pub mod campaign;
pub mod ledger;
pub mod payout;
pub mod protocol;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod timer;
pub mod transfer;

#[cfg(test)]
mod testkit;
