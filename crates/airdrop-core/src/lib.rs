//! # airdrop-core
//! Foundation types, errors and collaborator traits for merkle-gated,
//! epoch-tiered airdrop campaigns.

pub mod constants;
pub mod error;
pub mod merkle;
pub mod params;
pub mod state;
pub mod tier;
pub mod traits;
pub mod types;
