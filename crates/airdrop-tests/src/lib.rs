//! Scenario and adversarial test suite for airdrop campaigns.
//!
//! The integration tests under `tests/` drive whole campaigns through a
//! manual timer and in-memory or RocksDB storage, checking the claim
//! invariants (at-most-once, conservation, gated acceptance, proof gating,
//! monotonic epochs) under scripted and randomized histories.

pub mod helpers;
