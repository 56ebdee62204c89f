//! Adversarial property-based tests for airdrop campaigns.
//!
//! Attack vectors tested:
//! - Duplicate claims racing for one identity (at-most-once)
//! - Claims interleaved with epoch advances, top-ups and withdrawals
//!   (conservation of escrow)
//! - Dishonest tier assertions (proof gating)
//! - Arbitrary timer firing patterns (monotonic epochs)

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rand::seq::SliceRandom;

use airdrop_campaign::store::CampaignStore;
use airdrop_core::error::ClaimError;
use airdrop_core::state::CampaignState;
use airdrop_core::types::Amount;
use airdrop_tests::helpers::{id, tier_of, World, EPOCH};

// ---------------------------------------------------------------------------
// At-most-once under concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicates_pay_each_identity_once() {
    let w = World::new(1_000_000).with_transfer_delay(Duration::from_millis(2));
    let c = w.start();
    w.open_window();

    let mut attempts: Vec<u8> = (1..=10u8).flat_map(|b| std::iter::repeat_n(b, 8)).collect();
    attempts.shuffle(&mut rand::thread_rng());

    let handles: Vec<_> = attempts
        .into_iter()
        .map(|b| {
            let c = Arc::clone(&c);
            let proof = w.proof(id(b), tier_of(b));
            tokio::spawn(async move { (b, c.make_claim(id(b), tier_of(b), &proof).await) })
        })
        .collect();

    let mut paid = HashSet::new();
    for handle in handles {
        let (b, result) = handle.await.unwrap();
        match result {
            Ok(_) => assert!(paid.insert(b), "identity {b} paid twice"),
            Err(e) => assert_eq!(e, ClaimError::AlreadyClaimed(id(b))),
        }
    }

    assert_eq!(paid.len(), 10);
    assert_eq!(w.seats.transfer_count(), 10);
    assert_eq!(w.store.claims().unwrap().len(), 10);
    for b in 1..=10u8 {
        let expected = w.params.tier_table.amount(0, tier_of(b)).unwrap();
        assert_eq!(w.seats.balance_of(&id(b)), expected);
    }
    assert!(c.info().escrow.is_balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn claims_racing_an_epoch_advance_stay_conserved() {
    let w = Arc::new(World::new(20_000).with_transfer_delay(Duration::from_millis(1)));
    let c = w.start();
    w.open_window();

    let handles: Vec<_> = (1..=20u8)
        .map(|b| {
            let c = Arc::clone(&c);
            let proof = w.proof(id(b), tier_of(b));
            tokio::spawn(async move { c.make_claim(id(b), tier_of(b), &proof).await })
        })
        .collect();
    let timer = Arc::clone(&w.timer);
    let advancer = tokio::task::spawn_blocking(move || timer.advance_by(EPOCH));

    let mut total: Amount = 0;
    for handle in handles {
        if let Ok(receipt) = handle.await.unwrap() {
            let row_amount = w.params.tier_table.amount(receipt.epoch, receipt.tier).unwrap();
            assert_eq!(receipt.amount, row_amount);
            total += receipt.amount;
        }
    }
    advancer.await.unwrap();

    let info = c.info();
    assert_eq!(info.current_epoch, 1);
    assert_eq!(info.escrow.total_paid, total);
    assert_eq!(w.seats.total_credited(), total);
    assert!(info.escrow.is_balanced());
    assert!(total <= 20_000);
}

// ---------------------------------------------------------------------------
// Randomized histories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    /// Claim for `id(seed)`; `honest` selects the allowlisted tier.
    Claim { seed: u8, honest: bool },
    Advance(u64),
    Deposit(Amount),
    Withdraw(Amount),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u8..=24, prop::bool::weighted(0.85))
            .prop_map(|(seed, honest)| Op::Claim { seed, honest }),
        2 => (0u64..2 * EPOCH).prop_map(Op::Advance),
        1 => (1u64..3_000).prop_map(Op::Deposit),
        1 => (1u64..3_000).prop_map(Op::Withdraw),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Paid-out funds never exceed funding, and every movement is accounted
    /// for: credited seats equal recorded payouts, and
    /// `balance + paid + withdrawn == deposited` after every step.
    #[test]
    fn escrow_is_conserved(
        escrow in 0u64..15_000,
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let w = World::new(escrow);
        let rt = runtime();
        let c = w.start();
        w.open_window();

        let mut deposited = escrow;
        let mut paid_ids = HashSet::new();

        for op in ops {
            match op {
                Op::Claim { seed, honest } => {
                    let who = id(seed);
                    // Seeds above 20 are off the allowlist; borrow a member's proof.
                    let (proof_seed, allowed) = if seed <= 20 { (seed, true) } else { (1, false) };
                    let real_tier = tier_of(proof_seed);
                    let asserted = if honest { real_tier } else { (real_tier + 1) % 5 };
                    let proof = w.proof(id(proof_seed), real_tier);
                    let before = c.info();

                    let result = rt.block_on(c.make_claim(who, asserted, &proof));
                    match result {
                        Ok(receipt) => {
                            prop_assert!(allowed && honest);
                            prop_assert!(paid_ids.insert(seed));
                            prop_assert_eq!(receipt.amount, before.active_tiers[real_tier as usize]);
                        }
                        Err(e) => {
                            if !(allowed && honest) && before.state == CampaignState::Open
                                && !paid_ids.contains(&seed)
                            {
                                prop_assert_eq!(e, ClaimError::IneligibleClaim(who));
                            }
                            let after = c.info();
                            prop_assert_eq!(after.escrow, before.escrow);
                            prop_assert_eq!(after.claim_count, before.claim_count);
                        }
                    }
                }
                Op::Advance(secs) => w.timer.advance_by(secs),
                Op::Deposit(amount) => {
                    if c.deposit_escrow(amount).is_ok() {
                        deposited += amount;
                    }
                }
                Op::Withdraw(amount) => {
                    let _ = c.create_payment(amount);
                }
            }

            let info = c.info();
            prop_assert_eq!(info.escrow.total_deposited, deposited);
            prop_assert!(info.escrow.is_balanced());
            prop_assert!(info.escrow.total_paid <= deposited);
            prop_assert_eq!(info.in_flight, 0);
            prop_assert_eq!(w.seats.total_credited(), info.escrow.total_paid);
            prop_assert_eq!(info.claim_count, paid_ids.len());
        }
    }

    /// The epoch never decreases, never leaves the tier table, and an
    /// expired campaign stays expired.
    #[test]
    fn epochs_are_monotonic(
        steps in prop::collection::vec(0u64..3 * EPOCH, 1..40),
        redeliver in prop::collection::vec(any::<bool>(), 40),
    ) {
        let w = World::new(1_000);
        let c = w.start();
        w.open_window();
        let total = w.params.total_epochs;

        let mut last_epoch = c.current_epoch();
        let mut expired = false;
        for (i, secs) in steps.into_iter().enumerate() {
            w.timer.advance_by(secs);
            if redeliver[i] {
                w.timer.redeliver_last();
            }
            let epoch = c.current_epoch();
            prop_assert!(epoch >= last_epoch);
            prop_assert!(epoch < total);
            if expired {
                prop_assert_eq!(c.status(), CampaignState::Expired);
            }
            expired = c.status() == CampaignState::Expired;
            last_epoch = epoch;
        }
    }
}
