//! Persisted campaign state.
//!
//! A snapshot is everything needed to bring a campaign back after a restart
//! or upgrade, except the claim records themselves (stored per identity).
//! On disk it is `bincode(schema_version) || bincode(body)`; older bodies are
//! migrated forward by [`CampaignSnapshot::decode`].

use airdrop_core::constants::SNAPSHOT_VERSION;
use airdrop_core::error::SnapshotError;
use airdrop_core::params::CampaignParams;
use airdrop_core::state::CampaignState;
use airdrop_core::types::{Amount, Timestamp};

use crate::payout::EscrowAccount;
use crate::scheduler::ScheduleState;

#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct CampaignSnapshot {
    /// 1 on first start, incremented on every restore.
    pub incarnation: u32,
    pub params: CampaignParams,
    pub state: CampaignState,
    pub schedule: ScheduleState,
    pub escrow: EscrowAccount,
}

/// Body layout written by schema version 1.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct SnapshotV1 {
    pub incarnation: u32,
    pub params: CampaignParams,
    pub state: CampaignState,
    pub current_epoch: u64,
    pub window_start: Option<Timestamp>,
    pub next_wakeup: Option<Timestamp>,
    pub escrow_balance: Amount,
    pub total_paid: Amount,
}

impl SnapshotV1 {
    /// Lift a v1 body to the current layout.
    pub fn migrate(self) -> Result<CampaignSnapshot, SnapshotError> {
        let total_deposited = self
            .escrow_balance
            .checked_add(self.total_paid)
            .ok_or_else(|| SnapshotError::Corrupted("v1 escrow totals overflow".into()))?;
        let next_boundary = match self.state {
            CampaignState::Initialized | CampaignState::Prepared => 0,
            _ => self.current_epoch + 1,
        };
        Ok(CampaignSnapshot {
            incarnation: self.incarnation,
            params: self.params,
            state: self.state,
            schedule: ScheduleState {
                current_epoch: self.current_epoch,
                next_boundary,
                window_start: self.window_start,
                next_wakeup: self.next_wakeup,
                live_token: None,
                halted: self.state == CampaignState::Expired,
            },
            escrow: EscrowAccount {
                balance: self.escrow_balance,
                total_deposited,
                total_paid: self.total_paid,
                total_withdrawn: 0,
            },
        })
    }
}

impl CampaignSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let config = bincode::config::standard();
        let mut bytes = bincode::encode_to_vec(SNAPSHOT_VERSION, config)
            .map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        bytes.extend(
            bincode::encode_to_vec(self, config)
                .map_err(|e| SnapshotError::Corrupted(e.to_string()))?,
        );
        Ok(bytes)
    }

    /// Decode any supported schema version, migrating to the current layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let config = bincode::config::standard();
        let (version, read): (u32, usize) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        let body = &bytes[read..];
        let corrupted = |e: bincode::error::DecodeError| SnapshotError::Corrupted(e.to_string());
        match version {
            1 => {
                let (v1, _): (SnapshotV1, usize) =
                    bincode::decode_from_slice(body, config).map_err(corrupted)?;
                v1.migrate()
            }
            SNAPSHOT_VERSION => {
                let (snapshot, _): (Self, usize) =
                    bincode::decode_from_slice(body, config).map_err(corrupted)?;
                Ok(snapshot)
            }
            other => Err(SnapshotError::UnsupportedVersion(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_core::tier::TierTable;
    use airdrop_core::types::{CancelToken, Hash256};

    fn params() -> CampaignParams {
        CampaignParams {
            tier_table: TierTable::new(vec![vec![1000, 800], vec![600, 480]]).unwrap(),
            total_epochs: 2,
            epoch_length_secs: 60,
            start_delay_secs: 10,
            root_hash: Hash256([3; 32]),
            initial_escrow: 5_000,
            token_name: "DROP".into(),
        }
    }

    fn snapshot() -> CampaignSnapshot {
        CampaignSnapshot {
            incarnation: 2,
            params: params(),
            state: CampaignState::Open,
            schedule: ScheduleState {
                current_epoch: 1,
                next_boundary: 2,
                window_start: Some(110),
                next_wakeup: Some(230),
                live_token: Some(CancelToken((2 << 32) | 3)),
                halted: false,
            },
            escrow: EscrowAccount {
                balance: 3_720,
                total_deposited: 5_000,
                total_paid: 1_280,
                total_withdrawn: 0,
            },
        }
    }

    #[test]
    fn current_version_roundtrip() {
        let snap = snapshot();
        let decoded = CampaignSnapshot::decode(&snap.encode().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn unknown_version_rejected() {
        let config = bincode::config::standard();
        let mut bytes = bincode::encode_to_vec(99u32, config).unwrap();
        bytes.extend(bincode::encode_to_vec(&snapshot(), config).unwrap());
        assert_eq!(
            CampaignSnapshot::decode(&bytes),
            Err(SnapshotError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn truncated_bytes_are_corrupted() {
        let bytes = snapshot().encode().unwrap();
        assert!(matches!(
            CampaignSnapshot::decode(&bytes[..bytes.len() / 2]),
            Err(SnapshotError::Corrupted(_))
        ));
    }

    #[test]
    fn v1_body_is_migrated() {
        let v1 = SnapshotV1 {
            incarnation: 1,
            params: params(),
            state: CampaignState::Open,
            current_epoch: 0,
            window_start: Some(110),
            next_wakeup: Some(170),
            escrow_balance: 4_200,
            total_paid: 800,
        };
        let config = bincode::config::standard();
        let mut bytes = bincode::encode_to_vec(1u32, config).unwrap();
        bytes.extend(bincode::encode_to_vec(&v1, config).unwrap());

        let snap = CampaignSnapshot::decode(&bytes).unwrap();
        assert_eq!(snap.schedule.next_boundary, 1);
        assert_eq!(snap.schedule.live_token, None);
        assert!(!snap.schedule.halted);
        assert_eq!(snap.escrow.total_deposited, 5_000);
        assert!(snap.escrow.is_balanced());
    }

    #[test]
    fn v1_expired_migrates_halted() {
        let v1 = SnapshotV1 {
            incarnation: 3,
            params: params(),
            state: CampaignState::Expired,
            current_epoch: 1,
            window_start: Some(110),
            next_wakeup: None,
            escrow_balance: 0,
            total_paid: 5_000,
        };
        let snap = v1.migrate().unwrap();
        assert!(snap.schedule.halted);
        assert_eq!(snap.schedule.current_epoch, 1);
    }
}
