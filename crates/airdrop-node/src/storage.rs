//! RocksDB-backed campaign storage.
//!
//! Implements [`CampaignStore`] with two column families: `meta` holds the
//! encoded [`CampaignSnapshot`], `claims` holds one bincode-encoded
//! [`ClaimRecord`] per identity. A claim commit writes its records and the
//! updated snapshot in a single [`WriteBatch`].

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use airdrop_campaign::snapshot::CampaignSnapshot;
use airdrop_campaign::store::CampaignStore;
use airdrop_core::error::AirdropError;
use airdrop_core::types::{ClaimRecord, Identity};

// --- Column family names ---

const CF_META: &str = "meta";
const CF_CLAIMS: &str = "claims";

const ALL_CFS: &[&str] = &[CF_META, CF_CLAIMS];

// --- Metadata keys ---

const META_SNAPSHOT: &[u8] = b"campaign_snapshot";

fn storage_err(e: impl std::fmt::Display) -> AirdropError {
    AirdropError::Storage(e.to_string())
}

/// RocksDB-backed persistent campaign state.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AirdropError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), AirdropError> {
        self.db.flush().map_err(storage_err)
    }

    /// Trigger manual compaction across all column families.
    pub fn compact(&self) -> Result<(), AirdropError> {
        for cf_name in ALL_CFS {
            let cf = self.cf_handle(cf_name)?;
            self.db.compact_range_cf(&cf, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, AirdropError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AirdropError::Storage(format!("missing column family {name}")))
    }

    fn encode_record(record: &ClaimRecord) -> Result<Vec<u8>, AirdropError> {
        bincode::encode_to_vec(record, bincode::config::standard()).map_err(storage_err)
    }

    fn decode_record(bytes: &[u8]) -> Result<ClaimRecord, AirdropError> {
        let (record, _): (ClaimRecord, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(storage_err)?;
        Ok(record)
    }
}

impl CampaignStore for RocksStore {
    fn load_snapshot(&self) -> Result<Option<CampaignSnapshot>, AirdropError> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, META_SNAPSHOT).map_err(storage_err)? {
            Some(bytes) => Ok(Some(CampaignSnapshot::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &CampaignSnapshot) -> Result<(), AirdropError> {
        let cf = self.cf_handle(CF_META)?;
        let bytes = snapshot.encode()?;
        self.db.put_cf(cf, META_SNAPSHOT, bytes).map_err(storage_err)
    }

    fn commit_claims(
        &self,
        records: &[ClaimRecord],
        snapshot: &CampaignSnapshot,
    ) -> Result<(), AirdropError> {
        let cf_claims = self.cf_handle(CF_CLAIMS)?;
        let cf_meta = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();
        for record in records {
            let key = record.identity.as_bytes();
            if let Some(bytes) = self.db.get_cf(cf_claims, key).map_err(storage_err)? {
                if Self::decode_record(&bytes)? != *record {
                    return Err(AirdropError::Storage(format!(
                        "conflicting claim record for {}",
                        record.identity
                    )));
                }
            }
            batch.put_cf(cf_claims, key, Self::encode_record(record)?);
        }
        batch.put_cf(cf_meta, META_SNAPSHOT, snapshot.encode()?);
        self.db.write(batch).map_err(storage_err)
    }

    fn get_claim(&self, identity: &Identity) -> Result<Option<ClaimRecord>, AirdropError> {
        let cf = self.cf_handle(CF_CLAIMS)?;
        self.db
            .get_cf(cf, identity.as_bytes())
            .map_err(storage_err)?
            .map(|bytes| Self::decode_record(&bytes))
            .transpose()
    }

    fn claims(&self) -> Result<Vec<ClaimRecord>, AirdropError> {
        let cf = self.cf_handle(CF_CLAIMS)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(storage_err)?;
                Self::decode_record(&value)
            })
            .collect()
    }
}
