use crate::domain::beneficiary::Beneficiary;
use crate::domain::ports::BeneficiaryStore;
use crate::error::{RemitError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for saved beneficiaries, keyed by beneficiary id.
pub const CF_BENEFICIARIES: &str = "beneficiaries";

/// Persistent beneficiary store backed by RocksDB.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating the
    /// beneficiaries column family if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_BENEFICIARIES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_BENEFICIARIES).ok_or_else(|| {
            RemitError::InternalError(Box::new(std::io::Error::other(
                "Beneficiaries column family not found",
            )))
        })
    }
}

#[async_trait]
impl BeneficiaryStore for RocksDBStore {
    async fn save(&self, beneficiary: Beneficiary) -> Result<()> {
        let value = serde_json::to_vec(&beneficiary)?;
        self.db
            .put_cf(self.cf()?, beneficiary.id.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Beneficiary>> {
        match self.db.get_cf(self.cf()?, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<Beneficiary>> {
        let mut beneficiaries = Vec::new();
        let iter = self
            .db
            .iterator_cf(self.cf()?, rocksdb::IteratorMode::Start);
        for item in iter {
            let (_key, value) = item?;
            beneficiaries.push(serde_json::from_slice::<Beneficiary>(&value)?);
        }
        beneficiaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(beneficiaries)
    }
}
