use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::key::{self, Category};
use common::lock::{BlobLock, LockError, LockMode};
use common::retry::{RetryError, with_retry};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, CatalogError, MsaRecord, RowId};
use crate::config::RetryConfig;
use crate::payload::{MsaPayload, PayloadError};

/// Failures of the store/lookup engine.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The catalog stayed contended through the whole retry budget.
    #[error("catalog still contended after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: CatalogError },

    #[error("no stored alignment for {category} sequence {sequence}")]
    MissingMsa {
        category: Category,
        sequence: String,
    },

    #[error("stored blob is not an alignment object: {path}")]
    MalformedBlob { path: String },

    #[error("invalid alignment JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RetryError<CatalogError>> for StoreError {
    fn from(err: RetryError<CatalogError>) -> Self {
        match err {
            RetryError::Aborted(err) => StoreError::Catalog(err),
            RetryError::Exhausted { attempts, last } => {
                StoreError::RetriesExhausted { attempts, last }
            }
        }
    }
}

/// Descriptive attributes accompanying a stored sequence. Only `species`
/// participates in identity, and only for mhc.
#[derive(Clone, Debug, Default)]
pub struct RecordAttrs {
    pub species: Option<String>,
    pub name: Option<String>,
    pub chain: Option<String>,
    pub protein_class: Option<String>,
}

/// Handle to the shared MSA store: catalog, blob tree and retry policy.
pub struct MsaStore {
    catalog: Arc<dyn Catalog>,
    blob_root: PathBuf,
    retry: RetryConfig,
}

impl MsaStore {
    pub fn new(catalog: Arc<dyn Catalog>, blob_root: impl Into<PathBuf>, retry: RetryConfig) -> Self {
        Self {
            catalog,
            blob_root: blob_root.into(),
            retry,
        }
    }

    /// Blob location for a sequence under this store's root.
    pub fn blob_path(&self, category: Category, sequence: &str) -> PathBuf {
        key::blob_path(&self.blob_root, category, sequence)
    }

    /// Store one computed alignment: reconcile the catalog row, then
    /// replace the blob, all under the blob's exclusive lock.
    ///
    /// The catalog transaction commits before any blob byte changes, and
    /// the lock is held across both, so a reader that finds the row can
    /// take the shared lock and read one complete document. If the catalog
    /// write fails, the previous blob contents are untouched.
    pub async fn store(
        &self,
        category: Category,
        sequence: &str,
        attrs: RecordAttrs,
        payload: &MsaPayload,
    ) -> Result<RowId, StoreError> {
        let path = self.blob_path(category, sequence);
        let record = MsaRecord {
            category,
            sequence: sequence.to_owned(),
            species: attrs.species,
            name: attrs.name,
            chain: attrs.chain,
            protein_class: attrs.protein_class,
            msa_path: path.to_string_lossy().into_owned(),
            is_empty: payload.is_empty,
            stored_date: MsaRecord::today(),
        };

        let blob = payload.to_blob()?;

        let mut lock = BlobLock::acquire(&path, LockMode::Exclusive)?;
        let row_id = with_retry(
            || self.catalog.reconcile(&record),
            self.retry.max_attempts,
            self.retry.initial_delay(),
        )
        .await?;
        lock.replace_contents(&blob)?;

        info!(
            category = %category,
            row_id,
            path = %path.display(),
            is_empty = record.is_empty,
            "stored alignment"
        );
        Ok(row_id)
    }

    /// Parsed blob contents for a stored sequence, read under a shared
    /// lock so a writer mid-update cannot produce a half-read document.
    pub async fn fetch(
        &self,
        category: Category,
        sequence: &str,
        species: Option<&str>,
    ) -> Result<Option<Value>, StoreError> {
        let Some(path) = self
            .catalog
            .find_blob_path(category, sequence, species)
            .await?
        else {
            return Ok(None);
        };

        let mut lock = BlobLock::acquire(Path::new(&path), LockMode::Shared)?;
        let bytes = lock.read_to_end()?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(Some(value))
    }

    /// Predicate-only existence probe; no blob access.
    pub async fn exists(
        &self,
        category: Category,
        sequence: &str,
        species: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .catalog
            .find_blob_path(category, sequence, species)
            .await?
            .is_some())
    }
}
