use async_trait::async_trait;
use chrono::NaiveDate;
use common::Category;
use common::retry::Transient;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::debug;

use crate::entity::{generic_msa, mhc_chain_msa, peptide_msa, tcr_chain_msa};

/// Stable identifier of a catalog row, assigned on insert and preserved
/// across updates.
pub type RowId = i64;

/// One catalog row's worth of metadata for a stored alignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsaRecord {
    pub category: Category,
    pub sequence: String,
    /// Part of the uniqueness predicate for mhc; ignored elsewhere.
    pub species: Option<String>,
    pub name: Option<String>,
    pub chain: Option<String>,
    pub protein_class: Option<String>,
    pub msa_path: String,
    pub is_empty: bool,
    pub stored_date: i64,
}

impl MsaRecord {
    /// Day count since the fixed epoch; the value written to `stored_date`.
    pub fn today() -> i64 {
        // NaiveDate::default() is 1970-01-01.
        (chrono::Utc::now().date_naive() - NaiveDate::default()).num_days()
    }
}

/// Failures from the catalog client, classified at this boundary into a
/// closed set so callers never match on driver error text.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store reported a temporary lock/busy condition; the only
    /// transient kind.
    #[error("catalog busy: {0}")]
    Contention(String),

    /// Could not reach or open the catalog backend.
    #[error("catalog connection failed: {0}")]
    Connection(String),

    /// The uniqueness predicate matched more than one row. External data
    /// corruption; never auto-resolved.
    #[error("{count} catalog rows match {predicate}; expected at most one")]
    Consistency { predicate: String, count: usize },

    /// The record cannot form a valid row for its category.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Any other rejected statement.
    #[error("catalog query failed: {0}")]
    Query(String),
}

impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                CatalogError::Connection(err.to_string())
            }
            _ => {
                let text = err.to_string();
                // sqlite reports contention as SQLITE_BUSY / SQLITE_LOCKED.
                // This substring check is confined to this one seam.
                if text.contains("database is locked") || text.contains("database table is locked")
                {
                    CatalogError::Contention(text)
                } else {
                    CatalogError::Query(text)
                }
            }
        }
    }
}

impl Transient for CatalogError {
    fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Contention(_))
    }
}

/// Catalog operations the store engine depends on.
///
/// `reconcile` is the single-writer-wins seam: backends without a native
/// upsert implement it as select-then-insert-or-update. The race window
/// between the existence check and the write for two first-writers of the
/// same key lives entirely behind this method.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert or fully rewrite the row matching `record`'s uniqueness
    /// predicate, returning the stable row id. The update path replaces
    /// every column, it does not merge.
    async fn reconcile(&self, record: &MsaRecord) -> Result<RowId, CatalogError>;

    /// Blob path of the row matching the predicate, if any.
    async fn find_blob_path(
        &self,
        category: Category,
        sequence: &str,
        species: Option<&str>,
    ) -> Result<Option<String>, CatalogError>;
}

/// sea-orm implementation over the shared catalog database.
pub struct SqlCatalog {
    db: DatabaseConnection,
}

impl SqlCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn reconcile(&self, record: &MsaRecord) -> Result<RowId, CatalogError> {
        let txn = self.db.begin().await?;
        let id = match record.category {
            Category::Peptide => reconcile_peptide(&txn, record).await?,
            Category::Tcr => reconcile_tcr(&txn, record).await?,
            Category::Mhc => reconcile_mhc(&txn, record).await?,
            Category::Generic => reconcile_generic(&txn, record).await?,
        };
        txn.commit().await?;
        debug!(category = %record.category, id, "reconciled catalog row");
        Ok(id)
    }

    async fn find_blob_path(
        &self,
        category: Category,
        sequence: &str,
        species: Option<&str>,
    ) -> Result<Option<String>, CatalogError> {
        let paths: Vec<String> = match category {
            Category::Peptide => peptide_msa::Entity::find()
                .filter(peptide_msa::Column::Sequence.eq(sequence))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|row| row.msa_path)
                .collect(),
            Category::Tcr => tcr_chain_msa::Entity::find()
                .filter(tcr_chain_msa::Column::Sequence.eq(sequence))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|row| row.msa_path)
                .collect(),
            Category::Mhc => {
                let mut query = mhc_chain_msa::Entity::find()
                    .filter(mhc_chain_msa::Column::Sequence.eq(sequence));
                if let Some(species) = species {
                    query = query.filter(mhc_chain_msa::Column::Species.eq(species));
                }
                query
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|row| row.msa_path)
                    .collect()
            }
            Category::Generic => generic_msa::Entity::find()
                .filter(generic_msa::Column::Sequence.eq(sequence))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|row| row.msa_path)
                .collect(),
        };

        match paths.len() {
            0 => Ok(None),
            1 => Ok(paths.into_iter().next()),
            count => Err(duplicate_rows(category, sequence, species, count)),
        }
    }
}

fn duplicate_rows(
    category: Category,
    sequence: &str,
    species: Option<&str>,
    count: usize,
) -> CatalogError {
    let predicate = match species {
        Some(species) => format!("{category}:{sequence}:{species}"),
        None => format!("{category}:{sequence}"),
    };
    CatalogError::Consistency { predicate, count }
}

async fn reconcile_peptide(
    txn: &DatabaseTransaction,
    record: &MsaRecord,
) -> Result<RowId, CatalogError> {
    use peptide_msa::{ActiveModel, Column, Entity};

    let existing = Entity::find()
        .filter(Column::Sequence.eq(&record.sequence))
        .all(txn)
        .await?;

    match existing.as_slice() {
        [] => {
            let row = ActiveModel {
                sequence: Set(record.sequence.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
                ..Default::default()
            };
            Ok(row.insert(txn).await?.id)
        }
        [current] => {
            let row = ActiveModel {
                id: Set(current.id),
                sequence: Set(record.sequence.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
            };
            row.update(txn).await?;
            Ok(current.id)
        }
        rows => Err(duplicate_rows(
            record.category,
            &record.sequence,
            None,
            rows.len(),
        )),
    }
}

async fn reconcile_tcr(
    txn: &DatabaseTransaction,
    record: &MsaRecord,
) -> Result<RowId, CatalogError> {
    use tcr_chain_msa::{ActiveModel, Column, Entity};

    let existing = Entity::find()
        .filter(Column::Sequence.eq(&record.sequence))
        .all(txn)
        .await?;

    match existing.as_slice() {
        [] => {
            let row = ActiveModel {
                sequence: Set(record.sequence.clone()),
                chain: Set(record.chain.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
                ..Default::default()
            };
            Ok(row.insert(txn).await?.id)
        }
        [current] => {
            let row = ActiveModel {
                id: Set(current.id),
                sequence: Set(record.sequence.clone()),
                chain: Set(record.chain.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
            };
            row.update(txn).await?;
            Ok(current.id)
        }
        rows => Err(duplicate_rows(
            record.category,
            &record.sequence,
            None,
            rows.len(),
        )),
    }
}

async fn reconcile_mhc(
    txn: &DatabaseTransaction,
    record: &MsaRecord,
) -> Result<RowId, CatalogError> {
    use mhc_chain_msa::{ActiveModel, Column, Entity};

    let species = record
        .species
        .as_deref()
        .ok_or_else(|| CatalogError::InvalidRecord("mhc rows require a species".into()))?;

    let existing = Entity::find()
        .filter(Column::Sequence.eq(&record.sequence))
        .filter(Column::Species.eq(species))
        .all(txn)
        .await?;

    match existing.as_slice() {
        [] => {
            let row = ActiveModel {
                sequence: Set(record.sequence.clone()),
                name: Set(record.name.clone()),
                chain: Set(record.chain.clone()),
                protein_class: Set(record.protein_class.clone()),
                species: Set(species.to_string()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
                ..Default::default()
            };
            Ok(row.insert(txn).await?.id)
        }
        [current] => {
            let row = ActiveModel {
                id: Set(current.id),
                sequence: Set(record.sequence.clone()),
                name: Set(record.name.clone()),
                chain: Set(record.chain.clone()),
                protein_class: Set(record.protein_class.clone()),
                species: Set(species.to_string()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
            };
            row.update(txn).await?;
            Ok(current.id)
        }
        rows => Err(duplicate_rows(
            record.category,
            &record.sequence,
            Some(species),
            rows.len(),
        )),
    }
}

async fn reconcile_generic(
    txn: &DatabaseTransaction,
    record: &MsaRecord,
) -> Result<RowId, CatalogError> {
    use generic_msa::{ActiveModel, Column, Entity};

    let existing = Entity::find()
        .filter(Column::Sequence.eq(&record.sequence))
        .all(txn)
        .await?;

    match existing.as_slice() {
        [] => {
            let row = ActiveModel {
                sequence: Set(record.sequence.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
                ..Default::default()
            };
            Ok(row.insert(txn).await?.id)
        }
        [current] => {
            let row = ActiveModel {
                id: Set(current.id),
                sequence: Set(record.sequence.clone()),
                msa_path: Set(record.msa_path.clone()),
                is_empty: Set(record.is_empty),
                stored_date: Set(record.stored_date),
            };
            row.update(txn).await?;
            Ok(current.id)
        }
        rows => Err(duplicate_rows(
            record.category,
            &record.sequence,
            None,
            rows.len(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_errors_classify_as_contention() {
        let err = CatalogError::from(DbErr::Custom("database is locked".into()));
        assert!(matches!(err, CatalogError::Contention(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn other_errors_classify_as_query() {
        let err = CatalogError::from(DbErr::Custom("no such table: peptide_msa".into()));
        assert!(matches!(err, CatalogError::Query(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn consistency_fault_is_not_transient() {
        let err = duplicate_rows(Category::Mhc, "MHCSEQ", Some("human"), 2);
        assert!(!err.is_transient());
        assert!(err.to_string().contains("mhc:MHCSEQ:human"));
    }

    #[test]
    fn stored_date_counts_days_since_epoch() {
        // 1970-01-01 itself is day zero, so today is strictly positive.
        assert!(MsaRecord::today() > 0);
    }
}
