use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "peptide_msa")]
pub struct Model {
    /// Stable row identifier, assigned on insert and preserved across
    /// updates.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Raw peptide sequence; the lookup key for this table.
    pub sequence: String,

    /// Blob location on the shared filesystem.
    pub msa_path: String,

    /// True when the computed alignment degenerated to the single-sequence
    /// placeholder.
    pub is_empty: bool,

    /// Day count since 1970-01-01 of the last write; not content-versioned.
    pub stored_date: i64,
}

impl ActiveModelBehavior for ActiveModel {}
