use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catch-all table for sequences outside the named categories.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generic_msa")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub sequence: String,
    pub msa_path: String,
    pub is_empty: bool,
    pub stored_date: i64,
}

impl ActiveModelBehavior for ActiveModel {}
