use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tcr_chain_msa")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Raw chain sequence; the lookup key for this table.
    pub sequence: String,

    /// Chain type (alpha/beta), descriptive only.
    pub chain: Option<String>,

    pub msa_path: String,
    pub is_empty: bool,
    pub stored_date: i64,
}

impl ActiveModelBehavior for ActiveModel {}
