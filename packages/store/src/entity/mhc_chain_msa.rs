use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mhc_chain_msa")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Raw chain sequence. Together with `species` this forms the lookup
    /// key: the same sequence may legitimately occur in several species.
    pub sequence: String,

    pub name: Option<String>,
    pub chain: Option<String>,
    pub protein_class: Option<String>,

    /// Species of origin; part of the uniqueness predicate.
    pub species: String,

    pub msa_path: String,
    pub is_empty: bool,
    pub stored_date: i64,
}

impl ActiveModelBehavior for ActiveModel {}
