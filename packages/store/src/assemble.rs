use common::Category;
use serde_json::{Map, Value, json};

use crate::engine::{MsaStore, StoreError};
use crate::payload::placeholder_alignment;

/// Chain inputs for one downstream inference request.
///
/// Chains are lettered in a fixed order regardless of which are present:
/// peptide A, MHC chains B and C, TCR chains D and E.
#[derive(Clone, Debug, Default)]
pub struct InferenceRequest {
    pub job_name: String,
    pub model_seeds: Vec<i64>,
    pub peptide: Option<String>,
    /// Use the stored peptide MSA instead of the trivial placeholder.
    pub use_peptide_msa: bool,
    /// Up to two MHC chain sequences (chains B, C).
    pub mhc_chains: Vec<String>,
    /// Up to two TCR chain sequences (chains D, E).
    pub tcr_chains: Vec<String>,
}

/// Assemble the inference document from stored alignments.
///
/// Pure data transformation over `fetch`; a missing stored MSA for any
/// requested chain is an error.
pub async fn assemble(store: &MsaStore, request: &InferenceRequest) -> Result<Value, StoreError> {
    let mut sequences = Vec::new();

    if let Some(peptide) = &request.peptide {
        let protein = if request.use_peptide_msa {
            fetch_chain(store, Category::Peptide, peptide, "A").await?
        } else {
            json!({
                "id": "A",
                "sequence": peptide,
                "unpairedMsa": placeholder_alignment(peptide),
                "pairedMsa": placeholder_alignment(peptide),
                "templates": [],
            })
        };
        sequences.push(json!({ "protein": protein }));
    }

    for (chain_id, sequence) in ["B", "C"].iter().zip(&request.mhc_chains) {
        let protein = fetch_chain(store, Category::Mhc, sequence, chain_id).await?;
        sequences.push(json!({ "protein": protein }));
    }

    for (chain_id, sequence) in ["D", "E"].iter().zip(&request.tcr_chains) {
        let protein = fetch_chain(store, Category::Tcr, sequence, chain_id).await?;
        sequences.push(json!({ "protein": protein }));
    }

    Ok(json!({
        "name": request.job_name,
        "modelSeeds": request.model_seeds,
        "sequences": sequences,
        "dialect": "alphafold3",
        "version": 1,
    }))
}

/// Fetch one stored alignment and reattach its chain id.
async fn fetch_chain(
    store: &MsaStore,
    category: Category,
    sequence: &str,
    chain_id: &str,
) -> Result<Value, StoreError> {
    let value = store
        .fetch(category, sequence, None)
        .await?
        .ok_or_else(|| StoreError::MissingMsa {
            category,
            sequence: sequence.to_string(),
        })?;

    let Value::Object(mut protein) = value else {
        return Err(StoreError::MalformedBlob {
            path: store
                .blob_path(category, sequence)
                .to_string_lossy()
                .into_owned(),
        });
    };
    protein.insert("id".to_string(), Value::String(chain_id.to_string()));
    Ok(Value::Object(protein))
}

/// A one-protein request document with no stored MSA at all, for jobs that
/// let the inference tool search from scratch.
pub fn single_sequence_request(job_name: &str, chain_id: &str, sequence: &str) -> Value {
    let mut protein = Map::new();
    protein.insert("id".into(), Value::String(chain_id.to_string()));
    protein.insert("sequence".into(), Value::String(sequence.to_string()));

    json!({
        "name": job_name,
        "modelSeeds": [42],
        "sequences": [{ "protein": Value::Object(protein) }],
        "dialect": "alphafold3",
        "version": 1,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::{Catalog, CatalogError, MsaRecord, RowId};
    use crate::config::RetryConfig;

    #[test]
    fn single_sequence_request_shape() {
        let doc = single_sequence_request("job1", "A", "ACDE");
        assert_eq!(doc["name"], "job1");
        assert_eq!(doc["dialect"], "alphafold3");
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["modelSeeds"], json!([42]));
        assert_eq!(doc["sequences"][0]["protein"]["id"], "A");
        assert_eq!(doc["sequences"][0]["protein"]["sequence"], "ACDE");
    }

    struct EmptyCatalog;

    #[async_trait]
    impl Catalog for EmptyCatalog {
        async fn reconcile(&self, _record: &MsaRecord) -> Result<RowId, CatalogError> {
            Err(CatalogError::Query("not under test".into()))
        }

        async fn find_blob_path(
            &self,
            _category: Category,
            _sequence: &str,
            _species: Option<&str>,
        ) -> Result<Option<String>, CatalogError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn peptide_without_stored_msa_gets_the_placeholder_protein() {
        let dir = tempfile::tempdir().unwrap();
        let store = MsaStore::new(
            Arc::new(EmptyCatalog),
            dir.path().join("msa"),
            RetryConfig::default(),
        );

        let request = InferenceRequest {
            job_name: "solo".to_string(),
            model_seeds: vec![42],
            peptide: Some("SIINFEKL".to_string()),
            use_peptide_msa: false,
            ..Default::default()
        };

        let doc = assemble(&store, &request).await.unwrap();
        let protein = &doc["sequences"][0]["protein"];
        assert_eq!(protein["id"], "A");
        assert_eq!(protein["unpairedMsa"], ">query\nSIINFEKL\n");
        assert_eq!(protein["pairedMsa"], ">query\nSIINFEKL\n");
        assert_eq!(protein["templates"], json!([]));
    }
}
