use serde_json::Value;
use thiserror::Error;

/// Structural problems with the upstream tool's output document.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("payload has no `sequences` entries")]
    MissingSequences,

    #[error("first sequence entry has no `protein` object")]
    MissingProtein,
}

/// The trivial single-sequence alignment produced when search finds nothing.
pub fn placeholder_alignment(sequence: &str) -> String {
    format!(">query\n{sequence}\n")
}

/// The storable portion of an upstream MSA document.
#[derive(Clone, Debug, PartialEq)]
pub struct MsaPayload {
    /// The `protein` object with its chain `id` stripped.
    pub document: Value,
    /// True when both alignments equal the single-sequence placeholder.
    pub is_empty: bool,
}

impl MsaPayload {
    /// Extract the storable alignment from a full upstream document:
    /// `sequences[0].protein`, minus the chain `id`.
    pub fn from_document(raw: &str, sequence: &str) -> Result<Self, PayloadError> {
        let doc: Value = serde_json::from_str(raw)?;

        let entry = doc
            .get("sequences")
            .and_then(Value::as_array)
            .and_then(|sequences| sequences.first())
            .ok_or(PayloadError::MissingSequences)?;

        let Some(Value::Object(protein)) = entry.get("protein") else {
            return Err(PayloadError::MissingProtein);
        };

        let mut protein = protein.clone();
        protein.remove("id");

        let placeholder = placeholder_alignment(sequence);
        let is_empty = ["unpairedMsa", "pairedMsa"]
            .iter()
            .all(|key| protein.get(*key).and_then(Value::as_str) == Some(placeholder.as_str()));

        Ok(Self {
            document: Value::Object(protein),
            is_empty,
        })
    }

    /// Serialized blob contents.
    pub fn to_blob(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.document)
    }
}
