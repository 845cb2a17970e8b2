use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Sequence classification. Selects the catalog table, the key-derivation
/// rule and the blob subdirectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Peptide,
    Mhc,
    Tcr,
    Generic,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Peptide => "peptide",
            Category::Mhc => "mhc",
            Category::Tcr => "tcr",
            Category::Generic => "generic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown category '{0}', expected peptide, mhc, tcr or generic")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peptide" => Ok(Category::Peptide),
            "mhc" => Ok(Category::Mhc),
            "tcr" => Ok(Category::Tcr),
            "generic" => Ok(Category::Generic),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

/// A derived lookup key and blob filename for one sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedKey {
    /// Catalog lookup key; always the raw sequence.
    pub lookup_key: String,
    /// Filesystem-safe blob filename.
    pub filename: String,
}

/// Derive the catalog lookup key and the blob filename for a sequence.
///
/// Peptide sequences are short and filename-safe, so they keep a
/// human-readable filename. Every other category hashes the sequence to
/// bound filename length and charset.
pub fn derive(category: Category, sequence: &str) -> DerivedKey {
    let filename = match category {
        Category::Peptide => format!("{sequence}.json"),
        _ => {
            let digest = Sha256::digest(sequence.as_bytes());
            format!("{}.json", hex::encode(digest))
        }
    };
    DerivedKey {
        lookup_key: sequence.to_string(),
        filename,
    }
}

/// Filesystem location of a sequence's blob: one subdirectory per category
/// under the shared root.
pub fn blob_path(root: &Path, category: Category, sequence: &str) -> PathBuf {
    root.join(category.as_str())
        .join(derive(category, sequence).filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peptide_filename_is_raw_sequence() {
        let key = derive(Category::Peptide, "ACDE");
        assert_eq!(key.lookup_key, "ACDE");
        assert_eq!(key.filename, "ACDE.json");
    }

    #[test]
    fn tcr_filename_is_sha256_hex() {
        let key = derive(Category::Tcr, "ACDE");
        let expected = format!("{}.json", hex::encode(Sha256::digest(b"ACDE")));
        assert_eq!(key.filename, expected);
        assert_eq!(key.lookup_key, "ACDE");
        // 64 hex chars + extension
        assert_eq!(key.filename.len(), 64 + ".json".len());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive(Category::Mhc, "MHCSEQ");
        let b = derive(Category::Mhc, "MHCSEQ");
        assert_eq!(a, b);
    }

    #[test]
    fn non_peptide_categories_share_the_hash_rule() {
        let seq = "LONGSEQUENCEWITHNOFILENAMEGUARANTEES";
        assert_eq!(
            derive(Category::Mhc, seq).filename,
            derive(Category::Tcr, seq).filename
        );
        assert_eq!(
            derive(Category::Generic, seq).filename,
            derive(Category::Tcr, seq).filename
        );
    }

    #[test]
    fn blob_path_has_one_subdirectory_per_category() {
        let path = blob_path(Path::new("/data/msa"), Category::Peptide, "ACDE");
        assert_eq!(path, Path::new("/data/msa/peptide/ACDE.json"));
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in [
            Category::Peptide,
            Category::Mhc,
            Category::Tcr,
            Category::Generic,
        ] {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("dna".parse::<Category>().is_err());
    }
}
