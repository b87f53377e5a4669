use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata captured for one file copied into the managed workspace.
///
/// `file_name` is the key within a workspace.  Records are immutable: a
/// rename produces a new record via [`FileRecord::renamed`] and the caller
/// swaps it in under the new key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub original_path: PathBuf,
    pub copied_path: PathBuf,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub char_count: usize,
    /// Extension including the leading dot (`".md"`), empty when absent.
    pub extension: String,
}

impl FileRecord {
    /// Copy of this record keyed by `new_name`; every other attribute,
    /// including the on-disk `copied_path`, is preserved.
    pub fn renamed(&self, new_name: impl Into<String>) -> Self {
        Self {
            file_name: new_name.into(),
            ..self.clone()
        }
    }
}

/// One cached, LLM-generated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub file_name: String,
    pub summary: String,
    pub generated_at: DateTime<Utc>,
    /// Rough token estimate (`chars / 4`), not a real tokenizer count.
    pub token_count: usize,
}

impl SummaryRecord {
    pub fn new(file_name: impl Into<String>, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        Self {
            file_name: file_name.into(),
            token_count: estimate_token_count(&summary),
            summary,
            generated_at: Utc::now(),
        }
    }
}

/// ~4 characters per token.
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count() / 4
}
