use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the active workspace, polled by front ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStatus {
    pub initialized: bool,
    pub file_count: usize,
    pub last_initialized: Option<DateTime<Utc>>,
    pub source_path: Option<String>,
    pub destination_path: Option<String>,
}

impl WorkspaceStatus {
    /// An initialized workspace that ended up with zero files.  Clients
    /// treat this as the cue for a single automatic re-initialization.
    pub fn needs_reinitialization(&self) -> bool {
        self.initialized && self.file_count == 0
    }
}
