//! The `notes_index.json` listing file and the atomic write helper shared
//! with per-note files.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::schema::NoteIndexEntry;

pub const INDEX_FILE_NAME: &str = "notes_index.json";

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a torn write.  Writes a `.tmp` sibling, fsyncs it, then
/// renames it over the target.  The temp file is removed on failure.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "note.json".to_string());
        path.with_file_name(format!("{filename}.tmp"))
    };

    let write_result: Result<()> = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }

    Ok(())
}

/// Array of [`NoteIndexEntry`] stored next to the note files.
///
/// Not synchronized on its own; [`crate::NoteStore`] holds its index lock
/// around every load-modify-save sequence.
#[derive(Debug, Clone)]
pub struct NoteIndex {
    path: PathBuf,
}

impl NoteIndex {
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(INDEX_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable index loads as empty.
    pub async fn load(&self) -> Vec<NoteIndexEntry> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "note index unreadable; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<NoteIndexEntry>>(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "note index corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    pub async fn save(&self, entries: &[NoteIndexEntry]) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &json).await
    }

    /// Insert or replace the entry with the same id.
    pub async fn upsert(&self, entry: NoteIndexEntry) -> Result<()> {
        let mut entries = self.load().await;
        match entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.save(&entries).await
    }

    /// Returns whether an entry was removed.  The index is rewritten either way.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.load().await;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        self.save(&entries).await?;
        Ok(removed)
    }
}
