use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use docrag_core::FileRecord;

use crate::error::{IngestError, IngestResult};
use crate::processor::read_all_text;

/// In-memory registry of the files in one workspace, keyed by file name.
#[derive(Debug)]
pub struct FileRepository {
    destination: PathBuf,
    files: RwLock<HashMap<String, FileRecord>>,
}

impl FileRepository {
    /// Build from freshly copied records.  When two records share a name
    /// the first one wins.
    pub fn new(destination: impl Into<PathBuf>, records: Vec<FileRecord>) -> Self {
        let mut files = HashMap::with_capacity(records.len());
        for record in records {
            match files.entry(record.file_name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(existing) => warn!(
                    file_name = %record.file_name,
                    kept = %existing.get().copied_path.display(),
                    dropped = %record.copied_path.display(),
                    "duplicate file name in workspace"
                ),
            }
        }
        Self {
            destination: destination.into(),
            files: RwLock::new(files),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, file_name: &str) -> bool {
        self.files.read().await.contains_key(file_name)
    }

    /// Returns `false` when the name is already taken.
    pub async fn add(&self, record: FileRecord) -> bool {
        match self.files.write().await.entry(record.file_name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Write `bytes` under the first name from `candidates` that is neither
    /// registered nor present on disk, then register the record `build`
    /// makes for it.  The write guard is held throughout, so concurrent
    /// callers never share a name.
    pub async fn store_new<I, F>(&self, candidates: I, bytes: &[u8], build: F) -> IngestResult<FileRecord>
    where
        I: IntoIterator<Item = String>,
        F: FnOnce(String, PathBuf) -> FileRecord,
    {
        let mut files = self.files.write().await;
        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|err| IngestError::io(&self.destination, err))?;

        for file_name in candidates {
            if files.contains_key(&file_name) {
                continue;
            }
            let path = self.destination.join(&file_name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(IngestError::io(&path, err)),
            };
            if let Err(err) = write_all_synced(&mut file, bytes).await {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(IngestError::io(&path, err));
            }

            let record = build(file_name.clone(), path);
            files.insert(file_name, record.clone());
            return Ok(record);
        }

        Err(IngestError::io(
            &self.destination,
            std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"),
        ))
    }

    pub async fn get(&self, file_name: &str) -> Option<FileRecord> {
        self.files.read().await.get(file_name).cloned()
    }

    /// All records ordered by file name.
    pub async fn list(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.files.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        records
    }

    pub async fn content(&self, file_name: &str) -> IngestResult<String> {
        let record = self
            .get(file_name)
            .await
            .ok_or_else(|| IngestError::FileNotFound(file_name.to_string()))?;
        read_all_text(&record.copied_path)
            .await
            .map_err(|err| IngestError::io(&record.copied_path, err))
    }

    /// Drop the record.  The copied file stays on disk.
    pub async fn remove(&self, file_name: &str) -> bool {
        let removed = self.files.write().await.remove(file_name).is_some();
        debug!(file_name, removed, "file record removed");
        removed
    }

    /// Re-key `old_name` as `new_name`.  `None` when `old_name` is unknown
    /// or `new_name` is already taken.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> Option<FileRecord> {
        let mut files = self.files.write().await;
        if !files.contains_key(old_name) || files.contains_key(new_name) {
            return None;
        }
        let old = files.remove(old_name)?;
        let renamed = old.renamed(new_name);
        files.insert(new_name.to_string(), renamed.clone());
        Some(renamed)
    }
}

async fn write_all_synced(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}
