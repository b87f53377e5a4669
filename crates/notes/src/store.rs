use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::index::{INDEX_FILE_NAME, NoteIndex, write_atomic};
use crate::schema::{Note, NoteIndexEntry};

/// Outcome of [`NoteStore::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Note files that had no index entry and were added.
    pub added: usize,
    /// Index entries whose note file was missing and were dropped.
    pub removed: usize,
}

/// Flat-file note persistence: one pretty-printed `{id}.json` per note plus
/// `notes_index.json` for listing.
///
/// Note files are authoritative for content; the index decides what
/// listing and search can see.  The two writes are not transactional: a
/// crash between them leaves a note retrievable by id but absent from
/// listings until [`reconcile`](Self::reconcile) runs.
///
/// All mutations on one store are serialized by an internal lock so
/// concurrent saves and deletes cannot lose index updates.  Two stores
/// opened on the same directory do not share that lock.
#[derive(Debug)]
pub struct NoteStore {
    directory: PathBuf,
    index: NoteIndex,
    write_lock: Mutex<()>,
}

impl NoteStore {
    /// Open (creating if needed) the store rooted at `directory`.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("failed to create notes directory {}", directory.display()))?;
        let index = NoteIndex::new(&directory);
        debug!(directory = %directory.display(), "note store opened");
        Ok(Self {
            directory,
            index,
            write_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn note_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && !id.contains(['/', '\\'])
            && id != "."
            && id != ".."
            && format!("{id}.json") != INDEX_FILE_NAME;
        valid.then(|| self.directory.join(format!("{id}.json")))
    }

    async fn write_note_file(&self, note: &Note) -> Result<()> {
        let path = self
            .note_path(&note.id)
            .with_context(|| format!("invalid note id '{}'", note.id))?;
        let json = serde_json::to_vec_pretty(note)?;
        write_atomic(&path, &json).await
    }

    /// Write the note file, then its index entry.  Caller holds `write_lock`.
    async fn persist(&self, note: &Note) -> Result<()> {
        self.write_note_file(note).await?;
        self.index.upsert(NoteIndexEntry::from_note(note)).await?;
        Ok(())
    }

    /// Persist `note`, assigning an id when it has none and stamping both
    /// timestamps with the current time.
    pub async fn save(&self, mut note: Note) -> Result<Note> {
        if note.id.trim().is_empty() {
            note.id = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        note.created_at = now;
        note.updated_at = Some(now);

        let _guard = self.write_lock.lock().await;
        self.persist(&note).await?;
        info!(note_id = %note.id, title = %note.title, "note saved");
        Ok(note)
    }

    /// Read one note file.  Missing or corrupt files yield `None`.
    pub async fn get_by_id(&self, id: &str) -> Option<Note> {
        let path = self.note_path(id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(note_id = id, error = %err, "note file unreadable");
                }
                return None;
            }
        };
        match serde_json::from_slice::<Note>(&raw) {
            Ok(note) => Some(note),
            Err(err) => {
                warn!(note_id = id, error = %err, "note file corrupt; treating as missing");
                None
            }
        }
    }

    /// Every indexed note that still resolves, newest first.
    pub async fn get_all(&self) -> Vec<Note> {
        let entries = self.index.load().await;
        let mut notes = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.get_by_id(&entry.id).await {
                Some(note) => notes.push(note),
                None => debug!(note_id = %entry.id, "index entry does not resolve; skipping"),
            }
        }
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    pub async fn get_for_document(&self, file_name: &str) -> Vec<Note> {
        let mut notes = self.get_all().await;
        notes.retain(|note| note.links(file_name));
        notes
    }

    /// Notes linked to at least one of `file_names`.
    pub async fn get_for_documents(&self, file_names: &[String]) -> Vec<Note> {
        let wanted: HashSet<&str> = file_names.iter().map(String::as_str).collect();
        let mut notes = self.get_all().await;
        notes.retain(|note| {
            note.linked_documents
                .iter()
                .any(|doc| wanted.contains(doc.as_str()))
        });
        notes
    }

    /// Multi-document notes whose linked documents all lie within
    /// `file_names`.
    pub async fn get_cross_document(&self, file_names: &[String]) -> Vec<Note> {
        let wanted: HashSet<&str> = file_names.iter().map(String::as_str).collect();
        let mut notes = self.get_all().await;
        notes.retain(|note| {
            note.is_cross_document()
                && note
                    .linked_documents
                    .iter()
                    .all(|doc| wanted.contains(doc.as_str()))
        });
        notes
    }

    /// Delete one note.  Succeeds when the note was already gone; `false`
    /// only on an I/O failure.
    pub async fn delete(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.delete_locked(id).await {
            Ok(()) => {
                info!(note_id = id, "note deleted");
                true
            }
            Err(err) => {
                warn!(note_id = id, error = %err, "note delete failed");
                false
            }
        }
    }

    async fn delete_locked(&self, id: &str) -> Result<()> {
        if let Some(path) = self.note_path(id) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.index.remove(id).await?;
        Ok(())
    }

    /// Delete every note linked to `file_name`.  Individual failures are
    /// logged, not reported.
    pub async fn delete_for_document(&self, file_name: &str) -> bool {
        let notes = self.get_for_document(file_name).await;
        let total = notes.len();
        let mut deleted = 0usize;
        for note in notes {
            if self.delete(&note.id).await {
                deleted += 1;
            }
        }
        info!(file_name, deleted, total, "notes removed for document");
        true
    }

    /// Overwrite the note stored under `id`.  The original creation time is
    /// kept; `updated_at` is re-stamped.  Returns `false` on any failure.
    pub async fn update(&self, id: &str, mut note: Note) -> bool {
        let _guard = self.write_lock.lock().await;
        note.id = id.to_string();
        note.created_at = match self.get_by_id(id).await {
            Some(existing) => existing.created_at,
            None => Utc::now(),
        };
        note.updated_at = Some(Utc::now());

        match self.persist(&note).await {
            Ok(()) => {
                info!(note_id = id, "note updated");
                true
            }
            Err(err) => {
                warn!(note_id = id, error = %err, "note update failed");
                false
            }
        }
    }

    /// Case-insensitive substring search.  A blank term returns every note.
    pub async fn search(&self, term: &str) -> Vec<Note> {
        let notes = self.get_all().await;
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return notes;
        }
        notes
            .into_iter()
            .filter(|note| note.matches_lowercase(&needle))
            .collect()
    }

    /// Bring the index in line with the note files on disk: add entries for
    /// notes the index misses and drop entries whose file is gone.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.write_lock.lock().await;

        let mut on_disk = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let is_note_file = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != INDEX_FILE_NAME);
            if !is_note_file {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            match self.get_by_id(&stem).await {
                Some(note) if note.id == stem => on_disk.push(note),
                Some(note) => warn!(file = %path.display(), note_id = %note.id, "note id does not match file name; skipping"),
                None => {}
            }
        }

        let mut entries = self.index.load().await;
        let disk_ids: HashSet<&str> = on_disk.iter().map(|note| note.id.as_str()).collect();
        let before = entries.len();
        entries.retain(|entry| disk_ids.contains(entry.id.as_str()));
        let removed = before - entries.len();

        let indexed: HashSet<String> = entries.iter().map(|entry| entry.id.clone()).collect();
        let mut added = 0usize;
        for note in &on_disk {
            if !indexed.contains(&note.id) {
                entries.push(NoteIndexEntry::from_note(note));
                added += 1;
            }
        }

        let report = ReconcileReport { added, removed };
        if added > 0 || removed > 0 {
            self.index.save(&entries).await?;
            info!(added, removed, "note index reconciled");
        } else {
            debug!("note index already consistent");
        }
        Ok(report)
    }
}
