use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use docrag_config::IngestConfig;
use docrag_core::{DocumentSummaries, FileRecord, WorkspaceStatus};

use crate::copier::DirectoryCopier;
use crate::error::{IngestError, IngestResult};
use crate::processor::{FileProcessor, dotted_extension};
use crate::repository::FileRepository;

/// One initialized source/destination pair and its file registry.
#[derive(Debug)]
pub struct Workspace {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub initialized_at: DateTime<Utc>,
    pub files: FileRepository,
}

/// `{stem}_{yyyyMMdd_HHmmss}{ext}` for an uploaded file.
pub fn upload_file_name(original: &str, at: DateTime<Utc>) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    format!("{stem}_{}{}", at.format("%Y%m%d_%H%M%S"), dotted_extension(path))
}

/// Owns the active [`Workspace`].
///
/// Re-initialization builds a complete new workspace and swaps it in;
/// callers holding the previous `Arc<Workspace>` keep a consistent view.
pub struct WorkspaceManager {
    config: IngestConfig,
    processor: Arc<FileProcessor>,
    copier: DirectoryCopier,
    current: RwLock<Option<Arc<Workspace>>>,
}

impl WorkspaceManager {
    pub fn new(summaries: Arc<dyn DocumentSummaries>, config: IngestConfig) -> Self {
        let processor = Arc::new(FileProcessor::new(
            summaries,
            &config.summary_extensions,
            config.overwrite_existing_files,
        ));
        let copier = DirectoryCopier::new(processor.clone(), config.max_file_size_bytes);
        Self {
            config,
            processor,
            copier,
            current: RwLock::new(None),
        }
    }

    fn default_destination(&self) -> PathBuf {
        if self.config.default_destination_path.trim().is_empty() {
            std::env::temp_dir()
                .join("DocRag")
                .join(Uuid::new_v4().to_string())
        } else {
            PathBuf::from(&self.config.default_destination_path)
        }
    }

    /// Copy `source` into `destination` (or the configured default) and
    /// make the result the active workspace.  On failure the previous
    /// workspace stays active.
    pub async fn initialize(
        &self,
        source: impl AsRef<Path>,
        destination: Option<PathBuf>,
    ) -> IngestResult<Arc<Workspace>> {
        let source = source.as_ref().to_path_buf();
        let destination = destination.unwrap_or_else(|| self.default_destination());

        if !self.config.create_destination_if_not_exists
            && !tokio::fs::try_exists(&destination).await.unwrap_or(false)
        {
            return Err(IngestError::DestinationMissing(destination));
        }

        info!(source = %source.display(), destination = %destination.display(), "initializing workspace");
        let copy = self.copier.copy_directory(&source, &destination);
        let records = match self.config.timeout_secs {
            0 => copy.await?,
            secs => tokio::time::timeout(Duration::from_secs(secs), copy)
                .await
                .map_err(|_| IngestError::TimedOut {
                    path: source.clone(),
                    secs,
                })??,
        };

        let workspace = Arc::new(Workspace {
            files: FileRepository::new(destination.clone(), records),
            source,
            destination,
            initialized_at: Utc::now(),
        });
        let file_count = workspace.files.len().await;
        *self.current.write().await = Some(workspace.clone());
        info!(file_count, "workspace initialized");
        Ok(workspace)
    }

    pub async fn current(&self) -> IngestResult<Arc<Workspace>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(IngestError::NotInitialized)
    }

    pub async fn is_initialized(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn status(&self) -> WorkspaceStatus {
        let Ok(workspace) = self.current().await else {
            return WorkspaceStatus::default();
        };
        WorkspaceStatus {
            initialized: true,
            file_count: workspace.files.len().await,
            last_initialized: Some(workspace.initialized_at),
            source_path: Some(workspace.source.display().to_string()),
            destination_path: Some(workspace.destination.display().to_string()),
        }
    }

    /// Store `bytes` under a timestamped copy of `original_name` and
    /// register it.  Eligible types get a background summary.
    pub async fn upload(&self, original_name: &str, bytes: &[u8]) -> IngestResult<FileRecord> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyUpload(original_name.to_string()));
        }
        let workspace = self.current().await?;
        let size = bytes.len() as u64;
        let limit = self.config.max_file_size_bytes;
        if limit > 0 && size > limit {
            return Err(IngestError::FileTooLarge {
                file_name: original_name.to_string(),
                size,
                limit,
            });
        }

        // Only the final component of the client-supplied name is used.
        let base_name = Path::new(original_name)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| original_name.to_string());
        let base_path = Path::new(&base_name);
        let stem = base_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = dotted_extension(base_path);

        let now = Utc::now();
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let candidates = std::iter::once(upload_file_name(&base_name, now))
            .chain((1..).map(|attempt| format!("{stem}_{stamp}_{attempt}{extension}")));

        let content = String::from_utf8_lossy(bytes).into_owned();
        let char_count = content.chars().count();
        let record = workspace
            .files
            .store_new(candidates, bytes, |file_name, copied_path| FileRecord {
                original_path: PathBuf::from(original_name),
                copied_path,
                file_name,
                created_at: now,
                modified_at: now,
                size_bytes: size,
                char_count,
                extension: extension.clone(),
            })
            .await?;

        self.processor.warm_summary(&record, content);
        info!(file_name = %record.file_name, size, "file uploaded");
        Ok(record)
    }

    /// Upload a file from the local filesystem.
    pub async fn upload_path(&self, path: impl AsRef<Path>) -> IngestResult<FileRecord> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| IngestError::io(path, err))?;
        let mut record = self.upload(&path.display().to_string(), &bytes).await?;
        record.original_path = path.to_path_buf();
        Ok(record)
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> IngestResult<Option<FileRecord>> {
        let workspace = self.current().await?;
        let renamed = workspace.files.rename(old_name, new_name).await;
        if renamed.is_some() {
            info!(old_name, new_name, "file renamed");
        }
        Ok(renamed)
    }

    /// Drop the file record only; linked notes are the caller's concern.
    pub async fn remove(&self, file_name: &str) -> IngestResult<bool> {
        Ok(self.current().await?.files.remove(file_name).await)
    }

    pub async fn get_file(&self, file_name: &str) -> IngestResult<Option<FileRecord>> {
        Ok(self.current().await?.files.get(file_name).await)
    }

    pub async fn list_files(&self) -> IngestResult<Vec<FileRecord>> {
        Ok(self.current().await?.files.list().await)
    }

    pub async fn get_file_content(&self, file_name: &str) -> IngestResult<String> {
        self.current().await?.files.content(file_name).await
    }
}
