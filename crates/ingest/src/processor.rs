use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use docrag_core::{DocumentSummaries, FileRecord};

use crate::error::{IngestError, IngestResult};

/// Read a file as text.  Invalid UTF-8 is replaced rather than rejected so
/// binary formats (`.pdf`, `.docx`) still ingest.
pub async fn read_all_text(path: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `".md"` for `notes/a.md`, empty when there is no extension.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn timestamp(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

/// Copies single files into the workspace and records their metadata.
pub struct FileProcessor {
    summaries: Arc<dyn DocumentSummaries>,
    summary_extensions: Vec<String>,
    overwrite: bool,
}

impl FileProcessor {
    pub fn new(
        summaries: Arc<dyn DocumentSummaries>,
        summary_extensions: &[String],
        overwrite: bool,
    ) -> Self {
        Self {
            summaries,
            summary_extensions: summary_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            overwrite,
        }
    }

    /// Extension allow-list check; no content sniffing.
    pub fn is_summary_eligible(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.summary_extensions.iter().any(|ext| *ext == extension)
    }

    /// Queue a background summary when `record` has an eligible extension.
    pub fn warm_summary(&self, record: &FileRecord, content: String) {
        if self.is_summary_eligible(&record.extension) {
            self.summaries
                .generate_in_background(content, record.file_name.clone());
            info!(file_name = %record.file_name, "background summary requested");
        }
    }

    /// Copy `source` into `dest_dir`, read it back, warm its summary and
    /// return its record.
    pub async fn process(&self, source: &Path, dest_dir: &Path) -> IngestResult<FileRecord> {
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|err| IngestError::io(source, err))?;
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| IngestError::FileNotFound(source.display().to_string()))?;
        let copied_path = dest_dir.join(&file_name);

        if self.overwrite || !tokio::fs::try_exists(&copied_path).await.unwrap_or(false) {
            tokio::fs::copy(source, &copied_path)
                .await
                .map_err(|err| IngestError::io(&copied_path, err))?;
        } else {
            debug!(path = %copied_path.display(), "destination exists; keeping it");
        }

        let content = read_all_text(&copied_path)
            .await
            .map_err(|err| IngestError::io(&copied_path, err))?;

        let modified_at = timestamp(metadata.modified()).unwrap_or_else(Utc::now);
        let record = FileRecord {
            original_path: source.to_path_buf(),
            copied_path,
            file_name,
            created_at: timestamp(metadata.created()).unwrap_or(modified_at),
            modified_at,
            size_bytes: metadata.len(),
            char_count: content.chars().count(),
            extension: dotted_extension(source),
        };

        debug!(file_name = %record.file_name, size = record.size_bytes, "file processed");
        self.warm_summary(&record, content);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing::RecordingSummaries;

    fn processor(summaries: Arc<RecordingSummaries>, overwrite: bool) -> FileProcessor {
        let extensions: Vec<String> = [".txt", ".md"].iter().map(|e| e.to_string()).collect();
        FileProcessor::new(summaries, &extensions, overwrite)
    }

    #[test]
    fn extension_helpers() {
        assert_eq!(dotted_extension(Path::new("a/b.MD")), ".MD");
        assert_eq!(dotted_extension(Path::new("Makefile")), "");

        let p = processor(Arc::new(RecordingSummaries::default()), true);
        assert!(p.is_summary_eligible(".MD"));
        assert!(!p.is_summary_eligible(".png"));
        assert!(!p.is_summary_eligible(""));
    }

    #[tokio::test]
    async fn process_copies_and_records_metadata() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("report.txt");
        std::fs::write(&file, "Q3 results were strong.").unwrap();

        let summaries = Arc::new(RecordingSummaries::default());
        let record = processor(summaries.clone(), true)
            .process(&file, dst.path())
            .await
            .unwrap();

        assert_eq!(record.file_name, "report.txt");
        assert_eq!(record.extension, ".txt");
        assert_eq!(record.size_bytes, 23);
        assert_eq!(record.char_count, 23);
        assert_eq!(record.original_path, file);
        assert_eq!(
            std::fs::read_to_string(&record.copied_path).unwrap(),
            "Q3 results were strong."
        );
        assert_eq!(summaries.requested(), vec!["report.txt"]);
    }

    #[tokio::test]
    async fn ineligible_extension_skips_summary_and_binary_is_lossy() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("image.png");
        std::fs::write(&file, [0x89, b'P', b'N', b'G', 0xff]).unwrap();

        let summaries = Arc::new(RecordingSummaries::default());
        let record = processor(summaries.clone(), true)
            .process(&file, dst.path())
            .await
            .unwrap();

        assert_eq!(record.size_bytes, 5);
        assert!(summaries.requested().is_empty());
    }

    #[tokio::test]
    async fn no_overwrite_keeps_existing_destination() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("a.md");
        std::fs::write(&file, "new").unwrap();
        std::fs::write(dst.path().join("a.md"), "old").unwrap();

        let summaries = Arc::new(RecordingSummaries::default());
        let record = processor(summaries, false)
            .process(&file, dst.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(record.copied_path).unwrap(), "old");
    }
}
