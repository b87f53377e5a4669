use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{info, warn};
use walkdir::WalkDir;

use docrag_core::FileRecord;

use crate::error::{IngestError, IngestResult};
use crate::processor::FileProcessor;

/// Mirrors a source tree into a destination directory.
pub struct DirectoryCopier {
    processor: Arc<FileProcessor>,
    max_file_size_bytes: u64,
}

impl DirectoryCopier {
    pub fn new(processor: Arc<FileProcessor>, max_file_size_bytes: u64) -> Self {
        Self {
            processor,
            max_file_size_bytes,
        }
    }

    /// Regular files under `source`, skipping anything inside `skip`
    /// (a destination nested in its own source) and files over the size
    /// limit.
    fn discover(source: &Path, skip: &Path, limit: u64) -> IngestResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(source).to_path_buf();
                IngestError::io(path, err.into())
            })?;
            if !entry.file_type().is_file() || entry.path().starts_with(skip) {
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|err| IngestError::io(entry.path(), err.into()))?
                .len();
            if limit > 0 && size > limit {
                warn!(path = %entry.path().display(), size, limit, "file over size limit; skipping");
                continue;
            }
            files.push(entry.into_path());
        }
        Ok(files)
    }

    /// Copy every file under `source` into `destination`, preserving the
    /// relative layout, and process them concurrently.  The first failing
    /// file fails the whole batch.
    pub async fn copy_directory(
        &self,
        source: &Path,
        destination: &Path,
    ) -> IngestResult<Vec<FileRecord>> {
        if !tokio::fs::metadata(source)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(IngestError::SourceNotFound(source.to_path_buf()));
        }

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|err| IngestError::io(destination, err))?;

        let (src, dst, limit) = (
            source.to_path_buf(),
            destination.to_path_buf(),
            self.max_file_size_bytes,
        );
        let files = tokio::task::spawn_blocking(move || Self::discover(&src, &dst, limit))
            .await
            .map_err(|err| IngestError::io(source, std::io::Error::other(err)))??;

        let tasks = files.iter().map(|file| async move {
            let relative_dir = file
                .strip_prefix(source)
                .ok()
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new(""));
            let target_dir = destination.join(relative_dir);
            tokio::fs::create_dir_all(&target_dir)
                .await
                .map_err(|err| IngestError::io(&target_dir, err))?;
            self.processor.process(file, &target_dir).await
        });

        let records = try_join_all(tasks).await?;
        info!(
            source = %source.display(),
            destination = %destination.display(),
            files = records.len(),
            "directory copied"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing::RecordingSummaries;

    fn copier(limit: u64) -> (DirectoryCopier, Arc<RecordingSummaries>) {
        let summaries = Arc::new(RecordingSummaries::default());
        let extensions = vec![".txt".to_string(), ".md".to_string()];
        let processor = Arc::new(FileProcessor::new(summaries.clone(), &extensions, true));
        (DirectoryCopier::new(processor, limit), summaries)
    }

    #[tokio::test]
    async fn missing_source_is_distinct_error() {
        let dst = TempDir::new().unwrap();
        let (copier, _) = copier(0);
        let err = copier
            .copy_directory(Path::new("/definitely/not/here"), dst.path())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn copies_nested_tree_and_warms_eligible_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("sub/deeper")).unwrap();
        std::fs::write(src.path().join("report.txt"), "Q3 results were strong.").unwrap();
        std::fs::write(src.path().join("sub/notes.md"), "# Notes").unwrap();
        std::fs::write(src.path().join("sub/deeper/data.csv"), "a,b").unwrap();

        let (copier, summaries) = copier(0);
        let target = dst.path().join("workspace");
        let mut records = copier.copy_directory(src.path(), &target).await.unwrap();
        records.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let names: Vec<&str> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["data.csv", "notes.md", "report.txt"]);
        assert!(target.join("sub/deeper/data.csv").exists());
        assert!(target.join("sub/notes.md").exists());
        assert_eq!(summaries.requested(), vec!["notes.md", "report.txt"]);
    }

    #[tokio::test]
    async fn oversize_files_are_skipped() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("small.txt"), "ok").unwrap();
        std::fs::write(src.path().join("big.txt"), "x".repeat(64)).unwrap();

        let (copier, _) = copier(16);
        let records = copier.copy_directory(src.path(), dst.path()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "small.txt");
    }

    #[tokio::test]
    async fn destination_inside_source_is_not_recopied() {
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.txt"), "a").unwrap();
        let nested = src.path().join("out");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("stale.txt"), "old copy").unwrap();

        let (copier, _) = copier(0);
        let records = copier.copy_directory(src.path(), &nested).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "a.txt");
    }
}
