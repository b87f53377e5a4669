//! File ingestion: copy a source tree into a managed workspace, record
//! per-file metadata and warm document summaries in the background.

mod copier;
pub mod error;
mod processor;
mod repository;
#[cfg(test)]
mod testing;
mod workspace;

pub use copier::DirectoryCopier;
pub use error::{IngestError, IngestResult};
pub use processor::{FileProcessor, dotted_extension, read_all_text};
pub use repository::FileRepository;
pub use workspace::{Workspace, WorkspaceManager, upload_file_name};
