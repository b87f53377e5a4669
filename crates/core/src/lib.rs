pub mod records;
pub mod status;
pub mod summaries;
pub mod text;

pub use records::{FileRecord, SummaryRecord};
pub use status::WorkspaceStatus;
pub use summaries::DocumentSummaries;
pub use text::{truncate_str, truncate_with_ellipsis};
