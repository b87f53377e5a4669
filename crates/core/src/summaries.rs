use async_trait::async_trait;

use crate::records::SummaryRecord;

/// Read/warm access to per-document summaries.
///
/// Ingestion only needs [`generate_in_background`](Self::generate_in_background);
/// note generation only needs lookups.  Both go through this trait so either
/// side can be tested against a substitute.
#[async_trait]
pub trait DocumentSummaries: Send + Sync {
    /// Return the cached summary or generate one.  Never fails: upstream
    /// errors turn into a fallback sentence.
    async fn generate(&self, content: &str, file_name: &str) -> String;

    /// Schedule generation without waiting for it.  No-op when a summary
    /// is already cached.
    fn generate_in_background(&self, content: String, file_name: String);

    /// Pure lookup; never triggers generation.
    async fn get(&self, file_name: &str) -> Option<SummaryRecord>;

    /// The cached subset of `file_names`, in request order.
    async fn get_many(&self, file_names: &[String]) -> Vec<SummaryRecord>;
}
