use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use docrag_core::{DocumentSummaries, SummaryRecord};
use docrag_llm::{CompletionService, ModelTarget};

use crate::prompt::{fallback_summary, summary_prompt};
use crate::scheduler::{BackgroundScheduler, TokioScheduler};

/// Process-wide memo of one summary per file name.
///
/// Lookups read the map directly.  Every generation funnels through a
/// single cache-wide lock, so at most one completion call is in flight
/// per cache and two requests for the same name never both reach the
/// model.  Unrelated names wait on each other too; that is a known
/// throughput limit.
///
/// Cloning is cheap and shares the underlying cache.
#[derive(Clone)]
pub struct SummaryCache {
    inner: Arc<Inner>,
    scheduler: Arc<dyn BackgroundScheduler>,
}

struct Inner {
    llm: Arc<dyn CompletionService>,
    target: ModelTarget,
    records: RwLock<HashMap<String, SummaryRecord>>,
    generation: Mutex<()>,
}

impl SummaryCache {
    pub fn new(llm: Arc<dyn CompletionService>, target: ModelTarget) -> Self {
        Self::with_scheduler(llm, target, Arc::new(TokioScheduler))
    }

    pub fn with_scheduler(
        llm: Arc<dyn CompletionService>,
        target: ModelTarget,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                llm,
                target,
                records: RwLock::new(HashMap::new()),
                generation: Mutex::new(()),
            }),
            scheduler,
        }
    }

    pub fn target(&self) -> &ModelTarget {
        &self.inner.target
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.inner.read().contains_key(file_name)
    }

    /// Drop any cached summary for `file_name` and generate a fresh one.
    pub async fn regenerate(&self, content: &str, file_name: &str) -> String {
        let _guard = self.inner.generation.lock().await;
        self.inner.write().remove(file_name);
        info!(file_name, "summary invalidated for regeneration");
        self.inner.generate_locked(content, file_name).await
    }
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SummaryRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SummaryRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn cached_text(&self, file_name: &str) -> Option<String> {
        self.read().get(file_name).map(|record| record.summary.clone())
    }

    async fn generate(&self, content: &str, file_name: &str) -> String {
        if let Some(summary) = self.cached_text(file_name) {
            debug!(file_name, "summary cache hit");
            return summary;
        }
        let _guard = self.generation.lock().await;
        self.generate_locked(content, file_name).await
    }

    /// Caller holds `generation`.
    async fn generate_locked(&self, content: &str, file_name: &str) -> String {
        // Another caller may have filled the slot while we waited.
        if let Some(summary) = self.cached_text(file_name) {
            debug!(file_name, "summary cache hit after wait");
            return summary;
        }

        info!(file_name, target = %self.target, "generating summary");
        let prompt = summary_prompt(file_name, content);
        match self.llm.complete(&prompt, &self.target).await {
            Ok(summary) => {
                let record = SummaryRecord::new(file_name, summary.clone());
                info!(file_name, token_count = record.token_count, "summary cached");
                self.write()
                    .entry(file_name.to_string())
                    .or_insert(record);
                summary
            }
            Err(err) => {
                error!(file_name, error = %err, "summary generation failed");
                fallback_summary(file_name)
            }
        }
    }
}

#[async_trait]
impl DocumentSummaries for SummaryCache {
    async fn generate(&self, content: &str, file_name: &str) -> String {
        self.inner.generate(content, file_name).await
    }

    fn generate_in_background(&self, content: String, file_name: String) {
        if self.contains(&file_name) {
            debug!(file_name = %file_name, "summary already cached");
            return;
        }
        let inner = self.inner.clone();
        let label = format!("summary:{file_name}");
        self.scheduler.spawn(
            label,
            async move {
                inner.generate(&content, &file_name).await;
                info!(file_name = %file_name, "background summary finished");
            }
            .boxed(),
        );
    }

    async fn get(&self, file_name: &str) -> Option<SummaryRecord> {
        self.inner.read().get(file_name).cloned()
    }

    async fn get_many(&self, file_names: &[String]) -> Vec<SummaryRecord> {
        let records = self.inner.read();
        file_names
            .iter()
            .filter_map(|name| records.get(name).cloned())
            .collect()
    }
}
