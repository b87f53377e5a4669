use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use docrag_config::AppConfig;
use docrag_core::{DocumentSummaries, FileRecord, SummaryRecord, WorkspaceStatus};
use docrag_ingest::{Workspace, WorkspaceManager};
use docrag_llm::{CompletionService, LlmRouter, ModelTarget};
use docrag_notes::NoteStore;
use docrag_summary::SummaryCache;

use crate::chat::ChatService;
use crate::generator::NoteGenerator;

/// The wired application: one completion backend shared by the summary
/// cache, note generator and chat, plus the note store and workspace.
pub struct App {
    config: AppConfig,
    llm: Arc<dyn CompletionService>,
    summaries: SummaryCache,
    notes: Arc<NoteStore>,
    workspace: WorkspaceManager,
    generator: NoteGenerator,
    chat: ChatService,
}

impl App {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let router = LlmRouter::from_config(&config.llm);
        Self::with_completion(config, Arc::new(router)).await
    }

    /// Build against an arbitrary completion backend.
    pub async fn with_completion(config: AppConfig, llm: Arc<dyn CompletionService>) -> Result<Self> {
        let summary_target = ModelTarget::parse(&config.summary.servicer, &config.summary.model)
            .context("invalid [summary] servicer")?;
        let summaries = SummaryCache::new(llm.clone(), summary_target);
        Self::assemble(config, llm, summaries).await
    }

    /// Build with a caller-supplied summary cache (e.g. one driven by a
    /// manual scheduler).
    pub async fn assemble(
        config: AppConfig,
        llm: Arc<dyn CompletionService>,
        summaries: SummaryCache,
    ) -> Result<Self> {
        let note_target = ModelTarget::parse(&config.notes.servicer, &config.notes.model)
            .context("invalid [notes] servicer")?;

        let notes = Arc::new(NoteStore::open(PathBuf::from(&config.notes.directory)).await?);
        if config.notes.reconcile_on_startup {
            match notes.reconcile().await {
                Ok(report) => info!(added = report.added, removed = report.removed, "note store reconciled"),
                Err(err) => warn!(error = %err, "note store reconciliation failed"),
            }
        }

        let shared_summaries: Arc<dyn DocumentSummaries> = Arc::new(summaries.clone());
        let workspace = WorkspaceManager::new(shared_summaries.clone(), config.ingest.clone());
        let generator = NoteGenerator::new(notes.clone(), shared_summaries, llm.clone(), note_target)
            .with_labels(&config.notes.generator_label, &config.notes.default_category);
        let chat = ChatService::new(llm.clone(), config.chat.max_context_chars);

        Ok(Self {
            config,
            llm,
            summaries,
            notes,
            workspace,
            generator,
            chat,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn llm(&self) -> &Arc<dyn CompletionService> {
        &self.llm
    }

    pub fn summaries(&self) -> &SummaryCache {
        &self.summaries
    }

    pub fn notes(&self) -> &Arc<NoteStore> {
        &self.notes
    }

    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    pub fn generator(&self) -> &NoteGenerator {
        &self.generator
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    /// Target for ad-hoc chat: `servicer` (or the configured provider) with
    /// `model` (or that servicer's configured model).
    pub fn chat_target(&self, servicer: Option<&str>, model: Option<&str>) -> Result<ModelTarget> {
        let servicer = servicer.unwrap_or(self.config.llm.provider.as_str());
        let model = model.unwrap_or_else(|| self.config.model_for(servicer));
        ModelTarget::parse(servicer, model)
    }

    // ── workspace ───────────────────────────────────────────────────────────

    pub async fn initialize(&self, source: impl AsRef<Path>, destination: Option<PathBuf>) -> Result<Arc<Workspace>> {
        Ok(self.workspace.initialize(source, destination).await?)
    }

    pub async fn status(&self) -> WorkspaceStatus {
        self.workspace.status().await
    }

    pub async fn upload_file(&self, original_name: &str, bytes: &[u8]) -> Result<FileRecord> {
        Ok(self.workspace.upload(original_name, bytes).await?)
    }

    pub async fn upload_path(&self, path: impl AsRef<Path>) -> Result<FileRecord> {
        Ok(self.workspace.upload_path(path).await?)
    }

    pub async fn rename_file(&self, old_name: &str, new_name: &str) -> Result<Option<FileRecord>> {
        Ok(self.workspace.rename(old_name, new_name).await?)
    }

    /// Remove a file from the workspace, deleting its linked notes first.
    /// Returns whether a file record was removed.
    pub async fn remove_file(&self, file_name: &str) -> Result<bool> {
        self.workspace.current().await?;
        if !self.generator.delete_notes_for_document(file_name).await {
            warn!(file_name, "some linked notes could not be removed");
        }
        let removed = self.workspace.remove(file_name).await?;
        info!(file_name, removed, "file removed");
        Ok(removed)
    }

    // ── summaries ───────────────────────────────────────────────────────────

    pub async fn summary(&self, file_name: &str) -> Option<SummaryRecord> {
        self.summaries.get(file_name).await
    }

    pub async fn summaries_for(&self, file_names: &[String]) -> Vec<SummaryRecord> {
        self.summaries.get_many(file_names).await
    }

    /// Cached summary text, generating it from the file content if needed.
    pub async fn summarize(&self, file_name: &str) -> Result<String> {
        let content = self.workspace.get_file_content(file_name).await?;
        Ok(self.summaries.generate(&content, file_name).await)
    }

    pub async fn regenerate_summary(&self, file_name: &str) -> Result<String> {
        let content = self.workspace.get_file_content(file_name).await?;
        Ok(self.summaries.regenerate(&content, file_name).await)
    }
}

#[cfg(test)]
mod tests {
    use docrag_llm::fake::ScriptedCompletion;
    use docrag_summary::ManualScheduler;
    use tempfile::TempDir;

    use super::*;
    use crate::generator::GenerateNoteRequest;
    use docrag_notes::NoteType;

    struct Harness {
        _root: TempDir,
        source: PathBuf,
        scheduler: Arc<ManualScheduler>,
        llm: Arc<ScriptedCompletion>,
        app: App,
    }

    async fn harness(files: &[(&str, &str)]) -> Harness {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        for (name, content) in files {
            std::fs::write(source.join(name), content).unwrap();
        }

        let mut config = AppConfig::default();
        config.notes.directory = root.path().join("Data/Notes").display().to_string();
        config.ingest.default_destination_path = root.path().join("dest").display().to_string();

        let llm = Arc::new(ScriptedCompletion::replying("# Generated\nSomething useful."));
        let scheduler = Arc::new(ManualScheduler::new());
        let summary_target = ModelTarget::parse(&config.summary.servicer, &config.summary.model).unwrap();
        let summaries = SummaryCache::with_scheduler(llm.clone(), summary_target, scheduler.clone());
        let app = App::assemble(config, llm.clone(), summaries).await.unwrap();

        Harness {
            _root: root,
            source,
            scheduler,
            llm,
            app,
        }
    }

    #[tokio::test]
    async fn ingest_warms_summary_in_background() {
        let h = harness(&[("report.txt", "Q3 results were strong.")]).await;
        h.app.initialize(&h.source, None).await.unwrap();
        assert!(h.app.summary("report.txt").await.is_none());

        h.scheduler.run_all().await;
        let record = h.app.summary("report.txt").await.unwrap();
        assert!(!record.summary.is_empty());
        assert_eq!(record.token_count, record.summary.chars().count() / 4);
        assert!(h.llm.prompts()[0].contains("Q3 results were strong."));
    }

    #[tokio::test]
    async fn note_for_ingested_document_end_to_end() {
        let h = harness(&[("report.txt", "Q3 results were strong.")]).await;
        h.app.initialize(&h.source, None).await.unwrap();
        h.scheduler.run_all().await;

        let response = h
            .app
            .generator()
            .generate_note(&GenerateNoteRequest::for_documents(["report.txt"]))
            .await;
        assert!(response.success);
        let note = response.note.unwrap();
        assert_eq!(note.note_type, NoteType::SingleDocument);
        assert_eq!(note.title, "# Generated");
        assert!(note.cross_document_context.is_none());
    }

    #[tokio::test]
    async fn removing_a_file_cascades_to_its_notes() {
        let h = harness(&[("X.txt", "x content"), ("Y.txt", "y content")]).await;
        h.app.initialize(&h.source, None).await.unwrap();
        h.scheduler.run_all().await;

        let gen_ = h.app.generator();
        assert!(gen_.generate_note(&GenerateNoteRequest::for_documents(["X.txt"])).await.success);
        assert!(gen_.generate_note(&GenerateNoteRequest::for_documents(["Y.txt"])).await.success);

        assert!(h.app.remove_file("X.txt").await.unwrap());
        assert!(gen_.notes_for_document("X.txt").await.is_empty());
        assert_eq!(gen_.all_notes().await.len(), 1);
        assert_eq!(h.app.status().await.file_count, 1);
    }

    #[tokio::test]
    async fn remove_before_initialize_is_an_error() {
        let h = harness(&[]).await;
        assert!(h.app.remove_file("a.txt").await.is_err());
    }

    #[tokio::test]
    async fn summarize_and_regenerate_use_workspace_content() {
        let h = harness(&[("a.md", "alpha")]).await;
        h.app.initialize(&h.source, None).await.unwrap();
        h.llm.push_reply("first summary");
        h.llm.push_reply("second summary");

        assert_eq!(h.app.summarize("a.md").await.unwrap(), "first summary");
        assert_eq!(h.app.summarize("a.md").await.unwrap(), "first summary");
        assert_eq!(h.app.regenerate_summary("a.md").await.unwrap(), "second summary");
        assert!(h.app.summarize("missing.md").await.is_err());

        // the queued background job finds the summary already cached
        h.scheduler.run_all().await;
        assert_eq!(h.llm.call_count(), 2);
    }

    #[test]
    fn chat_target_defaults_follow_config() {
        let config = AppConfig::default();
        let servicer = config.llm.provider.clone();
        let model = config.model_for(&servicer).to_string();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let mut config = config;
        config.notes.directory = dir.path().display().to_string();
        let app = rt
            .block_on(App::with_completion(config, Arc::new(ScriptedCompletion::default())))
            .unwrap();

        let target = app.chat_target(None, None).unwrap();
        assert_eq!(target.to_string(), format!("{servicer}/{model}"));
        let explicit = app.chat_target(Some("openai"), Some("gpt-4.1")).unwrap();
        assert_eq!(explicit.to_string(), "openai/gpt-4.1");
        assert!(app.chat_target(Some("bogus"), None).is_err());
    }
}
