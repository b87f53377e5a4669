use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use docrag_core::DocumentSummaries;
use docrag_llm::{CompletionService, ModelTarget};
use docrag_notes::{Note, NoteStore, NoteType};

use crate::prompt_builder::{
    DEFAULT_CROSS_DOCUMENT_INSTRUCTIONS, DEFAULT_NOTE_INSTRUCTIONS, NotePromptInputs,
    build_note_prompt, extract_cross_document_context, extract_title,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateNoteRequest {
    pub document_names: Vec<String>,
    pub instructions: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cross_document_instructions: Option<String>,
}

impl GenerateNoteRequest {
    pub fn for_documents<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteGenerationResponse {
    pub success: bool,
    pub message: String,
    pub note: Option<Note>,
    pub error: Option<String>,
}

impl NoteGenerationResponse {
    fn succeeded(note: Note) -> Self {
        Self {
            success: true,
            message: "Note generated successfully".to_string(),
            note: Some(note),
            error: None,
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            note: None,
            error: None,
        }
    }

    fn failed(err: &anyhow::Error) -> Self {
        Self {
            success: false,
            message: "Error generating note".to_string(),
            note: None,
            error: Some(err.to_string()),
        }
    }
}

/// Turns cached document summaries into persisted notes, and fronts the
/// note store for the rest of the application.
pub struct NoteGenerator {
    store: Arc<NoteStore>,
    summaries: Arc<dyn DocumentSummaries>,
    llm: Arc<dyn CompletionService>,
    target: ModelTarget,
    generator_label: String,
    default_category: String,
}

impl NoteGenerator {
    pub fn new(
        store: Arc<NoteStore>,
        summaries: Arc<dyn DocumentSummaries>,
        llm: Arc<dyn CompletionService>,
        target: ModelTarget,
    ) -> Self {
        Self {
            store,
            summaries,
            llm,
            target,
            generator_label: "Ollama AI".to_string(),
            default_category: "General".to_string(),
        }
    }

    pub fn with_labels(mut self, generator_label: impl Into<String>, default_category: impl Into<String>) -> Self {
        self.generator_label = generator_label.into();
        self.default_category = default_category.into();
        self
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    /// Generate and persist a note.  Never fails: every problem becomes a
    /// `success = false` response.
    #[instrument(skip(self, request), fields(documents = request.document_names.len(), target = %self.target))]
    pub async fn generate_note(&self, request: &GenerateNoteRequest) -> NoteGenerationResponse {
        match self.try_generate(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "note generation failed");
                NoteGenerationResponse::failed(&err)
            }
        }
    }

    /// Same flow as [`generate_note`](Self::generate_note); the note type
    /// still follows the number of documents.
    pub async fn generate_multi_document_note(&self, request: &GenerateNoteRequest) -> NoteGenerationResponse {
        self.generate_note(request).await
    }

    async fn try_generate(&self, request: &GenerateNoteRequest) -> Result<NoteGenerationResponse> {
        let names = &request.document_names;
        if names.is_empty() {
            return Ok(NoteGenerationResponse::rejected(
                "No documents specified for note generation",
            ));
        }

        let note_type = NoteType::for_document_count(names.len());

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            match self.summaries.get(name).await {
                Some(record) => summaries.push(record),
                None => info!(file_name = %name, "no cached summary; document left out of prompt"),
            }
        }
        if summaries.is_empty() {
            return Ok(NoteGenerationResponse::rejected(
                "Could not retrieve document summaries for note generation",
            ));
        }

        let instructions = request
            .instructions
            .clone()
            .unwrap_or_else(|| DEFAULT_NOTE_INSTRUCTIONS.to_string());
        let cross_instructions = request
            .cross_document_instructions
            .as_deref()
            .unwrap_or(DEFAULT_CROSS_DOCUMENT_INSTRUCTIONS);

        let prompt = build_note_prompt(&NotePromptInputs {
            document_names: names,
            note_type,
            instructions: &instructions,
            cross_document_instructions: cross_instructions,
            summaries: &summaries,
        });

        let content = self.llm.complete(&prompt, &self.target).await?;

        let mut note = Note::new(names.clone(), extract_title(&content), content.clone());
        note.note_type = note_type;
        note.category = request
            .category
            .clone()
            .unwrap_or_else(|| self.default_category.clone());
        note.tags = request.tags.clone().unwrap_or_default();
        note.generated_by = self.generator_label.clone();
        note.instructions = instructions;
        note.cross_document_context = match note_type {
            NoteType::MultiDocument => extract_cross_document_context(&content, names.len()),
            NoteType::SingleDocument => None,
        };

        let saved = self.store.save(note).await?;
        info!(note_id = %saved.id, title = %saved.title, "note generated");
        Ok(NoteGenerationResponse::succeeded(saved))
    }

    // ── store passthroughs ──────────────────────────────────────────────────

    pub async fn all_notes(&self) -> Vec<Note> {
        self.store.get_all().await
    }

    pub async fn note_by_id(&self, id: &str) -> Option<Note> {
        self.store.get_by_id(id).await
    }

    pub async fn notes_for_document(&self, file_name: &str) -> Vec<Note> {
        self.store.get_for_document(file_name).await
    }

    pub async fn notes_for_documents(&self, file_names: &[String]) -> Vec<Note> {
        self.store.get_for_documents(file_names).await
    }

    pub async fn cross_document_notes(&self, file_names: &[String]) -> Vec<Note> {
        self.store.get_cross_document(file_names).await
    }

    pub async fn delete_note(&self, id: &str) -> bool {
        self.store.delete(id).await
    }

    pub async fn delete_notes_for_document(&self, file_name: &str) -> bool {
        self.store.delete_for_document(file_name).await
    }

    pub async fn update_note(&self, id: &str, note: Note) -> bool {
        self.store.update(id, note).await
    }

    pub async fn search_notes(&self, term: &str) -> Vec<Note> {
        self.store.search(term).await
    }
}

#[cfg(test)]
mod tests {
    use docrag_llm::Provider;
    use docrag_llm::fake::ScriptedCompletion;
    use docrag_summary::{ManualScheduler, SummaryCache};
    use tempfile::TempDir;

    use super::*;

    struct Fixture {
        _dir: TempDir,
        llm: Arc<ScriptedCompletion>,
        summaries: SummaryCache,
        generator: NoteGenerator,
    }

    async fn fixture(note_reply: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(NoteStore::open(dir.path().join("notes")).await.unwrap());

        let summary_llm = Arc::new(ScriptedCompletion::replying("A cached summary."));
        let summaries = SummaryCache::with_scheduler(
            summary_llm,
            ModelTarget::new(Provider::OpenAi, "gpt-4o-mini"),
            Arc::new(ManualScheduler::new()),
        );

        let llm = Arc::new(ScriptedCompletion::replying(note_reply));
        let generator = NoteGenerator::new(
            store,
            Arc::new(summaries.clone()),
            llm.clone(),
            ModelTarget::new(Provider::Ollama, "phi4"),
        );
        Fixture {
            _dir: dir,
            llm,
            summaries,
            generator,
        }
    }

    #[tokio::test]
    async fn empty_request_is_rejected_without_llm_call() {
        let fx = fixture("unused").await;
        let response = fx.generator.generate_note(&GenerateNoteRequest::default()).await;
        assert!(!response.success);
        assert_eq!(response.message, "No documents specified for note generation");
        assert!(response.note.is_none());
        assert_eq!(fx.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn no_cached_summaries_is_rejected_without_llm_call() {
        let fx = fixture("unused").await;
        let response = fx
            .generator
            .generate_note(&GenerateNoteRequest::for_documents(["ghost.txt"]))
            .await;
        assert!(!response.success);
        assert_eq!(
            response.message,
            "Could not retrieve document summaries for note generation"
        );
        assert_eq!(fx.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn single_document_note_is_generated_and_saved() {
        let fx = fixture("# Q3 Review\n\n## Key Points\n- Strong results").await;
        fx.summaries.generate("Q3 results were strong.", "report.txt").await;

        let response = fx
            .generator
            .generate_note(&GenerateNoteRequest::for_documents(["report.txt"]))
            .await;

        assert!(response.success, "{response:?}");
        assert_eq!(response.message, "Note generated successfully");
        let note = response.note.unwrap();
        assert_eq!(note.note_type, NoteType::SingleDocument);
        assert_eq!(note.linked_documents, vec!["report.txt"]);
        assert!(note.cross_document_context.is_none());
        assert_eq!(note.title, "# Q3 Review");
        assert_eq!(note.category, "General");
        assert_eq!(note.generated_by, "Ollama AI");
        assert_eq!(note.instructions, DEFAULT_NOTE_INSTRUCTIONS);
        assert!(note.tags.is_empty());

        let stored = fx.generator.note_by_id(&note.id).await.unwrap();
        assert_eq!(stored, note);

        let prompt = &fx.llm.prompts()[0];
        assert!(prompt.contains("SINGLE DOCUMENT ANALYSIS REQUEST:"));
        assert!(prompt.contains("Summary: A cached summary."));
        assert_eq!(fx.llm.targets()[0], ModelTarget::new(Provider::Ollama, "phi4"));
    }

    #[tokio::test]
    async fn multi_document_note_extracts_cross_document_context() {
        let reply = "# Combined\n## Document Relationships\n- a feeds b\n## Action Items\n- none";
        let fx = fixture(reply).await;
        fx.summaries.generate("alpha", "a.md").await;
        fx.summaries.generate("beta", "b.md").await;

        let request = GenerateNoteRequest {
            document_names: vec!["a.md".into(), "b.md".into(), "missing.md".into()],
            category: Some("Research".into()),
            tags: Some(vec!["compare".into()]),
            cross_document_instructions: Some("Contrast them.".into()),
            ..GenerateNoteRequest::default()
        };
        let response = fx.generator.generate_multi_document_note(&request).await;

        assert!(response.success);
        let note = response.note.unwrap();
        assert_eq!(note.note_type, NoteType::MultiDocument);
        assert_eq!(note.linked_documents.len(), 3);
        assert_eq!(note.category, "Research");
        assert_eq!(note.tags, vec!["compare"]);
        assert_eq!(
            note.cross_document_context.as_deref(),
            Some("## Document Relationships\n- a feeds b")
        );

        let prompt = &fx.llm.prompts()[0];
        assert!(prompt.contains("Number of documents: 3"));
        assert!(prompt.contains("Contrast them."));
        assert!(!prompt.contains("Document: missing.md\nSummary"));
    }

    #[tokio::test]
    async fn llm_failure_becomes_failure_response() {
        let fx = fixture("unused").await;
        fx.summaries.generate("text", "doc.txt").await;
        fx.llm.push_error("model not installed");

        let response = fx
            .generator
            .generate_note(&GenerateNoteRequest::for_documents(["doc.txt"]))
            .await;
        assert!(!response.success);
        assert_eq!(response.message, "Error generating note");
        assert_eq!(response.error.as_deref(), Some("model not installed"));
        assert!(fx.generator.all_notes().await.is_empty());
    }

    #[tokio::test]
    async fn passthroughs_reach_the_store() {
        let fx = fixture("Title line\nbody").await;
        fx.summaries.generate("x", "x.txt").await;
        let note = fx
            .generator
            .generate_note(&GenerateNoteRequest::for_documents(["x.txt"]))
            .await
            .note
            .unwrap();

        assert_eq!(fx.generator.notes_for_document("x.txt").await.len(), 1);
        assert_eq!(fx.generator.notes_for_documents(&["x.txt".to_string()]).await.len(), 1);
        assert!(fx.generator.cross_document_notes(&["x.txt".to_string()]).await.is_empty());
        assert_eq!(fx.generator.search_notes("title").await.len(), 1);

        let mut edited = note.clone();
        edited.title = "Edited".into();
        assert!(fx.generator.update_note(&note.id, edited).await);
        assert_eq!(fx.generator.note_by_id(&note.id).await.unwrap().title, "Edited");

        assert!(fx.generator.delete_notes_for_document("x.txt").await);
        assert!(fx.generator.all_notes().await.is_empty());
        assert!(fx.generator.delete_note(&note.id).await);
    }
}
