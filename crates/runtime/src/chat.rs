use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{error, instrument, warn};

use docrag_ingest::WorkspaceManager;
use docrag_llm::{CompletionService, CompletionStream, ModelTarget};

use crate::prompt_builder::{ChatDocument, build_document_context_prompt};

/// Free-form chat against the completion capability, optionally grounded in
/// workspace documents.
pub struct ChatService {
    llm: Arc<dyn CompletionService>,
    max_context_chars: usize,
}

impl ChatService {
    pub fn new(llm: Arc<dyn CompletionService>, max_context_chars: usize) -> Self {
        Self {
            llm,
            max_context_chars,
        }
    }

    /// Single-shot reply.  Upstream errors are logged and returned.
    #[instrument(skip(self, prompt, target), fields(target = %target, prompt_len = prompt.len()))]
    pub async fn chat(&self, prompt: &str, target: &ModelTarget) -> Result<String> {
        if prompt.trim().is_empty() {
            bail!("Prompt cannot be empty");
        }
        match self.llm.complete(prompt, target).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                error!(error = %err, "chat completion failed");
                Err(err)
            }
        }
    }

    /// Streamed reply.  A stream that cannot start is empty.
    pub async fn chat_stream(&self, prompt: &str, target: &ModelTarget) -> Result<CompletionStream> {
        if prompt.trim().is_empty() {
            bail!("Prompt cannot be empty");
        }
        Ok(self.llm.complete_stream(prompt, target).await)
    }

    /// Describe `file_names` from the active workspace around `question`.
    /// Unknown names are skipped; unreadable files are noted in the prompt.
    pub async fn build_document_context_prompt(
        &self,
        workspace: &WorkspaceManager,
        file_names: &[String],
        question: &str,
    ) -> String {
        let mut documents = Vec::with_capacity(file_names.len());
        for name in file_names {
            let record = match workspace.get_file(name).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(file_name = %name, "chat context document not in workspace");
                    continue;
                }
                Err(err) => {
                    warn!(file_name = %name, error = %err, "chat context unavailable");
                    continue;
                }
            };
            let content = match workspace.get_file_content(name).await {
                Ok(content) => Some(content),
                Err(err) => {
                    warn!(file_name = %name, error = %err, "could not load content for chat context");
                    None
                }
            };
            documents.push(ChatDocument { record, content });
        }
        build_document_context_prompt(&documents, question, self.max_context_chars)
    }

    pub async fn chat_about_documents(
        &self,
        workspace: &WorkspaceManager,
        file_names: &[String],
        question: &str,
        target: &ModelTarget,
    ) -> Result<String> {
        if question.trim().is_empty() {
            bail!("Prompt cannot be empty");
        }
        let prompt = self
            .build_document_context_prompt(workspace, file_names, question)
            .await;
        self.chat(&prompt, target).await
    }
}

#[cfg(test)]
mod tests {
    use docrag_config::IngestConfig;
    use docrag_llm::Provider;
    use docrag_llm::fake::ScriptedCompletion;
    use docrag_summary::{ManualScheduler, SummaryCache};
    use tempfile::TempDir;

    use super::*;

    fn target() -> ModelTarget {
        ModelTarget::new(Provider::Ollama, "phi4")
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_llm() {
        let llm = Arc::new(ScriptedCompletion::replying("hi"));
        let chat = ChatService::new(llm.clone(), 2000);
        assert!(chat.chat("   ", &target()).await.is_err());
        assert!(chat.chat_stream("", &target()).await.is_err());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn chat_passes_through_and_rethrows() {
        let llm = Arc::new(ScriptedCompletion::replying("hello there"));
        llm.push_error("provider down");
        let chat = ChatService::new(llm.clone(), 2000);

        let err = chat.chat("hi", &target()).await.unwrap_err();
        assert_eq!(err.to_string(), "provider down");
        assert_eq!(chat.chat("hi", &target()).await.unwrap(), "hello there");
    }

    #[tokio::test]
    async fn stream_yields_chunks_and_failure_is_empty() {
        let llm = Arc::new(ScriptedCompletion::replying("one two"));
        let chat = ChatService::new(llm.clone(), 2000);
        let text = chat.chat_stream("hi", &target()).await.unwrap().collect_text().await;
        assert_eq!(text, "one two");

        llm.push_error("cannot start");
        let text = chat.chat_stream("hi", &target()).await.unwrap().collect_text().await;
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn document_context_uses_workspace_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("plan.md"), "abcdefghij").unwrap();
        let summaries = SummaryCache::with_scheduler(
            Arc::new(ScriptedCompletion::replying("summary")),
            target(),
            Arc::new(ManualScheduler::new()),
        );
        let workspace = WorkspaceManager::new(Arc::new(summaries), IngestConfig::default());
        workspace
            .initialize(src.path(), Some(dst.path().to_path_buf()))
            .await
            .unwrap();

        let llm = Arc::new(ScriptedCompletion::replying("answer"));
        let chat = ChatService::new(llm.clone(), 4);
        let names = vec!["plan.md".to_string(), "ghost.md".to_string()];
        let reply = chat
            .chat_about_documents(&workspace, &names, "What is planned?", &target())
            .await
            .unwrap();
        assert_eq!(reply, "answer");

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Document: plan.md\n"));
        assert!(prompt.contains("Content preview: abcd...\n"));
        assert!(!prompt.contains("ghost.md"));
        assert!(prompt.contains("User Question: What is planned?"));
    }
}
