use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use docrag_config::LlmConfig;

use crate::clients::{OllamaClient, OpenAiClient};
use crate::{CompletionService, CompletionStream, ModelTarget, Provider};

/// Chunks buffered between the HTTP reader and the stream consumer.
const STREAM_BUFFER: usize = 64;

/// Dispatches completions to the backend named by a [`ModelTarget`].
#[derive(Debug, Clone)]
pub struct LlmRouter {
    ollama: OllamaClient,
    openai: OpenAiClient,
    openrouter: OpenAiClient,
    timeout: Option<Duration>,
}

impl LlmRouter {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            ollama: OllamaClient::new(&config.ollama_base_url),
            openai: OpenAiClient::openai(&config.openai_base_url),
            openrouter: OpenAiClient::openrouter(),
            timeout: match config.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    async fn dispatch(&self, prompt: &str, target: &ModelTarget) -> Result<String> {
        match target.provider {
            Provider::Ollama => self.ollama.chat_model(&target.model, prompt).await,
            Provider::OpenAi => self.openai.chat_model(&target.model, prompt).await,
            Provider::OpenRouter => self.openrouter.chat_model(&target.model, prompt).await,
        }
    }

    async fn dispatch_stream(
        &self,
        prompt: &str,
        target: &ModelTarget,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        match target.provider {
            Provider::Ollama => self.ollama.chat_model_stream(&target.model, prompt, tx).await,
            Provider::OpenAi => self.openai.chat_model_stream(&target.model, prompt, tx).await,
            Provider::OpenRouter => {
                self.openrouter
                    .chat_model_stream(&target.model, prompt, tx)
                    .await
            }
        }
    }
}

#[async_trait]
impl CompletionService for LlmRouter {
    async fn complete(&self, prompt: &str, target: &ModelTarget) -> Result<String> {
        debug!(%target, prompt_len = prompt.len(), "completion requested");
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(prompt, target)).await {
                Ok(result) => result,
                Err(_) => bail!("completion on {target} timed out after {}s", limit.as_secs()),
            },
            None => self.dispatch(prompt, target).await,
        }
    }

    async fn complete_stream(&self, prompt: &str, target: &ModelTarget) -> CompletionStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let router = self.clone();
        let prompt = prompt.to_string();
        let target = target.clone();

        tokio::spawn(async move {
            let run = router.dispatch_stream(&prompt, &target, tx);
            let result = match router.timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("stream timed out after {}s", limit.as_secs())),
                },
                None => run.await,
            };
            match result {
                Ok(text) => debug!(%target, chars = text.len(), "stream finished"),
                Err(err) => warn!(%target, error = %err, "streaming completion failed"),
            }
        });

        CompletionStream::new(rx)
    }
}
