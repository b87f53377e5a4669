//! Completion capability: a single-shot `complete(prompt) -> text` call and
//! a streaming variant, routed to a backend by a servicer/model pair.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use anyhow::{Result, bail};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

mod clients;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod router;

pub use clients::{OllamaClient, OpenAiClient, list_ollama_models, list_openrouter_models};
pub use router::LlmRouter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    Ollama,
    OpenAi,
    OpenRouter,
}

impl Provider {
    /// Servicer name as used in config files and requests.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Parse a servicer name (case-insensitive).
    pub fn from_servicer(servicer: &str) -> Option<Self> {
        match servicer.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::from_servicer(s) {
            Some(provider) => Ok(provider),
            None => bail!("unknown servicer '{s}' (expected ollama, openai or openrouter)"),
        }
    }
}

/// Which backend and model a completion should run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTarget {
    pub provider: Provider,
    pub model: String,
}

impl ModelTarget {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Build a target from a servicer name such as `"openai"`.
    pub fn parse(servicer: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self::new(servicer.parse()?, model))
    }
}

impl fmt::Display for ModelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// The boundary to any LLM backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, target: &ModelTarget) -> Result<String>;

    /// Start a streamed completion.  A request that cannot be started
    /// yields an empty stream rather than an error.
    async fn complete_stream(&self, prompt: &str, target: &ModelTarget) -> CompletionStream;
}

/// Ordered text chunks from a streamed completion.
///
/// Single consumer.  Dropping the stream before it is drained tells the
/// producer to stop and releases the underlying connection.
#[derive(Debug)]
pub struct CompletionStream {
    rx: mpsc::Receiver<String>,
}

impl CompletionStream {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { rx }
    }

    pub async fn next_chunk(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.rx.recv().await {
            text.push_str(&chunk);
        }
        text
    }
}

impl Stream for CompletionStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
