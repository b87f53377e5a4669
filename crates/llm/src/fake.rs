//! In-process completion backend with scripted replies, for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{CompletionService, CompletionStream, ModelTarget};

#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    /// Consumed front to back before `fallback` is used.
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<Result<String, String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    targets: Mutex<Vec<ModelTarget>>,
}

impl ScriptedCompletion {
    /// Every call returns `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(Ok(text.into())),
            ..Self::default()
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Some(Err(message.into())),
            ..Self::default()
        }
    }

    /// Sleep this long inside every call, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.lock_script().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.lock_script().push_back(Err(message.into()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn targets(&self) -> Vec<ModelTarget> {
        self.targets.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn next_reply(&self, prompt: &str, target: &ModelTarget) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Ok(mut targets) = self.targets.lock() {
            targets.push(target.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.lock_script().pop_front();
        scripted
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Err("no scripted reply".to_string()))
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str, target: &ModelTarget) -> Result<String> {
        self.next_reply(prompt, target).await.map_err(|msg| anyhow!(msg))
    }

    async fn complete_stream(&self, prompt: &str, target: &ModelTarget) -> CompletionStream {
        let Ok(text) = self.next_reply(prompt, target).await else {
            return CompletionStream::empty();
        };
        let chunks: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            let _ = tx.try_send(chunk);
        }
        CompletionStream::new(rx)
    }
}
