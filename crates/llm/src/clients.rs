use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

/// Client for OpenAI-compatible `chat/completions` endpoints (OpenAI itself
/// and OpenRouter).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    /// Environment variable holding the bearer token.
    api_key_env: &'static str,
    /// OpenRouter wants an app referer and title on every request.
    attribution: bool,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    pub async fn chat_model(&self, model: &str, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Ollama unavailable at {}; start Ollama and ensure model '{model}' is installed",
                    self.base_url
                )
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("Ollama error ({status}): {body}");
        }

        match body.get("response").and_then(|value| value.as_str()) {
            Some(content) => Ok(content.to_string()),
            None => bail!("Ollama response missing text: {body}"),
        }
    }

    /// Stream tokens into `tx`.  Returns early, dropping the connection,
    /// once the receiving side has gone away.
    pub async fn chat_model_stream(
        &self,
        model: &str,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": true
        });

        let mut response = self.client.post(self.endpoint()).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await?;
            bail!("Ollama error ({status}): {body}");
        }

        let mut full_response = String::new();
        while let Some(chunk) = response.chunk().await? {
            let chunk_str = String::from_utf8_lossy(&chunk);
            for line in chunk_str.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(line) {
                    if let Some(content) = json.get("response").and_then(|v| v.as_str()) {
                        if content.is_empty() {
                            continue;
                        }
                        full_response.push_str(content);
                        if tx.send(content.to_string()).await.is_err() {
                            return Ok(full_response);
                        }
                    }
                }
            }
        }

        Ok(full_response)
    }
}

impl OpenAiClient {
    pub fn openai(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key_env: "OPENAI_API_KEY",
            attribution: false,
        }
    }

    pub fn openrouter() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY",
            attribution: true,
        }
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("{} is not set", self.api_key_env),
        }
    }

    fn request(&self, payload: &serde_json::Value) -> Result<reqwest::RequestBuilder> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut request = self
            .client
            .post(endpoint)
            .bearer_auth(self.api_key()?)
            .json(payload);
        if self.attribution {
            request = request
                .header("HTTP-Referer", "https://docrag.local")
                .header("X-Title", "DocRag");
        }
        Ok(request)
    }

    pub async fn chat_model(&self, model: &str, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self.request(&payload)?.send().await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("completion error ({status}): {body}");
        }

        match body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
        {
            Some(content) => Ok(content.to_string()),
            None => bail!("completion response missing content: {body}"),
        }
    }

    pub async fn chat_model_stream(
        &self,
        model: &str,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let payload = json!({
            "model": model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "stream": true
        });

        let mut response = self.request(&payload)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await?;
            bail!("completion error ({status}): {body}");
        }

        let mut full_response = String::new();
        while let Some(chunk) = response.chunk().await? {
            let chunk_str = String::from_utf8_lossy(&chunk);
            for line in chunk_str.lines() {
                let line = line.trim();
                if line.is_empty() || line == "data: [DONE]" {
                    continue;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
                    continue;
                };
                if let Some(content) = json
                    .get("choices")
                    .and_then(|choices| choices.get(0))
                    .and_then(|choice| choice.get("delta"))
                    .and_then(|delta| delta.get("content"))
                    .and_then(|content| content.as_str())
                {
                    if content.is_empty() {
                        continue;
                    }
                    full_response.push_str(content);
                    if tx.send(content.to_string()).await.is_err() {
                        return Ok(full_response);
                    }
                }
            }
        }

        Ok(full_response)
    }
}

// ── Model catalogues ──────────────────────────────────────────────────────────

const OPENROUTER_FALLBACK_MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "openai/gpt-4.1-mini",
    "anthropic/claude-3.5-sonnet",
    "google/gemini-2.0-flash-001",
    "meta-llama/llama-3.1-8b-instruct",
    "mistralai/mistral-small-3.1-24b-instruct",
    "qwen/qwen-2.5-72b-instruct",
    "deepseek/deepseek-chat",
];

/// Names of the models installed in the Ollama instance at `base_url`.
pub async fn list_ollama_models(base_url: &str) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(6))
        .build()?;
    let endpoint = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = client
        .get(endpoint)
        .send()
        .await
        .with_context(|| format!("Ollama unavailable at {base_url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("failed to read ollama models ({status})");
    }

    let body: serde_json::Value = response.json().await?;
    let mut models = body
        .get("models")
        .and_then(|models| models.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(|name| name.as_str()))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    models.sort();
    models.dedup();
    Ok(models)
}

pub async fn list_openrouter_models() -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(6))
        .build()?;
    let response = client
        .get("https://openrouter.ai/api/v1/models")
        .send()
        .await;

    let fallback = || {
        OPENROUTER_FALLBACK_MODELS
            .iter()
            .map(|model| (*model).to_string())
            .collect::<Vec<_>>()
    };

    let models = match response {
        Ok(response) if response.status().is_success() => {
            let body: serde_json::Value = response.json().await?;
            let mut items = body
                .get("data")
                .and_then(|data| data.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            items.sort();
            items.dedup();
            if items.is_empty() { fallback() } else { items }
        }
        _ => fallback(),
    };

    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 1 is reserved and closed on every CI box we run on.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

    #[tokio::test]
    async fn ollama_unreachable_is_an_error() {
        let client = OllamaClient::new(DEAD_ENDPOINT);
        let err = client.chat_model("phi4", "hello").await.unwrap_err();
        assert!(err.to_string().contains("Ollama unavailable"));
    }

    #[tokio::test]
    async fn ollama_stream_unreachable_is_an_error() {
        let client = OllamaClient::new(DEAD_ENDPOINT);
        let (tx, _rx) = mpsc::channel(1);
        assert!(client.chat_model_stream("phi4", "hello", tx).await.is_err());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }
}
