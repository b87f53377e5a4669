use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── LLM backends ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Default servicer for chat requests that don't name one.
    pub provider: String,
    pub ollama_model: String,
    pub openai_model: String,
    pub openrouter_model: String,
    /// Base URL for the Ollama API.  Overridden at load time by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
    /// Base URL for the OpenAI-compatible API.  Overridden by
    /// `OPENAI_BASE_URL`.
    pub openai_base_url: String,
    /// Upper bound for a single completion request.  `0` disables the
    /// timeout.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "phi4".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 120,
        }
    }
}

// ── Summary cache ─────────────────────────────────────────────────────────────

/// The fixed servicer/model pair used for every document summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub servicer: String,
    pub model: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            servicer: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

// ── Note store / generation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Directory holding `{id}.json` note files and `notes_index.json`.
    /// Relative paths resolve against the working directory.
    pub directory: String,
    pub servicer: String,
    pub model: String,
    /// Recorded on every generated note as `generatedBy`.
    pub generator_label: String,
    pub default_category: String,
    /// Rebuild missing index entries from note files when the store opens.
    pub reconcile_on_startup: bool,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            directory: "Data/Notes".to_string(),
            servicer: "ollama".to_string(),
            model: "phi4".to_string(),
            generator_label: "Ollama AI".to_string(),
            default_category: "General".to_string(),
            reconcile_on_startup: true,
        }
    }
}

// ── File ingestion ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub default_source_path: String,
    /// Empty means "a fresh directory under the system temp dir".
    pub default_destination_path: String,
    /// Uploads above this size are rejected; larger files found while
    /// copying a directory are skipped.
    pub max_file_size_bytes: u64,
    /// Extensions (with leading dot, case-insensitive) that get a
    /// background summary on ingest.
    pub summary_extensions: Vec<String>,
    pub create_destination_if_not_exists: bool,
    pub overwrite_existing_files: bool,
    /// Upper bound for a whole directory ingestion.  `0` disables it.
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_source_path: String::new(),
            default_destination_path: String::new(),
            max_file_size_bytes: 52_428_800,
            summary_extensions: [".txt", ".md", ".doc", ".docx", ".pdf"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            create_destination_if_not_exists: true,
            overwrite_existing_files: true,
            timeout_secs: 0,
        }
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Per-document content preview cap in contextual chat prompts.
    pub max_context_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub summary: SummaryConfig,
    pub notes: NotesConfig,
    pub ingest: IngestConfig,
    pub chat: ChatConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("OLLAMA_BASE_URL") {
            if !value.is_empty() {
                config.llm.ollama_base_url = value;
            }
        }

        if let Ok(value) = env::var("OPENAI_BASE_URL") {
            if !value.is_empty() {
                config.llm.openai_base_url = value;
            }
        }

        if let Ok(dir) = env::var("DOCRAG_NOTES_DIR") {
            if !dir.is_empty() {
                config.notes.directory = dir;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Model configured for `servicer`, falling back to the Ollama model for
    /// unrecognised names.
    pub fn model_for(&self, servicer: &str) -> &str {
        match servicer.trim().to_ascii_lowercase().as_str() {
            "openai" => &self.llm.openai_model,
            "openrouter" => &self.llm.openrouter_model,
            _ => &self.llm.ollama_model,
        }
    }

    pub fn active_model(&self) -> &str {
        self.model_for(&self.llm.provider)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
