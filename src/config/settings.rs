//! Configuration settings for Syllabus.

use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub generation: GenerationSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub session: SessionSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.syllabus".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Language model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API (default).
    #[default]
    Anthropic,
    /// Any OpenAI-compatible chat completions endpoint (OpenAI, DeepSeek, ...).
    OpenAI,
}

impl Provider {
    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "deepseek" => Ok(Provider::OpenAI),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Generation (chat model) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Provider to call.
    pub provider: Provider,
    /// Model identifier sent with every request.
    pub model: String,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Override for the provider's API base URL.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout_seconds: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            base_url: None,
            timeout_seconds: 300,
        }
    }
}

impl GenerationSettings {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }

        let var = self.provider.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(key),
            Ok(_) => Err(SyllabusError::Config(format!("{} is empty", var))),
            Err(_) => Err(SyllabusError::Config(format!(
                "{} not set. Set it with: export {}='...' or add generation.api_key to the config",
                var, var
            ))),
        }
    }

    /// Parse and validate the configured base URL, if any.
    pub fn base_url(&self) -> Result<Option<url::Url>> {
        match self.base_url.as_deref().filter(|u| !u.is_empty()) {
            Some(raw) => url::Url::parse(raw)
                .map(Some)
                .map_err(|e| SyllabusError::Config(format!("Invalid base_url '{}': {}", raw, e))),
            None => Ok(None),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Path to the JSON catalog snapshot of indexed courses and chunks.
    /// Defaults to `catalog.json` in the data directory.
    pub catalog_path: Option<String>,
    /// Maximum number of chunks returned by a content search.
    pub max_results: usize,
    /// Minimum title similarity for resolving a course name semantically.
    pub course_match_threshold: f32,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            max_results: 5,
            course_match_threshold: 0.3,
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Number of most recent exchanges rendered into the prompt.
    pub max_history: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_history: 2 }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SyllabusError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syllabus")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded catalog snapshot path.
    pub fn catalog_path(&self) -> PathBuf {
        match self.vector_store.catalog_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Self::expand_path(path),
            None => self.data_dir().join("catalog.json"),
        }
    }
}
