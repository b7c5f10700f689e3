use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const CONFIG_DIR: &str = ".promptpack";
const DEFAULT_SCORING_TARGET: &str = "gpt-4o-mini@chatgpt";
const DEFAULT_SCORING_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_SCORING_MAX_TOKENS: u32 = 600;

/// A parsed target: model@backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub model: String,
    pub backend: String,
}

impl Target {
    /// Parse a target string like "gpt-4o-mini@chatgpt" into model and backend
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.rsplitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Target {
                model: parts[1].to_string(),
                backend: parts[0].to_string(),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.model, self.backend)
    }
}

/// Configuration for a single backend (OpenAI-compatible API provider)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

impl BackendConfig {
    /// Resolve the API key from config or environment.
    /// Backends without auth (Ollama) still get a placeholder, since the
    /// header is required even when its value is ignored.
    pub fn resolve_api_key(&self) -> SecretString {
        if let Some(key) = &self.api_key {
            return key.clone();
        }

        if let Some(env_var) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return SecretString::from(key);
            }
        }

        SecretString::from("ollama")
    }
}

/// LLM-backed quality scoring. Unset fields fall back to defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub llm_enabled: Option<bool>,
    /// `model@backend`
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ScoringConfig {
    pub fn llm_enabled(&self) -> bool {
        self.llm_enabled.unwrap_or(false)
    }

    pub fn target(&self) -> Option<Target> {
        Target::parse(self.target.as_deref().unwrap_or(DEFAULT_SCORING_TARGET))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_SCORING_TIMEOUT_MS))
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_SCORING_MAX_TOKENS)
    }

    fn merge(&mut self, other: ScoringConfig) {
        if other.llm_enabled.is_some() {
            self.llm_enabled = other.llm_enabled;
        }
        if other.target.is_some() {
            self.target = other.target;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
    }
}

/// Conversion behavior
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConversionConfig {
    /// Re-parse same-dialect output and report differences (default on)
    #[serde(default)]
    pub validate_round_trip: Option<bool>,
}

impl ConversionConfig {
    pub fn validate_round_trip(&self) -> bool {
        self.validate_round_trip.unwrap_or(true)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

impl Config {
    /// Create config with built-in default backends for all known providers
    pub fn with_builtin_backends() -> Self {
        let mut backends = HashMap::new();

        backends.insert(
            "chatgpt".to_string(),
            BackendConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                api_key: None,
            },
        );

        // Anthropic's OpenAI-compatible endpoint
        backends.insert(
            "claude".to_string(),
            BackendConfig {
                base_url: "https://api.anthropic.com/v1".to_string(),
                api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "venice".to_string(),
            BackendConfig {
                base_url: "https://api.venice.ai/api/v1".to_string(),
                api_key_env: Some("VENICE_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "ollama".to_string(),
            BackendConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                api_key: None,
            },
        );

        Config {
            backends,
            ..Config::default()
        }
    }

    /// Load configuration from default paths
    /// Priority: local (.promptpack/config.local.toml) > project (.promptpack/config.toml) > user (~/.promptpack/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_layered(dirs::home_dir().as_deref(), Path::new("."))
    }

    /// Load from an explicit home directory and project root
    pub fn load_layered(home: Option<&Path>, project: &Path) -> Result<Self> {
        let mut config = Self::with_builtin_backends();

        let mut layers = Vec::new();
        if let Some(home) = home {
            layers.push(home.join(CONFIG_DIR).join("config.toml"));
        }
        layers.push(project.join(CONFIG_DIR).join("config.toml"));
        // Should be gitignored
        layers.push(project.join(CONFIG_DIR).join("config.local.toml"));

        for path in layers {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config layer");
                config.merge(Self::load_from(&path)?);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Config) {
        for (name, backend) in other.backends {
            self.backends.insert(name, backend);
        }
        self.scoring.merge(other.scoring);
        if other.conversion.validate_round_trip.is_some() {
            self.conversion.validate_round_trip = other.conversion.validate_round_trip;
        }
    }

    /// Backend the scoring target points at
    pub fn scoring_backend(&self) -> Option<(Target, &BackendConfig)> {
        let target = self.scoring.target()?;
        let backend = self.backends.get(&target.backend)?;
        Some((target, backend))
    }
}
