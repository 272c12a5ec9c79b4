//! Configuration loading, validation, and management for autoloop.
//!
//! Loads configuration from `~/.autoloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which backend family drives the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API, native content blocks
    Anthropic,
    /// OpenAI chat completions
    OpenAi,
    /// Venice chat completions (OpenAI-style, no function calling)
    Venice,
    /// Any OpenAI-compatible endpoint; requires `api_url`
    Custom,
}

impl ProviderKind {
    /// The model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Venice => "most_intelligent",
            ProviderKind::Custom => "default",
        }
    }

    /// Provider-specific env var consulted for an API key.
    fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Venice => Some("VENICE_API_KEY"),
            ProviderKind::Custom => None,
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "venice" => Ok(ProviderKind::Venice),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected anthropic, openai, venice, or custom)"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Venice => "venice",
            ProviderKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// The root configuration structure.
///
/// Maps directly to `~/.autoloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the active provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Active provider
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model name; falls back to the provider's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override for the provider endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Appended to the built-in system prompt
    #[serde(default)]
    pub system_prompt_suffix: String,

    /// How many tool-result images to keep in history; unset keeps all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_to_keep: Option<usize>,

    /// Images are removed in multiples of this many
    #[serde(default = "default_min_removal_chunk")]
    pub min_removal_chunk: usize,

    /// Maximum tokens per model reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Optional cap on rounds per run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    /// Run one round's tool calls concurrently
    #[serde(default)]
    pub parallel_tools: bool,

    /// Force function calling on or off for chat-completion providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calling: Option<bool>,

    /// Adapter-level retry for transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Shell tool settings
    #[serde(default)]
    pub bash: BashConfig,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}
fn default_min_removal_chunk() -> usize {
    10
}
fn default_max_output_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("system_prompt_suffix", &self.system_prompt_suffix)
            .field("images_to_keep", &self.images_to_keep)
            .field("min_removal_chunk", &self.min_removal_chunk)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_rounds", &self.max_rounds)
            .field("parallel_tools", &self.parallel_tools)
            .field("function_calling", &self.function_calling)
            .field("retry", &self.retry)
            .field("bash", &self.bash)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request; 1 disables retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each further attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BashConfig {
    /// Per-command timeout
    #[serde(default = "default_bash_timeout_secs")]
    pub timeout_secs: u64,

    /// Working directory for commands; inherits the process cwd when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_bash_timeout_secs() -> u64 {
    120
}

impl Default for BashConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_bash_timeout_secs(),
            working_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.autoloop/config.toml).
    ///
    /// Environment variables override the file:
    /// - `AUTOLOOP_PROVIDER`, `AUTOLOOP_MODEL`, `AUTOLOOP_API_URL`
    /// - `AUTOLOOP_API_KEY` (highest priority), then the provider's own key
    ///   variable (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `VENICE_API_KEY`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, so tests need not touch
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("AUTOLOOP_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(model) = lookup("AUTOLOOP_MODEL") {
            self.model = Some(model);
        }
        if let Some(url) = lookup("AUTOLOOP_API_URL") {
            self.api_url = Some(url);
        }

        if let Some(key) = lookup("AUTOLOOP_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = self.provider.api_key_env().and_then(&lookup);
        }

        Ok(())
    }

    /// Switch the active provider.
    ///
    /// The key becomes `AUTOLOOP_API_KEY` if set, else the new provider's own
    /// key variable, else nothing. A key meant for one backend is never
    /// carried over to another.
    pub fn set_provider<F>(&mut self, provider: ProviderKind, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if provider == self.provider {
            return;
        }
        self.provider = provider;
        self.api_key = lookup("AUTOLOOP_API_KEY")
            .or_else(|| provider.api_key_env().and_then(|var| lookup(var)));
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".autoloop")
    }

    /// The model to request, resolving the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_output_tokens must be greater than 0".into(),
            ));
        }

        if self.min_removal_chunk == 0 {
            return Err(ConfigError::ValidationError(
                "min_removal_chunk must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.provider == ProviderKind::Custom && self.api_url.is_none() {
            return Err(ConfigError::ValidationError(
                "provider 'custom' requires api_url".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: None,
            api_url: None,
            system_prompt_suffix: String::new(),
            images_to_keep: None,
            min_removal_chunk: default_min_removal_chunk(),
            max_output_tokens: default_max_output_tokens(),
            max_rounds: None,
            parallel_tools: false,
            function_calling: None,
            retry: RetryConfig::default(),
            bash: BashConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.images_to_keep, None);
        assert_eq!(config.min_removal_chunk, 10);
        assert_eq!(config.max_output_tokens, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.images_to_keep, config.images_to_keep);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let config = AppConfig {
            max_output_tokens: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn custom_provider_requires_url() {
        let config = AppConfig {
            provider: ProviderKind::Custom,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
    }

    #[test]
    fn parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
provider = "venice"
system_prompt_suffix = "Prefer the terminal."
max_output_tokens = 2048
images_to_keep = 3

[retry]
max_attempts = 3
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider, ProviderKind::Venice);
        assert_eq!(config.model(), "most_intelligent");
        assert_eq!(config.system_prompt_suffix, "Prefer the terminal.");
        assert_eq!(config.max_output_tokens, 2048);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.images_to_keep, Some(3));
    }

    #[test]
    fn images_to_keep_roundtrips() {
        let config = AppConfig {
            images_to_keep: Some(5),
            ..AppConfig::default()
        };
        let parsed: AppConfig = toml::from_str(&toml::to_string(&config).unwrap()).unwrap();
        assert_eq!(parsed.images_to_keep, Some(5));

        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.images_to_keep, None);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_provider_and_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("AUTOLOOP_PROVIDER", "openai"),
                ("OPENAI_API_KEY", "sk-test"),
                ("ANTHROPIC_API_KEY", "sk-ant-ignored"),
            ]))
            .unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model(), "gpt-4o");
    }

    #[test]
    fn generic_key_wins() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config
            .apply_env(env(&[("AUTOLOOP_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("AUTOLOOP_PROVIDER", "bedrock")]))
            .unwrap_err();
        assert!(err.to_string().contains("bedrock"));
    }

    #[test]
    fn debug_redacts_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let out = format!("{config:?}");
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("anthropic"));
        assert!(toml_str.contains("max_output_tokens"));
    }

    #[test]
    fn switching_provider_picks_its_key() {
        let mut config = AppConfig {
            api_key: Some("sk-ant".into()),
            ..AppConfig::default()
        };
        config.set_provider(ProviderKind::Venice, env(&[("VENICE_API_KEY", "vk-1")]));
        assert_eq!(config.provider, ProviderKind::Venice);
        assert_eq!(config.api_key.as_deref(), Some("vk-1"));

        config.set_provider(
            ProviderKind::OpenAi,
            env(&[("AUTOLOOP_API_KEY", "shared"), ("OPENAI_API_KEY", "sk-oa")]),
        );
        assert_eq!(config.api_key.as_deref(), Some("shared"));
    }

    #[test]
    fn switching_provider_never_carries_old_key() {
        let mut config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        config.set_provider(ProviderKind::Venice, |_| None);
        assert_eq!(config.provider, ProviderKind::Venice);
        assert_eq!(config.api_key, None);
        assert!(!config.has_api_key());
    }

    #[test]
    fn same_provider_keeps_file_key() {
        let mut config = AppConfig {
            api_key: Some("sk-ant-file".into()),
            ..AppConfig::default()
        };
        config.set_provider(ProviderKind::Anthropic, |_| None);
        assert_eq!(config.api_key.as_deref(), Some("sk-ant-file"));
    }
}
