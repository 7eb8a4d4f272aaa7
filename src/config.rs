//! Builder configuration.
//!
//! Handles loading, validating, and merging the `plc.toml` settings file.
//! Stock defaults are the base layer; the user's file only needs the keys it
//! wants to override. The two data documents (languages, concepts) are not
//! configured here, see [`crate::catalog`].
//!
//! ## Config File Location
//!
//! `plc.toml` lives in the project root (`--root`, default `.`). Relative
//! paths inside it are resolved against that root.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! languages = "data/prog_langs.yaml"
//! concepts = "data/prog_lang_concepts.yaml"
//! cache_dir = ".cache"
//! content_dir = "docs/content-autogen"
//! site_dir = "docs"
//!
//! [generation]
//! model = "gpt-3.5-turbo"
//! system_prompt = "You are an eager teacher."
//! max_tokens = 2000
//! choices = 1
//! api_base = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 120
//!
//! [retry]
//! max_attempts = 6
//! base_delay_ms = 1000
//! max_delay_ms = 60000
//! jitter = true
//!
//! [processing]
//! workers = 4
//! auth_abort_after = 3
//!
//! [site]
//! base_url = "https://prog-lang-compare.netlify.app"
//! title = "Prog Lang Compare"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the settings file inside the project root.
pub const CONFIG_FILENAME: &str = "plc.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Builder settings loaded from `plc.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Request shape for the text-generation service.
    pub generation: GenerationConfig,
    /// Backoff policy around each generation call.
    pub retry: RetryConfig,
    /// Worker pool settings.
    pub processing: ProcessingConfig,
    /// Rendered site settings.
    pub site: SiteConfig,
}

impl BuilderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "generation.model must not be empty".into(),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "generation.max_tokens must be at least 1".into(),
            ));
        }
        if self.generation.choices == 0 {
            return Err(ConfigError::Validation(
                "generation.choices must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Validation(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::Validation(
                "processing.workers must be at least 1".into(),
            ));
        }
        if self.processing.auth_abort_after == 0 {
            return Err(ConfigError::Validation(
                "processing.auth_abort_after must be at least 1".into(),
            ));
        }
        if self.site.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.base_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Input and output locations, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// YAML list of language display names.
    pub languages: PathBuf,
    /// YAML mapping of category → concept → prompt template.
    pub concepts: PathBuf,
    /// One completion record per language.
    pub cache_dir: PathBuf,
    /// Parent of the per-model content directory.
    pub content_dir: PathBuf,
    /// Rendered site root.
    pub site_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            languages: PathBuf::from("data/prog_langs.yaml"),
            concepts: PathBuf::from("data/prog_lang_concepts.yaml"),
            cache_dir: PathBuf::from(".cache"),
            content_dir: PathBuf::from("docs/content-autogen"),
            site_dir: PathBuf::from("docs"),
        }
    }
}

impl PathsConfig {
    /// Resolve every relative path against `root`. Absolute paths are kept.
    pub fn resolve(&self, root: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        Self {
            languages: join(&self.languages),
            concepts: join(&self.concepts),
            cache_dir: join(&self.cache_dir),
            content_dir: join(&self.content_dir),
            site_dir: join(&self.site_dir),
        }
    }
}

/// Request shape for the text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Model identifier. Also names the content subdirectory.
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Number of choices requested. Only the first is kept.
    pub choices: u32,
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: "You are an eager teacher.".to_string(),
            max_tokens: 2000,
            choices: 1,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Exponential backoff around each generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per item, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Randomize delays so parallel workers don't retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter: true,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Concurrent generation calls. Used as-is, not clamped to CPU count:
    /// the workers spend their time waiting on the network.
    pub workers: usize,
    /// Authentication failures tolerated in one run before every remaining
    /// item is skipped without calling the service.
    pub auth_abort_after: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            auth_abort_after: 3,
        }
    }
}

/// Rendered site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute URL the site is published under, without trailing slash.
    pub base_url: String,
    pub title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://prog-lang-compare.netlify.app".to_string(),
            title: "Prog Lang Compare".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuilderConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `plc.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuilderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuilderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `plc.toml` from the project root on top of stock defaults.
pub fn load_config(root: &Path) -> Result<BuilderConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Load a settings file at an explicit path on top of stock defaults.
///
/// Unlike [`load_config`], a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<BuilderConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `plc.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Prog Lang Compare builder configuration
# =======================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
# Relative paths are resolved against the directory holding this file.

# ---------------------------------------------------------------------------
# Paths
# ---------------------------------------------------------------------------
[paths]
# List of language display names ("Programming Languages: [...]").
languages = "data/prog_langs.yaml"
# Category -> concept -> prompt template. "{lang}" is replaced by the language.
concepts = "data/prog_lang_concepts.yaml"
# Per-language record of generated concepts.
cache_dir = ".cache"
# Generated content; one subdirectory per model.
content_dir = "docs/content-autogen"
# Rendered HTML and sitemap.
site_dir = "docs"

# ---------------------------------------------------------------------------
# Text generation
# ---------------------------------------------------------------------------
[generation]
model = "gpt-3.5-turbo"
system_prompt = "You are an eager teacher."
max_tokens = 2000
# Choices requested per call; the first one is kept.
choices = 1
# Any OpenAI-compatible endpoint.
api_base = "https://api.openai.com/v1"
# Environment variable holding the API key.
api_key_env = "OPENAI_API_KEY"
timeout_secs = 120

# ---------------------------------------------------------------------------
# Retry (rate limits, timeouts, server errors)
# ---------------------------------------------------------------------------
[retry]
# Total attempts per concept, including the first.
max_attempts = 6
base_delay_ms = 1000
max_delay_ms = 60000
jitter = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Concurrent generation calls.
workers = 4
# Stop calling the service after this many authentication failures.
auth_abort_after = 3

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
base_url = "https://prog-lang-compare.netlify.app"
title = "Prog Lang Compare"
"##
}
