//! Configuration file parser for ~/.config/rss-digest/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though a warning is logged for each so
//! typos are noticed. `RSS_DIGEST_API_BASE` and `RSS_DIGEST_API_TOKEN` take
//! precedence over the file.
use crate::controller::SyncOptions;
use crate::gateway::DEFAULT_TIMEOUT;
use crate::sync::{SourceDraft, DEFAULT_CATEGORY};
use crate::util::{validate_api_base, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_API_BASE: &str = "RSS_DIGEST_API_BASE";
pub const ENV_API_TOKEN: &str = "RSS_DIGEST_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid api_base: {0}")]
    ApiBase(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One entry of the `seed_sources` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedSource {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl SeedSource {
    fn new(url: &str, title: &str, category: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            category: Some(category.to_string()),
        }
    }
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The Debug impl masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the digest backend.
    pub api_base: String,

    /// Per-request timeout in seconds. 0 falls back to the default.
    pub request_timeout_secs: u64,

    /// Category given to new subscriptions that name none.
    pub default_category: String,

    /// Bearer token for the backend, if it wants one.
    pub api_token: Option<String>,

    /// Drop digest responses superseded by a newer load.
    pub discard_stale_digests: bool,

    /// Subscriptions created by `seed`.
    pub seed_sources: Vec<SeedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            default_category: DEFAULT_CATEGORY.to_string(),
            api_token: None,
            discard_stale_digests: false,
            seed_sources: vec![
                SeedSource::new("https://hnrss.org/frontpage", "Hacker News", "科技"),
                SeedSource::new(
                    "https://rss.nytimes.com/services/xml/rss/nyt/Technology.xml",
                    "NYTimes Tech",
                    "全球",
                ),
            ],
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_category", &self.default_category)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("discard_stale_digests", &self.discard_stale_digests)
            .field("seed_sources", &self.seed_sources)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "api_base",
        "request_timeout_secs",
        "default_category",
        "api_token",
        "discard_stale_digests",
        "seed_sources",
    ];

    /// `~/.config/rss-digest/config.toml`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("rss-digest")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(path = %path.display(), api_base = %config.api_base, "Loaded configuration");
        Ok(config)
    }

    /// Parse TOML text. Blank text yields defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Apply `RSS_DIGEST_*` environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base) = lookup(ENV_API_BASE) {
            tracing::debug!(api_base = %base, "api_base taken from environment");
            self.api_base = base;
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Ok(validate_api_base(&self.api_base)?)
    }

    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    pub fn api_token(&self) -> Option<SecretString> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()))
    }

    /// `category`, or the configured default when blank.
    pub fn category_or_default(&self, category: Option<&str>) -> String {
        match category.map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => self.default_category.clone(),
        }
    }

    /// Seed drafts. Entries missing a URL or title are skipped with a warning.
    pub fn seed_drafts(&self) -> Vec<SourceDraft> {
        self.seed_sources
            .iter()
            .filter_map(|seed| match SourceDraft::new(&seed.url, &seed.title) {
                Ok(draft) => {
                    Some(draft.with_category(self.category_or_default(seed.category.as_deref())))
                }
                Err(e) => {
                    tracing::warn!(url = %seed.url, error = %e, "Skipping invalid seed source");
                    None
                }
            })
            .collect()
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            discard_stale_digests: self.discard_stale_digests,
            seeds: self.seed_drafts(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
