use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecollectConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub activation: ActivationConfig,
    pub search: SearchConfig,
    pub graph: GraphConfig,
    pub consolidation: ConsolidationConfig,
    pub redaction: RedactionConfig,
    pub repos: Vec<RepoEntry>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Directory that every `turn_content.content_path` is relative to.
    pub content_root: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActivationConfig {
    /// Per-hop multiplier applied from the second hop on. Must be in (0, 1).
    pub decay: f64,
    pub max_hops: usize,
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub rrf_k: usize,
    /// Candidate oversampling when every filter runs in SQL.
    pub fetch_multiplier: usize,
    /// Candidate oversampling when the client-side file filter is active.
    pub file_filter_multiplier: usize,
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    pub turn_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub batch_limit: usize,
    pub summary_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub patterns: Vec<String>,
    pub replacement: String,
}

/// A registered repository database for cross-repository search.
#[derive(Debug, Deserialize, Clone)]
pub struct RepoEntry {
    pub name: String,
    pub db_path: String,
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            activation: ActivationConfig::default(),
            search: SearchConfig::default(),
            graph: GraphConfig::default(),
            consolidation: ConsolidationConfig::default(),
            redaction: RedactionConfig::default(),
            repos: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_recollect_dir();
        Self {
            db_path: base.join("recollect.db").to_string_lossy().into_owned(),
            content_root: base.join("content").to_string_lossy().into_owned(),
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay: 0.5,
            max_hops: 2,
            limit: 20,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            fetch_multiplier: 3,
            file_filter_multiplier: 10,
            default_limit: 20,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { turn_limit: 200 }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            batch_limit: 500,
            summary_chars: 280,
        }
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            patterns: Vec::new(),
            replacement: "[FILTERED]".into(),
        }
    }
}

/// Returns `~/.recollect/`
pub fn default_recollect_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recollect")
}

/// Returns the default config file path: `~/.recollect/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recollect_dir().join("config.toml")
}

impl RecollectConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecollectConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (RECOLLECT_DB, RECOLLECT_CONTENT_ROOT, RECOLLECT_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECOLLECT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_CONTENT_ROOT") {
            self.storage.content_root = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.activation.decay > 0.0 && self.activation.decay < 1.0,
            "activation.decay must be in (0, 1), got {}",
            self.activation.decay
        );
        ensure!(self.search.rrf_k >= 1, "search.rrf_k must be at least 1");
        ensure!(
            self.search.fetch_multiplier >= 1 && self.search.file_filter_multiplier >= 1,
            "search multipliers must be at least 1"
        );
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_content_root(&self) -> PathBuf {
        expand_tilde(&self.storage.content_root)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
