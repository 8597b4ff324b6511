use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrainConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub notes: NotesConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    /// Root directory of the markdown note corpus.
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    /// Parallel embed requests during corpus generation. Clamped to [1, 16].
    pub concurrency: usize,
    /// Per-batch request timeout in milliseconds. Clamped to [1_000, 600_000].
    pub timeout_ms: u64,
    pub chunk_target_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub default_threshold: f64,
    pub full_content_char_limit: usize,
    pub content_cache_capacity: usize,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            notes: NotesConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 7444,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_brain_dir()
            .join("index.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        let root = default_brain_dir()
            .join("notes")
            .to_string_lossy()
            .into_owned();
        Self { root }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "nomic-embed-text".into(),
            dimensions: 768,
            concurrency: 4,
            timeout_ms: 60_000,
            chunk_target_size: 2000,
            chunk_overlap: 200,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_threshold: 0.7,
            full_content_char_limit: 5000,
            content_cache_capacity: 128,
        }
    }
}

/// Returns `~/.brain/`
pub fn default_brain_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".brain")
}

/// Returns the default config file path: `~/.brain/config.toml`
pub fn default_config_path() -> PathBuf {
    default_brain_dir().join("config.toml")
}

impl BrainConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BrainConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (BRAIN_DB, BRAIN_NOTES_DIR,
    /// BRAIN_LOG_LEVEL, BRAIN_EMBEDDING_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BRAIN_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("BRAIN_NOTES_DIR") {
            self.notes.root = val;
        }
        if let Ok(val) = std::env::var("BRAIN_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("BRAIN_EMBEDDING_URL") {
            self.embedding.base_url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the notes root, expanding `~` if needed.
    pub fn resolved_notes_root(&self) -> PathBuf {
        expand_tilde(&self.notes.root)
    }
}

impl EmbeddingConfig {
    /// Concurrency cap for corpus generation, clamped to [1, 16].
    ///
    /// The default of 4 mirrors the embedding backend's typical number of
    /// parallel inference slots; exceeding it produces 500s and queue blow-up.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, 16)
    }

    /// Per-batch request timeout, clamped to [1s, 600s].
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(1_000, 600_000))
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BrainConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.search.default_limit, 10);
        assert!(config.storage.db_path.ends_with("index.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[embedding]
model = "all-minilm"
dimensions = 384
concurrency = 2

[search]
default_limit = 5
"#;
        let config: BrainConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.embedding.model, "all-minilm");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.search.default_limit, 5);
        // defaults still apply for unset fields
        assert_eq!(config.search.default_threshold, 0.7);
        assert_eq!(config.embedding.chunk_target_size, 2000);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = BrainConfig::default();
        std::env::set_var("BRAIN_DB", "/tmp/override.db");
        std::env::set_var("BRAIN_NOTES_DIR", "/tmp/notes");
        std::env::set_var("BRAIN_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.notes.root, "/tmp/notes");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("BRAIN_DB");
        std::env::remove_var("BRAIN_NOTES_DIR");
        std::env::remove_var("BRAIN_LOG_LEVEL");
    }

    #[test]
    fn concurrency_and_timeout_are_clamped() {
        let mut config = EmbeddingConfig::default();
        config.concurrency = 0;
        assert_eq!(config.effective_concurrency(), 1);
        config.concurrency = 64;
        assert_eq!(config.effective_concurrency(), 16);

        config.timeout_ms = 10;
        assert_eq!(config.effective_timeout(), Duration::from_secs(1));
        config.timeout_ms = 3_600_000;
        assert_eq!(config.effective_timeout(), Duration::from_secs(600));
    }
}
