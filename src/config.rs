//! Configuration module for the knowledge-base search engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `KB_` and use double underscores
//! to separate nested levels:
//! - `KB_STORE__MAX_VECTORS=50000` sets `store.max_vectors`
//! - `KB_SEARCH__MIN_SIMILARITY=0.2` sets `search.min_similarity`
//! - `KB_STORE__AUTO_SAVE=false` sets `store.auto_save`

use crate::error::StoreError;
use crate::semantic::{DEFAULT_MAX_KEYWORDS, DEFAULT_MIN_DOCUMENT_FREQUENCY, thresholds};
use crate::vector::{DEFAULT_DIMENSION, DistanceMetric};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the settings file and, by default, the index.
pub const CONFIG_DIR: &str = ".kbsearch";

const SNAPSHOT_FILE: &str = "store.json";
const MODEL_FILE: &str = "model.json";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the store snapshot and the fitted model
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Vector store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Keyword extraction and vocabulary settings
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Query defaults
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Vector dimension, fixed for the store's lifetime
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum number of stored vectors
    #[serde(default = "default_max_vectors")]
    pub max_vectors: usize,

    /// Snapshot file; defaults to `<index_path>/store.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_path: Option<PathBuf>,

    /// Save automatically after mutations settle
    #[serde(default = "default_true")]
    pub auto_save: bool,

    /// Quiet period before an automatic save, in milliseconds
    #[serde(default = "default_save_delay_ms")]
    pub save_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VocabularyConfig {
    /// Keywords kept per document
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Minimum number of documents a term must appear in
    #[serde(default = "default_min_document_frequency")]
    pub min_document_frequency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Passages returned per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum similarity score (0.0 to 1.0)
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Snippet length in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Distance metric used for ranking
    #[serde(default)]
    pub metric: DistanceMetric,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}
fn default_max_vectors() -> usize {
    10_000
}
fn default_save_delay_ms() -> u64 {
    1000
}
fn default_max_keywords() -> usize {
    DEFAULT_MAX_KEYWORDS
}
fn default_min_document_frequency() -> usize {
    DEFAULT_MIN_DOCUMENT_FREQUENCY
}
fn default_max_results() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    thresholds::DEFAULT
}
fn default_snippet_chars() -> usize {
    200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            store: StoreConfig::default(),
            vocabulary: VocabularyConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            max_vectors: default_max_vectors(),
            persistence_path: None,
            auto_save: true,
            save_delay_ms: default_save_delay_ms(),
        }
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_keywords: default_max_keywords(),
            min_document_frequency: default_min_document_frequency(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_similarity: default_min_similarity(),
            snippet_chars: default_snippet_chars(),
            metric: DistanceMetric::default(),
        }
    }
}

impl StoreConfig {
    /// A store that never touches disk.
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            auto_save: false,
            ..Self::default()
        }
    }

    /// A store persisted at `path`, with automatic saves disabled.
    pub fn persistent(dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            persistence_path: Some(path.into()),
            auto_save: false,
            ..Self::default()
        }
    }

    pub fn with_max_vectors(mut self, max_vectors: usize) -> Self {
        self.max_vectors = max_vectors;
        self
    }

    pub fn with_auto_save(mut self, save_delay_ms: u64) -> Self {
        self.auto_save = true;
        self.save_delay_ms = save_delay_ms;
        self
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    /// Reject configurations a store cannot run with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.dimension == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "dimension must be at least 1".to_string(),
            });
        }
        if self.max_vectors == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "max_vectors must be at least 1".to_string(),
            });
        }
        if self.auto_save && self.persistence_path.is_none() {
            return Err(StoreError::InvalidConfig {
                reason: "auto_save requires a persistence_path".to_string(),
            });
        }
        Ok(())
    }
}

/// Provider for `KB_`-prefixed variables.
///
/// Double underscore (__) separates nested levels; single underscore (_)
/// remains as is within field names.
fn env_provider() -> Env {
    Env::prefixed("KB_").map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a .kbsearch directory
    /// from the current directory up to root
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Store configuration with the snapshot path resolved against `index_path`
    pub fn store_config(&self) -> StoreConfig {
        let mut config = self.store.clone();
        if config.persistence_path.is_none() {
            config.persistence_path = Some(self.index_path.join(SNAPSHOT_FILE));
        }
        config
    }

    /// Location of the fitted TF-IDF model
    pub fn model_path(&self) -> PathBuf {
        self.index_path.join(MODEL_FILE)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root/.kbsearch`
    pub fn init_config_file(
        root: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# kbsearch configuration file

# Version of the configuration schema
version = 1

# Directory holding store.json and model.json
index_path = ".kbsearch/index"

# Global debug mode
debug = false

[store]
# Vector dimension (upper bound on vocabulary size)
dimension = 200

# Maximum number of stored passages
max_vectors = 10000

# Save automatically once mutations have been quiet for save_delay_ms
auto_save = true
save_delay_ms = 1000

# Snapshot location (defaults to <index_path>/store.json)
# persistence_path = ".kbsearch/index/store.json"

[vocabulary]
# Keywords kept per document
max_keywords = 30

# A term must appear in at least this many documents to enter the vocabulary
min_document_frequency = 2

[search]
# Passages returned per query
max_results = 5

# Minimum similarity score (0.0 to 1.0)
min_similarity = 0.1

# Snippet length in characters
snippet_chars = 200

# Ranking metric: "cosine", "euclidean" or "manhattan"
metric = "cosine"
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.index_path, PathBuf::from(".kbsearch/index"));
        assert_eq!(settings.store.dimension, 200);
        assert_eq!(settings.store.max_vectors, 10_000);
        assert!(settings.store.auto_save);
        assert_eq!(settings.store.save_delay(), Duration::from_secs(1));
        assert_eq!(settings.vocabulary.max_keywords, 30);
        assert_eq!(settings.search.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2
index_path = "/srv/kb"

[store]
dimension = 64
auto_save = false

[vocabulary]
min_document_frequency = 1

[search]
metric = "manhattan"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.store.dimension, 64);
        assert!(!settings.store.auto_save);
        assert_eq!(settings.vocabulary.min_document_frequency, 1);
        assert_eq!(settings.search.metric, DistanceMetric::Manhattan);
        // Untouched keys keep their defaults
        assert_eq!(settings.vocabulary.max_keywords, 30);
        assert_eq!(settings.store.save_delay_ms, 1000);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.store.max_vectors = 42;
        settings.search.snippet_chars = 80;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.store.max_vectors, 42);
        assert_eq!(loaded.search.snippet_chars, 80);
        assert!(loaded.store.persistence_path.is_none());
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();

        let from_template: Settings = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let defaults = Settings::default();
        assert_eq!(from_template.store, defaults.store);
        assert_eq!(from_template.vocabulary, defaults.vocabulary);
        assert_eq!(from_template.search, defaults.search);

        // Refuses to clobber without force
        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_store_config_resolves_paths() {
        let mut settings = Settings::default();
        settings.index_path = PathBuf::from("/data/kb");

        let config = settings.store_config();
        assert_eq!(
            config.persistence_path,
            Some(PathBuf::from("/data/kb/store.json"))
        );
        assert_eq!(settings.model_path(), PathBuf::from("/data/kb/model.json"));

        settings.store.persistence_path = Some(PathBuf::from("/elsewhere.json"));
        assert_eq!(
            settings.store_config().persistence_path,
            Some(PathBuf::from("/elsewhere.json"))
        );
    }

    #[test]
    fn test_store_config_validation() {
        assert!(StoreConfig::in_memory(8).validate().is_ok());
        assert!(StoreConfig::in_memory(0).validate().is_err());
        assert!(
            StoreConfig::in_memory(8)
                .with_max_vectors(0)
                .validate()
                .is_err()
        );

        // Autosave needs somewhere to write
        let err = StoreConfig::in_memory(8)
            .with_auto_save(10)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("persistence_path"));
        assert!(
            StoreConfig::persistent(8, "/tmp/kb.json")
                .with_auto_save(10)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
[search]
max_results = 8
snippet_chars = 120
"#;
        fs::write(&config_path, toml_content).unwrap();

        // Environment variables override the config file
        unsafe {
            std::env::set_var("KB_SEARCH__MAX_RESULTS", "12");
            std::env::set_var("KB_SEARCH__MIN_SIMILARITY", "0.25");
        }

        let settings = Settings::load_from(&config_path).unwrap();

        unsafe {
            std::env::remove_var("KB_SEARCH__MAX_RESULTS");
            std::env::remove_var("KB_SEARCH__MIN_SIMILARITY");
        }

        assert_eq!(settings.search.max_results, 12);
        assert!((settings.search.min_similarity - 0.25).abs() < f32::EPSILON);
        // Config file value is used when no env var is set
        assert_eq!(settings.search.snippet_chars, 120);
    }
}
