//! Trip planner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Per-call timeouts for external collaborators
    pub timeouts: TimeoutsConfig,

    /// Slot-filling dialogue limits
    pub dialogue: DialogueConfig,

    /// Optional geocoding fallback for destinations
    pub geocoder: GeocoderConfig,

    /// Optional retrieval corpus
    pub retrieval: RetrievalConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early in
    /// startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if !(0.0..=1.0).contains(&self.dialogue.fuzzy_threshold) {
            return Err(eyre::eyre!(
                "dialogue.fuzzy-threshold must be between 0 and 1, got {}",
                self.dialogue.fuzzy_threshold
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path
    /// 2. `./.tripplanner.yml`
    /// 3. `<config_dir>/tripplanner/tripplanner.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// Timeouts applied around each external call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Slot extraction and intent routing calls
    #[serde(rename = "extraction-ms")]
    pub extraction_ms: u64,

    /// Location, activity and packing stage calls
    #[serde(rename = "stage-ms")]
    pub stage_ms: u64,

    /// Summary polish, refinement and chat replies
    #[serde(rename = "polish-ms")]
    pub polish_ms: u64,

    /// Geocoding lookups
    #[serde(rename = "geocode-ms")]
    pub geocode_ms: u64,

    /// Retrieval searches
    #[serde(rename = "retrieval-ms")]
    pub retrieval_ms: u64,
}

impl TimeoutsConfig {
    pub fn extraction(&self) -> Duration {
        Duration::from_millis(self.extraction_ms)
    }

    pub fn stage(&self) -> Duration {
        Duration::from_millis(self.stage_ms)
    }

    pub fn polish(&self) -> Duration {
        Duration::from_millis(self.polish_ms)
    }

    pub fn geocode(&self) -> Duration {
        Duration::from_millis(self.geocode_ms)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            extraction_ms: 20_000,
            stage_ms: 45_000,
            polish_ms: 30_000,
            geocode_ms: 5_000,
            retrieval_ms: 5_000,
        }
    }
}

/// Slot-filling dialogue limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Minimum normalized similarity for a fuzzy gazetteer match
    #[serde(rename = "fuzzy-threshold")]
    pub fuzzy_threshold: f64,

    /// Attempts per field before batch mode gives up on it
    #[serde(rename = "batch-max-attempts")]
    pub batch_max_attempts: u32,

    /// Longest accepted trip
    #[serde(rename = "max-trip-days")]
    pub max_trip_days: u32,

    /// How far ahead a trip may start
    #[serde(rename = "max-future-years")]
    pub max_future_years: u32,

    /// Reload-and-retry attempts when a conversation save conflicts
    #[serde(rename = "store-retries")]
    pub store_retries: u32,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            batch_max_attempts: 3,
            max_trip_days: 60,
            max_future_years: 2,
            store_retries: 3,
        }
    }
}

/// Geocoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Whether to fall back to geocoding for unknown destinations
    pub enabled: bool,

    /// Nominatim-compatible endpoint
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// ISO country code results must match
    #[serde(rename = "country-code")]
    pub country_code: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "tripplanner/0.1".to_string(),
            country_code: "lk".to_string(),
        }
    }
}

/// Retrieval corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// JSONL file of `{text, source, tags}` documents
    #[serde(rename = "corpus-path")]
    pub corpus_path: Option<PathBuf>,

    /// Snippets returned per search
    #[serde(rename = "top-k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: 4,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the conversation store
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: tripstore::default_store_dir(),
        }
    }
}
