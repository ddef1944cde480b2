//! Configuration management for mealscan.
//!
//! Configuration is loaded with figment from defaults, an optional TOML file
//! and `MEALSCAN_` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "mealscan";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "meals.db";

/// Directory (under the data dir) holding copies of scanned photos.
const IMAGE_DIR_NAME: &str = "images";

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `MEALSCAN_`, `__` separates
///    sections, e.g. `MEALSCAN_API__MODEL`)
/// 2. TOML config file at `~/.config/mealscan/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Vision API configuration.
    pub api: ApiConfig,
    /// Scanning behaviour.
    pub scan: ScanConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/mealscan/meals.db`
    pub database_path: Option<PathBuf>,
    /// Directory where scanned photos are kept.
    /// Defaults to `~/.local/share/mealscan/images`
    pub image_dir: Option<PathBuf>,
}

/// Settings for the chat-completion/vision endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of an OpenAI-compatible API, without a trailing slash.
    pub base_url: String,
    /// Model used for photo analysis.
    pub model: String,
    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on tokens in the model's answer.
    pub max_tokens: u32,
    /// Image detail hint sent with the photo (`low`, `high` or `auto`).
    pub image_detail: String,
}

/// Scanning behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Keep a copy of every scanned photo in the image directory.
    pub keep_images: bool,
    /// Largest photo accepted, in bytes.
    pub max_image_bytes: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_tokens: 1200,
            image_detail: "auto".to_string(),
        }
    }
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("image_detail", &self.image_detail)
            .finish()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            keep_images: true,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Resolve the API key from config or the environment.
    ///
    /// Empty strings count as unset.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        let non_blank = |key: &String| !key.trim().is_empty();
        self.api_key
            .clone()
            .filter(non_blank)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(non_blank))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("MEALSCAN_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::ConfigValidation {
                message: format!("api.base_url must be an http(s) URL, got '{base_url}'"),
            });
        }

        if self.api.model.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "api.model must not be empty".to_string(),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "api.timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.api.max_tokens == 0 {
            return Err(Error::ConfigValidation {
                message: "api.max_tokens must be greater than 0".to_string(),
            });
        }

        if !matches!(self.api.image_detail.as_str(), "low" | "high" | "auto") {
            return Err(Error::ConfigValidation {
                message: format!(
                    "api.image_detail must be low, high or auto, got '{}'",
                    self.api.image_detail
                ),
            });
        }

        if self.scan.max_image_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "scan.max_image_bytes must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the image directory, resolving defaults if not set.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.storage
            .image_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(IMAGE_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "https://api.openai.com/v1");
        assert!(config.api.api_key.is_none());
        assert!(config.scan.keep_images);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_base_url() {
        let mut config = Config::default();
        config.api.base_url = "api.openai.com".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("base_url"));
    }

    #[test]
    fn test_validate_empty_model() {
        let mut config = Config::default();
        config.api.model = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api.model"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_image_detail() {
        let mut config = Config::default();
        config.api.image_detail = "ultra".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("image_detail"));

        config.api.image_detail = "low".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_max_image_bytes() {
        let mut config = Config::default();
        config.scan.max_image_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config.database_path().to_string_lossy().contains("meals.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_image_dir_default() {
        let config = Config::default();
        let dir = config.image_dir();
        assert!(dir.ends_with("mealscan/images"));
    }

    #[test]
    fn test_configured_api_key_wins() {
        let mut api = ApiConfig::default();
        api.api_key = Some("sk-configured".to_string());
        assert_eq!(api.resolved_api_key().as_deref(), Some("sk-configured"));
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let mut api = ApiConfig::default();
        api.api_key = Some("   ".to_string());
        // Falls through to the environment, which may or may not be set,
        // but a blank configured key must never be returned.
        assert_ne!(api.resolved_api_key().as_deref(), Some("   "));
    }

    #[test]
    fn test_api_config_debug_redacts_key() {
        let mut api = ApiConfig::default();
        api.api_key = Some("sk-secret".to_string());
        let debug_str = format!("{api:?}");
        assert!(!debug_str.contains("sk-secret"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn test_timeout() {
        assert_eq!(ApiConfig::default().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("mealscan"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\nmodel = \"gpt-4o\"\ntimeout_secs = 30\n\n[scan]\nkeep_images = false\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.api.model, "gpt-4o");
        assert_eq!(config.api.timeout_secs, 30);
        assert!(!config.scan.keep_images);
        assert_eq!(config.api.max_tokens, ApiConfig::default().max_tokens);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\ntimeout_secs = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_config_serializes_to_json() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("base_url"));
        assert!(json.contains("keep_images"));
    }
}
