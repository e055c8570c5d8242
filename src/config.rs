//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub geocoder: GeocoderConfig,
    pub push: PushConfig,
    pub uploads: UploadsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3001)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Reverse-geocoding configuration
///
/// Points at a Nominatim-compatible `/reverse` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    /// Service base URL (e.g., "https://nominatim.openstreetmap.org")
    pub base_url: String,
    /// Per-lookup timeout in seconds; on expiry the address falls back
    /// to the "Unknown location" sentinel
    pub timeout_seconds: u64,
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Web-push delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Per-delivery timeout in seconds; expiry counts as a transient failure
    pub timeout_seconds: u64,
    /// Maximum concurrent delivery attempts per dispatch
    pub max_concurrent: usize,
}

impl PushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Photo upload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Root directory for uploaded files (served under /uploads)
    pub dir: PathBuf,
    /// Maximum accepted photo size in bytes (default: 5 MiB)
    pub max_photo_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (WARDWATCH_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3001)?
            .set_default("database.path", "data/wardwatch.db")?
            .set_default("geocoder.base_url", "https://nominatim.openstreetmap.org")?
            .set_default("geocoder.timeout_seconds", 3)?
            .set_default("push.timeout_seconds", 5)?
            .set_default("push.max_concurrent", 10)?
            .set_default("uploads.dir", "uploads")?
            .set_default("uploads.max_photo_bytes", 5 * 1024 * 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (WARDWATCH_*)
            .add_source(
                Environment::with_prefix("WARDWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if url::Url::parse(&self.geocoder.base_url).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "geocoder.base_url is not a valid URL: {}",
                self.geocoder.base_url
            )));
        }

        if self.geocoder.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "geocoder.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.push.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "push.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.push.max_concurrent == 0 {
            return Err(crate::error::AppError::Config(
                "push.max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.uploads.max_photo_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "uploads.max_photo_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
