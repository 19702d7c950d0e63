//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `TENTALUX_`, nested keys separated
//!    by a double underscore (`TENTALUX_RIG__PORT=8080`)
//!
//! # Example
//! ```no_run
//! use tentalux::config::TentaluxConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TentaluxConfig::load_from("config/tentalux.toml")?;
//! config.validate()?;
//! println!("Rig at {}", config.base_url());
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, TentaluxError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TentaluxConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Rig connection settings
    pub rig: RigConfig,
    /// Status polling settings
    #[serde(default)]
    pub polling: PollingConfig,
    /// Camera settings
    #[serde(default)]
    pub camera: CameraConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Prefix used when naming devices ("tentalux arm 0", "tentalux camera")
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the rig lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Hostname or URL of the rig. `http://` is assumed when no scheme is given.
    pub host: String,
    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep between two status polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Upper bound for one image fetch in milliseconds
    #[serde(default = "default_camera_timeout")]
    pub timeout_ms: u64,
    /// Frames per second the hub should request
    #[serde(default = "default_framerate")]
    pub framerate: f64,
}

// Default value functions
fn default_name() -> String {
    "tentalux".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_poll_interval() -> u64 {
    500
}

fn default_camera_timeout() -> u64 {
    10_000
}

fn default_framerate() -> f64 {
    1.0
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_camera_timeout(),
            framerate: default_framerate(),
        }
    }
}

impl TentaluxConfig {
    /// Configuration for a rig at `host:port` with every other field defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            application: ApplicationConfig::default(),
            rig: RigConfig {
                host: host.into(),
                port,
                request_timeout_ms: default_request_timeout(),
            },
            polling: PollingConfig::default(),
            camera: CameraConfig::default(),
        }
    }

    /// Load configuration from a TOML file and `TENTALUX_` environment variables
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TENTALUX_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse configuration from an in-memory TOML document (no environment)
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let config = Figment::new().merge(Toml::string(toml)).extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(TentaluxError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.rig.host.trim().is_empty() {
            return Err(TentaluxError::Configuration(
                "'rig.host' cannot be empty".into(),
            ));
        }

        if self.rig.port == 0 {
            return Err(TentaluxError::Configuration("'rig.port' cannot be 0".into()));
        }

        if self.polling.interval_ms == 0 {
            return Err(TentaluxError::Configuration(
                "'polling.interval_ms' must be positive".into(),
            ));
        }

        if self.camera.timeout_ms == 0 {
            return Err(TentaluxError::Configuration(
                "'camera.timeout_ms' must be positive".into(),
            ));
        }

        if !(self.camera.framerate.is_finite() && self.camera.framerate > 0.0) {
            return Err(TentaluxError::Configuration(format!(
                "'camera.framerate' must be a positive number, got {}",
                self.camera.framerate
            )));
        }

        Ok(())
    }

    /// Base URL of the rig API, `scheme://host:port`
    pub fn base_url(&self) -> String {
        let host = self.rig.host.trim().trim_end_matches('/');
        if host.contains("://") {
            format!("{}:{}", host, self.rig.port)
        } else {
            format!("http://{}:{}", host, self.rig.port)
        }
    }

    /// Sleep between two polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.rig.request_timeout_ms)
    }

    /// Camera fetch bound
    pub fn camera_timeout(&self) -> Duration {
        Duration::from_millis(self.camera.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = TentaluxConfig::from_toml_str(
            r#"
            [rig]
            host = "tentalux.local"
            "#,
        )
        .unwrap();

        assert_eq!(config.application.name, "tentalux");
        assert_eq!(config.rig.port, 80);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.camera_timeout(), Duration::from_secs(10));
        assert!((config.camera.framerate - 1.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_host_is_an_error() {
        let result = TentaluxConfig::from_toml_str(
            r#"
            [rig]
            port = 8080
            "#,
        );
        assert!(matches!(result, Err(TentaluxError::Config(_))));
    }

    #[test]
    fn test_base_url_scheme_handling() {
        let config = TentaluxConfig::new("tentalux.local", 8080);
        assert_eq!(config.base_url(), "http://tentalux.local:8080");

        let config = TentaluxConfig::new("https://rig.example.com/", 443);
        assert_eq!(config.base_url(), "https://rig.example.com:443");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TentaluxConfig::new("", 80);
        assert!(config.validate().is_err());

        config = TentaluxConfig::new("rig", 0);
        assert!(config.validate().is_err());

        config = TentaluxConfig::new("rig", 80);
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());

        config = TentaluxConfig::new("rig", 80);
        config.camera.framerate = 0.0;
        assert!(config.validate().is_err());

        config = TentaluxConfig::new("rig", 80);
        config.application.log_level = "loud".into();
        assert!(config.validate().is_err());

        config = TentaluxConfig::new("rig", 80);
        config.application.log_level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [application]
            name = "studio"

            [rig]
            host = "http://10.0.0.7"
            port = 5000

            [polling]
            interval_ms = 250
            "#
        )
        .unwrap();

        let config = TentaluxConfig::load_from(file.path()).unwrap();
        assert_eq!(config.application.name, "studio");
        assert_eq!(config.base_url(), "http://10.0.0.7:5000");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/tentalux.toml");
        let config = TentaluxConfig::load_from(path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.camera_timeout(), Duration::from_secs(10));
    }
}
