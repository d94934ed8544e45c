//! Bootstrap configuration loading
//!
//! Resolution priority (highest first):
//! 1. Command-line argument (applied by the service binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing default config file is not an error: the service logs a warning
//! and starts on compiled defaults. A file named explicitly must exist and
//! parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variables overriding analyzer base URLs
pub const FACIAL_URL_ENV: &str = "FACIAL_SERVICE_URL";
pub const VOICE_URL_ENV: &str = "VOICE_SERVICE_URL";
pub const TEXT_URL_ENV: &str = "TEXT_SERVICE_URL";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind
    pub host: String,
    /// HTTP/WebSocket port
    pub port: u16,
    /// Maximum accepted request body, in MiB
    pub max_upload_mb: usize,
    pub logging: LoggingConfig,
    pub analyzers: AnalyzerEndpoints,
    pub timeouts: TimeoutConfig,
    pub realtime: RealtimeConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8004,
            max_upload_mb: 10,
            logging: LoggingConfig::default(),
            analyzers: AnalyzerEndpoints::default(),
            timeouts: TimeoutConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,
    /// Optional log file, written in addition to stdout
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Base URLs of the three analyzer backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerEndpoints {
    pub facial_url: String,
    pub voice_url: String,
    pub text_url: String,
}

impl Default for AnalyzerEndpoints {
    fn default() -> Self {
        Self {
            facial_url: "http://localhost:8001".to_string(),
            voice_url: "http://localhost:8002".to_string(),
            text_url: "http://localhost:8003".to_string(),
        }
    }
}

impl AnalyzerEndpoints {
    /// Apply `FACIAL_SERVICE_URL` / `VOICE_SERVICE_URL` / `TEXT_SERVICE_URL`
    ///
    /// Returns the variables that took effect; blank values are ignored.
    pub fn apply_env_overrides(&mut self) -> Vec<&'static str> {
        let mut applied = Vec::new();
        for (var, slot) in [
            (FACIAL_URL_ENV, &mut self.facial_url),
            (VOICE_URL_ENV, &mut self.voice_url),
            (TEXT_URL_ENV, &mut self.text_url),
        ] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                    applied.push(var);
                }
            }
        }
        applied
    }
}

/// Per-call analyzer timeouts, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// One-shot multimodal requests (each modality)
    pub batch_secs: f64,
    /// Real-time video frames
    pub frame_secs: f64,
    /// Real-time audio chunks
    pub audio_secs: f64,
    /// Real-time text
    pub text_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            batch_secs: 30.0,
            frame_secs: 10.0,
            audio_secs: 15.0,
            text_secs: 10.0,
        }
    }
}

/// Real-time channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Text is analyzed only when its trimmed length exceeds this
    pub min_text_chars: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self { min_text_chars: 5 }
    }
}

/// Default config file location for a service
///
/// `<config_dir>/emo/<service>.toml`; on Linux `/etc/emo/<service>.toml` is
/// used when the per-user file does not exist.
pub fn default_config_path(service: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service);
    let user_config = dirs::config_dir().map(|d| d.join("emo").join(&file_name));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/emo").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// Default file absent (path if one could be determined)
    Defaults { missing: Option<PathBuf> },
}

/// Configuration plus how it was resolved
///
/// Loading happens before logging is set up, so nothing is logged while
/// resolving; call [`LoadedConfig::log_resolution`] once a subscriber is
/// installed.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
    /// Environment variables that overrode file values
    pub env_overrides: Vec<&'static str>,
}

impl LoadedConfig {
    pub fn log_resolution(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults { missing: Some(path) } => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Defaults { missing: None } => {
                warn!("Could not determine config directory, using compiled defaults")
            }
        }
        for var in &self.env_overrides {
            info!("{} overridden from environment", var);
        }
    }
}

/// Load the service configuration
///
/// `explicit` is a path given on the command line; it must exist. Without
/// it the default location is tried and compiled defaults are used when
/// that file is absent. Analyzer URL environment overrides are applied on
/// top of whatever was loaded.
pub fn load_config(explicit: Option<&Path>, service: &str) -> Result<LoadedConfig> {
    let (mut config, source) = match explicit {
        Some(path) => (load_toml_config(path)?, ConfigSource::File(path.to_path_buf())),
        None => match default_config_path(service) {
            Some(path) if path.exists() => (load_toml_config(&path)?, ConfigSource::File(path)),
            missing => (TomlConfig::default(), ConfigSource::Defaults { missing }),
        },
    };

    let env_overrides = config.analyzers.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        source,
        env_overrides,
    })
}
