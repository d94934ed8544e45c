//! Runtime settings for emo-fusion
//!
//! Validates the bootstrap [`TomlConfig`] into typed settings: a bind
//! address, parsed analyzer URLs and `Duration` timeouts.

use crate::realtime::RealtimeSettings;
use emo_common::config::{AnalyzerEndpoints, TomlConfig};
use emo_common::{Error, Result};
use reqwest::Url;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Validated service settings
#[derive(Debug, Clone, PartialEq)]
pub struct FusionSettings {
    pub bind_addr: SocketAddr,
    pub endpoints: AnalyzerEndpoints,
    /// Per-modality timeout for one-shot multimodal requests
    pub batch_timeout: Duration,
    pub realtime: RealtimeSettings,
    pub max_upload_bytes: usize,
}

impl FusionSettings {
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        let host: IpAddr = config
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host '{}': {}", config.host, e)))?;

        for (name, url) in [
            ("facial_url", &config.analyzers.facial_url),
            ("voice_url", &config.analyzers.voice_url),
            ("text_url", &config.analyzers.text_url),
        ] {
            Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid analyzer {} '{}': {}", name, url, e)))?;
        }

        if config.max_upload_mb == 0 {
            return Err(Error::Config("max_upload_mb must be greater than 0".to_string()));
        }

        let timeouts = &config.timeouts;
        Ok(Self {
            bind_addr: SocketAddr::new(host, config.port),
            endpoints: config.analyzers.clone(),
            batch_timeout: seconds("batch_secs", timeouts.batch_secs)?,
            realtime: RealtimeSettings {
                frame_timeout: seconds("frame_secs", timeouts.frame_secs)?,
                audio_timeout: seconds("audio_secs", timeouts.audio_secs)?,
                text_timeout: seconds("text_secs", timeouts.text_secs)?,
                min_text_chars: config.realtime.min_text_chars,
            },
            max_upload_bytes: config.max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !(value > 0.0) {
        return Err(Error::Config(format!(
            "Timeout {} must be positive, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::Config(format!("Timeout {} out of range: {}", name, e)))
}
