use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Configuration for one tuner backend instance (one M3U playlist, one device, ...)
///
/// Loaded from the `[[tuners]]` array of the configuration file and treated as
/// immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunerEndpointConfig {
    /// Stable identity, also used to name the channel cache file
    pub id: String,
    /// Backend type tag selecting the driver (e.g. "m3u")
    #[serde(rename = "type")]
    pub tuner_type: String,
    /// Playlist url or local path
    pub url: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Maximum concurrent streams; 0 means unlimited
    #[serde(default)]
    pub tuner_count: u32,
    /// User-Agent sent upstream; a browser UA is used when absent
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub enable_stream_looping: bool,
    #[serde(default = "default_true")]
    pub allow_hw_transcoding: bool,
    /// When false every stream gets a dedicated implementation
    #[serde(default = "default_true")]
    pub allow_stream_sharing: bool,
    #[serde(default)]
    pub ignore_dts: bool,
    #[serde(default)]
    pub allow_fmp4_transcoding_container: bool,
    #[serde(default)]
    pub fallback_max_streaming_bitrate: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl TunerEndpointConfig {
    /// Minimal config for a tuner, remaining flags at their defaults
    pub fn new<I: Into<String>, T: Into<String>, U: Into<String>>(
        id: I,
        tuner_type: T,
        url: U,
    ) -> Self {
        Self {
            id: id.into(),
            tuner_type: tuner_type.into(),
            url: url.into(),
            device_id: None,
            friendly_name: None,
            tuner_count: 0,
            user_agent: None,
            enable_stream_looping: false,
            allow_hw_transcoding: true,
            allow_stream_sharing: true,
            ignore_dts: false,
            allow_fmp4_transcoding_container: false,
            fallback_max_streaming_bitrate: None,
        }
    }

    pub fn with_tuner_count(mut self, tuner_count: u32) -> Self {
        self.tuner_count = tuner_count;
        self
    }

    pub fn with_stream_looping(mut self, enabled: bool) -> Self {
        self.enable_stream_looping = enabled;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Name for log lines and status reports
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.id)
    }

    /// Whether the tuner enforces a concurrent stream ceiling
    pub fn is_limited(&self) -> bool {
        self.tuner_count > 0
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::configuration("tuner id must not be empty"));
        }
        if self.tuner_type.trim().is_empty() {
            return Err(AppError::configuration(format!(
                "tuner '{}' has no type",
                self.id
            )));
        }
        if self.url.trim().is_empty() {
            return Err(AppError::configuration(format!(
                "tuner '{}' has no url",
                self.id
            )));
        }
        Ok(())
    }
}

/// Point-in-time capacity report for one tuner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunerStatus {
    pub tuner_id: String,
    pub name: String,
    pub tuner_type: String,
    pub active_streams: usize,
    /// 0 means unlimited
    pub tuner_count: u32,
    pub available: bool,
}
