use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;
pub mod provider;

pub use provider::{ConfigTunerProvider, TunerConfigProvider};

use crate::errors::{AppError, AppResult};
use crate::models::TunerEndpointConfig;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub tuners: Vec<TunerEndpointConfig>,
}

/// Channel list cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one `<fingerprint of tuner id>_channels` file per tuner
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
    /// Sliding expiry for in-memory entries; unset keeps them for the process lifetime
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_ttl: Option<Duration>,
}

/// Settings for the client used to fetch playlists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    /// Total timeout for playlist downloads. Live streams only use the connect timeout.
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Locality rules used to flag media sources as remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Extra CIDR subnets considered local, e.g. "10.8.0.0/24"
    #[serde(default)]
    pub local_subnets: Vec<String>,
    /// Treat RFC 1918 / unique-local / link-local addresses as local
    #[serde(default = "default_treat_private_as_local")]
    pub treat_private_as_local: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// How long opening a stream may wait for the first upstream bytes
    #[serde(default = "default_open_timeout", with = "duration_serde::duration")]
    pub open_timeout: Duration,
    /// Chunks buffered per shared stream before slow consumers start lagging
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIRECTORY)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_treat_private_as_local() -> bool {
    DEFAULT_TREAT_PRIVATE_AS_LOCAL
}

fn default_open_timeout() -> Duration {
    Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS)
}

fn default_broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            memory_ttl: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_subnets: Vec::new(),
            treat_private_as_local: default_treat_private_as_local(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            open_timeout: default_open_timeout(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl Config {
    /// Load and validate the configuration, writing out defaults when the file
    /// does not exist yet
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config = Self::from_toml(&contents)?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)
                .map_err(|e| AppError::configuration(format!("Failed to render defaults: {e}")))?;
            std::fs::write(path, contents)?;
            info!("Created default config file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn from_toml(contents: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| AppError::configuration(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut seen = HashSet::new();
        for tuner in &self.tuners {
            tuner.validate()?;
            if !seen.insert(tuner.id.to_ascii_lowercase()) {
                return Err(AppError::configuration(format!(
                    "Duplicate tuner id '{}'",
                    tuner.id
                )));
            }
        }

        if self.stream.broadcast_capacity == 0 {
            return Err(AppError::configuration(
                "stream.broadcast_capacity must be greater than zero",
            ));
        }

        Ok(())
    }
}
