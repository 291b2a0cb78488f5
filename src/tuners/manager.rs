//! Registry of tuner backends
//!
//! Each backend type gets its own aggregator and arbiter pair sharing one
//! channel cache. Callers address backends by type tag; stream and media
//! source lookups can also be routed purely by channel id prefix.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ChannelCache;
use crate::config::{Config, ConfigTunerProvider, TunerConfigProvider};
use crate::errors::{AppResult, TunerError, TunerResult};
use crate::models::{ChannelRecord, LiveStreamInfo, MediaSourceDescriptor, TunerStatus};
use crate::tuners::aggregator::TunerAggregator;
use crate::tuners::arbiter::StreamArbiter;
use crate::tuners::m3u::M3uTunerDriver;
use crate::tuners::traits::{LiveStream, TunerDriver};

struct Backend {
    aggregator: Arc<TunerAggregator>,
    arbiter: StreamArbiter,
}

pub struct TunerManager {
    provider: Arc<dyn TunerConfigProvider>,
    cache: Arc<ChannelCache>,
    backends: BTreeMap<String, Backend>,
}

impl TunerManager {
    pub fn new(provider: Arc<dyn TunerConfigProvider>, cache: Arc<ChannelCache>) -> Self {
        Self {
            provider,
            cache,
            backends: BTreeMap::new(),
        }
    }

    /// Manager with every built-in driver registered, backed by the
    /// configuration's tuner list and cache settings
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let provider = Arc::new(ConfigTunerProvider::new(config.tuners.clone()));
        let cache = Arc::new(ChannelCache::from_config(&config.cache));

        let mut manager = Self::new(provider, cache);
        manager.register(Arc::new(M3uTunerDriver::from_config(config)?));
        Ok(manager)
    }

    /// Add a driver. A driver for an already registered type replaces it.
    pub fn register(&mut self, driver: Arc<dyn TunerDriver>) {
        let backend_type = driver.backend_type().to_ascii_lowercase();
        let aggregator = Arc::new(TunerAggregator::new(
            driver,
            Arc::clone(&self.provider),
            Arc::clone(&self.cache),
        ));
        let arbiter = StreamArbiter::new(Arc::clone(&aggregator));

        info!("Registered tuner backend: {}", backend_type);
        self.backends.insert(
            backend_type,
            Backend {
                aggregator,
                arbiter,
            },
        );
    }

    pub fn backend_types(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    pub fn cache(&self) -> &Arc<ChannelCache> {
        &self.cache
    }

    pub async fn list_channels(
        &self,
        backend_type: &str,
        enable_cache: bool,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<ChannelRecord>> {
        self.backend(backend_type)?
            .aggregator
            .get_channels(enable_cache, cancel)
            .await
    }

    pub async fn get_channel_stream(
        &self,
        backend_type: &str,
        channel_id: &str,
        requested_stream_id: Option<&str>,
        open_streams: &[LiveStreamInfo],
        cancel: &CancellationToken,
    ) -> TunerResult<Box<dyn LiveStream>> {
        self.backend(backend_type)?
            .arbiter
            .get_channel_stream(channel_id, requested_stream_id, open_streams, cancel)
            .await
    }

    /// Open a stream, picking the backend from the channel id prefix
    pub async fn open_channel(
        &self,
        channel_id: &str,
        requested_stream_id: Option<&str>,
        open_streams: &[LiveStreamInfo],
        cancel: &CancellationToken,
    ) -> TunerResult<Box<dyn LiveStream>> {
        match self.backend_for_channel(channel_id) {
            Some(backend) => {
                backend
                    .arbiter
                    .get_channel_stream(channel_id, requested_stream_id, open_streams, cancel)
                    .await
            }
            None => Err(TunerError::not_found(channel_id)),
        }
    }

    /// Non-opening probe routed by channel id prefix; unknown ids yield an
    /// empty list
    pub async fn get_media_sources(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<MediaSourceDescriptor>> {
        match self.backend_for_channel(channel_id) {
            Some(backend) => backend.arbiter.get_media_sources(channel_id, cancel).await,
            None => {
                debug!("No tuner backend owns channel id {}", channel_id);
                Ok(Vec::new())
            }
        }
    }

    /// Capacity snapshot of every tuner of every registered backend
    pub async fn tuner_statuses(&self, open_streams: &[LiveStreamInfo]) -> Vec<TunerStatus> {
        let mut statuses = Vec::new();
        for backend in self.backends.values() {
            statuses.extend(backend.arbiter.tuner_statuses(open_streams).await);
        }
        statuses
    }

    fn backend(&self, backend_type: &str) -> TunerResult<&Backend> {
        self.backends
            .get(&backend_type.to_ascii_lowercase())
            .ok_or_else(|| TunerError::UnknownBackend {
                tuner_type: backend_type.to_string(),
            })
    }

    fn backend_for_channel(&self, channel_id: &str) -> Option<&Backend> {
        self.backends
            .values()
            .find(|b| b.aggregator.driver().is_valid_channel_id(channel_id))
    }
}
