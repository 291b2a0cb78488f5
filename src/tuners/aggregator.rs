//! Channel list aggregation across every tuner of one backend type

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ChannelCache;
use crate::config::TunerConfigProvider;
use crate::errors::{TunerError, TunerResult};
use crate::models::{ChannelRecord, TunerEndpointConfig};
use crate::tuners::traits::TunerDriver;
use crate::utils::UrlUtils;

/// Fans channel list requests out over the tuners of one backend type
///
/// Tuners are visited one after another in configuration order so that the
/// first tuner always wins an id collision. A failing tuner never fails the
/// call; with the cache enabled its last persisted list is used instead.
pub struct TunerAggregator {
    driver: Arc<dyn TunerDriver>,
    provider: Arc<dyn TunerConfigProvider>,
    cache: Arc<ChannelCache>,
}

impl TunerAggregator {
    pub fn new(
        driver: Arc<dyn TunerDriver>,
        provider: Arc<dyn TunerConfigProvider>,
        cache: Arc<ChannelCache>,
    ) -> Self {
        Self {
            driver,
            provider,
            cache,
        }
    }

    pub fn driver(&self) -> &Arc<dyn TunerDriver> {
        &self.driver
    }

    pub fn backend_type(&self) -> &str {
        self.driver.backend_type()
    }

    /// Tuners of this backend type, re-resolved on every call
    pub async fn tuners(&self) -> Vec<TunerEndpointConfig> {
        self.provider.tuner_hosts(self.driver.backend_type()).await
    }

    /// Merged, de-duplicated channels of every tuner.
    ///
    /// Only cancellation is reported as an error.
    pub async fn get_channels(
        &self,
        enable_cache: bool,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<ChannelRecord>> {
        let tuners = self.tuners().await;
        let mut merged = Vec::new();
        let mut seen = HashSet::new();

        for tuner in &tuners {
            let channels = self.get_channels_for_tuner(tuner, enable_cache, cancel).await?;
            append_unseen(&mut merged, &mut seen, channels);
        }

        debug!(
            "Aggregated {} {} channels from {} tuners",
            merged.len(),
            self.backend_type(),
            tuners.len()
        );
        Ok(merged)
    }

    /// Cache-or-fetch-or-fallback for a single tuner
    pub async fn get_channels_for_tuner(
        &self,
        tuner: &TunerEndpointConfig,
        enable_cache: bool,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<ChannelRecord>> {
        if cancel.is_cancelled() {
            return Err(TunerError::Cancelled);
        }

        if enable_cache {
            if let Some(cached) = self.cache.get(&tuner.id).await {
                debug!(
                    "Using {} cached channels for tuner {}",
                    cached.len(),
                    tuner.display_name()
                );
                return Ok(cached);
            }
        }

        let started = Instant::now();
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Channel fetch for tuner {} cancelled", tuner.display_name());
                return Err(TunerError::Cancelled);
            }
            result = self.driver.list_channels(tuner) => result,
        };

        match fetched {
            Ok(channels) => {
                info!(
                    "Fetched {} channels from tuner {} in {}ms",
                    channels.len(),
                    tuner.display_name(),
                    started.elapsed().as_millis()
                );
                if enable_cache {
                    self.cache.remember(&tuner.id, channels.clone()).await;
                } else {
                    self.cache.put(&tuner.id, channels.clone()).await;
                }
                Ok(channels)
            }
            Err(e) => {
                warn!(
                    error_type = e.error_type(),
                    "Error getting channel list from tuner {} ({}): {}",
                    tuner.display_name(),
                    UrlUtils::obfuscate_credentials(&tuner.url),
                    e
                );

                if !enable_cache {
                    return Ok(Vec::new());
                }

                match self.cache.load_from_disk(&tuner.id).await {
                    Some(channels) => {
                        info!(
                            "Falling back to {} persisted channels for tuner {}",
                            channels.len(),
                            tuner.display_name()
                        );
                        Ok(channels)
                    }
                    None => Ok(Vec::new()),
                }
            }
        }
    }
}

fn append_unseen(
    merged: &mut Vec<ChannelRecord>,
    seen: &mut HashSet<String>,
    channels: Vec<ChannelRecord>,
) {
    for channel in channels {
        if seen.insert(channel.id.to_ascii_lowercase()) {
            merged.push(channel);
        } else {
            debug!("Dropping duplicate channel id {}", channel.id);
        }
    }
}
