//! Channel to stream resolution across the tuners of one backend type

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{TunerError, TunerResult};
use crate::models::{
    ChannelRecord, LiveStreamInfo, MediaSourceDescriptor, TunerEndpointConfig, TunerStatus,
    count_streams_for_tuner,
};
use crate::tuners::aggregator::TunerAggregator;
use crate::tuners::traits::LiveStream;

/// Picks the tuner that serves a stream
///
/// Candidates are tried strictly in configuration order, so the first
/// configured tuner acts as primary and later ones as backups. Tuner ceilings
/// are checked against the open streams the caller passes in.
pub struct StreamArbiter {
    aggregator: Arc<TunerAggregator>,
}

impl StreamArbiter {
    pub fn new(aggregator: Arc<TunerAggregator>) -> Self {
        Self { aggregator }
    }

    pub fn aggregator(&self) -> &Arc<TunerAggregator> {
        &self.aggregator
    }

    /// Open a stream for `channel_id` on the first tuner able to serve it.
    ///
    /// Fails with [`TunerError::NotFound`] when no tuner lists the channel and
    /// with [`TunerError::TunerConflict`] when every tuner that does failed.
    pub async fn get_channel_stream(
        &self,
        channel_id: &str,
        requested_stream_id: Option<&str>,
        open_streams: &[LiveStreamInfo],
        cancel: &CancellationToken,
    ) -> TunerResult<Box<dyn LiveStream>> {
        let driver = self.aggregator.driver();
        if !driver.is_valid_channel_id(channel_id) {
            return Err(TunerError::not_found(channel_id));
        }

        let candidates = self.find_candidates(channel_id, cancel).await?;
        if candidates.is_empty() {
            return Err(TunerError::not_found(channel_id));
        }

        let attempts = candidates.len();
        for (tuner, channel) in candidates {
            if cancel.is_cancelled() {
                return Err(TunerError::Cancelled);
            }

            let mut stream = match driver
                .open_stream(&tuner, &channel, requested_stream_id, open_streams)
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(
                        error_type = e.error_type(),
                        "Tuner {} cannot serve channel {}: {}",
                        tuner.display_name(),
                        channel_id,
                        e
                    );
                    continue;
                }
            };

            let started = Instant::now();
            match stream.open(cancel).await {
                Ok(()) => {
                    info!(
                        "Live stream {} for channel {} opened on tuner {} after {}ms",
                        stream.id(),
                        channel_id,
                        tuner.display_name(),
                        started.elapsed().as_millis()
                    );
                    return Ok(stream);
                }
                Err(TunerError::Cancelled) => return Err(TunerError::Cancelled),
                Err(e) => {
                    error!(
                        error_type = e.error_type(),
                        "Error opening stream for channel {} on tuner {}: {}",
                        channel_id,
                        tuner.display_name(),
                        e
                    );
                }
            }
        }

        Err(TunerError::TunerConflict {
            channel_id: channel_id.to_string(),
            attempts,
        })
    }

    /// Describe the channel without committing a tuner. The first tuner that
    /// lists it and can describe it supplies the sources; an unknown channel
    /// yields an empty list.
    pub async fn get_media_sources(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<MediaSourceDescriptor>> {
        let driver = self.aggregator.driver();
        if !driver.is_valid_channel_id(channel_id) {
            return Ok(Vec::new());
        }

        for tuner in self.aggregator.tuners().await {
            let channels = self
                .aggregator
                .get_channels_for_tuner(&tuner, true, cancel)
                .await?;

            let Some(channel) = channels.iter().find(|c| c.has_id(channel_id)) else {
                continue;
            };
            match driver.media_sources(&tuner, channel) {
                Ok(sources) => return Ok(sources),
                Err(e) => {
                    warn!(
                        "Cannot describe channel {} on tuner {}: {}",
                        channel_id,
                        tuner.display_name(),
                        e
                    );
                }
            }
        }

        debug!("No tuner can describe channel {}", channel_id);
        Ok(Vec::new())
    }

    /// Capacity of every tuner given the caller's open streams
    pub async fn tuner_statuses(&self, open_streams: &[LiveStreamInfo]) -> Vec<TunerStatus> {
        self.aggregator
            .tuners()
            .await
            .into_iter()
            .map(|tuner| {
                let active_streams = count_streams_for_tuner(open_streams, &tuner.id);
                TunerStatus {
                    name: tuner.display_name().to_string(),
                    available: !tuner.is_limited()
                        || active_streams < tuner.tuner_count as usize,
                    tuner_id: tuner.id,
                    tuner_type: tuner.tuner_type,
                    active_streams,
                    tuner_count: tuner.tuner_count,
                }
            })
            .collect()
    }

    /// Every `(tuner, channel)` pair serving the channel, in configuration order
    async fn find_candidates(
        &self,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> TunerResult<Vec<(TunerEndpointConfig, ChannelRecord)>> {
        let mut candidates = Vec::new();

        for tuner in self.aggregator.tuners().await {
            let channels = self
                .aggregator
                .get_channels_for_tuner(&tuner, true, cancel)
                .await?;

            if let Some(channel) = channels.into_iter().find(|c| c.has_id(channel_id)) {
                candidates.push((tuner, channel));
            }
        }

        debug!(
            "Found {} candidate tuners for channel {}",
            candidates.len(),
            channel_id
        );
        Ok(candidates)
    }
}
