//! Tuner driver and live stream trait definitions
//!
//! A [`TunerDriver`] knows how to talk to one family of tuner backends. The
//! aggregation and arbitration layers are generic over it, so adding a backend
//! means implementing this trait and registering it with the
//! [`TunerManager`](super::TunerManager).

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::errors::{TunerError, TunerResult};
use crate::models::{
    ChannelRecord, LiveStreamInfo, MediaSourceDescriptor, TunerEndpointConfig,
    count_streams_for_tuner,
};

/// Lifecycle of a live stream handle
///
/// `Constructed` and `Opening` are only observable by the driver; callers see
/// a handle either fail to open or reach `Open`. `Closed` is only reached via
/// an explicit [`LiveStream::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LiveStreamState {
    Constructed,
    Opening,
    Open,
    Closed,
}

/// An owned live stream produced by a driver
///
/// Returned unopened by [`TunerDriver::open_stream`]. Whoever opens it owns it
/// and must call [`close`](LiveStream::close) when done.
#[async_trait]
pub trait LiveStream: Send + Sync {
    /// Unique id of this handle
    fn id(&self) -> &str;

    fn tuner_host_id(&self) -> &str;

    fn channel_id(&self) -> &str;

    /// The stream id the caller asked for, if any
    fn original_stream_id(&self) -> Option<&str>;

    fn media_source(&self) -> &MediaSourceDescriptor;

    fn state(&self) -> LiveStreamState;

    /// Acquire upstream resources. On failure (including cancellation) any
    /// partially acquired resource is released before returning.
    async fn open(&mut self, cancel: &CancellationToken) -> TunerResult<()>;

    /// Release upstream resources. Closing an already closed stream is a no-op.
    async fn close(&mut self);

    /// Receive the stream's bytes, for implementations that relay them.
    /// `None` means the consumer reads [`media_source`](LiveStream::media_source) directly.
    fn subscribe(&self) -> Option<broadcast::Receiver<Bytes>> {
        None
    }

    /// Snapshot for the caller's open-stream registry
    fn info(&self) -> LiveStreamInfo {
        LiveStreamInfo::new(self.id(), self.tuner_host_id(), self.channel_id())
    }
}

impl std::fmt::Debug for dyn LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("id", &self.id())
            .field("tuner_host_id", &self.tuner_host_id())
            .field("channel_id", &self.channel_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Backend-specific tuner driver
#[async_trait]
pub trait TunerDriver: Send + Sync {
    /// Backend type tag, matched case-insensitively against tuner configuration
    fn backend_type(&self) -> &str;

    /// Prefix every channel id produced by this driver starts with
    fn channel_id_prefix(&self) -> String {
        format!("{}_", self.backend_type().to_ascii_lowercase())
    }

    /// Whether a channel id could have been produced by this driver
    fn is_valid_channel_id(&self, channel_id: &str) -> bool {
        let prefix = self.channel_id_prefix();
        channel_id
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
    }

    /// Fetch the complete channel list of one tuner. Either the whole list is
    /// returned or the call fails with [`TunerError::BackendFetch`].
    async fn list_channels(&self, tuner: &TunerEndpointConfig) -> TunerResult<Vec<ChannelRecord>>;

    /// Describe how the channel would be played. Pure; only malformed channel
    /// data makes it fail.
    fn build_media_source(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
    ) -> TunerResult<MediaSourceDescriptor>;

    /// Every playable variant of the channel on this tuner
    fn media_sources(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
    ) -> TunerResult<Vec<MediaSourceDescriptor>> {
        Ok(vec![self.build_media_source(tuner, channel)?])
    }

    /// Construct an unopened stream for the channel, rejecting the request up
    /// front when the tuner is already at capacity
    async fn open_stream(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
        requested_stream_id: Option<&str>,
        open_streams: &[LiveStreamInfo],
    ) -> TunerResult<Box<dyn LiveStream>>;
}

/// Reject the open when `tuner` already serves `tuner_count` streams.
///
/// The check is advisory: two callers observing spare capacity at the same
/// time can both proceed.
pub fn ensure_tuner_capacity(
    tuner: &TunerEndpointConfig,
    open_streams: &[LiveStreamInfo],
) -> TunerResult<()> {
    if !tuner.is_limited() {
        return Ok(());
    }

    let active = count_streams_for_tuner(open_streams, &tuner.id);
    if active >= tuner.tuner_count as usize {
        return Err(TunerError::TunerLimitExceeded {
            tuner_id: tuner.id.clone(),
            active,
            limit: tuner.tuner_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_unlimited_tuner_always_passes() {
        let tuner = TunerEndpointConfig::new("t1", "m3u", "http://host/list.m3u");
        let open = vec![LiveStreamInfo::new("s1", "t1", "m3u_a_1"); 5];
        assert!(ensure_tuner_capacity(&tuner, &open).is_ok());
    }

    #[test]
    fn test_capacity_counts_only_matching_tuner() {
        let tuner =
            TunerEndpointConfig::new("t1", "m3u", "http://host/list.m3u").with_tuner_count(1);

        let other = vec![LiveStreamInfo::new("s1", "t2", "m3u_a_1")];
        assert!(ensure_tuner_capacity(&tuner, &other).is_ok());

        let same = vec![LiveStreamInfo::new("s1", "T1", "m3u_a_1")];
        assert_eq!(
            ensure_tuner_capacity(&tuner, &same),
            Err(TunerError::TunerLimitExceeded {
                tuner_id: "t1".to_string(),
                active: 1,
                limit: 1,
            })
        );
    }
}
