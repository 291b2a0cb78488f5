//! Shared fixtures for the integration suites
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use livetv_tuners::cache::ChannelCache;
use livetv_tuners::config::ConfigTunerProvider;
use livetv_tuners::errors::{TunerError, TunerResult};
use livetv_tuners::models::{
    ChannelRecord, ChannelType, LiveStreamInfo, MediaProtocol, MediaSourceDescriptor,
    MediaStreamInfo, TunerEndpointConfig,
};
use livetv_tuners::tuners::{
    LiveStream, LiveStreamState, StreamArbiter, TunerAggregator, TunerDriver,
    ensure_tuner_capacity,
};

pub const FAKE_BACKEND: &str = "fake";

pub fn channel(id: &str, name: &str, tuner_id: &str) -> ChannelRecord {
    ChannelRecord {
        id: id.to_string(),
        name: name.to_string(),
        number: None,
        image_url: None,
        path: format!("rtsp://{tuner_id}/{id}"),
        tuner_host_id: tuner_id.to_string(),
        channel_type: ChannelType::Tv,
        group: None,
        tvg_id: None,
        attributes: HashMap::new(),
    }
}

pub fn fake_tuner(id: &str) -> TunerEndpointConfig {
    TunerEndpointConfig::new(id, FAKE_BACKEND, format!("http://{id}.lan/lineup"))
}

/// Driver serving canned lineups and recording what it was asked to do
#[derive(Default)]
pub struct FakeDriver {
    lineups: Mutex<HashMap<String, Vec<ChannelRecord>>>,
    offline: Mutex<HashSet<String>>,
    failing_opens: Mutex<HashSet<String>>,
    undescribable: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
    pub open_attempts: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lineup(self, tuner_id: &str, channels: Vec<ChannelRecord>) -> Self {
        self.lineups
            .lock()
            .unwrap()
            .insert(tuner_id.to_string(), channels);
        self
    }

    pub fn set_offline(&self, tuner_id: &str, offline: bool) {
        let mut set = self.offline.lock().unwrap();
        if offline {
            set.insert(tuner_id.to_string());
        } else {
            set.remove(tuner_id);
        }
    }

    pub fn fail_opens_on(&self, tuner_id: &str) {
        self.failing_opens
            .lock()
            .unwrap()
            .insert(tuner_id.to_string());
    }

    /// Make `build_media_source` fail for every channel of the tuner
    pub fn fail_sources_on(&self, tuner_id: &str) {
        self.undescribable
            .lock()
            .unwrap()
            .insert(tuner_id.to_string());
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn open_attempts(&self) -> Vec<String> {
        self.open_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TunerDriver for FakeDriver {
    fn backend_type(&self) -> &str {
        FAKE_BACKEND
    }

    async fn list_channels(&self, tuner: &TunerEndpointConfig) -> TunerResult<Vec<ChannelRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.lock().unwrap().contains(&tuner.id) {
            return Err(TunerError::backend_fetch(&tuner.id, "connection refused"));
        }
        Ok(self
            .lineups
            .lock()
            .unwrap()
            .get(&tuner.id)
            .cloned()
            .unwrap_or_default())
    }

    fn build_media_source(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
    ) -> TunerResult<MediaSourceDescriptor> {
        if self.undescribable.lock().unwrap().contains(&tuner.id) {
            return Err(TunerError::invalid_channel(&channel.id, "no usable path"));
        }
        Ok(MediaSourceDescriptor {
            id: format!("{}:{}", tuner.id, channel.id),
            path: channel.path.clone(),
            protocol: MediaProtocol::from_path(&channel.path),
            required_http_headers: HashMap::new(),
            requires_opening: true,
            requires_closing: true,
            requires_looping: false,
            supports_direct_play: tuner.tuner_count == 0,
            supports_direct_stream: true,
            is_remote: false,
            is_infinite_stream: true,
            ignore_dts: false,
            use_most_compatible_transcoding_profile: true,
            fallback_max_streaming_bitrate: None,
            media_streams: vec![
                MediaStreamInfo::placeholder_video(),
                MediaStreamInfo::placeholder_audio(),
            ],
        })
    }

    async fn open_stream(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
        requested_stream_id: Option<&str>,
        open_streams: &[LiveStreamInfo],
    ) -> TunerResult<Box<dyn LiveStream>> {
        self.open_attempts.lock().unwrap().push(tuner.id.clone());
        ensure_tuner_capacity(tuner, open_streams)?;

        let fail_open = self.failing_opens.lock().unwrap().contains(&tuner.id);
        Ok(Box::new(FakeStream {
            id: format!("stream-{}-{}", tuner.id, channel.id),
            tuner_host_id: tuner.id.clone(),
            channel_id: channel.id.clone(),
            original_stream_id: requested_stream_id.map(str::to_string),
            media_source: self.build_media_source(tuner, channel)?,
            state: LiveStreamState::Constructed,
            fail_open,
        }))
    }
}

pub struct FakeStream {
    id: String,
    tuner_host_id: String,
    channel_id: String,
    original_stream_id: Option<String>,
    media_source: MediaSourceDescriptor,
    state: LiveStreamState,
    fail_open: bool,
}

#[async_trait]
impl LiveStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tuner_host_id(&self) -> &str {
        &self.tuner_host_id
    }

    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn original_stream_id(&self) -> Option<&str> {
        self.original_stream_id.as_deref()
    }

    fn media_source(&self) -> &MediaSourceDescriptor {
        &self.media_source
    }

    fn state(&self) -> LiveStreamState {
        self.state
    }

    async fn open(&mut self, cancel: &CancellationToken) -> TunerResult<()> {
        if cancel.is_cancelled() {
            self.state = LiveStreamState::Closed;
            return Err(TunerError::Cancelled);
        }
        if self.fail_open {
            self.state = LiveStreamState::Closed;
            return Err(TunerError::stream_open(&self.tuner_host_id, "upstream returned 503"));
        }
        self.state = LiveStreamState::Open;
        Ok(())
    }

    async fn close(&mut self) {
        self.state = LiveStreamState::Closed;
    }
}

/// Aggregator and arbiter over `driver` for the given tuners
pub fn build(
    driver: Arc<FakeDriver>,
    tuners: Vec<TunerEndpointConfig>,
    cache: Arc<ChannelCache>,
) -> (Arc<TunerAggregator>, StreamArbiter) {
    let provider = Arc::new(ConfigTunerProvider::new(tuners));
    let aggregator = Arc::new(TunerAggregator::new(driver, provider, cache));
    let arbiter = StreamArbiter::new(Arc::clone(&aggregator));
    (aggregator, arbiter)
}
