//! Caller-side bookkeeping of open live streams
//!
//! The arbiter never tracks streams itself; it only counts the snapshot it is
//! given. This registry is a convenience for callers that do not already keep
//! such a list.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::LiveStreamInfo;
use crate::tuners::traits::LiveStream;

#[derive(Clone, Default)]
pub struct OpenStreamRegistry {
    streams: Arc<RwLock<HashMap<String, LiveStreamInfo>>>,
}

impl OpenStreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an opened stream
    pub async fn register(&self, stream: &dyn LiveStream) -> LiveStreamInfo {
        let info = stream.info();
        self.streams
            .write()
            .await
            .insert(info.id.clone(), info.clone());
        debug!(
            "Registered live stream {} on tuner {}",
            info.id, info.tuner_host_id
        );
        info
    }

    /// Forget a stream, typically right after closing it
    pub async fn release(&self, stream_id: &str) -> Option<LiveStreamInfo> {
        let removed = self.streams.write().await.remove(stream_id);
        if removed.is_some() {
            debug!("Released live stream {}", stream_id);
        }
        removed
    }

    /// Snapshot to pass to the arbiter
    pub async fn snapshot(&self) -> Vec<LiveStreamInfo> {
        let mut streams: Vec<LiveStreamInfo> =
            self.streams.read().await.values().cloned().collect();
        streams.sort_by_key(|s| s.opened_at);
        streams
    }

    pub async fn count_for_tuner(&self, tuner_id: &str) -> usize {
        self.streams
            .read()
            .await
            .values()
            .filter(|s| s.tuner_host_id.eq_ignore_ascii_case(tuner_id))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}
