//! Live stream implementations handed out by tuner drivers
//!
//! - [`SharedHttpStream`]: one upstream HTTP connection fanned out to any
//!   number of subscribers
//! - [`DedicatedStream`]: the consumer reads the media source path itself;
//!   used for looping streams and containers that cannot be multiplexed

pub mod dedicated;
pub mod shared_http;

pub use dedicated::DedicatedStream;
pub use shared_http::SharedHttpStream;

use uuid::Uuid;

use crate::models::{ChannelRecord, MediaSourceDescriptor, TunerEndpointConfig};

/// Identity shared by every live stream implementation
#[derive(Debug, Clone)]
pub struct LiveStreamContext {
    pub id: String,
    pub tuner_host_id: String,
    pub channel_id: String,
    pub original_stream_id: Option<String>,
    pub media_source: MediaSourceDescriptor,
}

impl LiveStreamContext {
    pub fn new(
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
        requested_stream_id: Option<&str>,
        media_source: MediaSourceDescriptor,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tuner_host_id: tuner.id.clone(),
            channel_id: channel.id.clone(),
            original_stream_id: requested_stream_id.map(str::to_string),
            media_source,
        }
    }
}
