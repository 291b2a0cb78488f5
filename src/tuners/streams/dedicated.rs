//! Stream handed to a consumer that reads the media source itself

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LiveStreamContext;
use crate::errors::{TunerError, TunerResult};
use crate::models::{MediaProtocol, MediaSourceDescriptor};
use crate::tuners::traits::{LiveStream, LiveStreamState};
use crate::utils::UrlUtils;

/// A stream whose consumer opens the media source path on its own
///
/// Opening only verifies that a local file is reachable; network paths are
/// handed over untouched.
#[derive(Debug)]
pub struct DedicatedStream {
    context: LiveStreamContext,
    state: LiveStreamState,
}

impl DedicatedStream {
    pub fn new(context: LiveStreamContext) -> Self {
        Self {
            context,
            state: LiveStreamState::Constructed,
        }
    }

    async fn verify_local_file(&self) -> TunerResult<()> {
        let path = UrlUtils::to_local_path(&self.context.media_source.path);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            TunerError::stream_open(
                &self.context.tuner_host_id,
                format!("cannot access {path}: {e}"),
            )
        })?;

        if !metadata.is_file() {
            return Err(TunerError::stream_open(
                &self.context.tuner_host_id,
                format!("{path} is not a regular file"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LiveStream for DedicatedStream {
    fn id(&self) -> &str {
        &self.context.id
    }

    fn tuner_host_id(&self) -> &str {
        &self.context.tuner_host_id
    }

    fn channel_id(&self) -> &str {
        &self.context.channel_id
    }

    fn original_stream_id(&self) -> Option<&str> {
        self.context.original_stream_id.as_deref()
    }

    fn media_source(&self) -> &MediaSourceDescriptor {
        &self.context.media_source
    }

    fn state(&self) -> LiveStreamState {
        self.state
    }

    async fn open(&mut self, cancel: &CancellationToken) -> TunerResult<()> {
        match self.state {
            LiveStreamState::Open => return Ok(()),
            LiveStreamState::Closed => {
                return Err(TunerError::stream_open(
                    &self.context.tuner_host_id,
                    "stream has been closed",
                ));
            }
            LiveStreamState::Constructed | LiveStreamState::Opening => {}
        }
        self.state = LiveStreamState::Opening;

        let result = if self.context.media_source.protocol == MediaProtocol::File {
            tokio::select! {
                _ = cancel.cancelled() => Err(TunerError::Cancelled),
                checked = self.verify_local_file() => checked,
            }
        } else if cancel.is_cancelled() {
            Err(TunerError::Cancelled)
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                self.state = LiveStreamState::Open;
                info!(
                    "Opened dedicated stream {} for channel {} on tuner {}",
                    self.context.id, self.context.channel_id, self.context.tuner_host_id
                );
                Ok(())
            }
            Err(e) => {
                self.state = LiveStreamState::Closed;
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        if self.state == LiveStreamState::Closed {
            return;
        }
        self.state = LiveStreamState::Closed;
        debug!("Closed dedicated stream {}", self.context.id);
    }
}
