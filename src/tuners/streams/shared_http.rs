//! Shared HTTP live stream
//!
//! One upstream GET per stream; a pump task copies the body onto a broadcast
//! channel that every subscriber reads from.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::LiveStreamContext;
use crate::errors::{TunerError, TunerResult};
use crate::models::MediaSourceDescriptor;
use crate::tuners::traits::{LiveStream, LiveStreamState};
use crate::utils::UrlUtils;

/// One upstream HTTP connection relayed to any number of consumers
///
/// The body is read by a pump task and published on a broadcast channel.
/// Consumers that fall more than the channel capacity behind lose the oldest
/// chunks rather than stalling the upstream.
pub struct SharedHttpStream {
    context: LiveStreamContext,
    client: Client,
    open_timeout: Duration,
    state: LiveStreamState,
    sender: broadcast::Sender<Bytes>,
    /// Subscribed before the pump starts so the first consumer sees the stream from its first byte
    initial_receiver: Mutex<Option<broadcast::Receiver<Bytes>>>,
    pump_token: Option<CancellationToken>,
    pump_handle: Option<JoinHandle<()>>,
}

impl SharedHttpStream {
    pub fn new(
        context: LiveStreamContext,
        client: Client,
        open_timeout: Duration,
        broadcast_capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            context,
            client,
            open_timeout,
            state: LiveStreamState::Constructed,
            sender,
            initial_receiver: Mutex::new(None),
            pump_token: None,
            pump_handle: None,
        }
    }

    /// Number of live subscribers
    pub fn consumer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn open_error<M: Into<String>>(&self, message: M) -> TunerError {
        TunerError::stream_open(&self.context.tuner_host_id, message)
    }

    async fn connect(&self) -> TunerResult<reqwest::Response> {
        let source = &self.context.media_source;
        let mut request = self.client.get(&source.path);
        for (name, value) in &source.required_http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            self.open_error(UrlUtils::obfuscate_credentials(&e.to_string()))
        })?;

        if !response.status().is_success() {
            return Err(self.open_error(format!(
                "upstream returned {} for {}",
                response.status(),
                UrlUtils::obfuscate_credentials(&source.path)
            )));
        }
        Ok(response)
    }

    /// `open_timeout` bounds the whole handshake, headers and first chunk together
    async fn establish(&mut self, cancel: &CancellationToken) -> TunerResult<()> {
        let deadline = Instant::now() + self.open_timeout;

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TunerError::Cancelled),
            result = timeout_at(deadline, self.connect()) => match result {
                Ok(response) => response?,
                Err(_) => {
                    return Err(self.open_error(format!(
                        "no response within {}",
                        humantime::format_duration(self.open_timeout)
                    )));
                }
            },
        };

        let pump_token = CancellationToken::new();
        let (first_tx, first_rx) = oneshot::channel();
        *self.lock_initial_receiver() = Some(self.sender.subscribe());

        let handle = tokio::spawn(pump(
            response,
            self.sender.clone(),
            pump_token.clone(),
            first_tx,
            self.context.id.clone(),
        ));
        self.pump_token = Some(pump_token);
        self.pump_handle = Some(handle);

        tokio::select! {
            _ = cancel.cancelled() => Err(TunerError::Cancelled),
            first = timeout_at(deadline, first_rx) => match first {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(message))) => Err(self.open_error(message)),
                Ok(Err(_)) => Err(self.open_error("stream pump stopped unexpectedly")),
                Err(_) => Err(self.open_error(format!(
                    "no data within {}",
                    humantime::format_duration(self.open_timeout)
                ))),
            },
        }
    }

    async fn release(&mut self) {
        if let Some(token) = self.pump_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.pump_handle.take() {
            let _ = handle.await;
        }
        self.lock_initial_receiver().take();
    }

    fn lock_initial_receiver(&self) -> std::sync::MutexGuard<'_, Option<broadcast::Receiver<Bytes>>> {
        // A poisoned lock only ever guards an optional receiver
        self.initial_receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Copy the response body onto the broadcast channel until the upstream ends
/// or the stream is closed. `first_chunk` resolves once data starts flowing.
async fn pump(
    response: reqwest::Response,
    sender: broadcast::Sender<Bytes>,
    token: CancellationToken,
    first_chunk: oneshot::Sender<Result<(), String>>,
    stream_id: String,
) {
    let mut first_chunk = Some(first_chunk);
    let mut bytes_relayed: u64 = 0;
    let mut body = std::pin::pin!(response.bytes_stream());

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => break,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                bytes_relayed += bytes.len() as u64;
                // No subscribers is fine, live data is simply dropped
                let _ = sender.send(bytes);
                if let Some(tx) = first_chunk.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            None => {
                if let Some(tx) = first_chunk.take() {
                    let _ = tx.send(Err("upstream ended before sending data".to_string()));
                }
                debug!("Upstream for stream {} ended", stream_id);
                break;
            }
            Some(Err(e)) => {
                let message = UrlUtils::obfuscate_credentials(&e.to_string());
                warn!("Error reading upstream for stream {}: {}", stream_id, message);
                if let Some(tx) = first_chunk.take() {
                    let _ = tx.send(Err(message));
                }
                break;
            }
        }
    }

    debug!(
        "Stream pump {} stopped after {} bytes",
        stream_id, bytes_relayed
    );
}

#[async_trait]
impl LiveStream for SharedHttpStream {
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
            LiveStreamState::Closed => return Err(self.open_error("stream has been closed")),
            LiveStreamState::Constructed | LiveStreamState::Opening => {}
        }
        self.state = LiveStreamState::Opening;
        debug!(
            "Opening shared stream {} from {}",
            self.context.id,
            UrlUtils::obfuscate_credentials(&self.context.media_source.path)
        );

        match self.establish(cancel).await {
            Ok(()) => {
                self.state = LiveStreamState::Open;
                info!(
                    "Opened shared stream {} for channel {} on tuner {}",
                    self.context.id, self.context.channel_id, self.context.tuner_host_id
                );
                Ok(())
            }
            Err(e) => {
                self.release().await;
                self.state = LiveStreamState::Closed;
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        if self.state == LiveStreamState::Closed {
            return;
        }
        self.release().await;
        self.state = LiveStreamState::Closed;
        info!(
            "Closed shared stream {} for channel {}",
            self.context.id, self.context.channel_id
        );
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Bytes>> {
        if self.state != LiveStreamState::Open {
            return None;
        }
        let initial = self.lock_initial_receiver().take();
        Some(initial.unwrap_or_else(|| self.sender.subscribe()))
    }
}

impl Drop for SharedHttpStream {
    fn drop(&mut self) {
        if let Some(token) = self.pump_token.take() {
            token.cancel();
        }
    }
}
