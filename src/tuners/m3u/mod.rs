//! M3U playlist tuner driver
//!
//! Every configured M3U tuner points at a playlist, either over http(s) or as
//! a local path (optionally gzip compressed). Each playlist entry becomes one
//! channel; streams are relayed through a [`SharedHttpStream`] when the
//! upstream allows it and handed over as a [`DedicatedStream`] otherwise.

pub mod parser;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use self::parser::{PlaylistEntry, parse_playlist};
use crate::config::Config;
use crate::config::StreamConfig;
use crate::config::defaults::{DEFAULT_STREAM_USER_AGENT, DISALLOWED_SHARED_STREAM_EXTENSIONS};
use crate::errors::{AppResult, TunerError, TunerResult};
use crate::models::{
    ChannelRecord, ChannelType, LiveStreamInfo, MediaProtocol, MediaSourceDescriptor,
    MediaStreamInfo, TunerEndpointConfig,
};
use crate::tuners::streams::{DedicatedStream, LiveStreamContext, SharedHttpStream};
use crate::tuners::traits::{LiveStream, TunerDriver, ensure_tuner_capacity};
use crate::utils::{
    DecompressingHttpClient, DecompressionService, NetworkLocality, StandardHttpClient,
    SubnetLocality, UrlUtils, fingerprint,
};

pub const M3U_BACKEND_TYPE: &str = "m3u";

pub struct M3uTunerDriver {
    http_client: Arc<dyn DecompressingHttpClient>,
    stream_client: Client,
    locality: Arc<dyn NetworkLocality>,
    stream_config: StreamConfig,
}

impl M3uTunerDriver {
    pub fn new(
        http_client: Arc<dyn DecompressingHttpClient>,
        stream_client: Client,
        locality: Arc<dyn NetworkLocality>,
        stream_config: StreamConfig,
    ) -> Self {
        Self {
            http_client,
            stream_client,
            locality,
            stream_config,
        }
    }

    /// Build a driver with the HTTP clients and locality rules of `config`
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http_client = StandardHttpClient::from_config(&config.http)?;
        let stream_client = StandardHttpClient::streaming_client(
            config.http.connect_timeout,
            &config.http.user_agent,
        )?;

        Ok(Self::new(
            Arc::new(http_client),
            stream_client,
            Arc::new(SubnetLocality::from_config(&config.network)),
            config.stream.clone(),
        ))
    }

    /// `m3u_<fingerprint of the tuner url>_`
    pub fn tuner_channel_prefix(&self, tuner: &TunerEndpointConfig) -> String {
        format!("{}{}_", self.channel_id_prefix(), fingerprint(&tuner.url))
    }

    async fn fetch_playlist(&self, tuner: &TunerEndpointConfig) -> TunerResult<String> {
        let location = tuner.url.trim();

        if UrlUtils::is_http(location) {
            let result = match tuner.user_agent.as_deref() {
                Some(ua) => {
                    self.http_client
                        .fetch_text_with_headers(location, &[("User-Agent", ua)])
                        .await
                }
                None => self.http_client.fetch_text(location).await,
            };
            return result.map_err(|e| TunerError::backend_fetch(&tuner.id, e.to_string()));
        }

        let path = UrlUtils::to_local_path(location);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| TunerError::backend_fetch(&tuner.id, format!("cannot read {path}: {e}")))?;
        let bytes = DecompressionService::decompress(Bytes::from(raw))
            .map_err(|e| TunerError::backend_fetch(&tuner.id, e.to_string()))?;

        String::from_utf8(bytes)
            .map_err(|e| TunerError::backend_fetch(&tuner.id, format!("playlist is not UTF-8: {e}")))
    }

    fn to_channel_record(
        &self,
        tuner: &TunerEndpointConfig,
        prefix: &str,
        entry: PlaylistEntry,
    ) -> ChannelRecord {
        let discriminator = entry
            .stable_discriminator()
            .unwrap_or_else(|| fingerprint(&entry.url));
        let (name, number) = entry.name_and_number();
        let channel_type = if entry.is_radio() {
            ChannelType::Radio
        } else {
            ChannelType::Tv
        };

        ChannelRecord {
            id: format!("{prefix}{discriminator}"),
            name,
            number,
            image_url: entry.attribute("tvg-logo").map(str::to_string),
            tvg_id: entry.attribute("tvg-id").map(str::to_string),
            path: entry.url,
            tuner_host_id: tuner.id.clone(),
            channel_type,
            group: entry.group,
            attributes: entry.attributes,
        }
    }

    fn is_remote(&self, protocol: MediaProtocol, path: &str) -> bool {
        if protocol == MediaProtocol::File {
            return false;
        }
        match UrlUtils::extract_host(path) {
            Some(host) => !self.locality.is_in_local_network(&host),
            None => true,
        }
    }

    /// Relaying through one shared connection only works for plain transport
    /// streams; segmented and indexed containers need their own reader.
    fn can_share(tuner: &TunerEndpointConfig, source: &MediaSourceDescriptor) -> bool {
        source.protocol == MediaProtocol::Http
            && !source.requires_looping
            && tuner.allow_stream_sharing
            && !source
                .extension()
                .is_some_and(|ext| DISALLOWED_SHARED_STREAM_EXTENSIONS.contains(&ext.as_str()))
    }
}

#[async_trait]
impl TunerDriver for M3uTunerDriver {
    fn backend_type(&self) -> &str {
        M3U_BACKEND_TYPE
    }

    async fn list_channels(&self, tuner: &TunerEndpointConfig) -> TunerResult<Vec<ChannelRecord>> {
        info!(
            "Fetching M3U playlist for tuner {} from {}",
            tuner.display_name(),
            UrlUtils::obfuscate_credentials(&tuner.url)
        );

        let content = self.fetch_playlist(tuner).await?;
        let parsed = parse_playlist(&content);

        if parsed.entries.is_empty() && !parsed.has_m3u_markers {
            return Err(TunerError::backend_fetch(
                &tuner.id,
                "content is not an M3U playlist",
            ));
        }

        let prefix = self.tuner_channel_prefix(tuner);
        let channels: Vec<ChannelRecord> = parsed
            .entries
            .into_iter()
            .map(|entry| self.to_channel_record(tuner, &prefix, entry))
            .collect();

        info!(
            "Parsed {} channels from M3U tuner {}",
            channels.len(),
            tuner.display_name()
        );
        Ok(channels)
    }

    fn build_media_source(
        &self,
        tuner: &TunerEndpointConfig,
        channel: &ChannelRecord,
    ) -> TunerResult<MediaSourceDescriptor> {
        let path = channel.path.trim();
        if path.is_empty() {
            return Err(TunerError::invalid_channel(&channel.id, "channel has no stream path"));
        }

        let protocol = MediaProtocol::from_path(path);
        let mut required_http_headers = HashMap::new();
        if protocol == MediaProtocol::Http {
            let user_agent = tuner
                .user_agent
                .as_deref()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or(DEFAULT_STREAM_USER_AGENT);
            required_http_headers.insert("User-Agent".to_string(), user_agent.to_string());
        }

        let looping = tuner.enable_stream_looping;
        Ok(MediaSourceDescriptor {
            id: fingerprint(path),
            path: path.to_string(),
            protocol,
            required_http_headers,
            requires_opening: true,
            requires_closing: true,
            requires_looping: looping,
            supports_direct_play: !looping && tuner.tuner_count == 0,
            supports_direct_stream: !looping,
            is_remote: self.is_remote(protocol, path),
            is_infinite_stream: true,
            ignore_dts: tuner.ignore_dts,
            use_most_compatible_transcoding_profile: !tuner.allow_fmp4_transcoding_container,
            fallback_max_streaming_bitrate: tuner.fallback_max_streaming_bitrate,
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
        ensure_tuner_capacity(tuner, open_streams)?;

        let source = self.build_media_source(tuner, channel)?;
        let shared = Self::can_share(tuner, &source);
        let context = LiveStreamContext::new(tuner, channel, requested_stream_id, source);

        debug!(
            "Constructed {} stream {} for channel {} on tuner {}",
            if shared { "shared" } else { "dedicated" },
            context.id,
            channel.id,
            tuner.id
        );

        if shared {
            Ok(Box::new(SharedHttpStream::new(
                context,
                self.stream_client.clone(),
                self.stream_config.open_timeout,
                self.stream_config.broadcast_capacity,
            )))
        } else {
            Ok(Box::new(DedicatedStream::new(context)))
        }
    }
}
