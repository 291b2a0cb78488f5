use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Transport used to reach a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaProtocol {
    File,
    Http,
    Rtmp,
    Rtsp,
    Rtp,
    Udp,
    Ftp,
}

impl MediaProtocol {
    /// Sniff the protocol from a path's scheme.
    ///
    /// `https` counts as [`MediaProtocol::Http`]. Anything carrying a scheme
    /// that is not recognised is also treated as HTTP; plain paths and
    /// `file://` urls are files.
    pub fn from_path(path: &str) -> Self {
        let lower = path.trim().to_ascii_lowercase();

        if lower.starts_with("rtsp") {
            Self::Rtsp
        } else if lower.starts_with("rtmp") {
            Self::Rtmp
        } else if lower.starts_with("http") {
            Self::Http
        } else if lower.starts_with("rtp") {
            Self::Rtp
        } else if lower.starts_with("ftp") {
            Self::Ftp
        } else if lower.starts_with("udp") {
            Self::Udp
        } else if lower.starts_with("file://") || !lower.contains("://") {
            Self::File
        } else {
            Self::Http
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaStreamKind {
    Video,
    Audio,
}

/// Elementary stream description; index -1 marks a placeholder that has not
/// been probed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub kind: MediaStreamKind,
    pub index: i32,
    #[serde(default)]
    pub is_interlaced: bool,
}

impl MediaStreamInfo {
    pub fn placeholder_video() -> Self {
        Self {
            kind: MediaStreamKind::Video,
            index: -1,
            is_interlaced: true,
        }
    }

    pub fn placeholder_audio() -> Self {
        Self {
            kind: MediaStreamKind::Audio,
            index: -1,
            is_interlaced: false,
        }
    }
}

/// A resolved, playable description of one channel's stream on one tuner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSourceDescriptor {
    /// Fingerprint of `path`
    pub id: String,
    pub path: String,
    pub protocol: MediaProtocol,
    pub required_http_headers: HashMap<String, String>,
    pub requires_opening: bool,
    pub requires_closing: bool,
    pub requires_looping: bool,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    pub is_remote: bool,
    pub is_infinite_stream: bool,
    pub ignore_dts: bool,
    pub use_most_compatible_transcoding_profile: bool,
    pub fallback_max_streaming_bitrate: Option<u64>,
    pub media_streams: Vec<MediaStreamInfo>,
}

impl MediaSourceDescriptor {
    /// Lowercased file extension of the path, ignoring any query string
    pub fn extension(&self) -> Option<String> {
        let path = match url::Url::parse(&self.path) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self.path.clone(),
        };
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}
