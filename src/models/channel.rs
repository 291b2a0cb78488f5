use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Tv,
    Radio,
}

/// One channel exposed by a tuner
///
/// `id` is namespaced by backend type and tuner fingerprint so that it stays
/// unique across every configured tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Where the stream is played from
    pub path: String,
    pub tuner_host_id: String,
    #[serde(default)]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tvg_id: Option<String>,
    /// Raw backend metadata needed to build a stream later
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ChannelRecord {
    /// Ids are compared ASCII case-insensitively
    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

/// Snapshot of one open live stream, as tracked by the caller
///
/// Passed to the arbiter so tuner ceilings can be enforced without the core
/// holding global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStreamInfo {
    pub id: String,
    pub tuner_host_id: String,
    pub channel_id: String,
    pub opened_at: chrono::DateTime<chrono::Utc>,
}

impl LiveStreamInfo {
    pub fn new<I: Into<String>, T: Into<String>, C: Into<String>>(
        id: I,
        tuner_host_id: T,
        channel_id: C,
    ) -> Self {
        Self {
            id: id.into(),
            tuner_host_id: tuner_host_id.into(),
            channel_id: channel_id.into(),
            opened_at: chrono::Utc::now(),
        }
    }
}

/// Count the open streams that belong to `tuner_id`
pub fn count_streams_for_tuner(open_streams: &[LiveStreamInfo], tuner_id: &str) -> usize {
    open_streams
        .iter()
        .filter(|s| s.tuner_host_id.eq_ignore_ascii_case(tuner_id))
        .count()
}
