/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Cache defaults
pub const DEFAULT_CACHE_DIRECTORY: &str = "./data/cache/livetv";

// HTTP client defaults
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("livetv-tuners/", env!("CARGO_PKG_VERSION"));

/// Sent upstream for HTTP streams when a tuner has no user agent of its own.
/// Many IPTV providers reject non-browser agents.
pub const DEFAULT_STREAM_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.121 Safari/537.36";

// Network defaults
pub const DEFAULT_TREAT_PRIVATE_AS_LOCAL: bool = true;

// Stream defaults
pub const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Containers that cannot be fanned out to several readers from one upstream
/// connection
pub const DISALLOWED_SHARED_STREAM_EXTENSIONS: &[&str] = &["mkv", "mp4", "m3u8", "mpd"];
