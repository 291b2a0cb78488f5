//! Utility modules for the tuner subsystem
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod decompression;
pub mod fingerprint;
pub mod http_client;
pub mod network;
pub mod url;

// Re-export commonly used types for convenience
pub use decompression::{CompressionFormat, DecompressionService};
pub use fingerprint::fingerprint;
pub use http_client::{DecompressingHttpClient, StandardHttpClient};
pub use network::{NetworkLocality, SubnetLocality};
pub use url::UrlUtils;
