//! Error type definitions for the live TV tuner subsystem

use thiserror::Error;

/// Failures produced by tuner drivers, aggregation and stream arbitration.
///
/// Only `NotFound`, `TunerConflict` and `Cancelled` are expected to reach the
/// callers of the arbiter; the other variants are absorbed per tuner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunerError {
    /// A single tuner's channel list could not be retrieved (network or parse)
    #[error("Failed to fetch channels from tuner {tuner_id}: {message}")]
    BackendFetch { tuner_id: String, message: String },

    /// The channel id is unknown to every tuner of the backend
    #[error("Channel not found: {channel_id}")]
    NotFound { channel_id: String },

    /// A tuner already serves its maximum number of concurrent streams
    #[error("Tuner {tuner_id} stream limit reached ({active}/{limit})")]
    TunerLimitExceeded {
        tuner_id: String,
        active: usize,
        limit: u32,
    },

    /// Every tuner able to serve the channel failed to produce an open stream
    #[error("No tuner could serve channel {channel_id} ({attempts} attempted)")]
    TunerConflict { channel_id: String, attempts: usize },

    /// A driver-level failure while opening a stream
    #[error("Failed to open stream on tuner {tuner_id}: {message}")]
    StreamOpen { tuner_id: String, message: String },

    /// Channel data a driver cannot turn into a media source
    #[error("Invalid channel {channel_id}: {message}")]
    InvalidChannel { channel_id: String, message: String },

    /// No driver is registered for the backend type
    #[error("Unsupported tuner type: {tuner_type}")]
    UnknownBackend { tuner_type: String },

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,
}

impl TunerError {
    pub fn backend_fetch<T: Into<String>, M: Into<String>>(tuner_id: T, message: M) -> Self {
        Self::BackendFetch {
            tuner_id: tuner_id.into(),
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(channel_id: S) -> Self {
        Self::NotFound {
            channel_id: channel_id.into(),
        }
    }

    pub fn stream_open<T: Into<String>, M: Into<String>>(tuner_id: T, message: M) -> Self {
        Self::StreamOpen {
            tuner_id: tuner_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_channel<C: Into<String>, M: Into<String>>(channel_id: C, message: M) -> Self {
        Self::InvalidChannel {
            channel_id: channel_id.into(),
            message: message.into(),
        }
    }

    /// Whether the failure signals temporary tuner exhaustion rather than a
    /// permanent error. Callers may retry these with their own backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TunerConflict { .. } | Self::TunerLimitExceeded { .. }
        )
    }

    /// Short machine-readable label, used as a structured logging field
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BackendFetch { .. } => "backend_fetch",
            Self::NotFound { .. } => "not_found",
            Self::TunerLimitExceeded { .. } => "tuner_limit_exceeded",
            Self::TunerConflict { .. } => "tuner_conflict",
            Self::StreamOpen { .. } => "stream_open",
            Self::InvalidChannel { .. } => "invalid_channel",
            Self::UnknownBackend { .. } => "unknown_backend",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Tuner subsystem errors
    #[error("Tuner error: {0}")]
    Tuner(#[from] TunerError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File system errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// External service errors
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an external service error
    pub fn external_service<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let conflict = TunerError::TunerConflict {
            channel_id: "m3u_abc_1".to_string(),
            attempts: 2,
        };
        assert!(conflict.is_retryable());
        assert!(!TunerError::not_found("m3u_abc_1").is_retryable());
        assert!(!TunerError::Cancelled.is_retryable());
    }

    #[test]
    fn test_display_includes_limit() {
        let err = TunerError::TunerLimitExceeded {
            tuner_id: "living-room".to_string(),
            active: 1,
            limit: 1,
        };
        assert_eq!(err.to_string(), "Tuner living-room stream limit reached (1/1)");
        assert_eq!(err.error_type(), "tuner_limit_exceeded");
    }

    #[test]
    fn test_app_error_wraps_tuner_error() {
        let err: AppError = TunerError::not_found("m3u_x_1").into();
        assert!(matches!(err, AppError::Tuner(TunerError::NotFound { .. })));
    }
}
