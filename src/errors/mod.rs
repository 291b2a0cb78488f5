//! Centralized error handling for the live TV tuner subsystem
//!
//! Two layers of errors exist:
//!
//! - **`TunerError`**: the structured failure model surfaced by tuner drivers,
//!   the channel aggregator and the stream arbiter. Callers match on it.
//! - **`AppError`**: ambient failures (configuration, I/O, HTTP client setup)
//!   that only the embedding service and the binary care about.
//!
//! # Usage
//!
//! ```rust
//! use livetv_tuners::errors::{TunerError, TunerResult};
//!
//! fn lookup(channel_id: &str) -> TunerResult<()> {
//!     Err(TunerError::not_found(channel_id))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for tuner operation Results
pub type TunerResult<T> = Result<T, TunerError>;
