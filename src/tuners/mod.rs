//! Tuner drivers, channel aggregation and stream arbitration

pub mod aggregator;
pub mod arbiter;
pub mod m3u;
pub mod manager;
pub mod registry;
pub mod streams;
pub mod traits;

pub use aggregator::TunerAggregator;
pub use arbiter::StreamArbiter;
pub use m3u::{M3U_BACKEND_TYPE, M3uTunerDriver};
pub use manager::TunerManager;
pub use registry::OpenStreamRegistry;
pub use streams::{DedicatedStream, LiveStreamContext, SharedHttpStream};
pub use traits::{LiveStream, LiveStreamState, TunerDriver, ensure_tuner_capacity};
