//! Data model shared by tuner drivers, the channel cache and stream arbitration

pub mod channel;
pub mod media_source;
pub mod tuner;

pub use channel::*;
pub use media_source::*;
pub use tuner::*;
