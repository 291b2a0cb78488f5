//! Live TV tuner aggregation and stream arbitration
//!
//! Channel lineups from every configured tuner of a backend type are merged
//! by [`tuners::TunerAggregator`], cached per tuner by
//! [`cache::ChannelCache`], and turned into opened live streams by
//! [`tuners::StreamArbiter`]. [`tuners::TunerManager`] ties the pieces
//! together for each registered backend.

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod tuners;
pub mod utils;
