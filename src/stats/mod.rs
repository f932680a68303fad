//! Broker statistics

pub mod metrics;

pub use metrics::{BrokerStats, ChannelStats};

pub(crate) use metrics::Counters;
