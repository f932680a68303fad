//! Statistics and metrics for the broker

use std::time::{Duration, Instant};

/// Broker-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Channels with at least one subscriber
    pub channels: u64,
    /// Currently active subscriptions
    pub subscribers: u64,
    /// Channels with a registered replay source
    pub replay_sources: u64,
    /// Publish requests processed
    pub published: u64,
    /// Items enqueued to subscribers by live fan-out
    pub delivered: u64,
    /// Subscribers disconnected for falling behind
    pub slow_disconnects: u64,
    /// Subscriptions removed by unsubscribe
    pub unsubscribes: u64,
    /// Replay dispatchers started
    pub replays_started: u64,
    /// Time since the broker started
    pub uptime: Duration,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average fan-out per publish request
    pub fn fanout_ratio(&self) -> f64 {
        if self.published > 0 {
            self.delivered as f64 / self.published as f64
        } else {
            0.0
        }
    }
}

/// Statistics for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// Channel name
    pub channel: String,
    /// Number of active subscribers
    pub subscriber_count: usize,
    /// Whether a replay source is registered
    pub has_replay_source: bool,
}

/// Running counters kept by the broker core
#[derive(Debug)]
pub(crate) struct Counters {
    started_at: Instant,
    pub(crate) published: u64,
    pub(crate) delivered: u64,
    pub(crate) slow_disconnects: u64,
    pub(crate) unsubscribes: u64,
    pub(crate) replays_started: u64,
}

impl Counters {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            published: 0,
            delivered: 0,
            slow_disconnects: 0,
            unsubscribes: 0,
            replays_started: 0,
        }
    }

    /// Build a snapshot given the current map sizes
    pub(crate) fn snapshot(
        &self,
        channels: usize,
        subscribers: usize,
        replay_sources: usize,
    ) -> BrokerStats {
        BrokerStats {
            channels: channels as u64,
            subscribers: subscribers as u64,
            replay_sources: replay_sources as u64,
            published: self.published,
            delivered: self.delivered,
            slow_disconnects: self.slow_disconnects,
            unsubscribes: self.unsubscribes,
            replays_started: self.replays_started,
            uptime: self.started_at.elapsed(),
        }
    }
}
