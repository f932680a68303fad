//! Requests processed by the broker core

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::stats::{BrokerStats, ChannelStats};

use super::item::OutboundItem;
use super::replay::ReplaySource;
use super::subscription::{Slot, SubscriptionId};

/// A request handed to the broker core
///
/// Every request carries everything needed to handle it, so the core never
/// reaches back into caller state.
pub(super) enum Command {
    /// Install or replace the replay source for a channel
    Register {
        channel: String,
        source: Arc<dyn ReplaySource>,
    },
    /// Attach a new subscription
    Subscribe(Slot),
    /// Detach a subscription (no-op if already gone)
    Unsubscribe { id: SubscriptionId, channel: String },
    /// Fan an item out to every subscription on the named channels
    Publish {
        channels: Vec<String>,
        item: OutboundItem,
    },
    /// Snapshot broker-wide counters
    Stats(oneshot::Sender<BrokerStats>),
    /// Snapshot one channel
    ChannelStats {
        channel: String,
        reply: oneshot::Sender<Option<ChannelStats>>,
    },
    /// Close every queue and stop the core
    Shutdown,
}

impl Command {
    /// Short name for logging
    pub(super) fn kind(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Subscribe(_) => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::Publish { .. } => "publish",
            Command::Stats(_) => "stats",
            Command::ChannelStats { .. } => "channel_stats",
            Command::Shutdown => "shutdown",
        }
    }
}
