//! Broker core
//!
//! The single task that owns the channel → subscriptions map and the
//! channel → replay source map. Requests arrive one at a time over an
//! unbounded channel and are handled to completion before the next, so no
//! lock guards either map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::stats::{ChannelStats, Counters};

use super::command::Command;
use super::config::BrokerConfig;
use super::item::OutboundItem;
use super::replay::{self, ReplayJob, ReplaySource};
use super::subscription::{Slot, SubscriptionId};

/// Why a subscription left the fan-out set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    /// Explicit unsubscribe or dropped handle
    Unsubscribed,
    /// Queue full on publish
    SlowConsumer,
    /// Reader already gone when publishing
    ReaderGone,
}

/// State owned by the core task
pub(super) struct BrokerCore {
    config: BrokerConfig,
    channels: HashMap<String, HashMap<SubscriptionId, Slot>>,
    sources: HashMap<String, Arc<dyn ReplaySource>>,
    counters: Counters,
}

impl BrokerCore {
    pub(super) fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            channels: HashMap::new(),
            sources: HashMap::new(),
            counters: Counters::new(),
        }
    }

    /// Process requests until shutdown or until every sender is gone
    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(
            queue_capacity = self.config.queue_capacity,
            replay_all = self.config.replay_all,
            "Broker started"
        );

        while let Some(command) = commands.recv().await {
            tracing::trace!(command = command.kind(), "Processing command");

            if !self.handle(command) {
                break;
            }
        }

        // Requests still queued are dropped with the receiver; any pending
        // subscription slot goes with them, which closes its queue
        commands.close();
        self.close_all();
    }

    /// Handle one request; returns false on shutdown
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Register { channel, source } => self.register(channel, source),
            Command::Subscribe(slot) => self.subscribe(slot),
            Command::Unsubscribe { id, channel } => {
                self.remove(&channel, id, Removal::Unsubscribed);
            }
            Command::Publish { channels, item } => self.publish(&channels, item),
            Command::Stats(reply) => {
                let subscribers: usize = self.channels.values().map(HashMap::len).sum();
                let stats = self
                    .counters
                    .snapshot(self.channels.len(), subscribers, self.sources.len());
                let _ = reply.send(stats);
            }
            Command::ChannelStats { channel, reply } => {
                let _ = reply.send(self.channel_stats(&channel));
            }
            Command::Shutdown => return false,
        }

        true
    }

    fn register(&mut self, channel: String, source: Arc<dyn ReplaySource>) {
        let replaced = self.sources.insert(channel.clone(), source).is_some();

        tracing::info!(
            channel = %channel,
            replaced = replaced,
            "Replay source registered"
        );
    }

    fn subscribe(&mut self, mut slot: Slot) {
        let wants_replay = self.config.replay_all || !slot.last_event_id.is_empty();

        if wants_replay {
            match self.sources.get(&slot.channel) {
                Some(source) => {
                    let (guard, closed) = oneshot::channel();
                    slot.replay_guard = Some(guard);

                    replay::spawn(ReplayJob {
                        id: slot.id,
                        channel: slot.channel.clone(),
                        last_event_id: slot.last_event_id.clone(),
                        source: Arc::clone(source),
                        tx: slot.tx.clone(),
                        closed,
                    });
                    self.counters.replays_started += 1;
                }
                None => {
                    tracing::debug!(
                        subscription = %slot.id,
                        channel = %slot.channel,
                        "No replay source registered, skipping replay"
                    );
                }
            }
        }

        let subscribers = self.channels.entry(slot.channel.clone()).or_default();
        let id = slot.id;
        let channel = slot.channel.clone();
        let last_event_id = slot.last_event_id.clone();
        subscribers.insert(id, slot);

        tracing::debug!(
            subscription = %id,
            channel = %channel,
            last_event_id = %last_event_id,
            replay = wants_replay,
            subscribers = subscribers.len(),
            "Subscriber added"
        );
    }

    fn publish(&mut self, channels: &[String], item: OutboundItem) {
        self.counters.published += 1;

        for channel in channels {
            let Some(subscribers) = self.channels.get(channel) else {
                continue;
            };

            let mut failed = Vec::new();
            for (id, slot) in subscribers {
                match slot.tx.try_send(item.clone()) {
                    Ok(()) => self.counters.delivered += 1,
                    Err(TrySendError::Full(_)) => failed.push((*id, Removal::SlowConsumer)),
                    Err(TrySendError::Closed(_)) => failed.push((*id, Removal::ReaderGone)),
                }
            }

            for (id, reason) in failed {
                self.remove(channel, id, reason);
            }
        }
    }

    /// Remove a subscription and close its queue in one step
    ///
    /// Unknown ids are ignored, which makes repeated removal harmless.
    fn remove(&mut self, channel: &str, id: SubscriptionId, reason: Removal) {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return;
        };

        // Dropping the slot drops the core's sender and the replay guard
        let Some(slot) = subscribers.remove(&id) else {
            return;
        };
        drop(slot);

        let remaining = subscribers.len();
        if remaining == 0 {
            self.channels.remove(channel);
        }

        match reason {
            Removal::SlowConsumer => {
                self.counters.slow_disconnects += 1;
                tracing::warn!(
                    subscription = %id,
                    channel = %channel,
                    capacity = self.config.queue_capacity,
                    "Slow consumer disconnected, queue full"
                );
            }
            Removal::Unsubscribed | Removal::ReaderGone => {
                self.counters.unsubscribes += 1;
                tracing::debug!(
                    subscription = %id,
                    channel = %channel,
                    reason = ?reason,
                    subscribers = remaining,
                    "Subscriber removed"
                );
            }
        }
    }

    fn channel_stats(&self, channel: &str) -> Option<ChannelStats> {
        let subscriber_count = self.channels.get(channel).map_or(0, HashMap::len);
        let has_replay_source = self.sources.contains_key(channel);

        if subscriber_count == 0 && !has_replay_source {
            return None;
        }

        Some(ChannelStats {
            channel: channel.to_string(),
            subscriber_count,
            has_replay_source,
        })
    }

    /// Close every queue; readers drain what is left and then see the end
    fn close_all(&mut self) {
        let closed: usize = self.channels.drain().map(|(_, subs)| subs.len()).sum();
        self.sources.clear();

        tracing::info!(subscriptions_closed = closed, "Broker stopped");
    }
}
