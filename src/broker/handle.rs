//! Public broker API
//!
//! Every call here is a hand-off into the core's request stream. Calls from
//! one task are processed in the order they were made.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::stats::{BrokerStats, ChannelStats};

use super::command::Command;
use super::config::BrokerConfig;
use super::core::BrokerCore;
use super::item::{Event, OutboundItem};
use super::replay::ReplaySource;
use super::subscription::{Subscription, SubscriptionId};

/// Publish/subscribe broker for event streams
///
/// Must be created inside a tokio runtime: construction spawns the core
/// task. Share it between tasks with `Arc<Broker>`.
///
/// # Example
/// ```no_run
/// use sse_broker::{Broker, Event};
///
/// # async fn example() -> sse_broker::Result<()> {
/// let broker = Broker::new();
/// let mut sub = broker.subscribe("news", "")?;
///
/// broker.publish(["news"], Event::new("hello").with_id("1"))?;
///
/// while let Some(item) = sub.recv().await {
///     println!("{:?}", item);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Broker {
    config: BrokerConfig,
    commands: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    closed: AtomicBool,
    core: Mutex<Option<JoinHandle<()>>>,
}

impl Broker {
    /// Create a broker with default configuration
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Create a broker with custom configuration
    pub fn with_config(config: BrokerConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let core = tokio::spawn(BrokerCore::new(config.clone()).run(rx));

        Self {
            config,
            commands,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            core: Mutex::new(Some(core)),
        }
    }

    /// Get the broker configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Register the replay source for a channel
    ///
    /// Replaces any source previously registered for the channel.
    pub fn register<S>(&self, channel: impl Into<String>, source: S) -> Result<()>
    where
        S: ReplaySource,
    {
        self.send(Command::Register {
            channel: channel.into(),
            source: Arc::new(source),
        })
    }

    /// Publish an event to one or more channels
    pub fn publish<I, C>(&self, channels: I, event: Event) -> Result<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.publish_item(channels, OutboundItem::from(event))
    }

    /// Publish a comment to one or more channels
    pub fn publish_comment<I, C>(&self, channels: I, text: impl Into<String>) -> Result<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.publish_item(channels, OutboundItem::comment(text))
    }

    /// Publish an already-built item to one or more channels
    ///
    /// Delivery is best effort: subscribers whose queue is full are
    /// disconnected instead of receiving the item.
    pub fn publish_item<I, C>(&self, channels: I, item: OutboundItem) -> Result<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.send(Command::Publish {
            channels: channels.into_iter().map(Into::into).collect(),
            item,
        })
    }

    /// Subscribe to a channel
    ///
    /// A non-empty `last_event_id` (or the `replay_all` option) replays
    /// history from the channel's replay source before live items catch up.
    ///
    /// Returns [`Error::Closed`] once the broker is shut down. A subscribe
    /// racing with a concurrent [`close`](Self::close) may instead return a
    /// subscription whose queue is already closed.
    pub fn subscribe(
        &self,
        channel: impl Into<String>,
        last_event_id: impl Into<String>,
    ) -> Result<Subscription> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (subscription, slot) = Subscription::pair(
            id,
            channel.into(),
            last_event_id.into(),
            self.config.queue_capacity,
            self.commands.clone(),
        );

        self.send(Command::Subscribe(slot))?;
        Ok(subscription)
    }

    /// Detach a subscription
    ///
    /// Same as [`Subscription::unsubscribe`]; safe to call repeatedly.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    /// Snapshot broker-wide statistics
    pub async fn stats(&self) -> Result<BrokerStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats(reply))?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Snapshot one channel, `None` if nothing references it
    pub async fn channel_stats(&self, channel: impl Into<String>) -> Result<Option<ChannelStats>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ChannelStats {
            channel: channel.into(),
            reply,
        })?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Check if the broker has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the broker down permanently
    ///
    /// Requests made before this call are processed first. Every active
    /// subscription's queue is then closed and the core stops. Returns once
    /// the core has stopped; calling it again is a no-op.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Broker shutdown requested");
            let _ = self.commands.send(Command::Shutdown);
        }

        // Held across the await so concurrent callers also wait for the core
        let mut core = self.core.lock().await;
        if let Some(handle) = core.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Broker core task failed");
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.commands.send(command).map_err(|_| Error::Closed)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        // Live subscriptions keep the command channel open, so stop the core
        // explicitly
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}
