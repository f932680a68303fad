//! Subscription handle and its broker-side slot
//!
//! A subscription is split in two when it is created:
//!
//! - [`Subscription`] is returned to the caller and owns the read side of the
//!   output queue.
//! - [`Slot`] is handed to the broker core and owns the write side, plus the
//!   guard that keeps a replay dispatcher running.
//!
//! Dropping the slot is the only way a queue gets closed, and the core only
//! drops it while removing it from the fan-out set.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use super::command::Command;
use super::item::OutboundItem;

/// Broker-unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(super) u64);

impl SubscriptionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Write side of a subscription, owned by the broker core
pub(super) struct Slot {
    pub(super) id: SubscriptionId,
    pub(super) channel: String,
    pub(super) last_event_id: String,
    pub(super) tx: mpsc::Sender<OutboundItem>,
    /// Held while a replay dispatcher runs; dropping it stops the replay
    pub(super) replay_guard: Option<oneshot::Sender<()>>,
}

/// A consumer attached to one channel
///
/// Read items with [`recv`](Self::recv) until it returns `None`, which means
/// the broker closed the queue (unsubscribed, fell behind, or shut down).
/// Items already queued before the close are still delivered.
///
/// Dropping the handle unsubscribes it.
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    last_event_id: String,
    rx: mpsc::Receiver<OutboundItem>,
    commands: mpsc::UnboundedSender<Command>,
    detached: AtomicBool,
}

impl Subscription {
    /// Create a subscription and the slot the core stores for it
    pub(super) fn pair(
        id: SubscriptionId,
        channel: String,
        last_event_id: String,
        capacity: usize,
        commands: mpsc::UnboundedSender<Command>,
    ) -> (Self, Slot) {
        let (tx, rx) = mpsc::channel(capacity);

        let slot = Slot {
            id,
            channel: channel.clone(),
            last_event_id: last_event_id.clone(),
            tx,
            replay_guard: None,
        };

        let subscription = Self {
            id,
            channel,
            last_event_id,
            rx,
            commands,
            detached: AtomicBool::new(false),
        };

        (subscription, slot)
    }

    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel this subscription is bound to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Resume token supplied at subscribe time (empty = none)
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Receive the next item
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<OutboundItem> {
        self.rx.recv().await
    }

    /// Receive the next item without waiting
    pub fn try_recv(&mut self) -> Result<OutboundItem, TryRecvError> {
        self.rx.try_recv()
    }

    /// Detach from the broker
    ///
    /// Safe to call any number of times, and after the broker already
    /// removed the subscription.
    pub fn unsubscribe(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }

        // The core may already be gone; nothing left to detach from then
        let _ = self.commands.send(Command::Unsubscribe {
            id: self.id,
            channel: self.channel.clone(),
        });
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("last_event_id", &self.last_event_id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::item::Event;

    fn pair(capacity: usize) -> (Subscription, Slot, mpsc::UnboundedReceiver<Command>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (sub, slot) = Subscription::pair(
            SubscriptionId(7),
            "news".to_string(),
            "41".to_string(),
            capacity,
            commands,
        );
        (sub, slot, rx)
    }

    #[test]
    fn test_id_display() {
        assert_eq!(SubscriptionId(3).to_string(), "sub-3");
        assert_eq!(SubscriptionId(3).as_u64(), 3);
    }

    #[test]
    fn test_pair_fields() {
        let (sub, slot, _rx) = pair(4);

        assert_eq!(sub.id(), slot.id);
        assert_eq!(sub.channel(), "news");
        assert_eq!(slot.channel, "news");
        assert_eq!(sub.last_event_id(), "41");
        assert!(slot.replay_guard.is_none());
    }

    #[tokio::test]
    async fn test_queue_is_bounded() {
        let (mut sub, slot, _rx) = pair(1);

        slot.tx.try_send(Event::new("a").into()).unwrap();
        assert!(slot.tx.try_send(Event::new("b").into()).is_err());

        let item = sub.recv().await.unwrap();
        assert_eq!(item.as_event().unwrap().data, "a");
    }

    #[tokio::test]
    async fn test_dropping_slot_closes_after_drain() {
        let (mut sub, slot, _rx) = pair(4);

        slot.tx.try_send(Event::new("a").into()).unwrap();
        drop(slot);

        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_unsubscribe_sends_once() {
        let (sub, _slot, mut rx) = pair(4);

        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert!(matches!(
            rx.try_recv(),
            Ok(Command::Unsubscribe { id: SubscriptionId(7), .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (sub, _slot, mut rx) = pair(4);

        drop(sub);

        assert!(matches!(rx.try_recv(), Ok(Command::Unsubscribe { .. })));
    }

    #[test]
    fn test_unsubscribe_without_core() {
        let (sub, _slot, rx) = pair(4);
        drop(rx);

        // Must not panic when the core is gone
        sub.unsubscribe();
    }
}
