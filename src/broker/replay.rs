//! Replay sources and the replay dispatcher
//!
//! A reconnecting client sends the id of the last event it saw. If a replay
//! source is registered for its channel, a dispatcher task pulls the missed
//! items from the source and pushes them into the subscription's queue.
//!
//! Unlike live fan-out, replay uses a waiting send: it is catch-up traffic
//! and has no publisher to stall. The dispatcher runs on its own task so a
//! large replay never holds up the broker core.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::item::OutboundItem;
use super::subscription::SubscriptionId;

/// Lazy, finite sequence of historical items
pub type ReplayStream = BoxStream<'static, OutboundItem>;

/// Provider of historical items for a channel
///
/// The returned stream must end once it has caught up; the broker never
/// polls a source twice for the same subscription.
///
/// Closures of the form `Fn(&str, &str) -> ReplayStream` implement this
/// trait.
pub trait ReplaySource: Send + Sync + 'static {
    /// Items on `channel` published after `last_event_id`
    ///
    /// `last_event_id` is empty when the broker replays everything.
    fn replay(&self, channel: &str, last_event_id: &str) -> ReplayStream;
}

impl<F> ReplaySource for F
where
    F: Fn(&str, &str) -> ReplayStream + Send + Sync + 'static,
{
    fn replay(&self, channel: &str, last_event_id: &str) -> ReplayStream {
        self(channel, last_event_id)
    }
}

/// Everything a dispatcher needs, detached from the core
pub(super) struct ReplayJob {
    pub(super) id: SubscriptionId,
    pub(super) channel: String,
    pub(super) last_event_id: String,
    pub(super) source: Arc<dyn ReplaySource>,
    pub(super) tx: mpsc::Sender<OutboundItem>,
    /// Resolves when the core drops the subscription's slot
    pub(super) closed: oneshot::Receiver<()>,
}

/// Spawn a replay dispatcher
pub(super) fn spawn(job: ReplayJob) -> JoinHandle<()> {
    tokio::spawn(run(job))
}

async fn run(job: ReplayJob) {
    let ReplayJob {
        id,
        channel,
        last_event_id,
        source,
        tx,
        mut closed,
    } = job;

    let mut stream = source.replay(&channel, &last_event_id);
    let mut replayed = 0usize;

    loop {
        let item = tokio::select! {
            biased;
            _ = &mut closed => {
                tracing::debug!(
                    subscription = %id,
                    channel = %channel,
                    replayed = replayed,
                    "Replay aborted, subscription closed"
                );
                return;
            }
            item = stream.next() => item,
        };

        let Some(item) = item else {
            break;
        };

        let sent = tokio::select! {
            biased;
            _ = &mut closed => false,
            result = tx.send(item) => result.is_ok(),
        };

        if !sent {
            tracing::debug!(
                subscription = %id,
                channel = %channel,
                replayed = replayed,
                "Replay aborted, queue closed"
            );
            return;
        }

        replayed += 1;
    }

    tracing::debug!(
        subscription = %id,
        channel = %channel,
        last_event_id = %last_event_id,
        replayed = replayed,
        "Replay complete"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::broker::item::Event;

    fn items(n: usize) -> Vec<OutboundItem> {
        (1..=n)
            .map(|i| Event::new(format!("ev{}", i)).with_id(i.to_string()).into())
            .collect()
    }

    fn job(
        source: impl ReplaySource,
        capacity: usize,
    ) -> (
        ReplayJob,
        mpsc::Receiver<OutboundItem>,
        oneshot::Sender<()>,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let (guard, closed) = oneshot::channel();
        let job = ReplayJob {
            id: SubscriptionId(1),
            channel: "news".to_string(),
            last_event_id: "0".to_string(),
            source: Arc::new(source),
            tx,
            closed,
        };
        (job, rx, guard)
    }

    #[tokio::test]
    async fn test_closure_source() {
        let source = |channel: &str, last: &str| -> ReplayStream {
            let ev = Event::new(format!("{}:{}", channel, last));
            stream::iter(vec![OutboundItem::from(ev)]).boxed()
        };

        let mut replayed: Vec<_> = source.replay("news", "5").collect().await;
        assert_eq!(replayed.len(), 1);
        let item = replayed.remove(0);
        assert_eq!(item.as_event().unwrap().data, "news:5");
    }

    #[tokio::test]
    async fn test_replay_in_order() {
        let history = items(3);
        let expected = history.clone();
        let source =
            move |_: &str, _: &str| -> ReplayStream { stream::iter(history.clone()).boxed() };

        let (job, mut rx, _guard) = job(source, 8);
        spawn(job).await.unwrap();

        for want in expected {
            assert_eq!(rx.recv().await.unwrap(), want);
        }
    }

    #[tokio::test]
    async fn test_replay_blocks_on_full_queue() {
        let history = items(4);
        let source =
            move |_: &str, _: &str| -> ReplayStream { stream::iter(history.clone()).boxed() };

        let (job, mut rx, _guard) = job(source, 2);
        let handle = spawn(job);

        // Nothing is dropped while the reader catches up
        let mut seen = Vec::new();
        while seen.len() < 4 {
            seen.push(rx.recv().await.unwrap());
        }
        handle.await.unwrap();
        assert_eq!(seen, items(4));
    }

    #[tokio::test]
    async fn test_replay_stops_when_guard_dropped() {
        // A source that never ends on its own
        let source = |_: &str, _: &str| -> ReplayStream {
            stream::repeat(OutboundItem::comment("again")).boxed()
        };

        let (job, mut rx, guard) = job(source, 1);
        let handle = spawn(job);

        // Queue fills up and the dispatcher parks on send
        assert!(rx.recv().await.is_some());
        drop(guard);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_replay_stops_when_reader_gone() {
        let source = |_: &str, _: &str| -> ReplayStream {
            stream::repeat(OutboundItem::comment("again")).boxed()
        };

        let (job, rx, _guard) = job(source, 1);
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), spawn(job))
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_replay_stops_on_pending_source() {
        let source = |_: &str, _: &str| -> ReplayStream { stream::pending().boxed() };

        let (job, _rx, guard) = job(source, 1);
        let handle = spawn(job);
        drop(guard);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }
}
