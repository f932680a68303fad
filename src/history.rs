//! In-memory event history for reconnecting clients
//!
//! When a client reconnects with a `Last-Event-ID`, it needs every event it
//! missed since that id. [`MemoryHistory`] keeps the most recent events of
//! each channel and serves them as a [`ReplaySource`].
//!
//! Each channel's buffer is bounded by event count and by payload bytes;
//! the oldest events are evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::broker::item::{Event, OutboundItem};
use crate::broker::replay::{ReplaySource, ReplayStream};

/// Default number of events kept per channel
pub const DEFAULT_MAX_EVENTS: usize = 1024;

/// Default payload bytes kept per channel (4MB)
pub const DEFAULT_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Bounded history of one channel
#[derive(Debug)]
pub struct HistoryBuffer {
    /// Maximum number of events
    max_events: usize,
    /// Maximum total payload size in bytes
    max_bytes: usize,
    /// Current total payload size in bytes
    current_bytes: usize,
    /// Events, oldest first
    events: VecDeque<Arc<Event>>,
}

impl HistoryBuffer {
    /// Create a buffer with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_EVENTS, DEFAULT_MAX_BYTES)
    }

    /// Create a buffer with the given limits
    pub fn with_limits(max_events: usize, max_bytes: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            max_bytes,
            current_bytes: 0,
            events: VecDeque::new(),
        }
    }

    /// Append an event, evicting the oldest as needed
    ///
    /// Returns false if the event alone exceeds the byte limit.
    pub fn push(&mut self, event: Arc<Event>) -> bool {
        let size = event.data.len();
        if size > self.max_bytes {
            return false;
        }

        while self.events.len() >= self.max_events
            || (self.current_bytes + size > self.max_bytes && !self.events.is_empty())
        {
            if let Some(old) = self.events.pop_front() {
                self.current_bytes -= old.data.len();
            }
        }

        self.events.push_back(event);
        self.current_bytes += size;
        true
    }

    /// Events after the one with id `last_event_id`
    ///
    /// An empty or unknown id returns everything buffered: the client is
    /// either new or further behind than the buffer reaches.
    pub fn since(&self, last_event_id: &str) -> Vec<Arc<Event>> {
        let start = if last_event_id.is_empty() {
            0
        } else {
            self.events
                .iter()
                .rposition(|ev| ev.id == last_event_id)
                .map_or(0, |pos| pos + 1)
        };

        self.events.iter().skip(start).cloned().collect()
    }

    /// Id of the most recent event that has one
    pub fn latest_id(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .map(|ev| ev.id.as_str())
            .find(|id| !id.is_empty())
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total buffered payload size in bytes
    pub fn size(&self) -> usize {
        self.current_bytes
    }

    /// Drop all buffered events
    pub fn clear(&mut self) {
        self.events.clear();
        self.current_bytes = 0;
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel in-memory history, usable as a replay source
///
/// Cloning is cheap; clones share the same buffers. Register one clone with
/// the broker and record published events through another.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    channels: Arc<RwLock<HashMap<String, HistoryBuffer>>>,
    max_events: usize,
    max_bytes: usize,
}

impl MemoryHistory {
    /// Create a history with default per-channel limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_EVENTS, DEFAULT_MAX_BYTES)
    }

    /// Create a history with custom per-channel limits
    pub fn with_limits(max_events: usize, max_bytes: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            max_events,
            max_bytes,
        }
    }

    /// Record an event on a channel
    pub async fn record(&self, channel: impl Into<String>, event: impl Into<Arc<Event>>) -> bool {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.into())
            .or_insert_with(|| HistoryBuffer::with_limits(self.max_events, self.max_bytes))
            .push(event.into())
    }

    /// Number of events buffered for a channel
    pub async fn len(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, HistoryBuffer::len)
    }

    /// Id of the most recent event on a channel
    pub async fn latest_id(&self, channel: &str) -> Option<String> {
        self.channels
            .read()
            .await
            .get(channel)
            .and_then(|buffer| buffer.latest_id().map(str::to_string))
    }

    /// Forget a channel's history
    pub async fn clear(&self, channel: &str) {
        self.channels.write().await.remove(channel);
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaySource for MemoryHistory {
    fn replay(&self, channel: &str, last_event_id: &str) -> ReplayStream {
        let channels = Arc::clone(&self.channels);
        let channel = channel.to_string();
        let last_event_id = last_event_id.to_string();

        // Snapshot on first poll, on the dispatcher's task
        stream::once(async move {
            let events = channels
                .read()
                .await
                .get(&channel)
                .map(|buffer| buffer.since(&last_event_id))
                .unwrap_or_default();
            stream::iter(events.into_iter().map(OutboundItem::from))
        })
        .flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, size: usize) -> Arc<Event> {
        Arc::new(Event::new(vec![b'x'; size]).with_id(id))
    }

    fn ids(events: &[Arc<Event>]) -> Vec<&str> {
        events.iter().map(|ev| ev.id.as_str()).collect()
    }

    #[test]
    fn test_buffer_basic() {
        let mut buffer = HistoryBuffer::new();
        assert!(buffer.is_empty());

        buffer.push(event("1", 10));
        buffer.push(event("2", 10));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size(), 20);
        assert_eq!(buffer.latest_id(), Some("2"));
    }

    #[test]
    fn test_buffer_event_limit() {
        let mut buffer = HistoryBuffer::with_limits(2, 1024);

        buffer.push(event("1", 1));
        buffer.push(event("2", 1));
        buffer.push(event("3", 1));

        assert_eq!(ids(&buffer.since("")), vec!["2", "3"]);
    }

    #[test]
    fn test_buffer_size_limit() {
        let mut buffer = HistoryBuffer::with_limits(100, 500);

        buffer.push(event("1", 200));
        buffer.push(event("2", 200));

        // Evicts the oldest to make room (200 + 200 < 500)
        assert!(buffer.push(event("3", 200)));
        assert_eq!(ids(&buffer.since("")), vec!["2", "3"]);
        assert_eq!(buffer.size(), 400);

        // Single event larger than the limit is rejected
        assert!(!buffer.push(event("4", 600)));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_since() {
        let mut buffer = HistoryBuffer::new();
        for id in ["1", "2", "3", "4"] {
            buffer.push(event(id, 1));
        }

        assert_eq!(ids(&buffer.since("2")), vec!["3", "4"]);
        assert!(buffer.since("4").is_empty());
        assert_eq!(ids(&buffer.since("")), vec!["1", "2", "3", "4"]);
        // Unknown id: client is further behind than the buffer
        assert_eq!(ids(&buffer.since("0")), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = HistoryBuffer::new();
        buffer.push(event("1", 10));
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.latest_id(), None);
    }

    #[tokio::test]
    async fn test_memory_history_replay() {
        let history = MemoryHistory::new();
        for id in ["1", "2", "3"] {
            history.record("news", Event::new("x").with_id(id)).await;
        }
        history.record("sport", Event::new("y").with_id("9")).await;

        let replayed: Vec<OutboundItem> = history.replay("news", "1").collect().await;
        let tokens: Vec<_> = replayed.iter().filter_map(OutboundItem::resume_token).collect();
        assert_eq!(tokens, vec!["2", "3"]);

        assert_eq!(history.len("news").await, 3);
        assert_eq!(history.latest_id("sport").await.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_memory_history_unknown_channel() {
        let history = MemoryHistory::new();

        let replayed: Vec<OutboundItem> = history.replay("nothing", "1").collect().await;
        assert!(replayed.is_empty());
    }

    #[tokio::test]
    async fn test_replay_snapshot_is_lazy() {
        let history = MemoryHistory::new();
        let stream = history.replay("news", "");

        // Recorded after the stream was created but before it was polled
        history.record("news", Event::new("x").with_id("1")).await;

        let replayed: Vec<OutboundItem> = stream.collect().await;
        assert_eq!(replayed.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_buffers() {
        let history = MemoryHistory::with_limits(2, 1024);
        let other = history.clone();

        other.record("news", Event::new("a").with_id("1")).await;
        other.record("news", Event::new("b").with_id("2")).await;
        other.record("news", Event::new("c").with_id("3")).await;

        assert_eq!(history.len("news").await, 2);
        history.clear("news").await;
        assert_eq!(other.len("news").await, 0);
    }
}
