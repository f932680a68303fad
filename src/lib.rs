//! In-process publish/subscribe broker for server-sent event streams
//!
//! Publishers push events into named channels; every subscriber of a channel
//! receives them in publish order through its own bounded queue. Clients
//! that reconnect with a `Last-Event-ID` get the events they missed from a
//! per-channel replay source.
//!
//! - [`broker`]: the broker core, subscriptions and replay dispatch
//! - [`sse`]: wire encoding, response headers and the per-connection writer
//! - [`history`]: bounded in-memory replay source
//! - [`stats`]: broker counters
//!
//! # Example
//! ```no_run
//! use sse_broker::history::MemoryHistory;
//! use sse_broker::{Broker, Event};
//!
//! # async fn example() -> sse_broker::Result<()> {
//! let broker = Broker::new();
//! let history = MemoryHistory::new();
//! broker.register("news", history.clone())?;
//!
//! let event = Event::new("breaking").with_id("1");
//! history.record("news", event.clone()).await;
//! broker.publish(["news"], event)?;
//!
//! // A client that last saw nothing on "news" catches up, then goes live
//! let mut sub = broker.subscribe("news", "0")?;
//! let item = sub.recv().await;
//! # let _ = item;
//! broker.close().await;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod error;
pub mod history;
pub mod sse;
pub mod stats;

pub use broker::{
    Broker, BrokerConfig, Event, OutboundItem, ReplaySource, ReplayStream, Subscription,
    SubscriptionId,
};
pub use error::{Error, Result};
pub use stats::{BrokerStats, ChannelStats};
