//! Channel broker for event fan-out
//!
//! The broker routes items from publishers to every subscriber of a channel
//! and replays missed history to reconnecting subscribers.
//!
//! # Architecture
//!
//! ```text
//!       Broker (handle)                      BrokerCore (one task)
//!   ┌──────────────────────┐            ┌──────────────────────────────┐
//!   │ register()           │            │ channels: HashMap<channel,   │
//!   │ subscribe()          │  Command   │   HashMap<id, Slot { tx }>>  │
//!   │ publish()            ├───────────►│ sources: HashMap<channel,    │
//!   │ close()              │ (unbounded)│   Arc<dyn ReplaySource>>     │
//!   └──────────────────────┘            └──────────────┬───────────────┘
//!                                                      │ try_send (drop on full)
//!              ┌──────────────────┐                    ▼
//!              │ replay dispatcher├─ send ──► [bounded queue] ──► Subscription::recv()
//!              └──────────────────┘                                   │
//!                                                                     ▼
//!                                                               writer loop ──► client
//! ```
//!
//! # Backpressure
//!
//! Live publishing never waits on a subscriber. A subscriber whose queue is
//! full when an item arrives is removed and its queue closed; it reads what
//! was already queued and then sees the end of the stream.

pub mod config;
pub mod handle;
pub mod item;
pub mod replay;
pub mod subscription;

mod command;
mod core;

pub use config::BrokerConfig;
pub use handle::Broker;
pub use item::{Event, OutboundItem};
pub use replay::{ReplaySource, ReplayStream};
pub use subscription::{Subscription, SubscriptionId};
