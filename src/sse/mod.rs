//! Server-sent events transport helpers
//!
//! These sit outside the broker core: they turn a [`Subscription`] into
//! bytes on a client connection. Any HTTP stack can use them.
//!
//! - Frame encoding (`text/event-stream` wire format)
//! - Response headers, including CORS and gzip negotiation
//! - Incremental gzip body compression
//! - The per-connection writer loop
//!
//! [`Subscription`]: crate::broker::Subscription

pub mod encoder;
pub mod gzip;
pub mod headers;
pub mod writer;

pub use encoder::{encode, EventEncoder};
pub use gzip::GzipFramer;
pub use headers::{accepts_gzip, response_headers, BodyEncoding, CONTENT_TYPE, LAST_EVENT_ID};
pub use writer::{stream_events, StreamEnd};
