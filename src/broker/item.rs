//! Outbound item types
//!
//! This module defines the units of data fanned out to subscribers: events
//! carrying an application payload and comments used as keep-alives.

use std::sync::Arc;

use bytes::Bytes;

/// An application event delivered to subscribers
///
/// The `id` is sent to clients with the event and comes back as the
/// `Last-Event-ID` resume token when they reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// Event identifier (empty = no id sent)
    pub id: String,
    /// Event type name (empty = default "message" type)
    pub event: String,
    /// Payload (zero-copy via reference counting)
    pub data: Bytes,
}

impl Event {
    /// Create an event with the given payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            id: String::new(),
            event: String::new(),
            data: data.into(),
        }
    }

    /// Set the event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the event type name
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }
}

/// An item queued for delivery to a subscriber
///
/// Cheap to clone: fan-out to N subscribers shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundItem {
    /// Application event
    Event(Arc<Event>),
    /// Keep-alive or diagnostic comment, no resume semantics
    Comment(Arc<str>),
}

impl OutboundItem {
    /// Create a comment item
    pub fn comment(text: impl Into<String>) -> Self {
        OutboundItem::Comment(Arc::from(text.into()))
    }

    /// Check if this is an event
    pub fn is_event(&self) -> bool {
        matches!(self, OutboundItem::Event(_))
    }

    /// Check if this is a comment
    pub fn is_comment(&self) -> bool {
        matches!(self, OutboundItem::Comment(_))
    }

    /// Get the event, if this is one
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            OutboundItem::Event(ev) => Some(ev),
            OutboundItem::Comment(_) => None,
        }
    }

    /// Resume token a client would hold after receiving this item
    pub fn resume_token(&self) -> Option<&str> {
        self.as_event()
            .map(|ev| ev.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

impl From<Event> for OutboundItem {
    fn from(ev: Event) -> Self {
        OutboundItem::Event(Arc::new(ev))
    }
}

impl From<Arc<Event>> for OutboundItem {
    fn from(ev: Arc<Event>) -> Self {
        OutboundItem::Event(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let ev = Event::new("hello").with_id("42").with_event("greeting");

        assert_eq!(ev.id, "42");
        assert_eq!(ev.event, "greeting");
        assert_eq!(ev.data, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_item_kinds() {
        let ev: OutboundItem = Event::new("x").with_id("1").into();
        let comment = OutboundItem::comment("ping");

        assert!(ev.is_event());
        assert!(!ev.is_comment());
        assert!(comment.is_comment());
        assert!(comment.as_event().is_none());
    }

    #[test]
    fn test_resume_token() {
        let with_id: OutboundItem = Event::new("x").with_id("7").into();
        let without_id: OutboundItem = Event::new("x").into();

        assert_eq!(with_id.resume_token(), Some("7"));
        assert_eq!(without_id.resume_token(), None);
        assert_eq!(OutboundItem::comment("c").resume_token(), None);
    }

    #[test]
    fn test_clone_shares_payload() {
        let item: OutboundItem = Event::new(vec![1u8; 1024]).into();
        let copy = item.clone();

        match (&item, &copy) {
            (OutboundItem::Event(a), OutboundItem::Event(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected events"),
        }
    }
}
