//! Native event sources
//!
//! An [`EventSource`] is the multicast delegate a native type embeds for each
//! event it exposes. The bridge attaches handlers through the type's
//! [`EventDescriptor`](crate::EventDescriptor) and the native code raises the
//! event with [`EventSource::raise`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{NativeValue, ObjectRef};

/// Handler attached to a native event: receives the sender (absent for static
/// events) and the event argument.
pub type EventHandler = Arc<dyn Fn(Option<ObjectRef>, NativeValue) + Send + Sync>;

/// Token identifying one native subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    /// Create a token from a raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct EventSourceInner {
    handlers: Mutex<Vec<(SubscriptionToken, EventHandler)>>,
    next_token: AtomicU64,
}

/// Cloneable multicast event source.
///
/// Clones share the same handler list.
#[derive(Clone, Default)]
pub struct EventSource {
    inner: Arc<EventSourceInner>,
}

impl EventSource {
    /// Create an event source with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler
    pub fn add(&self, handler: EventHandler) -> SubscriptionToken {
        let token = SubscriptionToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.handlers.lock().push((token, handler));
        token
    }

    /// Detach a handler, returning whether it was attached
    pub fn remove(&self, token: SubscriptionToken) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(t, _)| *t != token);
        handlers.len() != before
    }

    /// Raise the event.
    ///
    /// Handlers run in attachment order on the calling thread, outside the
    /// handler lock, so a handler may attach or detach handlers.
    pub fn raise(&self, sender: Option<&ObjectRef>, args: NativeValue) {
        let snapshot: Vec<EventHandler> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in snapshot {
            handler(sender.cloned(), args.clone());
        }
    }

    /// Number of attached handlers
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_in_attachment_order() {
        let source = EventSource::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            source.add(Arc::new(move |_, _| seen.lock().push(tag)));
        }
        source.raise(None, NativeValue::Null);
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_remove_handler() {
        let source = EventSource::new();
        let token = source.add(Arc::new(|_, _| {}));
        assert_eq!(source.handler_count(), 1);
        assert!(source.remove(token));
        assert!(!source.remove(token));
        assert_eq!(source.handler_count(), 0);
    }

    #[test]
    fn test_handler_can_detach_during_raise() {
        let source = EventSource::new();
        let token = Arc::new(Mutex::new(None));
        let inner_source = source.clone();
        let inner_token = token.clone();
        let id = source.add(Arc::new(move |_, _| {
            if let Some(t) = *inner_token.lock() {
                inner_source.remove(t);
            }
        }));
        *token.lock() = Some(id);
        source.raise(None, NativeValue::Null);
        assert_eq!(source.handler_count(), 0);
    }
}
