//! Script listeners attached to native events
//!
//! Each (sender, event, listener identity) triple owns at most one native
//! subscription. Subscribing again returns the existing token. Native events
//! are marshalled with the event's declared argument type and delivered with
//! a `"sender"` entry naming the source. Arguments that are not a mapping, or
//! that have a `sender` field of their own, are nested under `"value"`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::json;
use tether_sdk::{
    EventDescriptor, EventHandler, NativeValue, ObjectRef, SubscriptionToken, TypeDescriptor,
};

use crate::error::{BridgeError, BridgeResult};
use crate::instances::InstanceHandle;
use crate::invoke::guarded;
use crate::marshal::{Marshaller, VALUE_KEY};
use crate::ScriptValue;

/// Key naming the event source in a delivered payload
pub const SENDER_KEY: &str = "sender";

/// Script-side event callback
pub type ListenerFn = Arc<dyn Fn(ScriptValue) + Send + Sync>;

/// A script listener: identity plus callback.
///
/// Identity decides listener equality; two listeners with the same identity
/// are the same listener.
#[derive(Clone)]
pub struct Listener {
    identity: String,
    callback: ListenerFn,
}

impl Listener {
    /// Create a listener
    pub fn new(
        identity: impl Into<String>,
        callback: impl Fn(ScriptValue) + Send + Sync + 'static,
    ) -> Self {
        Self {
            identity: identity.into(),
            callback: Arc::new(callback),
        }
    }

    /// Listener identity
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Token identifying one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

impl ListenerToken {
    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Source of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSender {
    /// Static event of a type, by script name
    Static(String),
    /// Event of a live instance
    Instance(InstanceHandle),
}

impl EventSender {
    fn is_static(&self) -> bool {
        matches!(self, EventSender::Static(_))
    }

    /// Script form placed under `"sender"`
    pub fn to_script(&self) -> ScriptValue {
        match self {
            EventSender::Static(type_name) => ScriptValue::String(type_name.clone()),
            EventSender::Instance(handle) => handle.to_script(),
        }
    }
}

struct Registration {
    event: String,
    identity: String,
    token: ListenerToken,
    /// `None` while the native subscription is being made
    subscription: Option<SubscriptionToken>,
    descriptor: Arc<EventDescriptor>,
    receiver: Option<ObjectRef>,
}

impl Registration {
    fn matches(&self, event: &str, identity: &str) -> bool {
        self.event == event && self.identity == identity
    }

    fn detach(self) -> BridgeResult<()> {
        let Some(subscription) = self.subscription else {
            return Ok(());
        };
        guarded(|| (self.descriptor.unsubscribe)(self.receiver.as_ref(), subscription))
            .map_err(BridgeError::NativeFailure)
    }
}

/// Registry of script listeners on native events
pub struct EventBridge {
    marshaller: Arc<Marshaller>,
    table: RwLock<FxHashMap<EventSender, Vec<Registration>>>,
    next_token: AtomicU64,
}

impl EventBridge {
    /// Create an event bridge marshalling through `marshaller`
    pub fn new(marshaller: Arc<Marshaller>) -> Self {
        Self {
            marshaller,
            table: RwLock::new(FxHashMap::default()),
            next_token: AtomicU64::new(1),
        }
    }

    fn event<'a>(
        descriptor: &'a TypeDescriptor,
        sender: &EventSender,
        event: &str,
    ) -> BridgeResult<&'a Arc<EventDescriptor>> {
        descriptor.event(event, sender.is_static()).ok_or_else(|| {
            BridgeError::MemberNotFound(format!(
                "{} has no {}event named '{}'",
                descriptor.native_name,
                if sender.is_static() { "static " } else { "" },
                event
            ))
        })
    }

    /// Attach `listener` to a native event.
    ///
    /// `receiver` is the live object for instance events and `None` for static
    /// events. The registration is reserved before the native subscription is
    /// made, so concurrent callers with the same identity share one
    /// subscription.
    pub fn subscribe(
        &self,
        sender: EventSender,
        descriptor: &TypeDescriptor,
        event: &str,
        receiver: Option<ObjectRef>,
        listener: Listener,
    ) -> BridgeResult<ListenerToken> {
        let event_descriptor = Self::event(descriptor, &sender, event)?.clone();
        let token = {
            let mut table = self.table.write();
            let registrations = table.entry(sender.clone()).or_default();
            if let Some(existing) = registrations
                .iter()
                .find(|r| r.matches(event, &listener.identity))
            {
                tracing::debug!(event, listener = %listener.identity, "listener already attached");
                return Ok(existing.token);
            }
            let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
            registrations.push(Registration {
                event: event.to_string(),
                identity: listener.identity.clone(),
                token,
                subscription: None,
                descriptor: event_descriptor.clone(),
                receiver: receiver.clone(),
            });
            token
        };

        // The native subscription happens outside the table lock
        let handler = self.handler(&sender, &event_descriptor, listener.callback.clone());
        let attached = guarded(|| (event_descriptor.subscribe)(receiver.as_ref(), handler));

        let mut table = self.table.write();
        let subscription = match attached {
            Ok(subscription) => subscription,
            Err(e) => {
                if let Some(registrations) = table.get_mut(&sender) {
                    registrations.retain(|r| r.token != token);
                    if registrations.is_empty() {
                        table.remove(&sender);
                    }
                }
                return Err(BridgeError::NativeFailure(e));
            }
        };
        if let Some(registration) = table
            .get_mut(&sender)
            .and_then(|registrations| registrations.iter_mut().find(|r| r.token == token))
        {
            registration.subscription = Some(subscription);
            tracing::debug!(
                event,
                sender = ?sender,
                listener = %listener.identity,
                token = token.0,
                "attached listener"
            );
            return Ok(token);
        }
        drop(table);

        // Removed while the native subscription was being made
        let orphan = Registration {
            event: event.to_string(),
            identity: listener.identity,
            token,
            subscription: Some(subscription),
            descriptor: event_descriptor,
            receiver,
        };
        orphan.detach()?;
        Ok(token)
    }

    /// Detach the listener with `identity` from a native event.
    ///
    /// Removing a listener that is not attached is a no-op.
    pub fn unsubscribe(
        &self,
        sender: &EventSender,
        descriptor: &TypeDescriptor,
        event: &str,
        identity: &str,
    ) -> BridgeResult<()> {
        Self::event(descriptor, sender, event)?;
        let removed = {
            let mut table = self.table.write();
            let Some(registrations) = table.get_mut(sender) else {
                tracing::warn!(event, listener = identity, "no listener to remove");
                return Ok(());
            };
            let removed = registrations
                .iter()
                .position(|r| r.matches(event, identity))
                .map(|index| registrations.remove(index));
            if registrations.is_empty() {
                table.remove(sender);
            }
            removed
        };
        match removed {
            Some(registration) => {
                tracing::debug!(event, listener = identity, "detached listener");
                registration.detach()
            }
            None => {
                tracing::warn!(event, listener = identity, "no listener to remove");
                Ok(())
            }
        }
    }

    /// Detach every listener of an instance; returns how many were attached
    pub fn unsubscribe_instance(&self, handle: &InstanceHandle) -> BridgeResult<usize> {
        let registrations = self
            .table
            .write()
            .remove(&EventSender::Instance(handle.clone()))
            .unwrap_or_default();
        let count = registrations.len();
        let mut first_error = None;
        for registration in registrations {
            if let Err(e) = registration.detach() {
                tracing::error!(instance = %handle, error = %e, "failed to detach listener");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    /// Detach every listener
    pub fn clear(&self) -> usize {
        let drained: Vec<Registration> = self
            .table
            .write()
            .drain()
            .flat_map(|(_, registrations)| registrations)
            .collect();
        let count = drained.len();
        for registration in drained {
            if let Err(e) = registration.detach() {
                tracing::warn!(error = %e, "failed to detach listener during teardown");
            }
        }
        count
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.table.read().values().map(Vec::len).sum()
    }

    fn handler(
        &self,
        sender: &EventSender,
        event: &EventDescriptor,
        callback: ListenerFn,
    ) -> EventHandler {
        let marshaller: Weak<Marshaller> = Arc::downgrade(&self.marshaller);
        let sender = sender.to_script();
        let args_type = event.args.clone();
        let event_name = event.name.clone();
        Arc::new(move |_source: Option<ObjectRef>, args: NativeValue| {
            let Some(marshaller) = marshaller.upgrade() else {
                return;
            };
            match marshaller.to_script(&args, &args_type) {
                Ok(payload) => callback(event_payload(sender.clone(), payload)),
                Err(e) => tracing::error!(
                    event = %event_name,
                    error = %e,
                    "dropping event whose arguments failed to marshal"
                ),
            }
        })
    }
}

/// Mappings gain a `"sender"` entry; anything else, or a mapping that
/// already has one, is wrapped as `{"sender", "value"}`
fn event_payload(sender: ScriptValue, payload: ScriptValue) -> ScriptValue {
    match payload {
        ScriptValue::Object(mut fields) if !fields.contains_key(SENDER_KEY) => {
            fields.insert(SENDER_KEY.to_string(), sender);
            ScriptValue::Object(fields)
        }
        other => json!({ SENDER_KEY: sender, VALUE_KEY: other }),
    }
}
