//! The script-facing operation set
//!
//! [`Bridge`] owns the namespace table, type catalog, instance registry and
//! listener registry, and routes every script call through them:
//! resolve the type, select the member, convert arguments in, call native
//! code, convert the result out.
//!
//! Resolution errors are always returned synchronously. Members with a
//! deferred convention report their native outcome through the [`Reply`].

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tether_sdk::{MemberKind, NativeValue, ObjectRef, TypeDescriptor, TypeRef};

use crate::catalog::TypeCatalog;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventBridge, EventSender, Listener, ListenerToken};
use crate::instances::{InstanceHandle, InstanceRegistry};
use crate::invoke::{InvocationResolver, Reply};
use crate::marshal::{Marshaller, TYPE_KEY};
use crate::namespace::{native_member_name, NamespaceMapper};
use crate::request::BridgeRequest;
use crate::ScriptValue;

/// Receives event payloads for listeners attached through
/// [`Bridge::dispatch`], keyed by listener identity
pub type EventSink = Arc<dyn Fn(&str, ScriptValue) + Send + Sync>;

type ReplySlot = Arc<Mutex<Option<Reply>>>;

/// Script ↔ native call bridge
pub struct Bridge {
    namespaces: Arc<NamespaceMapper>,
    catalog: Arc<TypeCatalog>,
    instances: Arc<InstanceRegistry>,
    marshaller: Arc<Marshaller>,
    resolver: InvocationResolver,
    events: EventBridge,
    sink: Arc<RwLock<Option<EventSink>>>,
}

impl Bridge {
    /// Create an empty bridge
    pub fn new() -> Self {
        let namespaces = Arc::new(NamespaceMapper::new());
        let catalog = Arc::new(TypeCatalog::new());
        let instances = Arc::new(InstanceRegistry::new());
        let marshaller = Arc::new(Marshaller::new(
            namespaces.clone(),
            catalog.clone(),
            instances.clone(),
        ));
        Self {
            resolver: InvocationResolver::new(marshaller.clone()),
            events: EventBridge::new(marshaller.clone()),
            namespaces,
            catalog,
            instances,
            marshaller,
            sink: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a bridge and apply `config`
    pub fn with_config(config: &BridgeConfig) -> BridgeResult<Self> {
        let bridge = Self::new();
        bridge.apply_config(config)?;
        Ok(bridge)
    }

    /// Register the namespaces and value types of `config`
    pub fn apply_config(&self, config: &BridgeConfig) -> BridgeResult<()> {
        config.validate()?;
        for mapping in &config.namespaces {
            self.register_namespace(&mapping.namespace, &mapping.prefix)?;
        }
        for script_type in &config.value_types {
            self.register_value_type(script_type)?;
        }
        Ok(())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Map a script namespace to a native prefix
    pub fn register_namespace(&self, namespace: &str, prefix: &str) -> BridgeResult<()> {
        Ok(self.namespaces.register(namespace, prefix)?)
    }

    /// Register a native type
    pub fn register_type(&self, descriptor: TypeDescriptor) -> BridgeResult<()> {
        self.catalog.register(descriptor).map(|_| ())
    }

    /// Marshal a type by value, by script-qualified name
    pub fn register_value_type(&self, script_type: &str) -> BridgeResult<()> {
        let native_name = self.namespaces.resolve_native_name(script_type)?;
        self.marshaller.register_value_type(native_name);
        Ok(())
    }

    /// Set the receiver of events for listeners attached by [`Bridge::dispatch`]
    pub fn set_event_sink(&self, sink: impl Fn(&str, ScriptValue) + Send + Sync + 'static) {
        *self.sink.write() = Some(Arc::new(sink));
    }

    // ========================================================================
    // Static members
    // ========================================================================

    /// Read a static property
    pub fn get_static_property(&self, type_name: &str, property: &str) -> BridgeResult<ScriptValue> {
        let descriptor = self.resolve_type(type_name)?;
        let name = member_name("property", property)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Getter, &name, None, &[])?
            .call_to_script()
    }

    /// Write a static property
    pub fn set_static_property(
        &self,
        type_name: &str,
        property: &str,
        value: ScriptValue,
    ) -> BridgeResult<()> {
        let descriptor = self.resolve_type(type_name)?;
        let name = member_name("property", property)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Setter, &name, None, &[value])?
            .call()
            .map(|_| ())
    }

    /// Call a static method.
    ///
    /// Resolution and synchronous failures are returned; a returned error
    /// means `reply` was not called.
    pub fn invoke_static_method(
        &self,
        type_name: &str,
        method: &str,
        args: &[ScriptValue],
        reply: Reply,
    ) -> BridgeResult<()> {
        let descriptor = self.resolve_type(type_name)?;
        let name = member_name("method", method)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Method, &name, None, args)?
            .invoke(reply)
    }

    /// Attach a listener to a static event
    pub fn add_static_event_listener(
        &self,
        type_name: &str,
        event: &str,
        listener: Listener,
    ) -> BridgeResult<ListenerToken> {
        let (descriptor, sender) = self.static_sender(type_name)?;
        let name = member_name("event", event)?;
        self.events
            .subscribe(sender, &descriptor, &name, None, listener)
    }

    /// Detach a listener from a static event
    pub fn remove_static_event_listener(
        &self,
        type_name: &str,
        event: &str,
        identity: &str,
    ) -> BridgeResult<()> {
        let (descriptor, sender) = self.static_sender(type_name)?;
        let name = member_name("event", event)?;
        self.events.unsubscribe(&sender, &descriptor, &name, identity)
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Construct an instance and return its handle
    pub fn create_instance(
        &self,
        type_name: &str,
        args: &[ScriptValue],
    ) -> BridgeResult<InstanceHandle> {
        let descriptor = self.resolve_type(type_name)?;
        let script_type = self.namespaces.resolve_script_name(&descriptor.native_name)?;
        let constructor = self.resolver.resolve_constructor(&descriptor, args)?;
        self.instances.create(&script_type, constructor)
    }

    /// Release an instance after detaching all of its listeners.
    ///
    /// Releasing a handle twice fails with InstanceNotFound.
    pub fn release_instance(&self, instance: &ScriptValue) -> BridgeResult<()> {
        let handle = InstanceHandle::from_script(instance)?;
        self.instances.resolve(&handle)?;
        let detached = self.events.unsubscribe_instance(&handle);
        self.instances.release(&handle)?;
        if let Ok(count) = detached {
            tracing::debug!(instance = %handle, listeners = count, "released instance");
        }
        detached.map(|_| ())
    }

    /// Read an instance property
    pub fn get_property(&self, instance: &ScriptValue, property: &str) -> BridgeResult<ScriptValue> {
        let (descriptor, object) = self.resolve_instance(instance)?;
        let name = member_name("property", property)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Getter, &name, Some(object), &[])?
            .call_to_script()
    }

    /// Write an instance property
    pub fn set_property(
        &self,
        instance: &ScriptValue,
        property: &str,
        value: ScriptValue,
    ) -> BridgeResult<()> {
        let (descriptor, object) = self.resolve_instance(instance)?;
        let name = member_name("property", property)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Setter, &name, Some(object), &[value])?
            .call()
            .map(|_| ())
    }

    /// Call an instance method; see [`Bridge::invoke_static_method`]
    pub fn invoke_method(
        &self,
        instance: &ScriptValue,
        method: &str,
        args: &[ScriptValue],
        reply: Reply,
    ) -> BridgeResult<()> {
        let (descriptor, object) = self.resolve_instance(instance)?;
        let name = member_name("method", method)?;
        self.resolver
            .resolve(&descriptor, MemberKind::Method, &name, Some(object), args)?
            .invoke(reply)
    }

    /// Attach a listener to an instance event
    pub fn add_event_listener(
        &self,
        instance: &ScriptValue,
        event: &str,
        listener: Listener,
    ) -> BridgeResult<ListenerToken> {
        let handle = InstanceHandle::from_script(instance)?;
        let object = self.instances.resolve(&handle)?;
        let descriptor = self.resolve_type(handle.type_name())?;
        let name = member_name("event", event)?;
        self.events.subscribe(
            EventSender::Instance(handle),
            &descriptor,
            &name,
            Some(object),
            listener,
        )
    }

    /// Detach a listener from an instance event.
    ///
    /// A released instance has no listeners left, so removing from one is a
    /// no-op.
    pub fn remove_event_listener(
        &self,
        instance: &ScriptValue,
        event: &str,
        identity: &str,
    ) -> BridgeResult<()> {
        let handle = InstanceHandle::from_script(instance)?;
        let name = member_name("event", event)?;
        if self.instances.resolve(&handle).is_err() {
            tracing::warn!(instance = %handle, event = %name, "removing listener from a released instance");
            return Ok(());
        }
        let descriptor = self.resolve_type(handle.type_name())?;
        self.events
            .unsubscribe(&EventSender::Instance(handle), &descriptor, &name, identity)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Route a decoded request and deliver its outcome through `reply`.
    ///
    /// `reply` fires exactly once, whether the request fails during
    /// resolution, completes synchronously or completes later on a native
    /// thread.
    pub fn dispatch(&self, request: BridgeRequest, reply: Reply) {
        let method = request.method_name();
        tracing::trace!(method, "dispatching request");
        let slot: ReplySlot = Arc::new(Mutex::new(Some(reply)));

        match self.route(request, &slot) {
            Ok(Some(value)) => settle(&slot, Ok(value)),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(method, code = %e.code(), error = %e, "request failed");
                settle(&slot, Err(e));
            }
        }
    }

    /// Run a request; `Ok(None)` means the reply was handed to an invocation
    fn route(&self, request: BridgeRequest, slot: &ReplySlot) -> BridgeResult<Option<ScriptValue>> {
        match request {
            BridgeRequest::GetStaticProperty {
                type_name,
                property,
            } => self.get_static_property(&type_name, &property).map(Some),
            BridgeRequest::SetStaticProperty {
                type_name,
                property,
                value,
            } => self
                .set_static_property(&type_name, &property, value)
                .map(done),
            BridgeRequest::InvokeStaticMethod {
                type_name,
                method,
                arguments,
            } => self
                .invoke_static_method(&type_name, &method, &arguments, forward(slot))
                .map(|_| None),
            BridgeRequest::AddStaticEventListener {
                type_name,
                event,
                listener,
            } => self
                .add_static_event_listener(&type_name, &event, self.sink_listener(listener))
                .map(done),
            BridgeRequest::RemoveStaticEventListener {
                type_name,
                event,
                listener,
            } => self
                .remove_static_event_listener(&type_name, &event, &listener)
                .map(done),
            BridgeRequest::CreateInstance {
                type_name,
                arguments,
            } => self
                .create_instance(&type_name, &arguments)
                .map(|handle| Some(handle.to_script())),
            BridgeRequest::ReleaseInstance { instance } => {
                self.release_instance(&instance).map(done)
            }
            BridgeRequest::GetProperty { instance, property } => {
                self.get_property(&instance, &property).map(Some)
            }
            BridgeRequest::SetProperty {
                instance,
                property,
                value,
            } => self.set_property(&instance, &property, value).map(done),
            BridgeRequest::InvokeMethod {
                instance,
                method,
                arguments,
            } => self
                .invoke_method(&instance, &method, &arguments, forward(slot))
                .map(|_| None),
            BridgeRequest::AddEventListener {
                instance,
                event,
                listener,
            } => self
                .add_event_listener(&instance, &event, self.sink_listener(listener))
                .map(done),
            BridgeRequest::RemoveEventListener {
                instance,
                event,
                listener,
            } => self
                .remove_event_listener(&instance, &event, &listener)
                .map(done),
        }
    }

    fn sink_listener(&self, identity: String) -> Listener {
        let sink = self.sink.clone();
        let key = identity.clone();
        Listener::new(identity, move |payload| {
            let current = sink.read().clone();
            match current {
                Some(sink) => sink(&key, payload),
                None => tracing::warn!(listener = %key, "no event sink installed; dropping event"),
            }
        })
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Detach every listener and release every instance
    pub fn teardown(&self) {
        let listeners = self.events.clear();
        let instances = self.instances.clear();
        tracing::debug!(listeners, instances = instances.len(), "bridge torn down");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Namespace mapper
    pub fn namespaces(&self) -> &NamespaceMapper {
        &self.namespaces
    }

    /// Type catalog
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Instance registry
    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    /// Marshaller
    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    /// Listener registry
    pub fn events(&self) -> &EventBridge {
        &self.events
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn resolve_type(&self, type_name: &str) -> BridgeResult<Arc<TypeDescriptor>> {
        if type_name.is_empty() {
            return Err(BridgeError::invalid("Type name is required"));
        }
        self.catalog.resolve(&self.namespaces, type_name)
    }

    fn static_sender(&self, type_name: &str) -> BridgeResult<(Arc<TypeDescriptor>, EventSender)> {
        let descriptor = self.resolve_type(type_name)?;
        let script_type = self.namespaces.resolve_script_name(&descriptor.native_name)?;
        Ok((descriptor, EventSender::Static(script_type)))
    }

    /// Descriptor and live object for an instance argument.
    ///
    /// A value-type payload without a handle is rebuilt as a temporary.
    fn resolve_instance(
        &self,
        instance: &ScriptValue,
    ) -> BridgeResult<(Arc<TypeDescriptor>, ObjectRef)> {
        let type_name = instance
            .get(TYPE_KEY)
            .and_then(ScriptValue::as_str)
            .ok_or_else(|| BridgeError::invalid("Instance must name its type"))?;
        let descriptor = self.resolve_type(type_name)?;
        let declared = TypeRef::object(descriptor.native_name.clone());
        match self.marshaller.to_native(instance, &declared)? {
            NativeValue::Object(object) => Ok((descriptor, object)),
            other => Err(BridgeError::invalid(format!(
                "Expected an instance of {}, got {}",
                type_name,
                other.kind()
            ))),
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("types", &self.catalog.len())
            .field("instances", &self.instances.len())
            .field("listeners", &self.events.listener_count())
            .finish()
    }
}

fn done<T>(_: T) -> Option<ScriptValue> {
    Some(ScriptValue::Null)
}

fn member_name(what: &str, name: &str) -> BridgeResult<String> {
    if name.is_empty() {
        return Err(BridgeError::invalid(format!("A {} name is required", what)));
    }
    Ok(native_member_name(name))
}

/// Reply that forwards into the shared slot
fn forward(slot: &ReplySlot) -> Reply {
    let slot = slot.clone();
    Reply::from_fn(move |outcome| settle(&slot, outcome))
}

fn settle(slot: &ReplySlot, outcome: BridgeResult<ScriptValue>) {
    let reply = slot.lock().take();
    match reply {
        Some(reply) => reply.deliver(outcome),
        None => tracing::warn!("reply already delivered"),
    }
}
