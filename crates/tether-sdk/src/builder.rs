//! Fluent construction of type descriptors
//!
//! ```ignore
//! let counter = TypeBuilder::class("app::Counter")
//!     .constructor(MethodDef::constructor().body(|_| Ok(Counter::default().into_native())))
//!     .method(
//!         MethodDef::new("add")
//!             .param(TypeRef::I32)
//!             .returns(TypeRef::I32)
//!             .body(|call| {
//!                 let counter = call.this::<Counter>()?;
//!                 Ok(counter.add(call.arg(0)?).into())
//!             }),
//!     )
//!     .property(PropertyDef::new("total", TypeRef::I32).getter(|call| {
//!         Ok(call.this::<Counter>()?.total().into())
//!     }))
//!     .build();
//! ```

use std::sync::Arc;

use crate::call::{NativeCall, NativeFn};
use crate::descriptor::{
    CallConvention, EnumDescriptor, EventDescriptor, MemberDescriptor, MemberKind,
    TypeDescriptor,
};
use crate::error::{NativeError, NativeResult};
use crate::event::{EventHandler, EventSource, SubscriptionToken};
use crate::types::TypeRef;
use crate::value::{NativeValue, ObjectRef};

fn native_fn<F>(f: F) -> NativeFn
where
    F: Fn(&mut NativeCall<'_>) -> NativeResult<NativeValue> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Definition for a constructor or method
#[derive(Clone)]
pub struct MethodDef {
    name: String,
    kind: MemberKind,
    is_static: bool,
    params: Vec<TypeRef>,
    returns: Option<TypeRef>,
    convention: CallConvention,
    body: Option<NativeFn>,
}

impl MethodDef {
    /// Create a new method definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            is_static: false,
            params: Vec::new(),
            returns: None,
            convention: CallConvention::Direct,
            body: None,
        }
    }

    /// Create a new constructor definition
    pub fn constructor() -> Self {
        Self {
            kind: MemberKind::Constructor,
            ..Self::new("")
        }
    }

    /// Mark as static method
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Add a script-visible parameter
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = Some(ty);
        self
    }

    /// Set the calling convention
    pub fn convention(mut self, convention: CallConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Set the body; members without a body are reserved
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> NativeResult<NativeValue> + Send + Sync + 'static,
    {
        self.body = Some(native_fn(f));
        self
    }

    fn into_descriptor(self, native_type: &str) -> MemberDescriptor {
        // Constructors are static from the script's side but produce instances
        let is_static = self.is_static && self.kind != MemberKind::Constructor;
        let returns = match self.kind {
            MemberKind::Constructor => Some(TypeRef::object(native_type)),
            _ => self.returns,
        };
        MemberDescriptor {
            name: self.name,
            kind: self.kind,
            is_static,
            params: self.params,
            returns,
            convention: self.convention,
            body: self.body,
        }
    }
}

/// Definition for a property; expands to a getter and an optional setter
#[derive(Clone)]
pub struct PropertyDef {
    name: String,
    ty: TypeRef,
    is_static: bool,
    getter: Option<NativeFn>,
    setter: Option<NativeFn>,
}

impl PropertyDef {
    /// Create a new property definition
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            getter: None,
            setter: None,
        }
    }

    /// Mark as static property
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set the getter
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> NativeResult<NativeValue> + Send + Sync + 'static,
    {
        self.getter = Some(native_fn(f));
        self
    }

    /// Set the setter; the new value is argument 0
    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> NativeResult<()> + Send + Sync + 'static,
    {
        self.setter = Some(native_fn(move |call| {
            f(call)?;
            Ok(NativeValue::Null)
        }));
        self
    }

    fn into_descriptors(self) -> impl Iterator<Item = MemberDescriptor> {
        let getter = self.getter.map(|body| MemberDescriptor {
            name: self.name.clone(),
            kind: MemberKind::Getter,
            is_static: self.is_static,
            params: Vec::new(),
            returns: Some(self.ty.clone()),
            convention: CallConvention::Direct,
            body: Some(body),
        });
        let setter = self.setter.map(|body| MemberDescriptor {
            name: self.name,
            kind: MemberKind::Setter,
            is_static: self.is_static,
            params: vec![self.ty],
            returns: None,
            convention: CallConvention::Direct,
            body: Some(body),
        });
        getter.into_iter().chain(setter)
    }
}

/// Definition for an event
#[derive(Clone)]
pub struct EventDef {
    descriptor: EventDescriptor,
}

impl EventDef {
    /// Instance event backed by an [`EventSource`] the receiver exposes
    pub fn instance<F>(name: impl Into<String>, args: TypeRef, source: F) -> Self
    where
        F: Fn(&ObjectRef) -> NativeResult<EventSource> + Send + Sync + 'static,
    {
        let source = Arc::new(source);
        let detach_source = source.clone();
        Self::custom(
            name,
            false,
            args,
            move |receiver, handler| {
                let receiver = receiver.ok_or_else(missing_receiver)?;
                Ok(source(receiver)?.add(handler))
            },
            move |receiver, token| {
                let receiver = receiver.ok_or_else(missing_receiver)?;
                detach_source(receiver)?.remove(token);
                Ok(())
            },
        )
    }

    /// Static event backed by a shared [`EventSource`]
    pub fn static_source(name: impl Into<String>, args: TypeRef, source: EventSource) -> Self {
        let detach_source = source.clone();
        Self::custom(
            name,
            true,
            args,
            move |_, handler| Ok(source.add(handler)),
            move |_, token| {
                detach_source.remove(token);
                Ok(())
            },
        )
    }

    /// Event with explicit attach and detach hooks
    pub fn custom<S, U>(
        name: impl Into<String>,
        is_static: bool,
        args: TypeRef,
        subscribe: S,
        unsubscribe: U,
    ) -> Self
    where
        S: Fn(Option<&ObjectRef>, EventHandler) -> NativeResult<SubscriptionToken>
            + Send
            + Sync
            + 'static,
        U: Fn(Option<&ObjectRef>, SubscriptionToken) -> NativeResult<()> + Send + Sync + 'static,
    {
        Self {
            descriptor: EventDescriptor {
                name: name.into(),
                is_static,
                args,
                subscribe: Arc::new(subscribe),
                unsubscribe: Arc::new(unsubscribe),
            },
        }
    }
}

fn missing_receiver() -> NativeError {
    NativeError::argument("Instance event used without a receiver")
}

/// Builder for [`TypeDescriptor`]
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
}

impl TypeBuilder {
    /// Start a class
    pub fn class(native_name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                native_name: native_name.into(),
                marshal_by_value: false,
                enumeration: None,
                members: Vec::new(),
                events: Vec::new(),
            },
        }
    }

    /// Start an enumeration from (symbol, value) pairs
    pub fn enumeration<S: Into<String>>(
        native_name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        let mut builder = Self::class(native_name);
        builder.descriptor.enumeration = Some(EnumDescriptor::new(
            members.into_iter().map(|(s, v)| (s.into(), v)).collect(),
        ));
        builder.descriptor.marshal_by_value = true;
        builder
    }

    /// Marshal instances by value instead of by reference
    pub fn marshal_by_value(mut self) -> Self {
        self.descriptor.marshal_by_value = true;
        self
    }

    /// Add a constructor
    pub fn constructor(self, def: MethodDef) -> Self {
        self.method(MethodDef {
            kind: MemberKind::Constructor,
            ..def
        })
    }

    /// Add a method
    pub fn method(mut self, def: MethodDef) -> Self {
        let member = def.into_descriptor(&self.descriptor.native_name);
        self.descriptor.members.push(Arc::new(member));
        self
    }

    /// Add a property
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.descriptor
            .members
            .extend(def.into_descriptors().map(Arc::new));
        self
    }

    /// Add an event
    pub fn event(mut self, def: EventDef) -> Self {
        self.descriptor.events.push(Arc::new(def.descriptor));
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_expands_to_accessors() {
        let ty = TypeBuilder::class("app::Gauge")
            .property(
                PropertyDef::new("level", TypeRef::F64)
                    .getter(|_| Ok(NativeValue::F64(0.5)))
                    .setter(|_| Ok(())),
            )
            .property(PropertyDef::new("limit", TypeRef::I32).getter(|_| Ok(3i32.into())))
            .build();
        assert_eq!(ty.members.len(), 3);
        assert_eq!(ty.instance_getters().count(), 2);
        assert!(ty.instance_setter("level").is_some());
        assert!(ty.instance_setter("limit").is_none());
    }

    #[test]
    fn test_constructor_returns_its_type() {
        let ty = TypeBuilder::class("app::Gauge")
            .constructor(MethodDef::constructor().body(|_| Ok(NativeValue::Null)))
            .build();
        let ctor = ty.default_constructor().map(|c| c.returns.clone());
        assert_eq!(ctor, Some(Some(TypeRef::object("app::Gauge"))));
    }

    #[test]
    fn test_reserved_method() {
        let ty = TypeBuilder::class("app::Gauge")
            .method(MethodDef::new("calibrate").as_static())
            .build();
        let member = ty.members_named(MemberKind::Method, "calibrate", true).next();
        assert!(member.map(|m| m.is_reserved()).unwrap_or(false));
    }

    #[test]
    fn test_enumeration() {
        let ty = TypeBuilder::enumeration("app::Mode", [("Off", 0), ("On", 1)]).build();
        assert!(ty.marshal_by_value);
        let table = ty.enumeration.as_ref().map(|e| e.value_of("On"));
        assert_eq!(table, Some(Some(1)));
    }

    #[test]
    fn test_instance_event_attaches_to_receiver_source() {
        let def = EventDef::instance("changed", TypeRef::I32, |obj: &ObjectRef| {
            obj.downcast::<EventSource>()
                .cloned()
                .ok_or_else(|| NativeError::failure("not a source"))
        });
        let source = EventSource::new();
        let obj = ObjectRef::new("app::Source", source.clone());
        let token = (def.descriptor.subscribe)(Some(&obj), Arc::new(|_, _| {}));
        assert!(token.is_ok());
        assert_eq!(source.handler_count(), 1);
        assert!((def.descriptor.subscribe)(None, Arc::new(|_, _| {})).is_err());
    }
}
