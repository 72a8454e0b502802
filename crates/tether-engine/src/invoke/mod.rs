//! Member selection and invocation
//!
//! Selection filters a type's members by kind, name and static-ness, then by
//! script-visible arity. Special parameters never count toward arity. Exactly
//! one survivor is required; arguments are then converted using the winner's
//! declared parameter types.

mod reply;
mod resolved;

pub use reply::Reply;
pub use resolved::ResolvedInvocation;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tether_sdk::{
    MemberDescriptor, MemberKind, NativeCall, NativeError, NativeFn, NativeResult, NativeValue,
    ObjectRef, TypeDescriptor,
};

use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{MarshalError, Marshaller};
use crate::ScriptValue;

/// Run native code, converting a panic into [`NativeError::Panic`]
pub(crate) fn guarded<T>(f: impl FnOnce() -> NativeResult<T>) -> NativeResult<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| Err(NativeError::Panic(panic_message(panic.as_ref()))))
}

/// Run a member body under [`guarded`]
pub(crate) fn call_guarded(body: &NativeFn, call: &mut NativeCall<'_>) -> NativeResult<NativeValue> {
    guarded(|| body(call))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Selects members and binds script arguments
pub struct InvocationResolver {
    marshaller: Arc<Marshaller>,
}

impl InvocationResolver {
    /// Create a resolver converting arguments with `marshaller`
    pub fn new(marshaller: Arc<Marshaller>) -> Self {
        Self { marshaller }
    }

    /// Resolve a constructor call
    pub fn resolve_constructor(
        &self,
        descriptor: &TypeDescriptor,
        args: &[ScriptValue],
    ) -> BridgeResult<ResolvedInvocation> {
        self.resolve(descriptor, MemberKind::Constructor, "", None, args)
    }

    /// Resolve a member call.
    ///
    /// A receiver selects instance members; its absence selects static ones.
    pub fn resolve(
        &self,
        descriptor: &TypeDescriptor,
        kind: MemberKind,
        name: &str,
        receiver: Option<ObjectRef>,
        args: &[ScriptValue],
    ) -> BridgeResult<ResolvedInvocation> {
        let is_static = receiver.is_none() && kind != MemberKind::Constructor;
        let member = select(descriptor, kind, name, is_static, args.len())?;
        if member.is_reserved() {
            return Err(BridgeError::NotImplemented(describe(descriptor, &member)));
        }
        let args = self.bind(descriptor, &member, args)?;
        Ok(ResolvedInvocation::new(
            self.marshaller.clone(),
            describe(descriptor, &member),
            member,
            receiver,
            args,
        ))
    }

    fn bind(
        &self,
        descriptor: &TypeDescriptor,
        member: &MemberDescriptor,
        args: &[ScriptValue],
    ) -> BridgeResult<Vec<NativeValue>> {
        args.iter()
            .zip(&member.params)
            .enumerate()
            .map(|(index, (arg, ty))| {
                self.marshaller.to_native(arg, ty).map_err(|e| match e {
                    MarshalError::InstanceNotFound(_) => e.into(),
                    e => BridgeError::InvalidArgument(format!(
                        "Argument {} of {}: {}",
                        index,
                        describe(descriptor, member),
                        e
                    )),
                })
            })
            .collect()
    }
}

fn describe(descriptor: &TypeDescriptor, member: &MemberDescriptor) -> String {
    match member.kind {
        MemberKind::Constructor => format!("{} constructor", descriptor.native_name),
        _ => format!("{}::{}", descriptor.native_name, member.name),
    }
}

/// Pick the single member matching kind, name, static-ness and arity
fn select(
    descriptor: &TypeDescriptor,
    kind: MemberKind,
    name: &str,
    is_static: bool,
    arity: usize,
) -> BridgeResult<Arc<MemberDescriptor>> {
    let named: Vec<&Arc<MemberDescriptor>> =
        descriptor.members_named(kind, name, is_static).collect();
    let viable: Vec<&Arc<MemberDescriptor>> = named
        .iter()
        .copied()
        .filter(|m| m.script_arity() == arity)
        .collect();
    let scope = if is_static { "static " } else { "" };

    match viable.as_slice() {
        [member] => {
            tracing::trace!(
                member = %describe(descriptor, member),
                script_arity = arity,
                declared_arity = member.declared_arity(),
                "selected member"
            );
            Ok(Arc::clone(member))
        }
        [] if named.is_empty() => Err(BridgeError::MemberNotFound(format!(
            "{} has no {}{} named '{}'",
            descriptor.native_name, scope, kind, name
        ))),
        [] => {
            let mut arities: Vec<usize> = named.iter().map(|m| m.script_arity()).collect();
            arities.sort_unstable();
            arities.dedup();
            Err(BridgeError::MemberNotFound(format!(
                "{} has no {}{} '{}' taking {} arguments (accepts {:?})",
                descriptor.native_name, scope, kind, name, arity, arities
            )))
        }
        many => Err(BridgeError::AmbiguousMember(format!(
            "{} {}s '{}' of {} take {} arguments",
            many.len(),
            kind,
            name,
            descriptor.native_name,
            arity
        ))),
    }
}
