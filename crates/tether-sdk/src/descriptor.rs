//! Type descriptors
//!
//! A [`TypeDescriptor`] is the registered description of one native type: its
//! constructors, methods, property accessors, events and (for enumerations)
//! the symbol table. Descriptors are immutable once built; the bridge
//! registers them once at startup and shares them read-only.

use std::fmt;
use std::sync::Arc;

use crate::call::NativeFn;
use crate::error::NativeResult;
use crate::event::{EventHandler, SubscriptionToken};
use crate::types::TypeRef;
use crate::value::ObjectRef;

/// Separator between native namespace prefix segments and type names
pub const NATIVE_PATH_SEPARATOR: &str = "::";

// ============================================================================
// Call Conventions
// ============================================================================

/// How a deferred member reports its outcome to the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStyle {
    /// Success carries no value
    ThenCatch,
    /// Success carries the marshalled result
    ResultCatch,
}

/// Calling convention of a member.
///
/// Special parameters (out-error slot, completion callbacks) are never
/// script-visible and are not counted for overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConvention {
    /// Returns a value or fails synchronously
    Direct,
    /// Returns a value; failure reported through the out-error slot
    ErrorOut,
    /// Completes later through a completer
    Deferred {
        /// Success shape
        style: CompletionStyle,
        /// Whether the member may also report failure through the out-error slot
        out_error: bool,
    },
}

impl CallConvention {
    /// Deferred member completing without a value
    pub const THEN_CATCH: CallConvention = CallConvention::Deferred {
        style: CompletionStyle::ThenCatch,
        out_error: false,
    };

    /// Deferred member completing with a value
    pub const RESULT_CATCH: CallConvention = CallConvention::Deferred {
        style: CompletionStyle::ResultCatch,
        out_error: false,
    };

    /// Number of trailing native parameters hidden from scripts
    pub fn special_parameter_count(&self) -> usize {
        match self {
            CallConvention::Direct => 0,
            CallConvention::ErrorOut => 1,
            CallConvention::Deferred { out_error, .. } => 2 + usize::from(*out_error),
        }
    }

    /// Check if the member completes through a completer
    pub fn is_deferred(&self) -> bool {
        matches!(self, CallConvention::Deferred { .. })
    }

    /// Check if the member has an out-error slot
    pub fn has_out_error(&self) -> bool {
        match self {
            CallConvention::Direct => false,
            CallConvention::ErrorOut => true,
            CallConvention::Deferred { out_error, .. } => *out_error,
        }
    }

    /// Completion style of a deferred member
    pub fn completion(&self) -> Option<CompletionStyle> {
        match self {
            CallConvention::Deferred { style, .. } => Some(*style),
            _ => None,
        }
    }
}

// ============================================================================
// Members
// ============================================================================

/// Kind of an invocable member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Constructor
    Constructor,
    /// Method
    Method,
    /// Property getter
    Getter,
    /// Property setter
    Setter,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
            MemberKind::Getter => "property getter",
            MemberKind::Setter => "property setter",
        };
        f.write_str(name)
    }
}

/// An invocable member of a native type
#[derive(Clone)]
pub struct MemberDescriptor {
    /// Native member name (snake_case); empty for constructors
    pub name: String,
    /// Member kind
    pub kind: MemberKind,
    /// Whether the member is static
    pub is_static: bool,
    /// Script-visible parameter types
    pub params: Vec<TypeRef>,
    /// Declared return type; `None` for members returning nothing
    pub returns: Option<TypeRef>,
    /// Calling convention
    pub convention: CallConvention,
    /// Member body; `None` marks a reserved, not-yet-implemented member
    pub body: Option<NativeFn>,
}

impl MemberDescriptor {
    /// Number of script-visible parameters
    pub fn script_arity(&self) -> usize {
        self.params.len()
    }

    /// Number of declared native parameters, counting special parameters
    pub fn declared_arity(&self) -> usize {
        self.params.len() + self.convention.special_parameter_count()
    }

    /// Check if the member is declared but has no implementation
    pub fn is_reserved(&self) -> bool {
        self.body.is_none()
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("is_static", &self.is_static)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("convention", &self.convention)
            .field("reserved", &self.is_reserved())
            .finish()
    }
}

// ============================================================================
// Events
// ============================================================================

/// Attaches an [`EventHandler`] to the native event of a receiver (absent for
/// static events)
pub type SubscribeFn =
    Arc<dyn Fn(Option<&ObjectRef>, EventHandler) -> NativeResult<SubscriptionToken> + Send + Sync>;

/// Detaches a previously attached handler
pub type UnsubscribeFn =
    Arc<dyn Fn(Option<&ObjectRef>, SubscriptionToken) -> NativeResult<()> + Send + Sync>;

/// A native event
#[derive(Clone)]
pub struct EventDescriptor {
    /// Native event name (snake_case)
    pub name: String,
    /// Whether the event is static
    pub is_static: bool,
    /// Declared type of the event argument
    pub args: TypeRef,
    /// Attach hook
    pub subscribe: SubscribeFn,
    /// Detach hook
    pub unsubscribe: UnsubscribeFn,
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("args", &self.args)
            .finish()
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Symbol table of an enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumDescriptor {
    members: Vec<(String, i64)>,
}

impl EnumDescriptor {
    /// Create from (symbol, value) pairs
    pub fn new(members: Vec<(String, i64)>) -> Self {
        Self { members }
    }

    /// Symbol of a value; the first declared symbol wins for aliased values
    pub fn symbol_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(s, _)| s.as_str())
    }

    /// Value of a symbol (case-sensitive)
    pub fn value_of(&self, symbol: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, v)| *v)
    }

    /// All (symbol, value) pairs in declaration order
    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }
}

// ============================================================================
// Types
// ============================================================================

/// Registered description of a native type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Fully-qualified native name, e.g. `app::widgets::Button`
    pub native_name: String,
    /// Whether instances cross the bridge as data rather than as handles
    pub marshal_by_value: bool,
    /// Symbol table when the type is an enumeration
    pub enumeration: Option<EnumDescriptor>,
    /// Constructors, methods and property accessors
    pub members: Vec<Arc<MemberDescriptor>>,
    /// Events
    pub events: Vec<Arc<EventDescriptor>>,
}

impl TypeDescriptor {
    /// Type name without the namespace prefix
    pub fn local_name(&self) -> &str {
        self.native_name
            .rsplit(NATIVE_PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.native_name)
    }

    /// Members with a given kind, name and static-ness
    pub fn members_named<'a>(
        &'a self,
        kind: MemberKind,
        name: &'a str,
        is_static: bool,
    ) -> impl Iterator<Item = &'a Arc<MemberDescriptor>> + 'a {
        self.members.iter().filter(move |m| {
            m.kind == kind
                && m.is_static == is_static
                && (kind == MemberKind::Constructor || m.name == name)
        })
    }

    /// Synchronous constructor taking no script arguments
    pub fn default_constructor(&self) -> Option<&Arc<MemberDescriptor>> {
        self.members_named(MemberKind::Constructor, "", false)
            .find(|m| m.params.is_empty() && !m.convention.is_deferred() && !m.is_reserved())
    }

    /// Readable instance properties, in declaration order
    pub fn instance_getters(&self) -> impl Iterator<Item = &Arc<MemberDescriptor>> {
        self.members
            .iter()
            .filter(|m| m.kind == MemberKind::Getter && !m.is_static && !m.is_reserved())
    }

    /// Instance setter for a property
    pub fn instance_setter<'a>(&'a self, name: &'a str) -> Option<&'a Arc<MemberDescriptor>> {
        self.members_named(MemberKind::Setter, name, false)
            .find(|m| m.params.len() == 1 && !m.is_reserved())
    }

    /// Event by name and static-ness
    pub fn event(&self, name: &str, is_static: bool) -> Option<&Arc<EventDescriptor>> {
        self.events
            .iter()
            .find(|e| e.name == name && e.is_static == is_static)
    }
}
