//! Marshalling between native values and script values
//!
//! Conversion in both directions is driven by the declared [`TypeRef`]:
//!
//! | Declared type         | Script form                                   |
//! |-----------------------|-----------------------------------------------|
//! | bool / string         | JSON boolean / string                         |
//! | integer / float       | JSON number, range-checked                    |
//! | optional              | `null` for absent                             |
//! | list                  | JSON array, element-wise                      |
//! | enum                  | member symbol as a string                     |
//! | value type            | `{"type": T, field: value, ...}`              |
//! | reference type        | `{"type": T, "handle": id}`                   |
//! | uuid / uri / date     | `{"type": "<uuid>", "value": text}` etc.      |
//! | json                  | passed through                                |

mod numeric;
mod special;

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use serde_json::Map;
use tether_sdk::{
    EnumValue, NativeCall, NativeError, NativeValue, ObjectRef, TypeDescriptor, TypeRef,
};

use crate::catalog::TypeCatalog;
use crate::instances::{InstanceHandle, InstanceNotFound, InstanceRegistry};
use crate::invoke::call_guarded;
use crate::namespace::{native_member_name, script_member_name, NamespaceError, NamespaceMapper};
use crate::ScriptValue;

pub use special::{DATE_TAG, URI_TAG, UUID_TAG};

/// Key naming the script type of a mapping
pub const TYPE_KEY: &str = "type";
/// Key holding an instance handle id
pub const HANDLE_KEY: &str = "handle";
/// Key holding the text of a tagged value
pub const VALUE_KEY: &str = "value";

/// Result type for marshalling
pub type MarshalResult<T> = Result<T, MarshalError>;

/// Marshalling errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarshalError {
    /// Value shape does not match the declared type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Shape received
        got: String,
    },

    /// Number outside the declared type's range or precision
    #[error("Value {value} is out of range for {target}")]
    OutOfRange {
        /// Offending value
        value: String,
        /// Declared type
        target: String,
    },

    /// Symbol or value not in the enumeration
    #[error("'{value}' is not a member of {enum_type}")]
    InvalidEnumValue {
        /// Enumeration type
        enum_type: String,
        /// Offending symbol or value
        value: String,
    },

    /// Malformed tagged text or handle
    #[error("Malformed {what}: {detail}")]
    Malformed {
        /// What was being parsed
        what: String,
        /// Parse failure
        detail: String,
    },

    /// Handle does not denote a live instance
    #[error(transparent)]
    InstanceNotFound(#[from] InstanceNotFound),

    /// Declared type is not registered
    #[error("Type is not registered: {0}")]
    UnknownType(String),

    /// Value type without a parameterless constructor
    #[error("{0} has no parameterless constructor and cannot be built from script data")]
    NotConstructible(String),

    /// Native accessor or constructor failed
    #[error(transparent)]
    Native(#[from] NativeError),

    /// Type name has no namespace mapping
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
}

impl MarshalError {
    pub(crate) fn mismatch(expected: impl fmt::Display, got: &ScriptValue) -> Self {
        MarshalError::TypeMismatch {
            expected: expected.to_string(),
            got: script_kind(got).to_string(),
        }
    }

    pub(crate) fn malformed(what: impl fmt::Display, detail: impl fmt::Display) -> Self {
        MarshalError::Malformed {
            what: what.to_string(),
            detail: detail.to_string(),
        }
    }

    fn native_mismatch(expected: &TypeRef, got: &NativeValue) -> Self {
        MarshalError::TypeMismatch {
            expected: expected.to_string(),
            got: got.kind().to_string(),
        }
    }
}

/// Short name of a script value's shape
pub(crate) fn script_kind(value: &ScriptValue) -> &'static str {
    match value {
        ScriptValue::Null => "null",
        ScriptValue::Bool(_) => "boolean",
        ScriptValue::Number(_) => "number",
        ScriptValue::String(_) => "string",
        ScriptValue::Array(_) => "array",
        ScriptValue::Object(_) => "mapping",
    }
}

/// Converts values across the bridge
pub struct Marshaller {
    namespaces: Arc<NamespaceMapper>,
    catalog: Arc<TypeCatalog>,
    instances: Arc<InstanceRegistry>,
    value_types: RwLock<FxHashSet<String>>,
}

impl Marshaller {
    /// Create a marshaller over shared registries
    pub fn new(
        namespaces: Arc<NamespaceMapper>,
        catalog: Arc<TypeCatalog>,
        instances: Arc<InstanceRegistry>,
    ) -> Self {
        Self {
            namespaces,
            catalog,
            instances,
            value_types: RwLock::new(FxHashSet::default()),
        }
    }

    /// Namespace mapper
    pub fn namespaces(&self) -> &Arc<NamespaceMapper> {
        &self.namespaces
    }

    /// Type catalog
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Instance registry
    pub fn instances(&self) -> &Arc<InstanceRegistry> {
        &self.instances
    }

    /// Marshal instances of a native type by value
    pub fn register_value_type(&self, native_name: impl Into<String>) {
        let native_name = native_name.into();
        tracing::debug!(native_type = %native_name, "registered value type");
        self.value_types.write().insert(native_name);
    }

    /// Check if a type crosses the bridge by value
    pub fn is_value_type(&self, descriptor: &TypeDescriptor) -> bool {
        descriptor.marshal_by_value || self.value_types.read().contains(&descriptor.native_name)
    }

    /// Release the instance a script handle refers to
    pub fn release(&self, handle: &ScriptValue) -> MarshalResult<ObjectRef> {
        let handle = InstanceHandle::from_script(handle)?;
        Ok(self.instances.release(&handle)?)
    }

    // ========================================================================
    // Native -> Script
    // ========================================================================

    /// Convert a native value of declared type `ty` to its script form
    pub fn to_script(&self, value: &NativeValue, ty: &TypeRef) -> MarshalResult<ScriptValue> {
        if value.is_null() {
            return match ty {
                TypeRef::Optional(_) | TypeRef::Json | TypeRef::Object(_) => Ok(ScriptValue::Null),
                _ => Err(MarshalError::native_mismatch(ty, value)),
            };
        }
        match (ty, value) {
            (TypeRef::Optional(inner), _) => self.to_script(value, inner),
            (TypeRef::Bool, NativeValue::Bool(b)) => Ok(ScriptValue::Bool(*b)),
            (t, _) if t.is_integer() || t.is_float() => numeric::to_script(value, ty),
            (TypeRef::String, NativeValue::String(s)) => Ok(ScriptValue::String(s.clone())),
            (TypeRef::Uuid, NativeValue::Uuid(uuid)) => {
                Ok(special::tagged(UUID_TAG, special::format_uuid(uuid)))
            }
            (TypeRef::Uri, NativeValue::Uri(url)) => {
                Ok(special::tagged(URI_TAG, url.as_str().to_string()))
            }
            (TypeRef::Date, NativeValue::Date(time)) => {
                Ok(special::tagged(DATE_TAG, special::format_date(time)?))
            }
            (TypeRef::Json, NativeValue::Json(json)) => Ok(json.clone()),
            (TypeRef::List(inner), NativeValue::List(items)) => items
                .iter()
                .map(|item| self.to_script(item, inner))
                .collect::<MarshalResult<Vec<_>>>()
                .map(ScriptValue::Array),
            (TypeRef::Enum(name), NativeValue::Enum(member)) => self.enum_to_script(name, member),
            (TypeRef::Object(name), NativeValue::Object(object)) => {
                self.object_to_script(name, object)
            }
            _ => Err(MarshalError::native_mismatch(ty, value)),
        }
    }

    fn descriptor(&self, native_name: &str) -> MarshalResult<Arc<TypeDescriptor>> {
        self.catalog
            .get(native_name)
            .ok_or_else(|| MarshalError::UnknownType(native_name.to_string()))
    }

    fn enum_to_script(&self, declared: &str, member: &EnumValue) -> MarshalResult<ScriptValue> {
        let descriptor = self.descriptor(declared)?;
        descriptor
            .enumeration
            .as_ref()
            .and_then(|table| table.symbol_of(member.value))
            .map(|symbol| ScriptValue::String(symbol.to_string()))
            .ok_or_else(|| MarshalError::InvalidEnumValue {
                enum_type: declared.to_string(),
                value: member.value.to_string(),
            })
    }

    fn object_to_script(&self, declared: &str, object: &ObjectRef) -> MarshalResult<ScriptValue> {
        // The runtime type wins when it is registered
        let descriptor = self
            .catalog
            .get(object.type_name())
            .map_or_else(|| self.descriptor(declared), Ok)?;
        let script_type = self.namespaces.resolve_script_name(&descriptor.native_name)?;

        if !self.is_value_type(&descriptor) {
            return Ok(self.instances.register(object.clone(), &script_type).to_script());
        }

        let mut fields = Map::new();
        fields.insert(TYPE_KEY.to_string(), ScriptValue::String(script_type));
        for getter in descriptor.instance_getters() {
            let Some(body) = &getter.body else { continue };
            let mut call = NativeCall::new(Some(object), Vec::new());
            let value = call_guarded(body, &mut call)?;
            let field_type = getter.returns.as_ref().unwrap_or(&TypeRef::Json);
            fields.insert(
                script_member_name(&getter.name),
                self.to_script(&value, field_type)?,
            );
        }
        Ok(ScriptValue::Object(fields))
    }

    // ========================================================================
    // Script -> Native
    // ========================================================================

    /// Convert a script value to a native value of declared type `ty`
    pub fn to_native(&self, value: &ScriptValue, ty: &TypeRef) -> MarshalResult<NativeValue> {
        if value.is_null() {
            return match ty {
                TypeRef::Optional(_) | TypeRef::Json | TypeRef::Object(_) => Ok(NativeValue::Null),
                _ => Err(MarshalError::mismatch(ty, value)),
            };
        }
        match ty {
            TypeRef::Optional(inner) => self.to_native(value, inner),
            TypeRef::Bool => value
                .as_bool()
                .map(NativeValue::Bool)
                .ok_or_else(|| MarshalError::mismatch(ty, value)),
            t if t.is_integer() || t.is_float() => numeric::to_native(value, ty),
            TypeRef::String => value
                .as_str()
                .map(|s| NativeValue::String(s.to_string()))
                .ok_or_else(|| MarshalError::mismatch(ty, value)),
            TypeRef::Uuid => Ok(NativeValue::Uuid(special::parse_uuid(special::untag(
                value, UUID_TAG,
            )?)?)),
            TypeRef::Uri => Ok(NativeValue::Uri(special::parse_uri(special::untag(
                value, URI_TAG,
            )?)?)),
            TypeRef::Date => Ok(NativeValue::Date(special::parse_date(special::untag(
                value, DATE_TAG,
            )?)?)),
            TypeRef::Json => Ok(NativeValue::Json(value.clone())),
            TypeRef::List(inner) => value
                .as_array()
                .ok_or_else(|| MarshalError::mismatch(ty, value))?
                .iter()
                .map(|item| self.to_native(item, inner))
                .collect::<MarshalResult<Vec<_>>>()
                .map(NativeValue::List),
            TypeRef::Enum(name) => self.enum_to_native(name, value),
            TypeRef::Object(name) => self.object_to_native(name, value),
            _ => Err(MarshalError::mismatch(ty, value)),
        }
    }

    fn enum_to_native(&self, declared: &str, value: &ScriptValue) -> MarshalResult<NativeValue> {
        let symbol = value
            .as_str()
            .ok_or_else(|| MarshalError::mismatch(declared, value))?;
        let descriptor = self.descriptor(declared)?;
        descriptor
            .enumeration
            .as_ref()
            .and_then(|table| table.value_of(symbol))
            .map(|v| NativeValue::Enum(EnumValue::new(declared, v)))
            .ok_or_else(|| MarshalError::InvalidEnumValue {
                enum_type: declared.to_string(),
                value: symbol.to_string(),
            })
    }

    fn object_to_native(&self, declared: &str, value: &ScriptValue) -> MarshalResult<NativeValue> {
        let fields = value
            .as_object()
            .ok_or_else(|| MarshalError::mismatch(declared, value))?;

        if fields.contains_key(HANDLE_KEY) {
            let handle = InstanceHandle::from_script(value)?;
            let object = self.instances.resolve(&handle)?;
            // Handles of unregistered runtime types carry the declared type
            let minted_for = self.namespaces.resolve_native_name(handle.type_name())?;
            if minted_for != declared && object.type_name() != declared {
                return Err(MarshalError::TypeMismatch {
                    expected: declared.to_string(),
                    got: minted_for,
                });
            }
            return Ok(NativeValue::Object(object));
        }

        let descriptor = match fields.get(TYPE_KEY) {
            Some(ScriptValue::String(script_type)) => {
                let native = self.namespaces.resolve_native_name(script_type)?;
                if native != declared {
                    return Err(MarshalError::TypeMismatch {
                        expected: declared.to_string(),
                        got: native,
                    });
                }
                self.descriptor(&native)?
            }
            Some(other) => return Err(MarshalError::mismatch("type name", other)),
            None => self.descriptor(declared)?,
        };
        if !self.is_value_type(&descriptor) {
            return Err(MarshalError::malformed(
                format!("{} reference", declared),
                "missing handle",
            ));
        }
        self.construct(&descriptor, fields).map(NativeValue::Object)
    }

    /// Build a value type from a mapping: default constructor, then one
    /// setter per field
    fn construct(
        &self,
        descriptor: &TypeDescriptor,
        fields: &Map<String, ScriptValue>,
    ) -> MarshalResult<ObjectRef> {
        let body = descriptor
            .default_constructor()
            .and_then(|ctor| ctor.body.clone())
            .ok_or_else(|| MarshalError::NotConstructible(descriptor.native_name.clone()))?;
        let object = match call_guarded(&body, &mut NativeCall::new(None, Vec::new()))? {
            NativeValue::Object(object) => object,
            other => {
                return Err(MarshalError::TypeMismatch {
                    expected: descriptor.native_name.clone(),
                    got: other.kind().to_string(),
                })
            }
        };

        for (key, field) in fields {
            if key == TYPE_KEY || key == HANDLE_KEY {
                continue;
            }
            let native_name = native_member_name(key);
            let Some(setter) = descriptor.instance_setter(&native_name) else {
                tracing::warn!(
                    native_type = %descriptor.native_name,
                    field = %key,
                    "ignoring field without a setter"
                );
                continue;
            };
            let Some(body) = &setter.body else { continue };
            let field_value = self.to_native(field, &setter.params[0])?;
            let mut call = NativeCall::new(Some(&object), vec![field_value]);
            call_guarded(body, &mut call)?;
        }
        Ok(object)
    }
}
