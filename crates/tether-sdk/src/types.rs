//! Declared types of parameters, return values, properties and event arguments

use std::fmt;

/// A declared native type.
///
/// Conversion in both directions is driven by the declared type, never by the
/// runtime shape of the value alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Text
    String,
    /// UUID
    Uuid,
    /// Absolute URI
    Uri,
    /// Point in time
    Date,
    /// Arbitrary structured data passed through untouched
    Json,
    /// Nullable wrapper; null maps to absent
    Optional(Box<TypeRef>),
    /// Ordered sequence
    List(Box<TypeRef>),
    /// Registered enumeration, by fully-qualified native name
    Enum(String),
    /// Registered class, by fully-qualified native name
    Object(String),
}

impl TypeRef {
    /// Nullable wrapper around `inner`
    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    /// Sequence of `inner`
    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    /// Registered class by native name
    pub fn object(native_name: impl Into<String>) -> Self {
        TypeRef::Object(native_name.into())
    }

    /// Registered enumeration by native name
    pub fn enumeration(native_name: impl Into<String>) -> Self {
        TypeRef::Enum(native_name.into())
    }

    /// Check if null is an acceptable value
    pub fn is_optional(&self) -> bool {
        matches!(self, TypeRef::Optional(_) | TypeRef::Json)
    }

    /// Check if this is one of the integer kinds
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeRef::I8
                | TypeRef::I16
                | TypeRef::I32
                | TypeRef::I64
                | TypeRef::U8
                | TypeRef::U16
                | TypeRef::U32
                | TypeRef::U64
        )
    }

    /// Check if this is one of the float kinds
    pub fn is_float(&self) -> bool {
        matches!(self, TypeRef::F32 | TypeRef::F64)
    }

    /// Native name of the registered type this refers to, if any
    pub fn named_type(&self) -> Option<&str> {
        match self {
            TypeRef::Enum(name) | TypeRef::Object(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::I8 => write!(f, "i8"),
            TypeRef::I16 => write!(f, "i16"),
            TypeRef::I32 => write!(f, "i32"),
            TypeRef::I64 => write!(f, "i64"),
            TypeRef::U8 => write!(f, "u8"),
            TypeRef::U16 => write!(f, "u16"),
            TypeRef::U32 => write!(f, "u32"),
            TypeRef::U64 => write!(f, "u64"),
            TypeRef::F32 => write!(f, "f32"),
            TypeRef::F64 => write!(f, "f64"),
            TypeRef::String => write!(f, "string"),
            TypeRef::Uuid => write!(f, "uuid"),
            TypeRef::Uri => write!(f, "uri"),
            TypeRef::Date => write!(f, "date"),
            TypeRef::Json => write!(f, "json"),
            TypeRef::Optional(inner) => write!(f, "{}?", inner),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::Enum(name) | TypeRef::Object(name) => write!(f, "{}", name),
        }
    }
}
