//! Native values exchanged with member bodies

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

/// A value on the native side of the bridge.
///
/// Integer and float widths are kept distinct so that marshalling can check
/// ranges against the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    I8(i8),
    /// Signed 16-bit integer
    I16(i16),
    /// Signed 32-bit integer
    I32(i32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Text
    String(String),
    /// UUID
    Uuid(Uuid),
    /// Absolute URI
    Uri(Url),
    /// Point in time
    Date(DateTime<Utc>),
    /// Untyped structured data
    Json(serde_json::Value),
    /// Ordered sequence
    List(Vec<NativeValue>),
    /// Enumeration member
    Enum(EnumValue),
    /// Native object
    Object(ObjectRef),
}

impl NativeValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Short name of the value kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::I8(_) => "i8",
            NativeValue::I16(_) => "i16",
            NativeValue::I32(_) => "i32",
            NativeValue::I64(_) => "i64",
            NativeValue::U8(_) => "u8",
            NativeValue::U16(_) => "u16",
            NativeValue::U32(_) => "u32",
            NativeValue::U64(_) => "u64",
            NativeValue::F32(_) => "f32",
            NativeValue::F64(_) => "f64",
            NativeValue::String(_) => "string",
            NativeValue::Uuid(_) => "uuid",
            NativeValue::Uri(_) => "uri",
            NativeValue::Date(_) => "date",
            NativeValue::Json(_) => "json",
            NativeValue::List(_) => "list",
            NativeValue::Enum(_) => "enum",
            NativeValue::Object(_) => "object",
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get any integer variant widened to i128
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            NativeValue::I8(v) => Some(v.into()),
            NativeValue::I16(v) => Some(v.into()),
            NativeValue::I32(v) => Some(v.into()),
            NativeValue::I64(v) => Some(v.into()),
            NativeValue::U8(v) => Some(v.into()),
            NativeValue::U16(v) => Some(v.into()),
            NativeValue::U32(v) => Some(v.into()),
            NativeValue::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Get any float variant as f64
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            NativeValue::F32(v) => Some(v.into()),
            NativeValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Get as object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            NativeValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::List(items) => Some(items),
            _ => None,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NativeValue {
                fn from(value: $ty) -> Self {
                    NativeValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Uuid => Uuid,
    Url => Uri,
    DateTime<Utc> => Date,
    serde_json::Value => Json,
    EnumValue => Enum,
    ObjectRef => Object,
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<()> for NativeValue {
    fn from(_: ()) -> Self {
        NativeValue::Null
    }
}

impl<T: Into<NativeValue>> From<Vec<T>> for NativeValue {
    fn from(items: Vec<T>) -> Self {
        NativeValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}

/// An enumeration member: owning enum type plus its underlying value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Fully-qualified native name of the enumeration
    pub type_name: String,
    /// Underlying integral value
    pub value: i64,
}

impl EnumValue {
    /// Create an enumeration member
    pub fn new(type_name: impl Into<String>, value: i64) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

// ============================================================================
// Object References
// ============================================================================

/// Shared reference to a native object.
///
/// Cloning shares the same object. Equality is identity: two references are
/// equal only when they point at the same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wrap a native object of the given native type
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: Arc::new(value),
        }
    }

    /// Fully-qualified native type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the underlying object as `T`
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Identity key of the underlying allocation
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Check if both references point at the same object
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.identity() == other.identity()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.type_name, self.identity())
    }
}
