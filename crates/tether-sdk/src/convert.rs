//! Typed extraction of native values

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::error::{NativeError, NativeResult};
use crate::value::{EnumValue, NativeValue, ObjectRef};

/// Convert from a [`NativeValue`] to a Rust type.
///
/// Implement this trait to receive your type as a member argument.
pub trait FromNative: Sized {
    /// Convert, returning an error if the kind doesn't match
    fn from_native(value: &NativeValue) -> NativeResult<Self>;
}

macro_rules! impl_from_native_int {
    ($($ty:ty),*) => {
        $(
            impl FromNative for $ty {
                fn from_native(value: &NativeValue) -> NativeResult<Self> {
                    let wide = value
                        .as_integer()
                        .ok_or_else(|| NativeError::mismatch(stringify!($ty), value.kind()))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        NativeError::argument(format!(
                            "{} is out of range for {}",
                            wide,
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_native_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromNative for f64 {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        value
            .as_float()
            .ok_or_else(|| NativeError::mismatch("f64", value.kind()))
    }
}

impl FromNative for f32 {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        match value {
            NativeValue::F32(v) => Ok(*v),
            other => Err(NativeError::mismatch("f32", other.kind())),
        }
    }
}

macro_rules! impl_from_native_variant {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromNative for $ty {
                fn from_native(value: &NativeValue) -> NativeResult<Self> {
                    match value {
                        NativeValue::$variant(v) => Ok(v.clone()),
                        other => Err(NativeError::mismatch(stringify!($variant), other.kind())),
                    }
                }
            }
        )*
    };
}

impl_from_native_variant! {
    bool => Bool,
    String => String,
    Uuid => Uuid,
    Url => Uri,
    DateTime<Utc> => Date,
    serde_json::Value => Json,
    EnumValue => Enum,
    ObjectRef => Object,
}

impl FromNative for NativeValue {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        match value {
            NativeValue::Null => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        match value {
            NativeValue::List(items) => items.iter().map(T::from_native).collect(),
            other => Err(NativeError::mismatch("list", other.kind())),
        }
    }
}
