//! Range-checked numeric conversion
//!
//! Script numbers are JSON numbers. Integers convert only when the value fits
//! the declared width; floats convert into integer types only when integral.
//! Integers convert into float types only when exactly representable.

use serde_json::Number;
use tether_sdk::{NativeValue, TypeRef};

use super::{MarshalError, MarshalResult};
use crate::ScriptValue;

const F64_EXACT_LIMIT: i128 = 1 << 53;
const F32_EXACT_LIMIT: i128 = 1 << 24;

fn out_of_range(value: impl ToString, ty: &TypeRef) -> MarshalError {
    MarshalError::OutOfRange {
        value: value.to_string(),
        target: ty.to_string(),
    }
}

/// Build the native integer of the declared width
fn native_integer(wide: i128, ty: &TypeRef) -> MarshalResult<NativeValue> {
    let fail = |_| out_of_range(wide, ty);
    Ok(match ty {
        TypeRef::I8 => NativeValue::I8(i8::try_from(wide).map_err(fail)?),
        TypeRef::I16 => NativeValue::I16(i16::try_from(wide).map_err(fail)?),
        TypeRef::I32 => NativeValue::I32(i32::try_from(wide).map_err(fail)?),
        TypeRef::I64 => NativeValue::I64(i64::try_from(wide).map_err(fail)?),
        TypeRef::U8 => NativeValue::U8(u8::try_from(wide).map_err(fail)?),
        TypeRef::U16 => NativeValue::U16(u16::try_from(wide).map_err(fail)?),
        TypeRef::U32 => NativeValue::U32(u32::try_from(wide).map_err(fail)?),
        TypeRef::U64 => NativeValue::U64(u64::try_from(wide).map_err(fail)?),
        other => {
            return Err(MarshalError::TypeMismatch {
                expected: other.to_string(),
                got: "integer".to_string(),
            })
        }
    })
}

/// Integer as a float, only when exactly representable
fn exact_float(wide: i128, ty: &TypeRef) -> MarshalResult<f64> {
    let limit = match ty {
        TypeRef::F32 => F32_EXACT_LIMIT,
        _ => F64_EXACT_LIMIT,
    };
    if wide.abs() > limit {
        return Err(out_of_range(wide, ty));
    }
    Ok(wide as f64)
}

fn checked_float(value: f64, ty: &TypeRef) -> MarshalResult<f64> {
    if !value.is_finite() || (*ty == TypeRef::F32 && value.abs() > f64::from(f32::MAX)) {
        return Err(out_of_range(value, ty));
    }
    Ok(value)
}

fn integral(value: f64, ty: &TypeRef) -> MarshalResult<i128> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(out_of_range(value, ty));
    }
    // Anything beyond u64 is out of range for every integer width
    if value.abs() > 2f64.powi(64) {
        return Err(out_of_range(value, ty));
    }
    Ok(value as i128)
}

fn integer_script_value(wide: i128) -> ScriptValue {
    if let Ok(v) = i64::try_from(wide) {
        ScriptValue::Number(Number::from(v))
    } else if let Ok(v) = u64::try_from(wide) {
        ScriptValue::Number(Number::from(v))
    } else {
        ScriptValue::Null
    }
}

/// Native number to script number
pub(super) fn to_script(value: &NativeValue, ty: &TypeRef) -> MarshalResult<ScriptValue> {
    if ty.is_integer() {
        let wide = value.as_integer().ok_or_else(|| MarshalError::TypeMismatch {
            expected: ty.to_string(),
            got: value.kind().to_string(),
        })?;
        native_integer(wide, ty)?;
        return Ok(integer_script_value(wide));
    }

    let float = match (value.as_float(), value.as_integer()) {
        (Some(f), _) => f,
        (None, Some(wide)) => exact_float(wide, ty)?,
        (None, None) => {
            return Err(MarshalError::TypeMismatch {
                expected: ty.to_string(),
                got: value.kind().to_string(),
            })
        }
    };
    let float = checked_float(float, ty)?;
    Number::from_f64(float)
        .map(ScriptValue::Number)
        .ok_or_else(|| out_of_range(float, ty))
}

/// Script number to native number of the declared type
pub(super) fn to_native(value: &ScriptValue, ty: &TypeRef) -> MarshalResult<NativeValue> {
    let number = match value {
        ScriptValue::Number(n) => n,
        other => return Err(MarshalError::mismatch(ty, other)),
    };
    let exact = number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from));

    if ty.is_integer() {
        let wide = match exact {
            Some(wide) => wide,
            None => integral(number.as_f64().unwrap_or(f64::NAN), ty)?,
        };
        return native_integer(wide, ty);
    }

    let float = match exact {
        Some(wide) => exact_float(wide, ty)?,
        None => number.as_f64().unwrap_or(f64::NAN),
    };
    let float = checked_float(float, ty)?;
    match ty {
        TypeRef::F32 => Ok(NativeValue::F32(float as f32)),
        _ => Ok(NativeValue::F64(float)),
    }
}
