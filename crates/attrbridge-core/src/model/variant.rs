// ── Typed values ──
//
// `DataType` is the tag a node advertises; `Variant` is a value of that
// tag. Raw source values arrive as JSON and are coerced here, so every
// factory shares one set of conversion rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Built-in scalar data types a variable node can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum DataType {
    Boolean,
    SByte,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
}

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    Boolean(bool),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Variant {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::SByte(_) => DataType::SByte,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
        }
    }

    /// The JSON form sent back to the source on write.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(v) => Value::from(*v),
            Self::SByte(v) => Value::from(*v),
            Self::Int16(v) => Value::from(*v),
            Self::Int32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::Float(v) => Value::from(f64::from(*v)),
            Self::Double(v) => Value::from(*v),
            Self::String(v) => Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

// ── Coercion ────────────────────────────────────────────────────────

impl DataType {
    /// Convert a raw source value into a variant of this type.
    ///
    /// JSON `null` yields `Ok(None)`. Integer targets are range-checked and
    /// accept integral floats and numeric strings. `String` accepts any
    /// value, rendering non-strings as JSON text.
    pub fn coerce(self, raw: &Value) -> Result<Option<Variant>, CoreError> {
        if raw.is_null() {
            return Ok(None);
        }
        let mismatch = || CoreError::mismatch(self, raw);

        let variant = match self {
            Self::Boolean => match raw {
                Value::Bool(b) => Variant::Boolean(*b),
                Value::String(s) => {
                    Variant::Boolean(s.trim().parse().map_err(|_| mismatch())?)
                }
                _ => return Err(mismatch()),
            },
            Self::SByte => Variant::SByte(ranged(raw).ok_or_else(mismatch)?),
            Self::Int16 => Variant::Int16(ranged(raw).ok_or_else(mismatch)?),
            Self::Int32 => Variant::Int32(ranged(raw).ok_or_else(mismatch)?),
            Self::Int64 => Variant::Int64(integer(raw).ok_or_else(mismatch)?),
            Self::Float => Variant::Float(float(raw).and_then(narrow).ok_or_else(mismatch)?),
            Self::Double => Variant::Double(float(raw).ok_or_else(mismatch)?),
            Self::String => match raw {
                Value::String(s) => Variant::String(s.clone()),
                other => Variant::String(other.to_string()),
            },
        };
        Ok(Some(variant))
    }
}

fn ranged<T: TryFrom<i64>>(raw: &Value) -> Option<T> {
    integer(raw).and_then(|v| T::try_from(v).ok())
}

fn integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// i64::MIN is exactly representable; i64::MAX rounds up to 2^63, hence `<`.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn integral_f64(v: f64) -> Option<i64> {
    let in_range = v >= -9_223_372_036_854_775_808.0 && v < 9_223_372_036_854_775_808.0;
    (v.fract() == 0.0 && in_range).then_some(v as i64)
}

fn float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn narrow(v: f64) -> Option<f32> {
    let narrowed = v as f32;
    (narrowed.is_finite() || !v.is_finite()).then_some(narrowed)
}
