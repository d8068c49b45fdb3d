// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value codec: maps the gateway's untyped JSON values onto OPC UA types.
//!
//! Both entry points are total. [`detect_type`] always yields a type and
//! [`convert`] always yields a [`Coerced`]; values that cannot be submitted
//! are carried as a tagged sentinel instead of an error, so one bad write
//! item never aborts a batch.
//!
//! | Target | Input rules |
//! |--------|-------------|
//! | integer / float | strings are trimmed and parsed (`""` is 0); `true`/`false` are 1/0; `null` is 0; anything unparsable is NaN |
//! | Boolean | a string is `true` only for a case-insensitive `"true"`; everything else by truthiness |
//! | String | always stringified; `null` and absent become `"null"` and `"undefined"` |
//! | Variant | passed through unchanged |

use serde_json::Value;

use crate::error::ConversionError;
use crate::types::OpcUaDataType;
use crate::value::OpcUaValue;

// =============================================================================
// Type detection
// =============================================================================

/// Infers the write type for an untyped value.
///
/// # Examples
///
/// ```
/// use iotgw_opcua::codec::detect_type;
/// use iotgw_opcua::types::OpcUaDataType;
/// use serde_json::json;
///
/// assert_eq!(detect_type(Some(&json!(true))), OpcUaDataType::Boolean);
/// assert_eq!(detect_type(Some(&json!(42))), OpcUaDataType::Int32);
/// assert_eq!(detect_type(Some(&json!(4.2))), OpcUaDataType::Double);
/// assert_eq!(detect_type(None), OpcUaDataType::Variant);
/// ```
pub fn detect_type(value: Option<&Value>) -> OpcUaDataType {
    match value {
        Some(Value::Bool(_)) => OpcUaDataType::Boolean,
        Some(Value::Number(n)) => {
            let integral = n.is_i64()
                || n.is_u64()
                || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0);
            if integral {
                OpcUaDataType::Int32
            } else {
                OpcUaDataType::Double
            }
        }
        Some(Value::String(_)) => OpcUaDataType::String,
        _ => OpcUaDataType::Variant,
    }
}

// =============================================================================
// Coerced
// =============================================================================

/// Outcome of [`convert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// A value ready to write.
    Typed(OpcUaValue),

    /// Numeric coercion produced NaN, infinity or an out-of-range number
    /// for an integer target.
    Unrepresentable {
        /// The requested integer type.
        data_type: OpcUaDataType,
        /// The number coercion produced.
        number: f64,
    },

    /// Untyped target; the input is written as-is.
    Untyped(Value),
}

impl Coerced {
    /// The value echoed back in a successful write result.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Typed(value) => value.to_json(),
            Self::Unrepresentable { number, .. } => OpcUaValue::Double(*number).to_json(),
            Self::Untyped(value) => value.clone(),
        }
    }

    /// Returns `true` for the NaN sentinel.
    pub fn is_nan(&self) -> bool {
        match self {
            Self::Typed(OpcUaValue::Double(v)) => v.is_nan(),
            Self::Typed(OpcUaValue::Float(v)) => v.is_nan(),
            Self::Unrepresentable { number, .. } => number.is_nan(),
            _ => false,
        }
    }

    /// Converts into the value submitted to the server.
    ///
    /// Floating point NaN is a valid OPC UA value and is submitted; integer
    /// sentinels are refused here so the failure stays local to one item.
    pub fn into_value(self) -> Result<OpcUaValue, ConversionError> {
        match self {
            Self::Typed(value) => Ok(value),
            Self::Untyped(value) => Ok(OpcUaValue::from_json(&value)),
            Self::Unrepresentable { data_type, number } if number.is_finite() => {
                Err(ConversionError::out_of_range(data_type.name(), number))
            }
            Self::Unrepresentable { data_type, .. } => {
                Err(ConversionError::not_a_number(data_type.name()))
            }
        }
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Coerces `value` to `data_type`. `None` is an absent value.
pub fn convert(value: Option<&Value>, data_type: OpcUaDataType) -> Coerced {
    match data_type {
        OpcUaDataType::Boolean => Coerced::Typed(OpcUaValue::Boolean(to_boolean(value))),
        OpcUaDataType::String => Coerced::Typed(OpcUaValue::String(to_js_string(value))),
        OpcUaDataType::Float => Coerced::Typed(OpcUaValue::Float(to_number(value) as f32)),
        OpcUaDataType::Double => Coerced::Typed(OpcUaValue::Double(to_number(value))),
        OpcUaDataType::Variant => Coerced::Untyped(value.cloned().unwrap_or(Value::Null)),
        integer => to_integer(to_number(value), integer),
    }
}

fn to_integer(number: f64, data_type: OpcUaDataType) -> Coerced {
    let unrepresentable = Coerced::Unrepresentable { data_type, number };
    if !number.is_finite() {
        return unrepresentable;
    }
    let n = number.trunc();

    macro_rules! fit {
        ($ty:ty, $variant:ident) => {
            if n >= <$ty>::MIN as f64 && n <= <$ty>::MAX as f64 {
                Coerced::Typed(OpcUaValue::$variant(n as $ty))
            } else {
                unrepresentable
            }
        };
    }

    match data_type {
        OpcUaDataType::SByte => fit!(i8, SByte),
        OpcUaDataType::Byte => fit!(u8, Byte),
        OpcUaDataType::Int16 => fit!(i16, Int16),
        OpcUaDataType::UInt16 => fit!(u16, UInt16),
        OpcUaDataType::Int32 => fit!(i32, Int32),
        OpcUaDataType::UInt32 => fit!(u32, UInt32),
        OpcUaDataType::Int64 => fit!(i64, Int64),
        OpcUaDataType::UInt64 => fit!(u64, UInt64),
        _ => unrepresentable,
    }
}

/// Numeric coercion with script-style rules. Never fails; NaN is the sentinel.
fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let lower = t.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN);
        }
    }

    // Rust's float grammar accepts "inf" and "nan" spellings; plain decimal only.
    if lower.contains("inf") || lower.contains("nan") {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

fn to_boolean(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn to_js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{:.0}", f)
            }
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
