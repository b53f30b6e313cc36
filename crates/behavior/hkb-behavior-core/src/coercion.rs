//! Coercion of incoming values into a field's declared kind.
//!
//! Rules:
//! - Int    <- Int, Bool (0/1), integral Float within i64 range, decimal string ("42", " -3 ")
//! - Float  <- Float, Int, Bool (1.0/0.0), numeric string (either separator)
//! - Bool   <- Bool, Int 0/1, "true"/"false"/"1"/"0" (any case)
//! - String <- any scalar, using its query text
//! - Pointer <- Pointer, id string ("" means unset)
//! - Array  <- Array with the same element kind (elements are kept, the
//!   declared element type id is taken from the field)
//! - Record <- Record of the same type
//!
//! Everything else is a `TypeMismatch`; callers leave the field untouched.

use crate::value::{parse_decimal, Array, Pointer, Real, Value, ValueKind};
use crate::{BehaviorError, Result};

fn mismatch(path: &str, expected: ValueKind, found: &Value) -> BehaviorError {
    let found = match found {
        Value::String(s) => format!("string '{s}'"),
        other => format!("{:?}", other.kind()).to_lowercase(),
    };
    BehaviorError::TypeMismatch {
        path: path.to_string(),
        expected,
        found,
    }
}

/// Coerce a value into a scalar kind. Arrays and records are never produced here.
pub fn coerce_scalar(value: Value, kind: ValueKind, path: &str) -> Result<Value> {
    if value.kind() == kind {
        return Ok(value);
    }
    let coerced = match (kind, &value) {
        (ValueKind::Int, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
        (ValueKind::Int, Value::Float(r)) => {
            let v = r.value();
            (v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64)
                .then(|| Value::Int(v as i64))
        }
        (ValueKind::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Int),

        (ValueKind::Float, Value::Int(i)) => Some(Value::Float(Real::new(*i as f64))),
        (ValueKind::Float, Value::Bool(b)) => {
            Some(Value::Float(Real::new(if *b { 1.0 } else { 0.0 })))
        }
        (ValueKind::Float, Value::String(s)) => {
            parse_decimal(s).map(|v| Value::Float(Real::new(v)))
        }

        (ValueKind::Bool, Value::Int(0)) => Some(Value::Bool(false)),
        (ValueKind::Bool, Value::Int(1)) => Some(Value::Bool(true)),
        (ValueKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },

        (ValueKind::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            Some(Value::String(value.text().into_owned()))
        }

        (ValueKind::Pointer, Value::String(s)) => Some(Value::Pointer(Pointer::to(s.trim()))),

        _ => None,
    };
    coerced.ok_or_else(|| mismatch(path, kind, &value))
}

/// Coerce `value` so it can replace `current` in place.
pub fn coerce_like(current: &Value, value: Value, path: &str) -> Result<Value> {
    match (current, value) {
        (Value::Array(cur), Value::Array(mut new)) => {
            if new.element_kind != cur.element_kind {
                return Err(BehaviorError::TypeMismatch {
                    path: path.to_string(),
                    expected: ValueKind::Array,
                    found: format!("array of {:?}", new.element_kind).to_lowercase(),
                });
            }
            new.element_type_id = cur.element_type_id.clone();
            Ok(Value::Array(new))
        }
        (Value::Record(cur), Value::Record(new)) => {
            if new.type_id != cur.type_id {
                return Err(BehaviorError::TypeMismatch {
                    path: path.to_string(),
                    expected: ValueKind::Record,
                    found: format!("record of type {}", new.type_id),
                });
            }
            Ok(Value::Record(new))
        }
        (Value::Array(_), other) => Err(mismatch(path, ValueKind::Array, &other)),
        (Value::Record(_), other) => Err(mismatch(path, ValueKind::Record, &other)),
        (scalar, other) => coerce_scalar(other, scalar.kind(), path),
    }
}

/// Coerce a value into an element of `array`.
pub fn coerce_item(array: &Array, value: Value, path: &str) -> Result<Value> {
    match (array.element_kind, value) {
        (ValueKind::Record, Value::Record(r)) if r.type_id == array.element_type_id => {
            Ok(Value::Record(r))
        }
        (ValueKind::Record, Value::Record(r)) => Err(BehaviorError::TypeMismatch {
            path: path.to_string(),
            expected: ValueKind::Record,
            found: format!("record of type {}", r.type_id),
        }),
        (ValueKind::Array, Value::Array(a)) => Ok(Value::Array(a)),
        (kind @ (ValueKind::Record | ValueKind::Array), other) => Err(mismatch(path, kind, &other)),
        (kind, other) => coerce_scalar(other, kind, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(
            coerce_scalar(Value::from("42"), ValueKind::Int, "x").unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            coerce_scalar(Value::from("0,25"), ValueKind::Float, "x").unwrap(),
            Value::from(0.25)
        );
    }

    #[test]
    fn non_numeric_string_is_a_mismatch() {
        let err = coerce_scalar(Value::from("abc"), ValueKind::Int, "selectedGeneratorIndex")
            .unwrap_err();
        assert!(matches!(
            err,
            BehaviorError::TypeMismatch { expected: ValueKind::Int, .. }
        ));
    }

    #[test]
    fn out_of_range_float_is_a_mismatch_not_a_clamp() {
        for v in [1e20, -1e20, 9_223_372_036_854_775_807.0, f64::INFINITY, f64::NAN] {
            let err = coerce_scalar(Value::from(v), ValueKind::Int, "x").unwrap_err();
            assert!(matches!(err, BehaviorError::TypeMismatch { expected: ValueKind::Int, .. }));
        }
        assert_eq!(
            coerce_scalar(Value::from(-9_223_372_036_854_775_808.0), ValueKind::Int, "x").unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            coerce_scalar(Value::from(3.0), ValueKind::Int, "x").unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn fractional_float_does_not_truncate_into_int() {
        assert!(coerce_scalar(Value::from(1.5), ValueKind::Int, "x").is_err());
        assert_eq!(
            coerce_scalar(Value::from(2.0), ValueKind::Int, "x").unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn bool_and_string_conversions() {
        assert_eq!(
            coerce_scalar(Value::from("TRUE"), ValueKind::Bool, "x").unwrap(),
            Value::Bool(true)
        );
        assert!(coerce_scalar(Value::Int(2), ValueKind::Bool, "x").is_err());
        assert_eq!(
            coerce_scalar(Value::Int(7), ValueKind::String, "x").unwrap(),
            Value::from("7")
        );
        assert_eq!(
            coerce_scalar(Value::from(""), ValueKind::Pointer, "x").unwrap(),
            Value::Pointer(Pointer::null())
        );
    }

    #[test]
    fn arrays_must_share_element_kind() {
        let current = Value::Array(Array::new("type5", ValueKind::Pointer));
        let ok = coerce_like(
            &current,
            Value::Array(Array::new("other", ValueKind::Pointer)),
            "generators",
        )
        .unwrap();
        assert_eq!(ok.as_array().unwrap().element_type_id, "type5");
        assert!(coerce_like(
            &current,
            Value::Array(Array::new("type1", ValueKind::Int)),
            "generators"
        )
        .is_err());
        assert!(coerce_like(&current, Value::Int(1), "generators").is_err());
    }
}
