//! Canonical numeric form for heterogeneous status and metric values
//!
//! The backend reports the same kind of fact in several encodings: JSON
//! booleans, status words ("UP", "fail", ...) and plain numbers. Everything
//! that reaches a metric record goes through [`normalize`].
//!
//! Two fallbacks exist for values that carry no recognizable state:
//! - device and power status fields fall back to `0` ([`normalize_status`])
//! - generic monitoring samples fall back to absent ([`normalize_sample`])

use serde_json::{Number, Value};

const TRUTHY: [&str; 4] = ["PASS", "TRUE", "ON", "UP"];
const FALSY: [&str; 4] = ["FAIL", "FALSE", "OFF", "DOWN"];

/// What an unrecognized value maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Zero,
    Absent,
}

impl Fallback {
    fn resolve(self) -> Option<Number> {
        match self {
            Fallback::Zero => Some(Number::from(0)),
            Fallback::Absent => None,
        }
    }
}

/// Map a raw value to `0`/`1`, the number itself, or the fallback. Never fails.
pub fn normalize(raw: &Value, fallback: Fallback) -> Option<Number> {
    match raw {
        Value::Bool(flag) => Some(Number::from(u8::from(*flag))),
        Value::String(word) => {
            let word = word.to_uppercase();
            if TRUTHY.contains(&word.as_str()) {
                Some(Number::from(1))
            } else if FALSY.contains(&word.as_str()) {
                Some(Number::from(0))
            } else {
                fallback.resolve()
            }
        }
        Value::Number(number) => Some(number.clone()),
        Value::Null | Value::Array(_) | Value::Object(_) => fallback.resolve(),
    }
}

/// Power state / ping status: unknown encodings count as "down"
pub fn normalize_status(raw: &Value) -> Number {
    normalize(raw, Fallback::Zero).unwrap_or_else(|| Number::from(0))
}

/// Monitoring sample value: unknown encodings are dropped from the record
pub fn normalize_sample(raw: &Value) -> Option<Number> {
    normalize(raw, Fallback::Absent)
}
