//! Conversion between in-memory values and their wire representation.

use crate::value::Value;
use serde_json::{Map, Value as Wire};

/// Key of the marker object standing in for values with no wire form.
pub const UNREPRESENTABLE_KEY: &str = "$unrepresentable";

/// Value <-> wire conversion.
///
/// Implementations must never fail: anything without a safe representation
/// becomes the unrepresentable marker, which decodes back to
/// [`Value::Undefined`].
pub trait Codec: Send + Sync {
    /// Encode a value. `None` means "nothing to send" (a top-level undefined).
    fn encode(&self, value: &Value) -> Option<Wire>;

    fn decode(&self, wire: &Wire) -> Value;
}

/// JSON codec.
///
/// Object keys that start with `$` are escaped with an extra `$` so user data
/// can never collide with the marker.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn marker() -> Wire {
        let mut map = Map::new();
        map.insert(UNREPRESENTABLE_KEY.to_string(), Wire::Bool(true));
        Wire::Object(map)
    }

    fn is_marker(map: &Map<String, Wire>) -> bool {
        map.len() == 1 && map.get(UNREPRESENTABLE_KEY) == Some(&Wire::Bool(true))
    }

    fn escape_key(key: &str) -> String {
        if key.starts_with('$') {
            format!("${}", key)
        } else {
            key.to_string()
        }
    }

    fn unescape_key(key: &str) -> String {
        match key.strip_prefix('$') {
            Some(rest) if rest.starts_with('$') => rest.to_string(),
            _ => key.to_string(),
        }
    }

    /// Encode a value that occupies a slot (a sequence element).
    fn encode_slot(&self, value: &Value) -> Wire {
        self.encode(value).unwrap_or_else(Self::marker)
    }
}

/// Integral numbers in the exactly-representable range go out as integers.
/// Negative zero stays a float to keep its sign.
fn encode_number(n: f64) -> Wire {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE && !negative_zero {
        return Wire::Number((n as i64).into());
    }
    // Non-finite numbers have no JSON form
    serde_json::Number::from_f64(n)
        .map(Wire::Number)
        .unwrap_or(Wire::Null)
}

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Option<Wire> {
        let wire = match value {
            Value::Undefined => return None,
            Value::Function(_) => Self::marker(),
            Value::Null => Wire::Null,
            Value::Bool(b) => Wire::Bool(*b),
            Value::Number(n) => encode_number(*n),
            Value::String(s) => Wire::String(s.clone()),
            Value::Array(items) => Wire::Array(items.iter().map(|v| self.encode_slot(v)).collect()),
            Value::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    if let Some(encoded) = self.encode(v) {
                        map.insert(Self::escape_key(k), encoded);
                    }
                }
                Wire::Object(map)
            }
        };
        Some(wire)
    }

    fn decode(&self, wire: &Wire) -> Value {
        match wire {
            Wire::Null => Value::Null,
            Wire::Bool(b) => Value::Bool(*b),
            Wire::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Wire::String(s) => Value::String(s.clone()),
            Wire::Array(items) => Value::Array(items.iter().map(|w| self.decode(w)).collect()),
            Wire::Object(map) if Self::is_marker(map) => Value::Undefined,
            Wire::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (Self::unescape_key(k), self.decode(v)))
                    .collect(),
            ),
        }
    }
}
