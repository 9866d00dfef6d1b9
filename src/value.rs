//! Typed values attached to tree nodes.
//!
//! A [`Value`] is one of a boolean, a finite 64-bit float, or a string-keyed
//! map of nested values. The JSON form carries no tag: the kind of the JSON
//! token selects the variant.

use crate::error::{HubtreeError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Largest magnitude below which every integral `f64` is exactly an `i64`.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Float(f64),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a value from arbitrary JSON, validating every nested entry.
    ///
    /// Strings, arrays, null and numbers that do not fit a finite `f64` are
    /// rejected with [`HubtreeError::UnsupportedType`].
    pub fn from_json(input: serde_json::Value) -> Result<Self> {
        match input {
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                let f = n.as_f64().ok_or(HubtreeError::UnsupportedType("number"))?;
                Self::float(f)
            }
            serde_json::Value::Object(obj) => {
                let mut map = BTreeMap::new();
                for (key, entry) in obj {
                    map.insert(key, Self::from_json(entry)?);
                }
                Ok(Value::Map(map))
            }
            serde_json::Value::String(_) => Err(HubtreeError::UnsupportedType("string")),
            serde_json::Value::Array(_) => Err(HubtreeError::UnsupportedType("array")),
            serde_json::Value::Null => Err(HubtreeError::UnsupportedType("null")),
        }
    }

    fn float(f: f64) -> Result<Self> {
        if f.is_finite() {
            Ok(Value::Float(f))
        } else {
            Err(HubtreeError::UnsupportedType("non-finite number"))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(HubtreeError::TypeMismatch {
                expected: "bool",
                got: other.kind(),
            }),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(HubtreeError::TypeMismatch {
                expected: "float",
                got: other.kind(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(HubtreeError::TypeMismatch {
                expected: "map",
                got: other.kind(),
            }),
        }
    }

    /// Encodes this value as untagged JSON.
    ///
    /// Fails with [`HubtreeError::UnsupportedType`] if a float anywhere in
    /// the value is not finite.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Float(f) => {
                let negative_zero = *f == 0.0 && f.is_sign_negative();
                // Integral floats are written as `1`, not `1.0`.
                if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT && !negative_zero {
                    Ok(serde_json::Value::from(*f as i64))
                } else {
                    serde_json::Number::from_f64(*f)
                        .map(serde_json::Value::Number)
                        .ok_or(HubtreeError::UnsupportedType("non-finite number"))
                }
            }
            Value::Map(m) => {
                let mut obj = serde_json::Map::new();
                for (key, entry) in m {
                    obj.insert(key.clone(), entry.to_json()?);
                }
                Ok(serde_json::Value::Object(obj))
            }
        }
    }

    /// Canonical JSON text for this value.
    pub fn encode(&self) -> Result<String> {
        Ok(self.to_json()?.to_string())
    }

    /// Checks that every float in this value is finite.
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::Bool(_) => Ok(()),
            Value::Float(f) => Self::float(*f).map(|_| ()),
            Value::Map(m) => m.values().try_for_each(Value::validate),
        }
    }

    /// Parses a value from raw JSON text.
    ///
    /// The bare boolean spellings `t`, `True`, `FALSE` and friends are
    /// accepted ahead of JSON parsing. Anything that is not a boolean, a
    /// number or an object of decodable values fails with
    /// [`HubtreeError::Decode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| HubtreeError::Decode(e.to_string()))?
            .trim();

        if let Some(b) = parse_bool(text) {
            return Ok(Value::Bool(b));
        }

        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| HubtreeError::Decode(e.to_string()))?;
        Self::from_json(json).map_err(|e| HubtreeError::Decode(e.to_string()))
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl TryFrom<f64> for Value {
    type Error = HubtreeError;

    fn try_from(f: f64) -> Result<Self> {
        Self::float(f)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = HubtreeError;

    fn try_from(input: serde_json::Value) -> Result<Self> {
        Self::from_json(input)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = self.to_json().map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}
