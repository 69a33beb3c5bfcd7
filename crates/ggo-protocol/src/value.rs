use std::fmt;

use serde::{Deserialize, Serialize};

/// A variable value as carried by device state messages.
///
/// Serialized untagged, so JSON hosts see plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Equality as the host sees it: `Int(1)` and `Float(1.0)` are the same.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(i), Value::Float(x)) | (Value::Float(x), Value::Int(i)) => {
                *i as f64 == *x
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    /// Integral floats render without a fractional part (`3.0` → `3`), which
    /// keeps channel suffixes stable whichever numeric type the device sends.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_displays_like_integer() {
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn numeric_values_compare_across_types() {
        assert!(Value::Int(1).same_as(&Value::Float(1.0)));
        assert!(Value::Float(1.0).same_as(&Value::Int(1)));
        assert!(!Value::Int(1).same_as(&Value::Float(1.5)));
        assert!(!Value::Int(1).same_as(&Value::Bool(true)));
        assert!(Value::from("a").same_as(&Value::from("a")));
    }

    #[test]
    fn untagged_json_roundtrip_keeps_numeric_kind() {
        let int: Value = serde_json::from_str("7").unwrap();
        let float: Value = serde_json::from_str("7.5").unwrap();
        let text: Value = serde_json::from_str(r#""Stage""#).unwrap();
        let flag: Value = serde_json::from_str("true").unwrap();

        assert_eq!(int, Value::Int(7));
        assert_eq!(float, Value::Float(7.5));
        assert_eq!(text, Value::Text("Stage".to_string()));
        assert_eq!(flag, Value::Bool(true));
    }
}
