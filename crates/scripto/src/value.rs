//! Parameter types and runtime values

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// The closed set of types a parameter may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int,
    Float,
    Str,
    Bool,
    StrList,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::StrList => "list[str]",
        }
    }

    /// Parse a raw string into a value of this type
    pub fn parse(&self, raw: &str) -> Result<Value, CoercionError> {
        let fail = || CoercionError {
            raw: raw.to_string(),
            expected: *self,
        };

        match self {
            Self::Int => raw.trim().parse().map(Value::Int).map_err(|_| fail()),
            Self::Float => raw.trim().parse().map(Value::Float).map_err(|_| fail()),
            Self::Str => Ok(Value::Str(raw.to_string())),
            Self::Bool => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "n" | "off" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            Self::StrList => Ok(Value::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
        }
    }

    /// Check a value against this type, widening integers to floats
    pub fn admit(&self, value: &Value) -> Result<Value, CoercionError> {
        match (self, value) {
            (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_))
            | (Self::Str, Value::Str(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::StrList, Value::List(_)) => Ok(value.clone()),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            _ => Err(CoercionError {
                raw: value.to_string(),
                expected: *self,
            }),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw string that does not fit the requested type
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid {expected} value: '{raw}'")]
pub struct CoercionError {
    pub raw: String,
    pub expected: ParamType,
}

/// A parsed argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::Str(_) => ParamType::Str,
            Self::Bool(_) => ParamType::Bool,
            Self::List(_) => ParamType::StrList,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Str(a), Self::Str(b)) => a.partial_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::List(a), Self::List(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Sort values in their natural order, falling back to rendered text
pub fn sort_values(values: &mut [Value]) {
    values.sort_by(|a, b| {
        a.partial_cmp(b)
            .unwrap_or_else(|| a.to_string().cmp(&b.to_string()))
    });
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}
