//! Caller-supplied authorize request parameters

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar custom parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CustomParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for CustomParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CustomParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CustomParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CustomParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Key to scalar mapping persisted across the redirect or iframe round trip.
///
/// Ordered so that generated URLs and request bodies are deterministic.
pub type CustomParams = BTreeMap<String, CustomParamValue>;
