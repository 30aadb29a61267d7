//! Core value objects
//!
//! Scalar values, cardinalities and index modes. They are compared by value
//! and carry the validation rules of the meta model.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod uris;

/// The scalar value of a topic or association
///
/// On the wire a simple value is the bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimpleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SimpleValue {
    /// The empty value a freshly created object of the given data type gets
    pub fn default_for(data_type_uri: &str) -> Self {
        match data_type_uri {
            uris::NUMBER => SimpleValue::Int(0),
            uris::BOOLEAN => SimpleValue::Bool(false),
            _ => SimpleValue::Text(String::new()),
        }
    }

    /// Name of the runtime kind, used in mismatch reports
    pub fn kind(&self) -> &'static str {
        match self {
            SimpleValue::Bool(_) => "boolean",
            SimpleValue::Int(_) | SimpleValue::Float(_) => "number",
            SimpleValue::Text(_) => "text",
        }
    }

    /// True for the empty text
    pub fn is_empty(&self) -> bool {
        matches!(self, SimpleValue::Text(s) if s.is_empty())
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SimpleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check the runtime kind against a declared data type
    pub fn check_data_type(&self, data_type_uri: &str) -> CoreResult<()> {
        let ok = match data_type_uri {
            uris::TEXT | uris::HTML | uris::COMPOSITE => matches!(self, SimpleValue::Text(_)),
            uris::NUMBER => matches!(self, SimpleValue::Int(_) | SimpleValue::Float(_)),
            uris::BOOLEAN => matches!(self, SimpleValue::Bool(_)),
            other => {
                return Err(CoreError::InvalidState(format!(
                    "\"{other}\" is not a known data type"
                )))
            }
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::type_mismatch(data_type_uri, self.kind()))
        }
    }
}

impl Default for SimpleValue {
    fn default() -> Self {
        SimpleValue::Text(String::new())
    }
}

impl fmt::Display for SimpleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimpleValue::Bool(b) => write!(f, "{b}"),
            SimpleValue::Int(n) => write!(f, "{n}"),
            SimpleValue::Float(n) => write!(f, "{n}"),
            SimpleValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for SimpleValue {
    fn from(s: &str) -> Self {
        SimpleValue::Text(s.to_string())
    }
}

impl From<String> for SimpleValue {
    fn from(s: String) -> Self {
        SimpleValue::Text(s)
    }
}

impl From<i64> for SimpleValue {
    fn from(n: i64) -> Self {
        SimpleValue::Int(n)
    }
}

impl From<f64> for SimpleValue {
    fn from(n: f64) -> Self {
        SimpleValue::Float(n)
    }
}

impl From<bool> for SimpleValue {
    fn from(b: bool) -> Self {
        SimpleValue::Bool(b)
    }
}

/// Per-side cardinality of an association definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "dm4.core.one")]
    One,
    #[serde(rename = "dm4.core.many")]
    Many,
}

impl Cardinality {
    /// Parse a cardinality URI; only the two enumerated URIs are accepted
    pub fn from_uri(uri: &str) -> CoreResult<Self> {
        match uri {
            uris::ONE => Ok(Cardinality::One),
            uris::MANY => Ok(Cardinality::Many),
            other => Err(CoreError::InvalidState(format!(
                "\"{other}\" is not a cardinality URI (expected \"{}\" or \"{}\")",
                uris::ONE,
                uris::MANY
            ))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Cardinality::One => uris::ONE,
            Cardinality::Many => uris::MANY,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// How instances of a type are indexed by the storage collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexMode {
    #[serde(rename = "dm4.core.off")]
    Off,
    #[serde(rename = "dm4.core.key")]
    Key,
    #[serde(rename = "dm4.core.fulltext")]
    Fulltext,
    #[serde(rename = "dm4.core.fulltext_key")]
    FulltextKey,
}

impl IndexMode {
    pub const ALL: [IndexMode; 4] = [
        IndexMode::Off,
        IndexMode::Key,
        IndexMode::Fulltext,
        IndexMode::FulltextKey,
    ];

    pub fn from_uri(uri: &str) -> CoreResult<Self> {
        match uri {
            uris::INDEX_OFF => Ok(IndexMode::Off),
            uris::INDEX_KEY => Ok(IndexMode::Key),
            uris::INDEX_FULLTEXT => Ok(IndexMode::Fulltext),
            uris::INDEX_FULLTEXT_KEY => Ok(IndexMode::FulltextKey),
            other => Err(CoreError::InvalidState(format!(
                "\"{other}\" is not an index mode URI"
            ))),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            IndexMode::Off => uris::INDEX_OFF,
            IndexMode::Key => uris::INDEX_KEY,
            IndexMode::Fulltext => uris::INDEX_FULLTEXT,
            IndexMode::FulltextKey => uris::INDEX_FULLTEXT_KEY,
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}
