// crates/schema-registry-serdes/src/value.rs
// ============================================================================
// Module: Serde Values
// Description: Format-tagged values passed through the rule engine.
// Purpose: Let rules see decoded values and raw payload bytes through one type.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Encoding rules see [`SerdeValue::Bytes`]; domain and migration rules see
//! [`SerdeValue::Json`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::error::SerdeError;

// ============================================================================
// SECTION: Values
// ============================================================================

/// A value flowing through the rule pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SerdeValue {
    /// Decoded JSON value.
    Json(Value),
    /// Encoded payload bytes.
    Bytes(Vec<u8>),
}

impl SerdeValue {
    /// Returns the JSON value, if this is one.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Bytes(_) => None,
        }
    }

    /// Returns true for JSON values.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Unwraps a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when rules produced bytes instead.
    pub fn into_json(self) -> Result<Value, SerdeError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Bytes(_) => {
                Err(SerdeError::Serde("rule execution returned bytes where json was expected".to_string()))
            }
        }
    }

    /// Unwraps payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when rules produced a decoded value instead.
    pub fn into_bytes(self) -> Result<Vec<u8>, SerdeError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Json(_) => {
                Err(SerdeError::Serde("rule execution returned json where bytes were expected".to_string()))
            }
        }
    }
}
