// crates/schema-registry-serdes/src/error.rs
// ============================================================================
// Module: Serdes Errors
// Description: Failure taxonomy for framing, subject resolution, rules, and validation.
// Purpose: Surface every codec failure with enough context to diagnose it.
// Dependencies: thiserror, schema-registry-client
// ============================================================================

//! ## Overview
//! [`SerdeError`] is the single error type returned by the codecs. Registry
//! failures convert via `#[from]` so `?` works across the crate boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use schema_registry_client::ConfigError;
use schema_registry_client::RegistryError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Codec failures.
///
/// # Invariants
/// - `Validation` is always fatal; rule actions never see it.
/// - `Rule` carries the name of the rule whose `ERROR` action fired.
#[derive(Debug, Error)]
pub enum SerdeError {
    /// Codec or executor configuration was rejected.
    #[error("serde configuration error: {0}")]
    Config(String),
    /// The registry could not supply a schema.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Framing, subject resolution, or payload encoding failed.
    #[error("serialization error: {0}")]
    Serde(String),
    /// A rule failed under an `ERROR` action.
    #[error("rule {rule} failed: {message}")]
    Rule {
        /// Rule name.
        rule: String,
        /// Failure description.
        message: String,
    },
    /// The value does not conform to its schema.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for SerdeError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SerdeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(format!("json: {err}"))
    }
}
