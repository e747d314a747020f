// crates/schema-registry-client/src/error.rs
// ============================================================================
// Module: Registry Client Errors
// Description: Typed failures for configuration, credentials, and registry calls.
// Purpose: Surface enough context to diagnose failures without a debugger.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Errors are split by concern: [`ConfigError`] for invalid or missing
//! configuration, [`AuthError`] for credential acquisition, and
//! [`RegistryError`] for everything that happens on the way to and from the
//! remote registry.
//! Invariants:
//! - HTTP failures always carry the status code and the raw response body.
//! - Configuration failures name the offending key or field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Configuration Errors
// ============================================================================

/// Invalid or missing configuration. Never retried.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required configuration key is absent or empty.
    #[error("missing required configuration key: {key}")]
    MissingKey {
        /// Name of the missing key.
        key: String,
    },
    /// A configuration value could not be interpreted.
    #[error("invalid value for configuration key {key}: {message}")]
    InvalidValue {
        /// Name of the offending key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
    /// A configuration object failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Credential Errors
// ============================================================================

/// Credential acquisition failures.
///
/// # Invariants
/// - Token values are never embedded in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token endpoint kept failing after all retry attempts.
    #[error("oauth token request failed after {attempts} attempts (status {status}): {body}")]
    TokenRequest {
        /// Last observed HTTP status, `0` for transport failures.
        status: u16,
        /// Last observed response body or transport error message.
        body: String,
        /// Total attempts made, including the first one.
        attempts: u32,
    },
    /// A credential source produced an empty access token.
    #[error("credential source returned an empty access token")]
    EmptyToken,
    /// A user-supplied token function failed.
    #[error("{0}")]
    Custom(String),
    /// The provider configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Internal token state lock was poisoned.
    #[error("token state lock poisoned")]
    Lock,
}

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Failures talking to the schema registry.
///
/// # Invariants
/// - `Http` is returned for every status code >= 400.
/// - Caches are never written when any variant is returned.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry responded with an error status.
    #[error("registry http error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// No configured base URL could be reached.
    #[error("registry transport error: {0}")]
    Transport(String),
    /// A successful response could not be parsed.
    #[error("failed to parse {context}: {message}")]
    Parse {
        /// What was being parsed.
        context: &'static str,
        /// Parser error message.
        message: String,
    },
    /// Client configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bearer credentials could not be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// A cache lock was poisoned.
    #[error("registry cache lock poisoned: {0}")]
    Lock(&'static str),
}

impl RegistryError {
    /// Returns the HTTP status for `Http` errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}
