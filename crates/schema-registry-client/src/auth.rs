// crates/schema-registry-client/src/auth.rs
// ============================================================================
// Module: Bearer Credentials
// Description: Credential provider capability plus static and custom providers.
// Purpose: Supply bearer fields for outbound registry requests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every bearer credential source implements [`CredentialProvider`]. The
//! transport only ever sees the trait object, so static tokens, the OAuth
//! client-credentials flow, and user-supplied functions are interchangeable.
//! Security posture: tokens are secrets; `Debug` output redacts them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::AuthError;
use crate::error::ConfigError;

// ============================================================================
// SECTION: Bearer Fields
// ============================================================================

/// Token plus the routing identifiers sent alongside it.
///
/// # Invariants
/// - Empty `logical_cluster` / `identity_pool_id` mean "omit the header".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BearerFields {
    /// Bearer access token.
    pub access_token: String,
    /// Registry logical cluster id (for example `lsrc-12345`).
    pub logical_cluster: String,
    /// Identity pool id (for example `pool-abcd`).
    pub identity_pool_id: String,
}

impl BearerFields {
    /// Creates bearer fields from their parts.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
        }
    }
}

impl fmt::Debug for BearerFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerFields")
            .field("access_token", &"<redacted>")
            .field("logical_cluster", &self.logical_cluster)
            .field("identity_pool_id", &self.identity_pool_id)
            .finish()
    }
}

// ============================================================================
// SECTION: Provider Capability
// ============================================================================

/// Source of bearer credentials.
///
/// Implementations must be safe to call from many threads at once and may
/// block while fetching or refreshing a token.
pub trait CredentialProvider: Send + Sync {
    /// Returns the bearer fields for the next request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when credentials cannot be obtained.
    fn get_bearer_fields(&self) -> Result<BearerFields, AuthError>;

    /// Returns only the access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when credentials cannot be obtained.
    fn get_access_token(&self) -> Result<String, AuthError> {
        self.get_bearer_fields().map(|fields| fields.access_token)
    }
}

// ============================================================================
// SECTION: Static Token
// ============================================================================

/// Provider for a pre-obtained token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    /// Fields returned on every call.
    fields: BearerFields,
}

impl StaticTokenProvider {
    /// Creates a provider for a bare token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `token` is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into();
        require_non_empty("access_token", &token)?;
        Ok(Self {
            fields: BearerFields::new(token, "", ""),
        })
    }

    /// Creates a provider for a cloud registry that also needs routing ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any of the three values is empty.
    pub fn cloud(
        token: impl Into<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let fields = BearerFields::new(token, logical_cluster, identity_pool_id);
        require_non_empty("access_token", &fields.access_token)?;
        require_non_empty("logical_cluster", &fields.logical_cluster)?;
        require_non_empty("identity_pool_id", &fields.identity_pool_id)?;
        Ok(Self {
            fields,
        })
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn get_bearer_fields(&self) -> Result<BearerFields, AuthError> {
        Ok(self.fields.clone())
    }
}

// ============================================================================
// SECTION: Custom Function
// ============================================================================

/// User-supplied token fetch function.
pub type TokenFetchFn = Arc<dyn Fn() -> Result<String, String> + Send + Sync>;

/// Provider that calls a user function on every request.
///
/// No caching is applied; wrap the function yourself if the source is expensive.
pub struct CustomTokenProvider {
    /// Token fetch function.
    fetch: TokenFetchFn,
    /// Logical cluster id, may be empty.
    logical_cluster: String,
    /// Identity pool id, may be empty.
    identity_pool_id: String,
}

impl CustomTokenProvider {
    /// Creates a provider without cloud routing ids.
    #[must_use]
    pub fn new(fetch: TokenFetchFn) -> Self {
        Self::with_cloud_ids(fetch, "", "")
    }

    /// Creates a provider that also reports cloud routing ids.
    #[must_use]
    pub fn with_cloud_ids(
        fetch: TokenFetchFn,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            fetch,
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
        }
    }
}

impl fmt::Debug for CustomTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTokenProvider")
            .field("logical_cluster", &self.logical_cluster)
            .field("identity_pool_id", &self.identity_pool_id)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider for CustomTokenProvider {
    fn get_bearer_fields(&self) -> Result<BearerFields, AuthError> {
        let token = (self.fetch)().map_err(AuthError::Custom)?;
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(BearerFields::new(token, self.logical_cluster.clone(), self.identity_pool_id.clone()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty required values.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} is required")));
    }
    Ok(())
}
