// crates/schema-registry-client/src/factory.rs
// ============================================================================
// Module: Credential Provider Factory
// Description: Builds credential providers from flat string configuration.
// Purpose: Select a bearer credential source by name at runtime.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The factory maps the `bearer.auth.credentials.source` value to a builder.
//! `STATIC_TOKEN` and `OAUTHBEARER` are registered by default; callers may
//! register more sources under new names.
//! Invariants:
//! - Source names are unique within a factory.
//! - Missing required keys are reported by their exact key name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::auth::CredentialProvider;
use crate::auth::StaticTokenProvider;
use crate::error::ConfigError;
use crate::oauth::OAuthClientConfig;
use crate::oauth::OAuthClientProvider;

// ============================================================================
// SECTION: Configuration Keys
// ============================================================================

/// Selects the credential source.
pub const CREDENTIALS_SOURCE: &str = "bearer.auth.credentials.source";
/// Static bearer token.
pub const TOKEN: &str = "bearer.auth.token";
/// OAuth client id.
pub const CLIENT_ID: &str = "bearer.auth.client.id";
/// OAuth client secret.
pub const CLIENT_SECRET: &str = "bearer.auth.client.secret";
/// OAuth scope.
pub const SCOPE: &str = "bearer.auth.scope";
/// OAuth token endpoint.
pub const ISSUER_ENDPOINT_URL: &str = "bearer.auth.issuer.endpoint.url";
/// Registry logical cluster id.
pub const LOGICAL_CLUSTER: &str = "bearer.auth.logical.cluster";
/// Identity pool id.
pub const IDENTITY_POOL_ID: &str = "bearer.auth.identity.pool.id";
/// OAuth retry count.
pub const MAX_RETRIES: &str = "bearer.auth.max.retries";
/// OAuth backoff base delay.
pub const RETRIES_WAIT_MS: &str = "bearer.auth.retries.wait.ms";
/// OAuth backoff ceiling.
pub const RETRIES_MAX_WAIT_MS: &str = "bearer.auth.retries.max.wait.ms";
/// OAuth refresh threshold.
pub const TOKEN_REFRESH_THRESHOLD: &str = "bearer.auth.token.refresh.threshold";
/// OAuth request timeout.
pub const TIMEOUT_SECS: &str = "bearer.auth.timeout.secs";

/// Source name for a pre-obtained token.
pub const SOURCE_STATIC_TOKEN: &str = "STATIC_TOKEN";
/// Source name for the OAuth client-credentials flow.
pub const SOURCE_OAUTHBEARER: &str = "OAUTHBEARER";

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builder for one credential source.
pub type ProviderBuilder = Box<
    dyn Fn(&BTreeMap<String, String>) -> Result<Arc<dyn CredentialProvider>, ConfigError>
        + Send
        + Sync,
>;

/// Registry of credential source builders.
///
/// # Invariants
/// - Source names are unique within the factory.
pub struct CredentialProviderFactory {
    /// Builders keyed by source name.
    builders: BTreeMap<String, ProviderBuilder>,
}

impl fmt::Debug for CredentialProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProviderFactory")
            .field("sources", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for CredentialProviderFactory {
    fn default() -> Self {
        Self::with_builtin_sources()
    }
}

impl CredentialProviderFactory {
    /// Creates a factory with no sources.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Creates a factory with `STATIC_TOKEN` and `OAUTHBEARER` registered.
    #[must_use]
    pub fn with_builtin_sources() -> Self {
        let mut builders: BTreeMap<String, ProviderBuilder> = BTreeMap::new();
        builders.insert(SOURCE_STATIC_TOKEN.to_string(), Box::new(build_static_token));
        builders.insert(SOURCE_OAUTHBEARER.to_string(), Box::new(build_oauth));
        Self {
            builders,
        }
    }

    /// Registers a builder under a new source name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the source name is already registered.
    pub fn register_source<F>(&mut self, source: impl Into<String>, builder: F) -> Result<(), ConfigError>
    where
        F: Fn(&BTreeMap<String, String>) -> Result<Arc<dyn CredentialProvider>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        let source = source.into();
        if self.builders.contains_key(&source) {
            return Err(ConfigError::Invalid(format!(
                "credential source already registered: {source}"
            )));
        }
        self.builders.insert(source, Box::new(builder));
        Ok(())
    }

    /// Returns the registered source names.
    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Builds the provider selected by `bearer.auth.credentials.source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the source is missing or unknown, or when the
    /// selected builder rejects the configuration.
    pub fn create(
        &self,
        config: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
        let source = required(config, CREDENTIALS_SOURCE)?;
        let Some(builder) = self.builders.get(source) else {
            return Err(ConfigError::InvalidValue {
                key: CREDENTIALS_SOURCE.to_string(),
                message: format!("unknown credential source: {source}"),
            });
        };
        builder(config)
    }
}

// ============================================================================
// SECTION: Builtin Sources
// ============================================================================

/// Builds a [`StaticTokenProvider`].
fn build_static_token(
    config: &BTreeMap<String, String>,
) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
    let token = required(config, TOKEN)?;
    if optional(config, LOGICAL_CLUSTER).is_empty() && optional(config, IDENTITY_POOL_ID).is_empty() {
        return Ok(Arc::new(StaticTokenProvider::new(token)?));
    }
    // Routing ids travel as a pair.
    let cluster = required(config, LOGICAL_CLUSTER)?;
    let pool = required(config, IDENTITY_POOL_ID)?;
    Ok(Arc::new(StaticTokenProvider::cloud(token, cluster, pool)?))
}

/// Builds an [`OAuthClientProvider`].
fn build_oauth(
    config: &BTreeMap<String, String>,
) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
    let defaults = OAuthClientConfig::default();
    let oauth = OAuthClientConfig {
        client_id: required(config, CLIENT_ID)?.to_string(),
        client_secret: required(config, CLIENT_SECRET)?.to_string(),
        scope: required(config, SCOPE)?.to_string(),
        token_endpoint_url: required(config, ISSUER_ENDPOINT_URL)?.to_string(),
        logical_cluster: optional(config, LOGICAL_CLUSTER).to_string(),
        identity_pool_id: optional(config, IDENTITY_POOL_ID).to_string(),
        max_retries: parsed(config, MAX_RETRIES, defaults.max_retries)?,
        retry_base_delay_ms: parsed(config, RETRIES_WAIT_MS, defaults.retry_base_delay_ms)?,
        retry_max_delay_ms: parsed(config, RETRIES_MAX_WAIT_MS, defaults.retry_max_delay_ms)?,
        token_refresh_threshold: parsed(
            config,
            TOKEN_REFRESH_THRESHOLD,
            defaults.token_refresh_threshold,
        )?,
        http_timeout_secs: parsed(config, TIMEOUT_SECS, defaults.http_timeout_secs)?,
    };
    Ok(Arc::new(OAuthClientProvider::new(oauth)?))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a required, non-empty value.
fn required<'a>(config: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, ConfigError> {
    match config.get(key) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(ConfigError::MissingKey {
            key: key.to_string(),
        }),
    }
}

/// Returns an optional value, empty when absent.
fn optional<'a>(config: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    config.get(key).map_or("", String::as_str)
}

/// Parses an optional value, falling back to `default` when absent or empty.
fn parsed<T>(config: &BTreeMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match config.get(key).map(|value| value.trim()) {
        None | Some("") => Ok(default),
        Some(value) => value.parse::<T>().map_err(|err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: err.to_string(),
        }),
    }
}
