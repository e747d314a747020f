// crates/schema-registry-client/src/config.rs
// ============================================================================
// Module: Client Configuration
// Description: Connection, authentication, and cache settings for the registry client.
// Purpose: Validate client settings before any request is made.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! [`ClientConfig`] deserializes from plain data. Authentication is attached
//! at runtime because bearer credentials are live provider objects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::auth::CredentialProvider;
use crate::error::ConfigError;

// ============================================================================
// SECTION: Authentication
// ============================================================================

/// How outbound registry requests authenticate.
#[derive(Clone, Default)]
pub enum Authentication {
    /// No credentials.
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token with optional cloud routing headers.
    Bearer(Arc<dyn CredentialProvider>),
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic {
                username, ..
            } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => f.write_str("Bearer(<provider>)"),
        }
    }
}

// ============================================================================
// SECTION: Client Configuration
// ============================================================================

/// Registry client configuration.
///
/// # Invariants
/// - `base_urls` holds at least one absolute `http`/`https` URL.
/// - `timeout_ms` and `max_response_bytes` are positive.
/// - `cache_latest_ttl_secs == None` keeps "latest" lookups until evicted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Registry base URLs, tried in order.
    pub base_urls: Vec<String>,
    /// Request authentication.
    #[serde(skip)]
    pub authentication: Authentication,
    /// Capacity of each "latest" cache.
    pub cache_capacity: usize,
    /// Lifetime of "latest" cache entries in seconds.
    pub cache_latest_ttl_secs: Option<u64>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_urls: Vec::new(),
            authentication: Authentication::None,
            cache_capacity: 1_000,
            cache_latest_ttl_secs: None,
            timeout_ms: 30_000,
            max_response_bytes: 16 * 1024 * 1024,
            user_agent: concat!("schema-registry-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for a single registry URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_urls: vec![base_url.into()],
            ..Self::default()
        }
    }

    /// Attaches a bearer credential provider.
    #[must_use]
    pub fn with_bearer(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.authentication = Authentication::Bearer(provider);
        self
    }

    /// Attaches basic authentication.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authentication = Authentication::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Sets the "latest" cache lifetime.
    #[must_use]
    pub const fn with_latest_ttl_secs(mut self, ttl_secs: Option<u64>) -> Self {
        self.cache_latest_ttl_secs = ttl_secs;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_urls.is_empty() {
            return Err(ConfigError::Invalid("at least one base url is required".to_string()));
        }
        for raw in &self.base_urls {
            parse_base_url(raw)?;
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid("max_response_bytes must be positive".to_string()));
        }
        if let Authentication::Basic {
            username, ..
        } = &self.authentication
            && username.is_empty()
        {
            return Err(ConfigError::Invalid("basic auth username is required".to_string()));
        }
        Ok(())
    }
}

/// Parses and checks one base URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidValue {
        key: "base_urls".to_string(),
        message: format!("{raw}: {err}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue {
            key: "base_urls".to_string(),
            message: format!("unsupported url scheme: {other}"),
        }),
    }
}
