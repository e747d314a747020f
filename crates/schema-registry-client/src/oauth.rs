// crates/schema-registry-client/src/oauth.rs
// ============================================================================
// Module: OAuth Client Credentials Provider
// Description: Cached, proactively refreshed bearer tokens from an OAuth endpoint.
// Purpose: Obtain short-lived tokens with at most one fetch in flight.
// Dependencies: reqwest, serde, time, tracing, url
// ============================================================================

//! ## Overview
//! [`OAuthClientProvider`] implements the client-credentials grant and keeps a
//! single [`OAuthToken`] behind a reader/writer lock. Readers share the lock
//! while the token is fresh. When it is missing or past its refresh point, one
//! caller takes the write lock, re-checks, and fetches while every other caller
//! waits, so a burst of callers produces exactly one token request.
//! Invariants:
//! - The token is replaced wholesale on refresh and never mutated in place.
//! - Every failure is retried until `max_retries` extra attempts are spent.
//! Security posture: client secrets and tokens are never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;
use std::thread;
use std::time::Duration as StdDuration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use time::Duration;
use time::OffsetDateTime;
use tracing::debug;
use tracing::warn;
use url::form_urlencoded;

use crate::auth::BearerFields;
use crate::auth::CredentialProvider;
use crate::backoff::JitterSource;
use crate::backoff::ThreadRngJitter;
use crate::backoff::backoff;
use crate::backoff::is_retriable;
use crate::error::AuthError;
use crate::error::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token lifetime assumed when the endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Access token with expiry tracking.
///
/// # Invariants
/// - Valid iff `access_token` is non-empty.
/// - Invalid tokens always report as expired.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthToken {
    /// Bearer access token.
    pub access_token: String,
    /// Absolute expiry time.
    pub expires_at: OffsetDateTime,
    /// Lifetime granted by the endpoint.
    pub expires_in_seconds: i64,
}

impl Default for OAuthToken {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            expires_at: OffsetDateTime::UNIX_EPOCH,
            expires_in_seconds: 0,
        }
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("valid", &self.is_valid())
            .field("expires_at", &self.expires_at)
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

impl OAuthToken {
    /// Creates a token that expires `expires_in_seconds` from now.
    #[must_use]
    pub fn issued_now(access_token: impl Into<String>, expires_in_seconds: i64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(expires_in_seconds),
            expires_in_seconds,
        }
    }

    /// Returns true when the token holds a value.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Returns true once `threshold` of the lifetime has elapsed.
    #[must_use]
    pub fn is_expired(&self, threshold: f64) -> bool {
        self.is_expired_at(threshold, OffsetDateTime::now_utc())
    }

    /// Same as [`Self::is_expired`] against an explicit clock reading.
    ///
    /// The refresh point is `expires_at - (1 - threshold) * expires_in`,
    /// compared at millisecond precision. It never falls within the first
    /// second after issue, so a token fetched with `threshold = 0` is usable
    /// for at least one call. A token is always expired at `expires_at`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        reason = "Lifetimes are small millisecond counts; float casts saturate."
    )]
    pub fn is_expired_at(&self, threshold: f64, now: OffsetDateTime) -> bool {
        if !self.is_valid() || now >= self.expires_at {
            return true;
        }
        let lifetime_ms = self.expires_in_seconds.saturating_mul(MILLIS_PER_SECOND);
        let buffer_ms = (lifetime_ms as f64 * (1.0 - threshold)).round() as i64;
        let buffer_ms = buffer_ms.min(lifetime_ms.saturating_sub(MILLIS_PER_SECOND)).max(0);
        self.expires_at - now <= Duration::milliseconds(buffer_ms)
    }
}

/// Milliseconds in one second.
const MILLIS_PER_SECOND: i64 = 1_000;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the client-credentials flow.
///
/// # Invariants
/// - `client_id`, `client_secret`, `scope`, `token_endpoint_url` are non-empty.
/// - `0 < retry_base_delay_ms <= retry_max_delay_ms`.
/// - `token_refresh_threshold` is within `[0, 1]`.
/// - `http_timeout_secs > 0`.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OAuthClientConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Requested scope.
    pub scope: String,
    /// Token endpoint URL.
    pub token_endpoint_url: String,
    /// Registry logical cluster id, may be empty.
    pub logical_cluster: String,
    /// Identity pool id, may be empty.
    pub identity_pool_id: String,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Backoff base delay in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Fraction of the lifetime after which the token is refreshed.
    pub token_refresh_threshold: f64,
    /// Token request timeout in seconds.
    pub http_timeout_secs: u64,
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scope: String::new(),
            token_endpoint_url: String::new(),
            logical_cluster: String::new(),
            identity_pool_id: String::new(),
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 20_000,
            token_refresh_threshold: 0.8,
            http_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("token_endpoint_url", &self.token_endpoint_url)
            .field("logical_cluster", &self.logical_cluster)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("token_refresh_threshold", &self.token_refresh_threshold)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl OAuthClientConfig {
    /// Validates required fields and numeric relationships.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", &self.scope),
            ("token_endpoint_url", &self.token_endpoint_url),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{field} is required")));
            }
        }
        if self.retry_base_delay_ms == 0 {
            return Err(ConfigError::Invalid("retry_base_delay_ms must be positive".to_string()));
        }
        if self.retry_max_delay_ms == 0 {
            return Err(ConfigError::Invalid("retry_max_delay_ms must be positive".to_string()));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry_base_delay_ms ({}) must not exceed retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.token_refresh_threshold) {
            return Err(ConfigError::Invalid(
                "token_refresh_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// OAuth 2.0 client-credentials provider with a shared token cache.
pub struct OAuthClientProvider {
    /// Validated configuration.
    config: OAuthClientConfig,
    /// Client used for token requests.
    http: Client,
    /// Jitter source for retry delays.
    jitter: Arc<dyn JitterSource>,
    /// Cached token; empty until the first fetch.
    token: RwLock<OAuthToken>,
}

impl fmt::Debug for OAuthClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientProvider").field("config", &self.config).finish_non_exhaustive()
    }
}

impl OAuthClientProvider {
    /// Creates a provider after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or HTTP client construction fails.
    pub fn new(config: OAuthClientConfig) -> Result<Self, ConfigError> {
        Self::with_jitter(config, Arc::new(ThreadRngJitter))
    }

    /// Creates a provider with an explicit jitter source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or HTTP client construction fails.
    pub fn with_jitter(
        config: OAuthClientConfig,
        jitter: Arc<dyn JitterSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(StdDuration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|err| ConfigError::Invalid(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            http,
            jitter,
            token: RwLock::new(OAuthToken::default()),
        })
    }

    /// Returns the provider configuration.
    #[must_use]
    pub const fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Drops the cached token so the next call fetches a new one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Lock`] when the token lock is poisoned.
    pub fn invalidate_token(&self) -> Result<(), AuthError> {
        let mut token = self.token.write().map_err(|_| AuthError::Lock)?;
        *token = OAuthToken::default();
        Ok(())
    }

    /// Builds bearer fields around an access token.
    fn fields_for(&self, access_token: &str) -> BearerFields {
        BearerFields::new(
            access_token,
            self.config.logical_cluster.clone(),
            self.config.identity_pool_id.clone(),
        )
    }

    /// Fetches a token, retrying with backoff.
    fn fetch_token(&self) -> Result<OAuthToken, AuthError> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .append_pair("scope", &self.config.scope)
            .finish();
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last = TokenFailure {
            status: 0,
            body: String::new(),
        };
        for attempt in 0..attempts {
            let failure = match self.request_token(&body) {
                Ok(token) => {
                    debug!(
                        expires_in = token.expires_in_seconds,
                        attempt, "oauth token refreshed"
                    );
                    return Ok(token);
                }
                Err(failure) => failure,
            };
            if failure.status == 0 {
                // Transport failures carry no status and are always retried.
                debug!(attempt, "oauth token endpoint unreachable");
            } else {
                debug!(
                    status = failure.status,
                    retriable_status = is_retriable(failure.status),
                    attempt,
                    "oauth token endpoint returned an error"
                );
            }
            last = failure;
            if attempt.saturating_add(1) < attempts {
                let delay = backoff(
                    self.config.retry_base_delay_ms,
                    attempt,
                    self.config.retry_max_delay_ms,
                    self.jitter.as_ref(),
                );
                warn!(
                    status = last.status,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "oauth token request failed; retrying"
                );
                thread::sleep(delay);
            }
        }
        Err(AuthError::TokenRequest {
            status: last.status,
            body: last.body,
            attempts,
        })
    }

    /// Performs one token request.
    fn request_token(&self, body: &str) -> Result<OAuthToken, TokenFailure> {
        let response = self
            .http
            .post(&self.config.token_endpoint_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|err| TokenFailure::transport(&err))?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|err| TokenFailure::transport(&err))?;
        if !(200..300).contains(&status) {
            return Err(TokenFailure {
                status,
                body: text,
            });
        }
        parse_token_response(&text).map_err(|message| TokenFailure {
            status,
            body: message,
        })
    }
}

impl CredentialProvider for OAuthClientProvider {
    fn get_bearer_fields(&self) -> Result<BearerFields, AuthError> {
        let threshold = self.config.token_refresh_threshold;
        {
            let token = self.token.read().map_err(|_| AuthError::Lock)?;
            if !token.is_expired(threshold) {
                return Ok(self.fields_for(&token.access_token));
            }
        }
        let mut token = self.token.write().map_err(|_| AuthError::Lock)?;
        // Another caller may have refreshed while we waited for the write lock.
        if token.is_expired(threshold) {
            *token = self.fetch_token()?;
        }
        Ok(self.fields_for(&token.access_token))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// One failed token request.
struct TokenFailure {
    /// HTTP status, `0` for transport failures.
    status: u16,
    /// Response body or error message.
    body: String,
}

impl TokenFailure {
    /// Wraps a transport error.
    fn transport(err: &reqwest::Error) -> Self {
        Self {
            status: 0,
            body: err.to_string(),
        }
    }
}

/// Token endpoint response body.
#[derive(Deserialize)]
struct TokenResponse {
    /// Issued access token.
    access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Parses a token endpoint response body.
fn parse_token_response(body: &str) -> Result<OAuthToken, String> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|err| format!("failed to parse oauth token response: {err}"))?;
    if parsed.access_token.is_empty() {
        return Err("oauth token response has an empty access_token".to_string());
    }
    let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    Ok(OAuthToken::issued_now(parsed.access_token, expires_in))
}
