// crates/schema-registry-client/src/rest.rs
// ============================================================================
// Module: REST Transport
// Description: Blocking HTTP transport with base-URL failover and authentication.
// Purpose: Send one registry request and return its body or a typed failure.
// Dependencies: reqwest, url, tracing
// ============================================================================

//! ## Overview
//! [`RestClient`] tries each base URL in order and moves on only when the
//! request never produced a response. Any response with status >= 400 is
//! final and surfaces as [`RegistryError::Http`]. Response bodies are read
//! with a hard size limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::io::Read;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use crate::auth::BearerFields;
use crate::config::Authentication;
use crate::config::ClientConfig;
use crate::config::parse_base_url;
use crate::error::ConfigError;
use crate::error::RegistryError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type for registry request bodies.
pub const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";
/// Accepted response content types.
const ACCEPT_TYPES: &str =
    "application/vnd.schemaregistry.v1+json, application/vnd.schemaregistry+json, application/json";
/// Header carrying the registry logical cluster id.
pub const TARGET_CLUSTER_HEADER: &str = "target-sr-cluster";
/// Header carrying the identity pool id.
pub const IDENTITY_POOL_HEADER: &str = "Confluent-Identity-Pool-Id";

// ============================================================================
// SECTION: Path Encoding
// ============================================================================

/// Percent-encodes one path segment.
///
/// ASCII alphanumerics and `-`, `_`, `.`, `~` pass through; every other byte
/// becomes `%XX` with uppercase hex.
#[must_use]
pub fn url_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Blocking registry transport.
///
/// # Invariants
/// - `base_urls` is non-empty.
/// - Bearer fields are fetched once per request, before the first attempt.
pub struct RestClient {
    /// Parsed base URLs, tried in order.
    base_urls: Vec<Url>,
    /// HTTP client.
    http: Client,
    /// Request authentication.
    authentication: Authentication,
    /// Maximum response size, in bytes.
    max_response_bytes: usize,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_urls", &self.base_urls)
            .field("authentication", &self.authentication)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Creates a transport from validated client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_urls =
            config.base_urls.iter().map(|raw| parse_base_url(raw)).collect::<Result<Vec<_>, _>>()?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ConfigError::Invalid(format!("http client build failed: {err}")))?;
        Ok(Self {
            base_urls,
            http,
            authentication: config.authentication.clone(),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Sends a request and returns the response body.
    ///
    /// `path` must already be percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Http`] for status >= 400,
    /// [`RegistryError::Transport`] when no base URL answered, and
    /// [`RegistryError::Auth`] when bearer credentials are unavailable.
    pub fn send(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<String, RegistryError> {
        let bearer = match &self.authentication {
            Authentication::Bearer(provider) => Some(provider.get_bearer_fields()?),
            _ => None,
        };
        let mut last_error = String::from("no base urls configured");
        for base in &self.base_urls {
            let url = build_url(base, path, query)?;
            let request = self.prepare(method, url.clone(), bearer.as_ref(), body.clone());
            match request.send() {
                Ok(response) => return self.finish(method, &url, response),
                Err(err) => {
                    debug!(%method, url = %url, error = %err, "registry url unreachable; trying next");
                    last_error = format!("{url}: {err}");
                }
            }
        }
        Err(RegistryError::Transport(last_error))
    }

    /// Builds a request with headers and authentication.
    fn prepare(
        &self,
        method: &Method,
        url: Url,
        bearer: Option<&BearerFields>,
        body: Option<Vec<u8>>,
    ) -> RequestBuilder {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, ACCEPT_TYPES)
            .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE);
        match (&self.authentication, bearer) {
            (
                Authentication::Basic {
                    username,
                    password,
                },
                _,
            ) => {
                request = request.basic_auth(username, Some(password));
            }
            (_, Some(fields)) => {
                request = request.header(AUTHORIZATION, format!("Bearer {}", fields.access_token));
                if !fields.logical_cluster.is_empty() {
                    request = request.header(TARGET_CLUSTER_HEADER, fields.logical_cluster.as_str());
                }
                if !fields.identity_pool_id.is_empty() {
                    request = request.header(IDENTITY_POOL_HEADER, fields.identity_pool_id.as_str());
                }
            }
            _ => {}
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request
    }

    /// Reads the response body and maps error statuses.
    fn finish(
        &self,
        method: &Method,
        url: &Url,
        mut response: Response,
    ) -> Result<String, RegistryError> {
        let status = response.status().as_u16();
        let body = read_response_limited(&mut response, self.max_response_bytes)?;
        let body = String::from_utf8_lossy(&body).into_owned();
        debug!(%method, url = %url, status, "registry response");
        if status >= 400 {
            return Err(RegistryError::Http {
                status,
                body,
            });
        }
        Ok(body)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins a base URL with an encoded path and query pairs.
fn build_url(base: &Url, path: &str, query: &[(&str, String)]) -> Result<Url, RegistryError> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    let mut url = Url::parse(&joined).map_err(|err| {
        RegistryError::Config(ConfigError::InvalidValue {
            key: "base_urls".to_string(),
            message: format!("{joined}: {err}"),
        })
    })?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Reads a response body with a hard size limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, RegistryError> {
    let max_bytes_u64 = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(RegistryError::Transport(format!(
            "registry response exceeds size limit ({expected} > {max_bytes})"
        )));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| RegistryError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(RegistryError::Transport(format!(
            "registry response exceeds size limit ({max_bytes} bytes)"
        )));
    }
    Ok(buf)
}
