// crates/schema-registry-client/src/client.rs
// ============================================================================
// Module: Schema Registry Client
// Description: Caching client for the schema registry REST API.
// Purpose: Resolve schemas by id, guid, content, and version with minimal round trips.
// Dependencies: reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`SchemaRegistryClient`] fronts the registry REST API with two cache tiers:
//! - the [`SchemaStore`] for immutable facts (ids, guids, fixed versions),
//! - TTL/LRU caches for "latest" lookups that change as subjects evolve.
//!
//! Reads follow one pattern: consult the cache, make one HTTP round trip on a
//! miss, parse, write through, return. Nothing is cached from a failed or
//! unparsable response.
//! Deletes do not invalidate the "latest" caches; callers that delete and then
//! read "latest" within the TTL window can observe the deleted version until
//! [`SchemaRegistryClient::clear_latest_caches`] is called.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::TtlLruCache;
use crate::config::ClientConfig;
use crate::error::RegistryError;
use crate::model::Association;
use crate::model::AssociationCreateOrUpdateRequest;
use crate::model::AssociationResponse;
use crate::model::RegisteredSchema;
use crate::model::Schema;
use crate::model::ServerConfig;
use crate::rest::RestClient;
use crate::rest::url_encode;
use crate::store::SchemaStore;

// ============================================================================
// SECTION: Request Options
// ============================================================================

/// Filters for [`SchemaRegistryClient::get_associations_by_resource_name`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationQuery {
    /// Resource name, typically a topic.
    pub resource_name: String,
    /// Optional resource namespace.
    pub resource_namespace: Option<String>,
    /// Optional resource type.
    pub resource_type: Option<String>,
    /// Association types to include (`key`, `value`).
    pub association_types: Vec<String>,
    /// Optional lifecycle filter.
    pub lifecycle: Option<String>,
    /// Result offset; zero is omitted.
    pub offset: u32,
    /// Result limit.
    pub limit: Option<u32>,
}

impl AssociationQuery {
    /// Creates a query for one resource name.
    #[must_use]
    pub fn for_resource(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            ..Self::default()
        }
    }

    /// Restricts the query to one association type.
    #[must_use]
    pub fn with_association_type(mut self, association_type: impl Into<String>) -> Self {
        self.association_types.push(association_type.into());
        self
    }

    /// Renders the query string pairs.
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("resourceName", self.resource_name.clone())];
        if let Some(namespace) = &self.resource_namespace {
            query.push(("resourceNamespace", namespace.clone()));
        }
        if let Some(resource_type) = &self.resource_type {
            query.push(("resourceType", resource_type.clone()));
        }
        for association_type in &self.association_types {
            query.push(("associationType", association_type.clone()));
        }
        if let Some(lifecycle) = &self.lifecycle {
            query.push(("lifecycle", lifecycle.clone()));
        }
        if self.offset > 0 {
            query.push(("offset", self.offset.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

/// Compatibility response body.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompatibilityResponse {
    /// Bare boolean.
    Bare(bool),
    /// Object form.
    Object {
        /// Compatibility verdict.
        is_compatible: bool,
    },
}

impl CompatibilityResponse {
    /// Returns the verdict.
    const fn is_compatible(&self) -> bool {
        match self {
            Self::Bare(value)
            | Self::Object {
                is_compatible: value,
            } => *value,
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Caching schema registry client.
///
/// # Invariants
/// - Store and caches are written only after a fully parsed 2xx response.
/// - Registry errors are never retried by the client.
pub struct SchemaRegistryClient {
    /// Client configuration.
    config: ClientConfig,
    /// HTTP transport.
    rest: RestClient,
    /// Immutable-fact store.
    store: SchemaStore,
    /// Latest version per subject.
    latest_version_cache: TtlLruCache<String, RegisteredSchema>,
    /// Latest version per subject and metadata filter.
    latest_with_metadata_cache: TtlLruCache<String, RegisteredSchema>,
}

impl std::fmt::Debug for SchemaRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistryClient").field("rest", &self.rest).finish_non_exhaustive()
    }
}

impl SchemaRegistryClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] when the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, RegistryError> {
        let rest = RestClient::new(&config)?;
        let ttl = config.cache_latest_ttl_secs.map(Duration::from_secs);
        Ok(Self {
            latest_version_cache: TtlLruCache::new(config.cache_capacity, ttl),
            latest_with_metadata_cache: TtlLruCache::new(config.cache_capacity, ttl),
            store: SchemaStore::new(),
            rest,
            config,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------------

    /// Registers a schema under a subject, returning its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn register_schema(
        &self,
        subject: &str,
        schema: &Schema,
        normalize: bool,
    ) -> Result<RegisteredSchema, RegistryError> {
        if let Some(registered) = self.store.get_registered_by_schema(subject, schema)? {
            debug!(subject, "schema store hit for registration");
            return Ok(registered);
        }
        let path = format!("/subjects/{}/versions", url_encode(subject));
        let query = [("normalize", normalize.to_string())];
        let mut registered: RegisteredSchema =
            self.send_json(Method::POST, &path, &query, Some(schema), "registered schema")?;
        if registered.subject.is_none() {
            registered.subject = Some(subject.to_string());
        }
        let stored = RegisteredSchema::from_schema(
            registered.id,
            registered.guid.clone(),
            registered.subject.clone(),
            registered.version,
            schema,
        );
        self.store.set_registered_schema(schema, &stored)?;
        Ok(registered)
    }

    /// Fetches a schema by id, optionally scoped to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_by_subject_and_id(
        &self,
        subject: Option<&str>,
        id: i32,
        format: Option<&str>,
    ) -> Result<Schema, RegistryError> {
        if let Some((_, schema)) = self.store.get_by_subject_and_id(subject, id)? {
            return Ok(schema);
        }
        let path = format!("/schemas/ids/{id}");
        let mut query = Vec::new();
        if let Some(subject) = subject {
            query.push(("subject", subject.to_string()));
        }
        if let Some(format) = format {
            query.push(("format", format.to_string()));
        }
        let response: RegisteredSchema =
            self.send_json(Method::GET, &path, &query, None::<&()>, "registered schema")?;
        let schema = response.to_schema();
        self.store.set_schema(subject, Some(id), response.guid.as_deref(), &schema)?;
        Ok(schema)
    }

    /// Fetches a schema by guid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_by_guid(&self, guid: &str, format: Option<&str>) -> Result<Schema, RegistryError> {
        if let Some(schema) = self.store.get_by_guid(guid)? {
            return Ok(schema);
        }
        let path = format!("/schemas/guids/{}", url_encode(guid));
        let query: Vec<(&str, String)> =
            format.map(|format| ("format", format.to_string())).into_iter().collect();
        let response: RegisteredSchema =
            self.send_json(Method::GET, &path, &query, None::<&()>, "registered schema")?;
        let schema = response.to_schema();
        self.store.set_schema(None, response.id, Some(guid), &schema)?;
        Ok(schema)
    }

    /// Looks up the registered identity of a schema under a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_by_schema(
        &self,
        subject: &str,
        schema: &Schema,
        normalize: bool,
        deleted: bool,
    ) -> Result<RegisteredSchema, RegistryError> {
        if let Some(registered) = self.store.get_registered_by_schema(subject, schema)? {
            debug!(subject, "schema store hit for lookup");
            return Ok(registered);
        }
        let path = format!("/subjects/{}", url_encode(subject));
        let query = [("normalize", normalize.to_string()), ("deleted", deleted.to_string())];
        let response: RegisteredSchema =
            self.send_json(Method::POST, &path, &query, Some(schema), "registered schema")?;
        let stored = RegisteredSchema::from_schema(
            response.id,
            response.guid.clone(),
            response.subject.clone().or_else(|| Some(subject.to_string())),
            response.version,
            schema,
        );
        self.store.set_registered_schema(schema, &stored)?;
        Ok(response)
    }

    /// Fetches one version of a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_version(
        &self,
        subject: &str,
        version: i32,
        deleted: bool,
        format: Option<&str>,
    ) -> Result<RegisteredSchema, RegistryError> {
        if let Some(registered) = self.store.get_registered_by_version(subject, version)? {
            return Ok(registered);
        }
        let path = format!("/subjects/{}/versions/{version}", url_encode(subject));
        let mut query = vec![("deleted", deleted.to_string())];
        if let Some(format) = format {
            query.push(("format", format.to_string()));
        }
        let mut response: RegisteredSchema =
            self.send_json(Method::GET, &path, &query, None::<&()>, "registered schema")?;
        if response.subject.is_none() {
            response.subject = Some(subject.to_string());
        }
        self.store.set_registered_schema(&response.to_schema(), &response)?;
        Ok(response)
    }

    /// Fetches the latest version of a subject, cached for the latest TTL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_latest_version(
        &self,
        subject: &str,
        format: Option<&str>,
    ) -> Result<RegisteredSchema, RegistryError> {
        let key = latest_cache_key(subject, format);
        if let Some(cached) = self.latest_version_cache.get(&key) {
            debug!(subject, "latest version cache hit");
            return Ok(cached);
        }
        let path = format!("/subjects/{}/versions/latest", url_encode(subject));
        let query: Vec<(&str, String)> =
            format.map(|format| ("format", format.to_string())).into_iter().collect();
        let response: RegisteredSchema =
            self.send_json(Method::GET, &path, &query, None::<&()>, "registered schema")?;
        self.latest_version_cache.put(key, response.clone());
        Ok(response)
    }

    /// Fetches the latest version whose metadata matches every pair.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_latest_with_metadata(
        &self,
        subject: &str,
        metadata: &BTreeMap<String, String>,
        deleted: bool,
        format: Option<&str>,
    ) -> Result<RegisteredSchema, RegistryError> {
        let key = metadata_cache_key(subject, metadata, deleted, format);
        if let Some(cached) = self.latest_with_metadata_cache.get(&key) {
            debug!(subject, "latest-with-metadata cache hit");
            return Ok(cached);
        }
        let path = format!("/subjects/{}/metadata", url_encode(subject));
        let mut query = vec![("deleted", deleted.to_string())];
        if let Some(format) = format {
            query.push(("format", format.to_string()));
        }
        for (name, value) in metadata {
            query.push(("key", name.clone()));
            query.push(("value", value.clone()));
        }
        let response: RegisteredSchema =
            self.send_json(Method::GET, &path, &query, None::<&()>, "registered schema")?;
        self.latest_with_metadata_cache.put(key, response.clone());
        Ok(response)
    }

    /// Lists the versions of a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_all_versions(&self, subject: &str) -> Result<Vec<i32>, RegistryError> {
        let path = format!("/subjects/{}/versions", url_encode(subject));
        self.send_json(Method::GET, &path, &[], None::<&()>, "version list")
    }

    /// Lists every subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_all_subjects(&self, deleted: bool) -> Result<Vec<String>, RegistryError> {
        let query = [("deleted", deleted.to_string())];
        self.send_json(Method::GET, "/subjects", &query, None::<&()>, "subject list")
    }

    /// Deletes a subject, returning the deleted versions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn delete_subject(&self, subject: &str, permanent: bool) -> Result<Vec<i32>, RegistryError> {
        let path = format!("/subjects/{}", url_encode(subject));
        let query = [("permanent", permanent.to_string())];
        self.send_json(Method::DELETE, &path, &query, None::<&()>, "version list")
    }

    /// Deletes one version of a subject, returning the deleted version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn delete_subject_version(
        &self,
        subject: &str,
        version: i32,
        permanent: bool,
    ) -> Result<i32, RegistryError> {
        let path = format!("/subjects/{}/versions/{version}", url_encode(subject));
        let query = [("permanent", permanent.to_string())];
        self.send_json(Method::DELETE, &path, &query, None::<&()>, "version")
    }

    // ------------------------------------------------------------------------
    // Compatibility
    // ------------------------------------------------------------------------

    /// Tests a schema against the latest version of a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn test_subject_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> Result<bool, RegistryError> {
        let path = format!("/compatibility/subjects/{}/versions/latest", url_encode(subject));
        let response: CompatibilityResponse =
            self.send_json(Method::POST, &path, &[], Some(schema), "compatibility response")?;
        Ok(response.is_compatible())
    }

    /// Tests a schema against one version of a subject.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn test_compatibility(
        &self,
        subject: &str,
        version: i32,
        schema: &Schema,
    ) -> Result<bool, RegistryError> {
        let path = format!("/compatibility/subjects/{}/versions/{version}", url_encode(subject));
        let response: CompatibilityResponse =
            self.send_json(Method::POST, &path, &[], Some(schema), "compatibility response")?;
        Ok(response.is_compatible())
    }

    // ------------------------------------------------------------------------
    // Config
    // ------------------------------------------------------------------------

    /// Fetches a subject-level config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_config(&self, subject: &str) -> Result<ServerConfig, RegistryError> {
        let path = format!("/config/{}", url_encode(subject));
        self.send_json(Method::GET, &path, &[], None::<&()>, "server config")
    }

    /// Updates a subject-level config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn update_config(
        &self,
        subject: &str,
        config: &ServerConfig,
    ) -> Result<ServerConfig, RegistryError> {
        let path = format!("/config/{}", url_encode(subject));
        self.send_json(Method::PUT, &path, &[], Some(config), "server config")
    }

    /// Fetches the global config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_default_config(&self) -> Result<ServerConfig, RegistryError> {
        self.send_json(Method::GET, "/config", &[], None::<&()>, "server config")
    }

    /// Updates the global config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn update_default_config(&self, config: &ServerConfig) -> Result<ServerConfig, RegistryError> {
        self.send_json(Method::PUT, "/config", &[], Some(config), "server config")
    }

    // ------------------------------------------------------------------------
    // Associations
    // ------------------------------------------------------------------------

    /// Lists associations for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn get_associations_by_resource_name(
        &self,
        query: &AssociationQuery,
    ) -> Result<Vec<Association>, RegistryError> {
        self.send_json(Method::GET, "/associations", &query.to_query(), None::<&()>, "associations")
    }

    /// Creates or updates associations.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport, HTTP, or parse failure.
    pub fn create_association(
        &self,
        request: &AssociationCreateOrUpdateRequest,
    ) -> Result<AssociationResponse, RegistryError> {
        self.send_json(Method::POST, "/associations", &[], Some(request), "association response")
    }

    /// Deletes associations of a resource.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on transport or HTTP failure.
    pub fn delete_associations(
        &self,
        resource_id: &str,
        resource_type: Option<&str>,
        association_types: &[String],
        cascade_lifecycle: bool,
    ) -> Result<(), RegistryError> {
        let path = format!("/associations/resources/{}", url_encode(resource_id));
        let mut query = Vec::new();
        if let Some(resource_type) = resource_type {
            query.push(("resourceType", resource_type.to_string()));
        }
        for association_type in association_types {
            query.push(("associationType", association_type.clone()));
        }
        query.push(("cascadeLifecycle", cascade_lifecycle.to_string()));
        self.rest.send(&Method::DELETE, &path, &query, None)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Cache management
    // ------------------------------------------------------------------------

    /// Clears both "latest" caches.
    pub fn clear_latest_caches(&self) {
        self.latest_version_cache.clear();
        self.latest_with_metadata_cache.clear();
    }

    /// Clears every cache, including the schema store.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn clear_caches(&self) -> Result<(), RegistryError> {
        self.clear_latest_caches();
        self.store.clear()
    }

    /// Releases cached state. The client remains usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn close(&self) -> Result<(), RegistryError> {
        self.clear_caches()
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Sends a request with an optional JSON body and parses the JSON response.
    fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        context: &'static str,
    ) -> Result<T, RegistryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| RegistryError::Parse {
                context: "request body",
                message: err.to_string(),
            })?;
        let text = self.rest.send(&method, path, query, body)?;
        serde_json::from_str(&text).map_err(|err| RegistryError::Parse {
            context,
            message: err.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Cache Keys
// ============================================================================

/// Appends the optional format component of a cache key.
fn push_format(key: &mut String, format: Option<&str>) {
    if let Some(format) = format {
        key.push('=');
        key.push_str(&url_encode(format));
    }
}

/// Builds the cache key for a latest-version lookup: `subject|format[=f]`.
///
/// Components are percent-encoded, so `|`, `=`, and `&` only ever appear as
/// separators.
#[must_use]
pub fn latest_cache_key(subject: &str, format: Option<&str>) -> String {
    let mut key = url_encode(subject);
    key.push_str("|format");
    push_format(&mut key, format);
    key
}

/// Builds the cache key for a metadata lookup:
/// `subject|deleted=<bool>|format[=f]|k1=v1&k2=v2&`.
///
/// Names and values are percent-encoded, so distinct maps never share a key.
#[must_use]
pub fn metadata_cache_key(
    subject: &str,
    metadata: &BTreeMap<String, String>,
    deleted: bool,
    format: Option<&str>,
) -> String {
    let mut key = url_encode(subject);
    key.push_str("|deleted=");
    key.push_str(if deleted { "true" } else { "false" });
    key.push_str("|format");
    push_format(&mut key, format);
    key.push('|');
    for (name, value) in metadata {
        key.push_str(&url_encode(name));
        key.push('=');
        key.push_str(&url_encode(value));
        key.push('&');
    }
    key
}
