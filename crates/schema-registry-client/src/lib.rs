// crates/schema-registry-client/src/lib.rs
// ============================================================================
// Module: Schema Registry Client
// Description: Caching registry client, credential providers, and retry backoff.
// Purpose: Resolve and register schemas against a remote schema registry.
// Dependencies: reqwest, serde, serde_jcs, sha2, thiserror, time, tracing, url
// ============================================================================

//! ## Overview
//! This crate is the registry side of the serialization runtime:
//! - [`SchemaRegistryClient`] talks to the registry REST API through a
//!   two-tier cache ([`SchemaStore`] for immutable facts, [`TtlLruCache`] for
//!   "latest" lookups).
//! - [`CredentialProvider`] implementations supply bearer credentials:
//!   static tokens, the OAuth client-credentials flow, or a user function.
//!   [`CredentialProviderFactory`] builds them from flat string settings.
//! - [`backoff`](backoff::backoff) computes jittered exponential retry delays.
//!
//! Invariants:
//! - Caches are written only after a fully parsed successful response.
//! - At most one OAuth token fetch is in flight per provider.
//!
//! Security posture: tokens and secrets are redacted from `Debug` output and
//! never logged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod model;
pub mod oauth;
pub mod rest;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::BearerFields;
pub use auth::CredentialProvider;
pub use auth::CustomTokenProvider;
pub use auth::StaticTokenProvider;
pub use auth::TokenFetchFn;
pub use backoff::FixedJitter;
pub use backoff::JitterSource;
pub use backoff::ThreadRngJitter;
pub use backoff::is_retriable;
pub use cache::TtlLruCache;
pub use client::AssociationQuery;
pub use client::SchemaRegistryClient;
pub use client::latest_cache_key;
pub use client::metadata_cache_key;
pub use config::Authentication;
pub use config::ClientConfig;
pub use error::AuthError;
pub use error::ConfigError;
pub use error::RegistryError;
pub use factory::CredentialProviderFactory;
pub use model::Association;
pub use model::AssociationCreateOrUpdateInfo;
pub use model::AssociationCreateOrUpdateRequest;
pub use model::AssociationInfo;
pub use model::AssociationResponse;
pub use model::CompatibilityLevel;
pub use model::LifecyclePolicy;
pub use model::Metadata;
pub use model::RegisteredSchema;
pub use model::Rule;
pub use model::RuleKind;
pub use model::RuleMode;
pub use model::RuleSet;
pub use model::Schema;
pub use model::SchemaReference;
pub use model::ServerConfig;
pub use oauth::OAuthClientConfig;
pub use oauth::OAuthClientProvider;
pub use oauth::OAuthToken;
pub use rest::RestClient;
pub use rest::url_encode;
pub use store::SchemaStore;
pub use store::schema_fingerprint;
