// crates/schema-registry-serdes/src/lib.rs
// ============================================================================
// Module: Schema Registry Serdes
// Description: Schema-id framing, subject strategies, rules, migrations, and JSON codecs.
// Purpose: Turn values into framed payloads and back using registry schemas.
// Dependencies: schema-registry-client, jsonschema, serde, serde_json, thiserror, tracing, uuid
// ============================================================================

//! ## Overview
//! The serdes crate sits on top of [`schema_registry_client`]:
//! - [`schema_id`] frames writer schema identities into payloads or headers.
//! - [`subject`] maps topics and schemas to registry subjects.
//! - [`RuleEngine`] runs encoding, domain, and migration rules through a
//!   [`RuleRegistry`] of named executors and actions.
//! - [`plan_migrations`] bridges writer and reader versions.
//! - [`JsonSerializer`] and [`JsonDeserializer`] tie it together for JSON
//!   Schema payloads.
//!
//! Invariants:
//! - Validation failures are always fatal.
//! - `WARN` and `NONE` rule outcomes keep the value the rule received.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod field;
pub mod json;
pub mod migration;
pub mod rules;
pub mod schema_id;
pub mod subject;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::DeserializerConfig;
pub use config::SchemaSelector;
pub use config::SerializerConfig;
pub use context::SerdeFormat;
pub use context::SerdeHeaders;
pub use context::SerdeType;
pub use context::SerializationContext;
pub use engine::RuleEngine;
pub use engine::RuleInput;
pub use error::SerdeError;
pub use field::JsonFieldTransformer;
pub use json::JsonDeserializer;
pub use json::JsonSerializer;
pub use json::ParsedJsonSchema;
pub use migration::Migration;
pub use migration::plan_migrations;
pub use rules::FieldContext;
pub use rules::FieldRuleExecutor;
pub use rules::FieldTransform;
pub use rules::FieldTransformer;
pub use rules::FieldType;
pub use rules::Phase;
pub use rules::RuleAction;
pub use rules::RuleContext;
pub use rules::RuleExecutor;
pub use rules::RuleRegistry;
pub use schema_id::SchemaId;
pub use schema_id::SchemaIdDeserializer;
pub use schema_id::SchemaIdSerializer;
pub use subject::SubjectNameStrategyType;
pub use subject::SubjectResolver;
pub use value::SerdeValue;
