// crates/schema-registry-serdes/src/subject.rs
// ============================================================================
// Module: Subject Resolution
// Description: Subject naming strategies for topics, records, and associations.
// Purpose: Map (topic, direction, schema) to the registry subject a codec uses.
// Dependencies: serde, serde_json, schema-registry-client, tracing
// ============================================================================

//! ## Overview
//! Naming strategies are pure functions of `(topic, direction, schema)`,
//! except `Associated`, which asks the registry which subject is bound to the
//! topic and caches the answer. Record-name strategies return `None` until a
//! schema with a record name is known.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use schema_registry_client::AssociationQuery;
use schema_registry_client::RegistryError;
use schema_registry_client::Schema;
use schema_registry_client::SchemaRegistryClient;
use schema_registry_client::TtlLruCache;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::context::SerdeType;
use crate::error::SerdeError;

// ============================================================================
// SECTION: Strategy Types
// ============================================================================

/// Subject naming strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectNameStrategyType {
    /// `<topic>-key` or `<topic>-value`.
    #[default]
    TopicName,
    /// The schema's record name.
    RecordName,
    /// `<topic>-<record name>`.
    TopicRecordName,
    /// The subject associated with the topic in the registry.
    Associated,
    /// Registry default, which is `TopicName`.
    None,
}

/// Extracts the record name of a schema, or an empty string.
pub type RecordNameFn = fn(&Schema) -> String;

// ============================================================================
// SECTION: Pure Strategies
// ============================================================================

/// Returns `<topic>-key` or `<topic>-value`.
#[must_use]
pub fn topic_name(topic: &str, serde_type: SerdeType) -> String {
    format!("{topic}-{}", serde_type.as_str())
}

/// Returns `<topic>-<record>`.
#[must_use]
pub fn topic_record_name(topic: &str, record: &str) -> String {
    format!("{topic}-{record}")
}

/// Returns the record name of a JSON Schema document.
///
/// Uses `title`, else the last path segment of `$id`, else an empty string.
#[must_use]
pub fn json_record_name(schema: &Schema) -> String {
    let Ok(Value::Object(document)) = serde_json::from_str::<Value>(&schema.schema) else {
        return String::new();
    };
    if let Some(Value::String(title)) = document.get("title") {
        return title.clone();
    }
    if let Some(Value::String(id)) = document.get("$id") {
        return match id.rsplit_once('/') {
            Some((_, last)) if !last.is_empty() => last.to_string(),
            _ => id.clone(),
        };
    }
    String::new()
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves subjects for one codec.
///
/// # Invariants
/// - `Associated` lookups are cached per `(topic, direction)`.
pub struct SubjectResolver {
    /// Configured strategy.
    strategy: SubjectNameStrategyType,
    /// Record-name extractor for the codec's format.
    record_name: RecordNameFn,
    /// Associated subjects keyed by `topic|direction`.
    associations: TtlLruCache<String, Option<String>>,
}

impl std::fmt::Debug for SubjectResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectResolver").field("strategy", &self.strategy).finish_non_exhaustive()
    }
}

impl SubjectResolver {
    /// Creates a resolver. Association answers live for `ttl` when set.
    #[must_use]
    pub fn new(
        strategy: SubjectNameStrategyType,
        record_name: RecordNameFn,
        cache_capacity: usize,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            strategy,
            record_name,
            associations: TtlLruCache::new(cache_capacity, ttl),
        }
    }

    /// Returns the configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> SubjectNameStrategyType {
        self.strategy
    }

    /// Resolves the subject, or `None` when the schema is needed but unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Registry`] when an association lookup fails with
    /// anything other than 404.
    pub fn resolve(
        &self,
        client: &SchemaRegistryClient,
        topic: &str,
        serde_type: SerdeType,
        schema: Option<&Schema>,
    ) -> Result<Option<String>, SerdeError> {
        match self.strategy {
            SubjectNameStrategyType::TopicName | SubjectNameStrategyType::None => {
                Ok(Some(topic_name(topic, serde_type)))
            }
            SubjectNameStrategyType::RecordName => Ok(self.record(schema)),
            SubjectNameStrategyType::TopicRecordName => {
                Ok(self.record(schema).map(|record| topic_record_name(topic, &record)))
            }
            SubjectNameStrategyType::Associated => {
                let associated = self.associated(client, topic, serde_type)?;
                Ok(Some(associated.unwrap_or_else(|| topic_name(topic, serde_type))))
            }
        }
    }

    /// Drops cached association answers.
    pub fn clear(&self) {
        self.associations.clear();
    }

    /// Returns the non-empty record name of `schema`.
    fn record(&self, schema: Option<&Schema>) -> Option<String> {
        let name = (self.record_name)(schema?);
        (!name.is_empty()).then_some(name)
    }

    /// Looks up the subject bound to a topic.
    fn associated(
        &self,
        client: &SchemaRegistryClient,
        topic: &str,
        serde_type: SerdeType,
    ) -> Result<Option<String>, SerdeError> {
        let key = format!("{topic}|{}", serde_type.as_str());
        if let Some(cached) = self.associations.get(&key) {
            return Ok(cached);
        }
        let query = AssociationQuery::for_resource(topic).with_association_type(serde_type.as_str());
        let subject = match client.get_associations_by_resource_name(&query) {
            Ok(associations) => associations.into_iter().find_map(|association| association.subject),
            Err(RegistryError::Http {
                status: 404, ..
            }) => None,
            Err(err) => return Err(err.into()),
        };
        debug!(
            topic,
            direction = serde_type.as_str(),
            subject = subject.as_deref().unwrap_or(""),
            "resolved associated subject"
        );
        self.associations.put(key, subject.clone());
        Ok(subject)
    }
}
