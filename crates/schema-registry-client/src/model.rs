// crates/schema-registry-client/src/model.rs
// ============================================================================
// Module: Registry Model
// Description: Schema, rule, config, and association types exchanged with the registry.
// Purpose: Provide the domain model behind every registry endpoint.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Types mirror the registry's JSON documents field for field (camelCase on the
//! wire). Optional fields are skipped when absent so that request bodies stay
//! byte-compatible with what the registry expects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Reference from one schema to another registered schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Name used to import the referenced schema.
    pub name: String,
    /// Subject the referenced schema is registered under.
    pub subject: String,
    /// Version of the referenced schema.
    pub version: i32,
}

/// Schema metadata attached at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Tags keyed by field path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, BTreeSet<String>>>,
    /// Free-form properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    /// Property names holding sensitive values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<BTreeSet<String>>,
}

/// Rule category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    /// Rewrites the value.
    #[default]
    Transform,
    /// Checks the value; the executor must produce `true`.
    #[serde(alias = "CONSTRAINT")]
    Condition,
}

/// Direction(s) a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleMode {
    /// Migration to a newer schema version.
    #[serde(rename = "UPGRADE")]
    Upgrade,
    /// Migration to an older schema version.
    #[serde(rename = "DOWNGRADE")]
    Downgrade,
    /// Both migration directions.
    #[serde(rename = "UPDOWN", alias = "UPGRADE_DOWNGRADE")]
    UpDown,
    /// Serialization.
    #[serde(rename = "WRITE")]
    Write,
    /// Deserialization.
    #[serde(rename = "READ")]
    Read,
    /// Both serialization and deserialization.
    #[serde(rename = "WRITEREAD")]
    WriteRead,
}

/// A transformation or condition attached to a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Rule name, unique within a rule set.
    pub name: String,
    /// Optional documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Rule category.
    #[serde(default)]
    pub kind: RuleKind,
    /// Direction(s) the rule applies to.
    pub mode: RuleMode,
    /// Executor type name.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Field tags the rule targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// Executor parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
    /// Executor expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Action run after success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,
    /// Action run after failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,
    /// Disabled rules are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl Rule {
    /// Returns true when the rule is explicitly disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

/// Rules attached to a schema, grouped by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Rules applied between schema versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_rules: Option<Vec<Rule>>,
    /// Rules applied to decoded values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_rules: Option<Vec<Rule>>,
    /// Rules applied to encoded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_rules: Option<Vec<Rule>>,
}

impl RuleSet {
    /// Returns the migration rules, or an empty slice.
    #[must_use]
    pub fn migration(&self) -> &[Rule] {
        self.migration_rules.as_deref().unwrap_or_default()
    }

    /// Returns the domain rules, or an empty slice.
    #[must_use]
    pub fn domain(&self) -> &[Rule] {
        self.domain_rules.as_deref().unwrap_or_default()
    }

    /// Returns the encoding rules, or an empty slice.
    #[must_use]
    pub fn encoding(&self) -> &[Rule] {
        self.encoding_rules.as_deref().unwrap_or_default()
    }
}

/// Schema document as registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema type (`AVRO` when absent, `JSON`, `PROTOBUF`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Schemas this schema imports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    /// Registration metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Rules attached to the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<RuleSet>,
    /// Schema text.
    #[serde(default)]
    pub schema: String,
}

impl Schema {
    /// Creates a schema of the given type from its text.
    #[must_use]
    pub fn new(schema_type: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            schema_type: Some(schema_type.into()),
            schema: schema.into(),
            ..Self::default()
        }
    }
}

/// Schema as returned by the registry, with its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSchema {
    /// Numeric schema id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    /// Schema GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Subject the schema is registered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Version within the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    /// Schema type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Schemas this schema imports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
    /// Registration metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Rules attached to the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<RuleSet>,
    /// Schema text, absent in registration responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl RegisteredSchema {
    /// Builds a registered schema from an identity and a schema document.
    #[must_use]
    pub fn from_schema(
        id: Option<i32>,
        guid: Option<String>,
        subject: Option<String>,
        version: Option<i32>,
        schema: &Schema,
    ) -> Self {
        Self {
            id,
            guid,
            subject,
            version,
            schema_type: schema.schema_type.clone(),
            references: schema.references.clone(),
            metadata: schema.metadata.clone(),
            rule_set: schema.rule_set.clone(),
            schema: Some(schema.schema.clone()),
        }
    }

    /// Returns the schema document without identity fields.
    #[must_use]
    pub fn to_schema(&self) -> Schema {
        Schema {
            schema_type: self.schema_type.clone(),
            references: self.references.clone(),
            metadata: self.metadata.clone(),
            rule_set: self.rule_set.clone(),
            schema: self.schema.clone().unwrap_or_default(),
        }
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// Compatibility level enforced by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    /// New schemas can read data written by the previous version.
    Backward,
    /// Backward against all previous versions.
    BackwardTransitive,
    /// Previous schema can read data written by the new version.
    Forward,
    /// Forward against all previous versions.
    ForwardTransitive,
    /// Backward and forward.
    Full,
    /// Full against all previous versions.
    FullTransitive,
    /// No checks.
    None,
}

/// Registry or subject-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Compatibility level (request field name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityLevel>,
    /// Compatibility level (response field name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_level: Option<CompatibilityLevel>,
    /// Whether schemas are normalized on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    /// Whether field names are validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_fields: Option<bool>,
    /// Subject alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Metadata property grouping compatibility checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_group: Option<String>,
    /// Metadata merged under registered schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_metadata: Option<Metadata>,
    /// Metadata merged over registered schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_metadata: Option<Metadata>,
    /// Rule set merged under registered schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule_set: Option<RuleSet>,
    /// Rule set merged over registered schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_rule_set: Option<RuleSet>,
}

// ============================================================================
// SECTION: Associations
// ============================================================================

/// Lifecycle coupling between a resource and its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePolicy {
    /// Subject lifecycle follows the resource.
    Strong,
    /// Subject outlives the resource.
    Weak,
}

/// Association between an external resource and a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    /// Associated subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Schema GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Resource name, typically a topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Resource namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_namespace: Option<String>,
    /// Resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Association type (`key` or `value`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type: Option<String>,
    /// Lifecycle policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecyclePolicy>,
    /// Whether the association is frozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
}

/// One association in a create-or-update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationCreateOrUpdateInfo {
    /// Subject to associate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Association type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type: Option<String>,
    /// Lifecycle policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecyclePolicy>,
    /// Whether the association is frozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
    /// Schema to register alongside the association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Whether to normalize the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
}

/// Request body for `POST /associations`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationCreateOrUpdateRequest {
    /// Resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Resource namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_namespace: Option<String>,
    /// Resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Associations to create or update.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationCreateOrUpdateInfo>,
}

/// One association in a create-or-update response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationInfo {
    /// Associated subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Association type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type: Option<String>,
    /// Lifecycle policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecyclePolicy>,
    /// Whether the association is frozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
    /// Registered schema, when one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Response body for `POST /associations`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationResponse {
    /// Resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Resource namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_namespace: Option<String>,
    /// Resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Associations created or updated.
    #[serde(default)]
    pub associations: Vec<AssociationInfo>,
}
