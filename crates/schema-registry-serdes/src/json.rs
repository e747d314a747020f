// crates/schema-registry-serdes/src/json.rs
// ============================================================================
// Module: JSON Schema Codec
// Description: Registry-aware JSON serializer and deserializer.
// Purpose: Encode and decode framed JSON payloads with rules, migrations, and validation.
// Dependencies: jsonschema, serde_json, schema-registry-client, tracing
// ============================================================================

//! ## Overview
//! [`JsonSerializer`] resolves the subject, picks the schema (pinned, auto
//! registered, or looked up), runs `WRITE` domain rules, validates, encodes,
//! runs `WRITE` encoding rules over the bytes, and frames the schema identity.
//!
//! [`JsonDeserializer`] reverses that: it unframes the identity, fetches the
//! writer schema, re-resolves the subject, runs `READ` encoding rules, plans
//! and applies migrations toward the reader schema, runs `READ` domain rules,
//! and validates. A reader schema is used only when `use_schema` is set.
//!
//! Parsed schemas are cached per codec, keyed by schema text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jsonschema::Validator;
use schema_registry_client::RegisteredSchema;
use schema_registry_client::RuleMode;
use schema_registry_client::Schema;
use schema_registry_client::SchemaRegistryClient;
use schema_registry_client::TtlLruCache;
use serde_json::Value;
use tracing::debug;

use crate::config::DeserializerConfig;
use crate::config::SchemaSelector;
use crate::config::SerializerConfig;
use crate::context::SerdeFormat;
use crate::context::SerializationContext;
use crate::engine::RuleEngine;
use crate::engine::RuleInput;
use crate::error::SerdeError;
use crate::field::JsonFieldTransformer;
use crate::migration::plan_migrations;
use crate::rules::Phase;
use crate::rules::RuleRegistry;
use crate::schema_id::SchemaId;
use crate::subject::SubjectNameStrategyType;
use crate::subject::SubjectResolver;
use crate::subject::json_record_name;
use crate::value::SerdeValue;

// ============================================================================
// SECTION: Parsed Schemas
// ============================================================================

/// A schema document with its compiled validator.
pub struct ParsedJsonSchema {
    /// Schema document.
    pub document: Value,
    /// Compiled validator.
    validator: Validator,
}

impl std::fmt::Debug for ParsedJsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedJsonSchema").field("document", &self.document).finish_non_exhaustive()
    }
}

impl ParsedJsonSchema {
    /// Parses and compiles a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when the text is not a valid JSON Schema.
    pub fn parse(schema: &Schema) -> Result<Self, SerdeError> {
        let document: Value = serde_json::from_str(&schema.schema)
            .map_err(|err| SerdeError::Serde(format!("schema is not valid json: {err}")))?;
        let validator = jsonschema::options()
            .build(&document)
            .map_err(|err| SerdeError::Serde(format!("invalid json schema: {err}")))?;
        Ok(Self {
            document,
            validator,
        })
    }

    /// Validates a value against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Validation`] listing every violation.
    pub fn validate(&self, value: &Value) -> Result<(), SerdeError> {
        let errors: Vec<String> = self.validator.iter_errors(value).map(|err| err.to_string()).collect();
        if errors.is_empty() {
            return Ok(());
        }
        Err(SerdeError::Validation(errors.join("; ")))
    }
}

// ============================================================================
// SECTION: Shared Codec State
// ============================================================================

/// State shared by the serializer and deserializer.
struct JsonSerde {
    /// Registry client.
    client: Arc<SchemaRegistryClient>,
    /// Rule executors and actions.
    rules: RuleRegistry,
    /// Subject strategy.
    resolver: SubjectResolver,
    /// Parsed schemas keyed by schema text.
    parsed: TtlLruCache<String, Arc<ParsedJsonSchema>>,
}

impl JsonSerde {
    /// Builds shared state and configures every rule executor.
    fn new(
        client: Arc<SchemaRegistryClient>,
        rules: RuleRegistry,
        strategy: SubjectNameStrategyType,
        rule_config: &BTreeMap<String, String>,
    ) -> Result<Self, SerdeError> {
        let client_config = client.config();
        rules.configure_executors(client_config, rule_config)?;
        let ttl = client_config.cache_latest_ttl_secs.map(Duration::from_secs);
        let resolver = SubjectResolver::new(strategy, json_record_name, client_config.cache_capacity, ttl);
        let parsed = TtlLruCache::new(client_config.cache_capacity, None);
        Ok(Self {
            client,
            rules,
            resolver,
            parsed,
        })
    }

    /// Returns the parsed form of a schema, parsing on first use.
    fn parsed(&self, schema: &Schema) -> Result<Arc<ParsedJsonSchema>, SerdeError> {
        if let Some(parsed) = self.parsed.get(&schema.schema) {
            return Ok(parsed);
        }
        let parsed = Arc::new(ParsedJsonSchema::parse(schema)?);
        self.parsed.put(schema.schema.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Resolves a subject, failing when the strategy cannot name one.
    fn subject(&self, ctx: &SerializationContext, schema: Option<&Schema>) -> Result<String, SerdeError> {
        self.resolver
            .resolve(&self.client, &ctx.topic, ctx.serde_type, schema)?
            .ok_or_else(|| SerdeError::Serde(format!("could not determine subject name for topic {}", ctx.topic)))
    }

    /// Fetches the schema a selector pins under a subject.
    fn selected_schema(&self, subject: &str, selector: &SchemaSelector) -> Result<RegisteredSchema, SerdeError> {
        let registered = match selector {
            SchemaSelector::SchemaId(id) => {
                let schema = self.client.get_by_subject_and_id(Some(subject), *id, None)?;
                self.client.get_by_schema(subject, &schema, false, true)?
            }
            SchemaSelector::LatestVersion => self.client.get_latest_version(subject, None)?,
            SchemaSelector::LatestWithMetadata(metadata) => {
                self.client.get_latest_with_metadata(subject, metadata, true, None)?
            }
        };
        Ok(registered)
    }

    /// Runs one phase of rules.
    fn run_rules(&self, input: &RuleInput<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        RuleEngine::new(&self.rules).execute(input, value)
    }

    /// Drops parsed schemas and cached associations.
    fn close(&self) {
        self.parsed.clear();
        self.resolver.clear();
    }
}

/// Returns true when a schema carries encoding rules.
fn has_encoding_rules(schema: &Schema) -> bool {
    schema.rule_set.as_ref().is_some_and(|rules| !rules.encoding().is_empty())
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Registry-aware JSON serializer.
pub struct JsonSerializer {
    /// Shared codec state.
    serde: JsonSerde,
    /// Schema to register or look up when no selector pins one.
    schema: Option<Schema>,
    /// Settings.
    config: SerializerConfig,
}

impl std::fmt::Debug for JsonSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSerializer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl JsonSerializer {
    /// Creates a serializer.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] for inconsistent settings, a missing
    /// schema, or an executor that rejects its configuration.
    pub fn new(
        client: Arc<SchemaRegistryClient>,
        schema: Option<Schema>,
        rules: RuleRegistry,
        config: SerializerConfig,
    ) -> Result<Self, SerdeError> {
        config.validate()?;
        if schema.is_none() && config.use_schema.is_none() {
            return Err(SerdeError::Config("a schema or a use_schema selector is required".to_string()));
        }
        let serde = JsonSerde::new(client, rules, config.subject_name_strategy_type, &config.rule_config)?;
        Ok(Self {
            serde,
            schema,
            config,
        })
    }

    /// Encodes a value, writing the schema identity into the payload or headers.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError`] when the subject or schema cannot be resolved, a
    /// rule fails, or validation fails.
    pub fn serialize(&self, ctx: &mut SerializationContext, value: &Value) -> Result<Vec<u8>, SerdeError> {
        let subject = self.serde.subject(ctx, self.schema.as_ref())?;
        let (schema_id, schema) = self.writer_schema(&subject)?;
        let parsed = self.serde.parsed(&schema)?;
        let walker = JsonFieldTransformer::new(&parsed.document);
        let domain = RuleInput {
            ser_ctx: ctx,
            subject: &subject,
            phase: Phase::Domain,
            mode: RuleMode::Write,
            source: None,
            target: Some(&schema),
            field_transformer: Some(&walker),
            extra_params: None,
        };
        let value = self.serde.run_rules(&domain, SerdeValue::Json(value.clone()))?.into_json()?;
        if self.config.validate {
            parsed.validate(&value)?;
        }
        let mut payload = serde_json::to_vec(&value)?;
        if has_encoding_rules(&schema) {
            let encoding = RuleInput {
                phase: Phase::Encoding,
                field_transformer: None,
                ..domain
            };
            payload = self.serde.run_rules(&encoding, SerdeValue::Bytes(payload))?.into_bytes()?;
        }
        self.config.schema_id_serializer.frame(payload, ctx, &schema_id)
    }

    /// Chooses the schema to write with and its identity.
    fn writer_schema(&self, subject: &str) -> Result<(SchemaId, Schema), SerdeError> {
        if let Some(selector) = &self.config.use_schema {
            let registered = self.serde.selected_schema(subject, selector)?;
            let schema_id =
                SchemaId::from_registered(SerdeFormat::Json, registered.id, registered.guid.as_deref())?;
            return Ok((schema_id, registered.to_schema()));
        }
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| SerdeError::Config("no schema configured".to_string()))?;
        let registered = if self.config.auto_register_schemas {
            self.serde.client.register_schema(subject, schema, self.config.normalize_schemas)?
        } else {
            self.serde.client.get_by_schema(subject, schema, self.config.normalize_schemas, false)?
        };
        debug!(subject, id = registered.id, "resolved writer schema");
        let schema_id = SchemaId::from_registered(SerdeFormat::Json, registered.id, registered.guid.as_deref())?;
        Ok((schema_id, schema.clone()))
    }

    /// Drops cached parsed schemas and associations.
    pub fn close(&self) {
        self.serde.close();
    }
}

// ============================================================================
// SECTION: Deserializer
// ============================================================================

/// Registry-aware JSON deserializer.
pub struct JsonDeserializer {
    /// Shared codec state.
    serde: JsonSerde,
    /// Settings.
    config: DeserializerConfig,
}

impl std::fmt::Debug for JsonDeserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDeserializer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl JsonDeserializer {
    /// Creates a deserializer.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] for invalid settings or an executor that
    /// rejects its configuration.
    pub fn new(
        client: Arc<SchemaRegistryClient>,
        rules: RuleRegistry,
        config: DeserializerConfig,
    ) -> Result<Self, SerdeError> {
        config.validate()?;
        let serde = JsonSerde::new(client, rules, config.subject_name_strategy_type, &config.rule_config)?;
        Ok(Self {
            serde,
            config,
        })
    }

    /// Decodes a framed payload into the reader schema's shape.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError`] for malformed framing, an unresolvable subject,
    /// registry failures, rule failures, or validation failures.
    pub fn deserialize(&self, ctx: &SerializationContext, data: &[u8]) -> Result<Value, SerdeError> {
        let client = &self.serde.client;
        let initial_subject = self.serde.resolver.resolve(client, &ctx.topic, ctx.serde_type, None)?;
        let mut reader = initial_subject.as_deref().and_then(|subject| self.probe_reader(subject));

        let mut schema_id = SchemaId::new(SerdeFormat::Json);
        let consumed = self.config.schema_id_deserializer.unframe(data, ctx, &mut schema_id)?;
        let payload = data
            .get(consumed..)
            .ok_or_else(|| SerdeError::Serde("payload shorter than its framing".to_string()))?;

        let writer = self.writer_schema(&schema_id, initial_subject.as_deref())?;
        let subject = self.serde.subject(ctx, Some(&writer))?;
        if initial_subject.as_deref() != Some(subject.as_str()) {
            reader = self.probe_reader(&subject);
        }

        let mut bytes = payload.to_vec();
        if has_encoding_rules(&writer) {
            let encoding = RuleInput {
                ser_ctx: ctx,
                subject: &subject,
                phase: Phase::Encoding,
                mode: RuleMode::Read,
                source: None,
                target: Some(&writer),
                field_transformer: None,
                extra_params: None,
            };
            bytes = self.serde.run_rules(&encoding, SerdeValue::Bytes(bytes))?.into_bytes()?;
        }

        let (migrations, reader_schema) = match reader {
            Some(reader) => (plan_migrations(client, &subject, &writer, &reader)?, reader.to_schema()),
            None => (Vec::new(), writer.clone()),
        };

        let mut value: Value = serde_json::from_slice(&bytes)?;
        for migration in &migrations {
            let source = migration.source.to_schema();
            let target = migration.target.to_schema();
            let step = RuleInput {
                ser_ctx: ctx,
                subject: &subject,
                phase: Phase::Migration,
                mode: migration.mode,
                source: Some(&source),
                target: Some(&target),
                field_transformer: None,
                extra_params: None,
            };
            value = self.serde.run_rules(&step, SerdeValue::Json(value))?.into_json()?;
        }

        let parsed = self.serde.parsed(&reader_schema)?;
        let walker = JsonFieldTransformer::new(&parsed.document);
        let domain = RuleInput {
            ser_ctx: ctx,
            subject: &subject,
            phase: Phase::Domain,
            mode: RuleMode::Read,
            source: None,
            target: Some(&reader_schema),
            field_transformer: Some(&walker),
            extra_params: None,
        };
        let value = self.serde.run_rules(&domain, SerdeValue::Json(value))?.into_json()?;
        if self.config.validate {
            parsed.validate(&value)?;
        }
        Ok(value)
    }

    /// Looks up the reader schema; absence is not an error.
    fn probe_reader(&self, subject: &str) -> Option<RegisteredSchema> {
        let selector = self.config.use_schema.as_ref()?;
        match self.serde.selected_schema(subject, selector) {
            Ok(reader) => Some(reader),
            Err(err) => {
                debug!(subject, error = %err, "no reader schema; reading with writer schema");
                None
            }
        }
    }

    /// Fetches the writer schema named by a decoded identity.
    fn writer_schema(&self, schema_id: &SchemaId, subject: Option<&str>) -> Result<Schema, SerdeError> {
        if let Some(id) = schema_id.id {
            return Ok(self.serde.client.get_by_subject_and_id(subject, id, None)?);
        }
        if let Some(guid) = schema_id.guid {
            return Ok(self.serde.client.get_by_guid(&guid.to_string(), None)?);
        }
        Err(SerdeError::Serde("payload carries no schema id or guid".to_string()))
    }

    /// Drops cached parsed schemas and associations.
    pub fn close(&self) {
        self.serde.close();
    }
}
