// crates/schema-registry-serdes/src/config.rs
// ============================================================================
// Module: Codec Configuration
// Description: Serializer and deserializer settings.
// Purpose: Select schemas, subject strategies, framing, and validation per codec.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Both configs deserialize from plain data with defaults matching the usual
//! registry client behavior: auto-registration on, `TopicName` subjects,
//! prefix framing on write and dual framing on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SerdeError;
use crate::schema_id::SchemaIdDeserializer;
use crate::schema_id::SchemaIdSerializer;
use crate::subject::SubjectNameStrategyType;

// ============================================================================
// SECTION: Schema Selection
// ============================================================================

/// Pins which registered schema a codec uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSelector {
    /// A specific schema id.
    SchemaId(i32),
    /// The subject's latest version.
    LatestVersion,
    /// The latest version whose metadata matches every pair.
    LatestWithMetadata(BTreeMap<String, String>),
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Serializer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Register the configured schema when it is not yet known.
    pub auto_register_schemas: bool,
    /// Use a registered schema instead of the configured one.
    pub use_schema: Option<SchemaSelector>,
    /// Ask the registry to normalize schemas on register and lookup.
    pub normalize_schemas: bool,
    /// Validate values against the schema before encoding.
    pub validate: bool,
    /// Settings passed to every rule executor at construction.
    pub rule_config: BTreeMap<String, String>,
    /// Subject naming strategy.
    pub subject_name_strategy_type: SubjectNameStrategyType,
    /// Schema identity framing.
    pub schema_id_serializer: SchemaIdSerializer,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            auto_register_schemas: true,
            use_schema: None,
            normalize_schemas: false,
            validate: false,
            rule_config: BTreeMap::new(),
            subject_name_strategy_type: SubjectNameStrategyType::TopicName,
            schema_id_serializer: SchemaIdSerializer::Prefix,
        }
    }
}

impl SerializerConfig {
    /// Validates the combination of settings.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] when registration and pinning conflict.
    pub fn validate(&self) -> Result<(), SerdeError> {
        if self.auto_register_schemas && self.use_schema.is_some() {
            return Err(SerdeError::Config(
                "auto_register_schemas and use_schema are mutually exclusive".to_string(),
            ));
        }
        if let Some(SchemaSelector::LatestWithMetadata(metadata)) = &self.use_schema
            && metadata.is_empty()
        {
            return Err(SerdeError::Config("latest-with-metadata selector needs at least one pair".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Deserializer
// ============================================================================

/// Deserializer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeserializerConfig {
    /// Reader schema to migrate values into; `None` reads with the writer schema.
    pub use_schema: Option<SchemaSelector>,
    /// Validate decoded values against the reader schema.
    pub validate: bool,
    /// Settings passed to every rule executor at construction.
    pub rule_config: BTreeMap<String, String>,
    /// Subject naming strategy.
    pub subject_name_strategy_type: SubjectNameStrategyType,
    /// Schema identity framing.
    pub schema_id_deserializer: SchemaIdDeserializer,
}

impl DeserializerConfig {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] for an empty metadata selector.
    pub fn validate(&self) -> Result<(), SerdeError> {
        if let Some(SchemaSelector::LatestWithMetadata(metadata)) = &self.use_schema
            && metadata.is_empty()
        {
            return Err(SerdeError::Config("latest-with-metadata selector needs at least one pair".to_string()));
        }
        Ok(())
    }
}
