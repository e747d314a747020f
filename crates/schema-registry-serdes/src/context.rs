// crates/schema-registry-serdes/src/context.rs
// ============================================================================
// Module: Serialization Context
// Description: Topic, direction, format, and message headers for one payload.
// Purpose: Carry per-message facts through subject resolution, framing, and rules.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`SerializationContext`] accompanies every payload. Header framing
//! writes into its [`SerdeHeaders`] and reads from them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Direction And Format
// ============================================================================

/// Whether a payload is a message key or value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerdeType {
    /// Message key.
    Key,
    /// Message value.
    #[default]
    Value,
}

impl SerdeType {
    /// Returns the association type / subject suffix word.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Value => "value",
        }
    }
}

/// Payload schema format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerdeFormat {
    /// Avro.
    Avro,
    /// JSON Schema.
    #[default]
    Json,
    /// Protobuf; framing carries message indexes.
    Protobuf,
}

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Ordered message headers. Names may repeat; lookups return the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeHeaders {
    /// Header pairs in insertion order.
    entries: Vec<(String, Vec<u8>)>,
}

impl SerdeHeaders {
    /// Creates empty headers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a header.
    pub fn insert(&mut self, name: impl Into<String>, value: Vec<u8>) {
        self.entries.push((name.into(), value));
    }

    /// Returns the last value recorded for `name`.
    #[must_use]
    pub fn last(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_slice())
    }

    /// Returns the number of header entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no headers are present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Facts about the message being encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationContext {
    /// Topic the message belongs to.
    pub topic: String,
    /// Key or value.
    pub serde_type: SerdeType,
    /// Schema format.
    pub format: SerdeFormat,
    /// Message headers; header framing reads and writes here.
    pub headers: Option<SerdeHeaders>,
}

impl SerializationContext {
    /// Creates a JSON context without headers.
    #[must_use]
    pub fn new(topic: impl Into<String>, serde_type: SerdeType) -> Self {
        Self {
            topic: topic.into(),
            serde_type,
            format: SerdeFormat::Json,
            headers: None,
        }
    }

    /// Attaches message headers.
    #[must_use]
    pub fn with_headers(mut self, headers: SerdeHeaders) -> Self {
        self.headers = Some(headers);
        self
    }
}
