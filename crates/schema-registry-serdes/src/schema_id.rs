// crates/schema-registry-serdes/src/schema_id.rs
// ============================================================================
// Module: Schema Id Framing
// Description: Wire encoding of writer schema identities in payloads and headers.
// Purpose: Frame encoded payloads with the schema id or guid that wrote them.
// Dependencies: uuid, serde
// ============================================================================

//! ## Overview
//! Two framings carry a writer schema identity:
//! - magic `0x00` followed by a big-endian `i32` schema id;
//! - magic `0x01` followed by the 16 bytes of the schema guid.
//!
//! Protobuf payloads append message indexes as zig-zag varints. The identity
//! travels either as a payload prefix or in the `__key_schema_id` /
//! `__value_schema_id` header. The dual deserializer prefers the header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::context::SerdeFormat;
use crate::context::SerdeHeaders;
use crate::context::SerdeType;
use crate::context::SerializationContext;
use crate::error::SerdeError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Magic byte for numeric schema id framing.
pub const MAGIC_BYTE_ID: u8 = 0x00;
/// Magic byte for guid framing.
pub const MAGIC_BYTE_GUID: u8 = 0x01;
/// Header carrying the key schema identity.
pub const KEY_SCHEMA_ID_HEADER: &str = "__key_schema_id";
/// Header carrying the value schema identity.
pub const VALUE_SCHEMA_ID_HEADER: &str = "__value_schema_id";

/// Returns the schema-id header name for a direction.
#[must_use]
pub const fn schema_id_header(serde_type: SerdeType) -> &'static str {
    match serde_type {
        SerdeType::Key => KEY_SCHEMA_ID_HEADER,
        SerdeType::Value => VALUE_SCHEMA_ID_HEADER,
    }
}

// ============================================================================
// SECTION: Schema Id
// ============================================================================

/// Writer schema identity decoded from, or encoded into, a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaId {
    /// Payload format; Protobuf adds message indexes.
    pub format: SerdeFormat,
    /// Numeric schema id.
    pub id: Option<i32>,
    /// Schema guid.
    pub guid: Option<Uuid>,
    /// Protobuf message indexes.
    pub message_indexes: Option<Vec<i32>>,
}

impl SchemaId {
    /// Creates an empty identity for a format.
    #[must_use]
    pub const fn new(format: SerdeFormat) -> Self {
        Self {
            format,
            id: None,
            guid: None,
            message_indexes: None,
        }
    }

    /// Creates an identity from the registry's id and guid strings.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when `guid` is not a valid UUID.
    pub fn from_registered(format: SerdeFormat, id: Option<i32>, guid: Option<&str>) -> Result<Self, SerdeError> {
        let guid = guid
            .map(|raw| Uuid::parse_str(raw).map_err(|err| SerdeError::Serde(format!("invalid schema guid {raw}: {err}"))))
            .transpose()?;
        Ok(Self {
            format,
            id,
            guid,
            message_indexes: None,
        })
    }

    /// Reads an identity from the start of `bytes`, returning the bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] for unknown magic bytes or truncated input.
    pub fn read_from(&mut self, bytes: &[u8]) -> Result<usize, SerdeError> {
        let (&magic, rest) =
            bytes.split_first().ok_or_else(|| SerdeError::Serde("payload is empty".to_string()))?;
        let mut pos = 1;
        match magic {
            MAGIC_BYTE_ID => {
                let raw: [u8; 4] = rest
                    .get(..4)
                    .and_then(|slice| slice.try_into().ok())
                    .ok_or_else(|| SerdeError::Serde("payload too short for schema id".to_string()))?;
                self.id = Some(i32::from_be_bytes(raw));
                pos += 4;
            }
            MAGIC_BYTE_GUID => {
                let raw: [u8; 16] = rest
                    .get(..16)
                    .and_then(|slice| slice.try_into().ok())
                    .ok_or_else(|| SerdeError::Serde("payload too short for schema guid".to_string()))?;
                self.guid = Some(Uuid::from_bytes(raw));
                pos += 16;
            }
            other => {
                return Err(SerdeError::Serde(format!("unknown magic byte {other:#04x}")));
            }
        }
        if self.format == SerdeFormat::Protobuf {
            self.message_indexes = Some(read_message_indexes(bytes, &mut pos)?);
        }
        Ok(pos)
    }

    /// Encodes the id framing.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when the id is unknown.
    pub fn id_bytes(&self) -> Result<Vec<u8>, SerdeError> {
        let id = self.id.ok_or_else(|| SerdeError::Serde("schema id is required for id framing".to_string()))?;
        let mut out = Vec::with_capacity(5);
        out.push(MAGIC_BYTE_ID);
        out.extend_from_slice(&id.to_be_bytes());
        self.write_message_indexes(&mut out);
        Ok(out)
    }

    /// Encodes the guid framing.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when the guid is unknown.
    pub fn guid_bytes(&self) -> Result<Vec<u8>, SerdeError> {
        let guid =
            self.guid.ok_or_else(|| SerdeError::Serde("schema guid is required for guid framing".to_string()))?;
        let mut out = Vec::with_capacity(17);
        out.push(MAGIC_BYTE_GUID);
        out.extend_from_slice(guid.as_bytes());
        self.write_message_indexes(&mut out);
        Ok(out)
    }

    /// Appends message indexes for Protobuf identities.
    fn write_message_indexes(&self, out: &mut Vec<u8>) {
        if self.format != SerdeFormat::Protobuf {
            return;
        }
        let indexes = self.message_indexes.as_deref().unwrap_or(&[0]);
        if indexes == [0] {
            write_zigzag(out, 0);
            return;
        }
        write_zigzag(out, i32::try_from(indexes.len()).unwrap_or(i32::MAX));
        for index in indexes {
            write_zigzag(out, *index);
        }
    }
}

// ============================================================================
// SECTION: Varints
// ============================================================================

/// Appends a zig-zag varint.
pub(crate) fn write_zigzag(out: &mut Vec<u8>, value: i32) {
    let mut encoded = (value << 1).cast_unsigned() ^ (value >> 31).cast_unsigned();
    while encoded >= 0x80 {
        out.push((encoded.to_le_bytes()[0] & 0x7F) | 0x80);
        encoded >>= 7;
    }
    out.push(encoded.to_le_bytes()[0]);
}

/// Reads a zig-zag varint at `pos`, advancing it.
pub(crate) fn read_zigzag(bytes: &[u8], pos: &mut usize) -> Result<i32, SerdeError> {
    let mut raw: u32 = 0;
    let mut shift = 0_u32;
    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| SerdeError::Serde("payload truncated inside varint".to_string()))?;
        *pos += 1;
        raw |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(SerdeError::Serde("varint is too long".to_string()));
        }
    }
    Ok((raw >> 1).cast_signed() ^ -(raw & 1).cast_signed())
}

/// Reads a Protobuf message index list.
fn read_message_indexes(bytes: &[u8], pos: &mut usize) -> Result<Vec<i32>, SerdeError> {
    let count = read_zigzag(bytes, pos)?;
    if count == 0 {
        return Ok(vec![0]);
    }
    let count = usize::try_from(count)
        .map_err(|_| SerdeError::Serde(format!("invalid message index count {count}")))?;
    if count > bytes.len().saturating_sub(*pos) {
        return Err(SerdeError::Serde(format!("message index count {count} exceeds payload")));
    }
    (0..count).map(|_| read_zigzag(bytes, pos)).collect()
}

// ============================================================================
// SECTION: Framing Strategies
// ============================================================================

/// Where the serializer writes the schema identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIdSerializer {
    /// Numeric id prefixed to the payload.
    #[default]
    Prefix,
    /// Guid written to the schema-id header.
    Header,
}

impl SchemaIdSerializer {
    /// Frames an encoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] when the identity lacks the needed id or guid.
    pub fn frame(
        self,
        payload: Vec<u8>,
        ctx: &mut SerializationContext,
        schema_id: &SchemaId,
    ) -> Result<Vec<u8>, SerdeError> {
        match self {
            Self::Prefix => {
                let mut out = schema_id.id_bytes()?;
                out.extend_from_slice(&payload);
                Ok(out)
            }
            Self::Header => {
                let header = schema_id.guid_bytes()?;
                ctx.headers.get_or_insert_with(SerdeHeaders::new).insert(schema_id_header(ctx.serde_type), header);
                Ok(payload)
            }
        }
    }
}

/// Where the deserializer reads the schema identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIdDeserializer {
    /// Payload prefix only.
    Prefix,
    /// Schema-id header only.
    Header,
    /// Header when present, else payload prefix.
    #[default]
    Dual,
}

impl SchemaIdDeserializer {
    /// Decodes the identity, returning how many payload bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Serde`] for missing headers or malformed framing.
    pub fn unframe(
        self,
        payload: &[u8],
        ctx: &SerializationContext,
        schema_id: &mut SchemaId,
    ) -> Result<usize, SerdeError> {
        let header = ctx.headers.as_ref().and_then(|headers| headers.last(schema_id_header(ctx.serde_type)));
        match (self, header) {
            (Self::Header | Self::Dual, Some(header)) => {
                schema_id.read_from(header)?;
                Ok(0)
            }
            (Self::Header, None) => Err(SerdeError::Serde(format!(
                "missing {} header",
                schema_id_header(ctx.serde_type)
            ))),
            (Self::Prefix | Self::Dual, _) => schema_id.read_from(payload),
        }
    }
}
