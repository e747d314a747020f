// crates/schema-registry-serdes/tests/schema_id_framing.rs
// ============================================================================
// Module: Schema Id Framing Tests
// Description: Wire layout of prefix, guid, header, and Protobuf index framing.
// Purpose: Pin byte-level framing and its malformed-input errors.
// ============================================================================

//! ## Overview
//! Exact byte layouts plus the error cases for truncated or unknown framing.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use schema_registry_serdes::SchemaId;
use schema_registry_serdes::SchemaIdDeserializer;
use schema_registry_serdes::SchemaIdSerializer;
use schema_registry_serdes::SerdeError;
use schema_registry_serdes::SerdeFormat;
use schema_registry_serdes::SerdeHeaders;
use schema_registry_serdes::SerdeType;
use schema_registry_serdes::SerializationContext;
use schema_registry_serdes::schema_id::KEY_SCHEMA_ID_HEADER;
use schema_registry_serdes::schema_id::VALUE_SCHEMA_ID_HEADER;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Guid used across tests.
const GUID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

/// Identity carrying both an id and a guid.
fn identity(format: SerdeFormat) -> SchemaId {
    SchemaId::from_registered(format, Some(42), Some(GUID)).unwrap()
}

/// Asserts a framing error mentioning `needle`.
fn assert_serde_error(result: Result<usize, SerdeError>, needle: &str) {
    match result {
        Err(SerdeError::Serde(message)) => assert!(message.contains(needle), "{message}"),
        other => panic!("expected framing error containing {needle}, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Prefix And Guid Framing
// ============================================================================

#[test]
fn prefix_framing_is_magic_zero_then_big_endian_id() {
    let mut ctx = SerializationContext::new("t", SerdeType::Value);

    let framed = SchemaIdSerializer::Prefix.frame(b"{}".to_vec(), &mut ctx, &identity(SerdeFormat::Json)).unwrap();

    assert_eq!(framed, vec![0, 0, 0, 0, 42, b'{', b'}']);
    assert!(ctx.headers.is_none());

    let mut decoded = SchemaId::new(SerdeFormat::Json);
    let consumed = SchemaIdDeserializer::Prefix.unframe(&framed, &ctx, &mut decoded).unwrap();
    assert_eq!(consumed, 5);
    assert_eq!(decoded.id, Some(42));
    assert_eq!(decoded.guid, None);
}

#[test]
fn guid_framing_is_magic_one_then_sixteen_bytes() {
    let schema_id = identity(SerdeFormat::Json);

    let bytes = schema_id.guid_bytes().unwrap();

    assert_eq!(bytes.len(), 17);
    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[1..], *schema_id.guid.unwrap().as_bytes());

    let mut decoded = SchemaId::new(SerdeFormat::Json);
    assert_eq!(decoded.read_from(&bytes).unwrap(), 17);
    assert_eq!(decoded.guid.unwrap().to_string(), GUID);
    assert_eq!(decoded.id, None);
}

#[test]
fn id_framing_requires_an_id() {
    let schema_id = SchemaId::from_registered(SerdeFormat::Json, None, Some(GUID)).unwrap();
    assert!(schema_id.id_bytes().is_err());

    let schema_id = SchemaId::from_registered(SerdeFormat::Json, Some(1), None).unwrap();
    assert!(schema_id.guid_bytes().is_err());
}

#[test]
fn invalid_guid_strings_are_rejected() {
    let err = SchemaId::from_registered(SerdeFormat::Json, Some(1), Some("not-a-guid")).unwrap_err();
    assert!(matches!(err, SerdeError::Serde(_)));
}

// ============================================================================
// SECTION: Header Framing
// ============================================================================

#[test]
fn header_framing_leaves_the_payload_untouched() {
    let mut ctx = SerializationContext::new("t", SerdeType::Key);

    let payload = SchemaIdSerializer::Header.frame(b"{}".to_vec(), &mut ctx, &identity(SerdeFormat::Json)).unwrap();

    assert_eq!(payload, b"{}".to_vec());
    let headers = ctx.headers.as_ref().unwrap();
    assert_eq!(headers.len(), 1);
    assert!(headers.last(VALUE_SCHEMA_ID_HEADER).is_none());
    let header = headers.last(KEY_SCHEMA_ID_HEADER).unwrap();
    assert_eq!(header[0], 1);

    let mut decoded = SchemaId::new(SerdeFormat::Json);
    let consumed = SchemaIdDeserializer::Header.unframe(&payload, &ctx, &mut decoded).unwrap();
    assert_eq!(consumed, 0);
    assert_eq!(decoded.guid.unwrap().to_string(), GUID);
}

#[test]
fn dual_prefers_the_header_over_the_prefix() {
    let mut headers = SerdeHeaders::new();
    headers.insert(VALUE_SCHEMA_ID_HEADER, vec![0, 0, 0, 0, 7]);
    headers.insert(VALUE_SCHEMA_ID_HEADER, vec![0, 0, 0, 0, 9]);
    let ctx = SerializationContext::new("t", SerdeType::Value).with_headers(headers);
    let payload = [0, 0, 0, 0, 5, b'{', b'}'];

    let mut decoded = SchemaId::new(SerdeFormat::Json);
    let consumed = SchemaIdDeserializer::Dual.unframe(&payload, &ctx, &mut decoded).unwrap();

    assert_eq!(consumed, 0);
    assert_eq!(decoded.id, Some(9), "the last header wins");
}

#[test]
fn dual_falls_back_to_the_prefix() {
    let ctx = SerializationContext::new("t", SerdeType::Value);
    let payload = [0, 0, 0, 0, 5, b'{', b'}'];

    let mut decoded = SchemaId::new(SerdeFormat::Json);
    let consumed = SchemaIdDeserializer::Dual.unframe(&payload, &ctx, &mut decoded).unwrap();

    assert_eq!(consumed, 5);
    assert_eq!(decoded.id, Some(5));
}

#[test]
fn header_mode_requires_the_header() {
    let ctx = SerializationContext::new("t", SerdeType::Value);
    let mut decoded = SchemaId::new(SerdeFormat::Json);

    assert_serde_error(
        SchemaIdDeserializer::Header.unframe(&[0, 0, 0, 0, 5], &ctx, &mut decoded),
        "missing __value_schema_id header",
    );
}

// ============================================================================
// SECTION: Protobuf Message Indexes
// ============================================================================

#[test]
fn protobuf_first_message_uses_a_single_zero() {
    let mut schema_id = identity(SerdeFormat::Protobuf);
    schema_id.message_indexes = Some(vec![0]);

    let bytes = schema_id.id_bytes().unwrap();

    assert_eq!(bytes, vec![0, 0, 0, 0, 42, 0]);
    let mut decoded = SchemaId::new(SerdeFormat::Protobuf);
    assert_eq!(decoded.read_from(&bytes).unwrap(), 6);
    assert_eq!(decoded.message_indexes, Some(vec![0]));
}

#[test]
fn protobuf_nested_indexes_are_counted_zigzag_varints() {
    let mut schema_id = identity(SerdeFormat::Protobuf);
    schema_id.message_indexes = Some(vec![1, 2]);

    let bytes = schema_id.id_bytes().unwrap();

    assert_eq!(bytes, vec![0, 0, 0, 0, 42, 4, 2, 4]);
    let mut decoded = SchemaId::new(SerdeFormat::Protobuf);
    assert_eq!(decoded.read_from(&bytes).unwrap(), 8);
    assert_eq!(decoded.message_indexes, Some(vec![1, 2]));
}

#[test]
fn protobuf_index_count_beyond_payload_is_rejected() {
    let mut decoded = SchemaId::new(SerdeFormat::Protobuf);
    assert_serde_error(decoded.read_from(&[0, 0, 0, 0, 42, 20, 2]), "exceeds payload");
}

#[test]
fn json_identities_carry_no_message_indexes() {
    let mut decoded = SchemaId::new(SerdeFormat::Json);
    assert_eq!(decoded.read_from(&[0, 0, 0, 0, 42, 4, 2, 4]).unwrap(), 5);
    assert_eq!(decoded.message_indexes, None);
}

// ============================================================================
// SECTION: Malformed Input
// ============================================================================

#[test]
fn malformed_framing_is_rejected() {
    let mut decoded = SchemaId::new(SerdeFormat::Json);
    assert_serde_error(decoded.read_from(&[]), "payload is empty");
    assert_serde_error(decoded.read_from(&[0, 0, 1]), "too short for schema id");
    assert_serde_error(decoded.read_from(&[1, 0, 1, 2]), "too short for schema guid");
    assert_serde_error(decoded.read_from(&[7, 0, 0, 0, 1]), "unknown magic byte 0x07");
}
