// crates/schema-registry-serdes/tests/rule_engine.rs
// ============================================================================
// Module: Rule Engine Tests
// Description: Rule selection, ordering, actions, conditions, and field rules.
// Purpose: Pin rule execution semantics without a registry.
// ============================================================================

//! ## Overview
//! Drives [`RuleEngine`] directly with schemas built in memory.

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

mod common;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use schema_registry_client::Metadata;
use schema_registry_client::RuleMode;
use schema_registry_client::Schema;
use schema_registry_serdes::FieldRuleExecutor;
use schema_registry_serdes::JsonFieldTransformer;
use schema_registry_serdes::Phase;
use schema_registry_serdes::RuleAction;
use schema_registry_serdes::RuleContext;
use schema_registry_serdes::RuleEngine;
use schema_registry_serdes::RuleInput;
use schema_registry_serdes::RuleRegistry;
use schema_registry_serdes::SerdeError;
use schema_registry_serdes::SerdeType;
use schema_registry_serdes::SerdeValue;
use schema_registry_serdes::SerializationContext;
use serde_json::Value;
use serde_json::json;

use crate::common::ConditionExecutor;
use crate::common::FailingExecutor;
use crate::common::NonEmptyTransform;
use crate::common::SetFieldExecutor;
use crate::common::TrailExecutor;
use crate::common::UppercaseTransform;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Object schema with a tagged `name` and an untagged `city`.
const PERSON: &str = r#"{
    "type": "object",
    "properties": {
        "name": {"type": "string", "confluent:tags": ["PII"]},
        "city": {"type": "string"},
        "age": {"type": "integer"}
    }
}"#;

/// Counts how often it runs.
#[derive(Debug, Default)]
struct CountingAction {
    /// Invocations so far.
    runs: AtomicUsize,
}

impl RuleAction for CountingAction {
    fn action_type(&self) -> &str {
        "COUNT"
    }

    fn run(&self, _ctx: &RuleContext<'_>, _error: Option<&SerdeError>) -> Result<(), SerdeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry with the test executors installed.
fn registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.register_executor(Arc::new(SetFieldExecutor));
    registry.register_executor(Arc::new(TrailExecutor));
    registry.register_executor(Arc::new(FailingExecutor));
    registry.register_executor(Arc::new(ConditionExecutor));
    registry.register_executor(Arc::new(FieldRuleExecutor::new("UPPER", UppercaseTransform)));
    registry.register_executor(Arc::new(FieldRuleExecutor::new("NON_EMPTY", NonEmptyTransform)));
    registry
}

/// Schema whose rule set is built from JSON.
fn schema_with_rules(text: &str, rules: &Value) -> Schema {
    let mut schema = Schema::new("JSON", text);
    schema.rule_set = Some(serde_json::from_value(rules.clone()).unwrap());
    schema
}

/// A domain rule as JSON.
fn domain(rules: &[Value]) -> Value {
    json!({"domainRules": rules})
}

/// Runs the domain phase of `schema` in `mode` over `value`.
fn run_domain(
    registry: &RuleRegistry,
    schema: &Schema,
    mode: RuleMode,
    value: Value,
) -> Result<Value, SerdeError> {
    let ctx = SerializationContext::new("people", SerdeType::Value);
    let document: Value = serde_json::from_str(&schema.schema).unwrap();
    let walker = JsonFieldTransformer::new(&document);
    let input = RuleInput {
        ser_ctx: &ctx,
        subject: "people-value",
        phase: Phase::Domain,
        mode,
        source: None,
        target: Some(schema),
        field_transformer: Some(&walker),
        extra_params: None,
    };
    RuleEngine::new(registry).execute(&input, SerdeValue::Json(value))?.into_json()
}

// ============================================================================
// SECTION: Actions
// ============================================================================

#[test]
fn error_action_fails_with_the_rule_name() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "boom", "kind": "TRANSFORM", "mode": "WRITE", "type": "FAIL"})]),
    );

    let err = run_domain(&registry(), &schema, RuleMode::Write, json!({})).unwrap_err();

    match err {
        SerdeError::Rule {
            rule,
            message,
        } => {
            assert_eq!(rule, "boom");
            assert!(message.contains("executor exploded"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn warn_and_none_actions_keep_the_original_value() {
    for action in ["WARN", "NONE"] {
        let schema = schema_with_rules(
            PERSON,
            &domain(&[
                json!({"name": "stamp", "kind": "TRANSFORM", "mode": "WRITE", "type": "SET_FIELD",
                       "params": {"field": "stamped", "value": "yes"}}),
                json!({"name": "boom", "kind": "TRANSFORM", "mode": "WRITE", "type": "FAIL", "onFailure": action}),
            ]),
        );

        let value = run_domain(&registry(), &schema, RuleMode::Write, json!({"name": "ann"})).unwrap();

        assert_eq!(value, json!({"name": "ann", "stamped": "yes"}), "action {action}");
    }
}

#[test]
fn custom_actions_run_on_success() {
    let action = Arc::new(CountingAction::default());
    let mut registry = registry();
    registry.register_action(Arc::clone(&action) as Arc<dyn RuleAction>);
    let schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "trail", "kind": "TRANSFORM", "mode": "WRITE", "type": "TRAIL",
                         "onSuccess": "COUNT"})]),
    );

    run_domain(&registry, &schema, RuleMode::Write, json!({})).unwrap();

    assert_eq!(action.runs.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_action_name_is_a_rule_error() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "trail", "kind": "TRANSFORM", "mode": "WRITE", "type": "TRAIL",
                         "onSuccess": "MISSING"})]),
    );

    let err = run_domain(&registry(), &schema, RuleMode::Write, json!({})).unwrap_err();

    match err {
        SerdeError::Rule {
            message, ..
        } => assert!(message.contains("no rule action named MISSING"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_executor_fails_through_the_error_action() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "ghost", "kind": "TRANSFORM", "mode": "WRITE", "type": "UNKNOWN"})]),
    );

    let err = run_domain(&registry(), &schema, RuleMode::Write, json!({})).unwrap_err();

    match err {
        SerdeError::Rule {
            rule,
            message,
        } => {
            assert_eq!(rule, "ghost");
            assert!(message.contains("no executor registered for rule type UNKNOWN"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// SECTION: Selection And Ordering
// ============================================================================

#[test]
fn disabled_and_mismatched_rules_are_skipped() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[
            json!({"name": "off", "kind": "TRANSFORM", "mode": "WRITE", "type": "FAIL", "disabled": true}),
            json!({"name": "read-only", "kind": "TRANSFORM", "mode": "READ", "type": "FAIL"}),
            json!({"name": "on", "kind": "TRANSFORM", "mode": "WRITE", "type": "TRAIL"}),
        ]),
    );

    let value = run_domain(&registry(), &schema, RuleMode::Write, json!({})).unwrap();

    assert_eq!(value, json!({"trail": ["on"]}));
}

#[test]
fn read_runs_rules_in_reverse_order() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[
            json!({"name": "a", "kind": "TRANSFORM", "mode": "WRITEREAD", "type": "TRAIL"}),
            json!({"name": "b", "kind": "TRANSFORM", "mode": "WRITEREAD", "type": "TRAIL"}),
        ]),
    );

    let written = run_domain(&registry(), &schema, RuleMode::Write, json!({})).unwrap();
    let read = run_domain(&registry(), &schema, RuleMode::Read, json!({})).unwrap();

    assert_eq!(written, json!({"trail": ["a", "b"]}));
    assert_eq!(read, json!({"trail": ["b", "a"]}));
}

#[test]
fn migrations_take_rules_from_the_newer_schema() {
    let registry = registry();
    let ctx = SerializationContext::new("people", SerdeType::Value);
    let older = schema_with_rules(
        r#"{"type":"object"}"#,
        &json!({"migrationRules": [{"name": "old", "kind": "TRANSFORM", "mode": "UPDOWN", "type": "TRAIL"}]}),
    );
    let newer = schema_with_rules(
        r#"{"type":"object"}"#,
        &json!({"migrationRules": [
            {"name": "n1", "kind": "TRANSFORM", "mode": "UPDOWN", "type": "TRAIL"},
            {"name": "n2", "kind": "TRANSFORM", "mode": "UPDOWN", "type": "TRAIL"}
        ]}),
    );
    let engine = RuleEngine::new(&registry);

    let upgrade = RuleInput {
        ser_ctx: &ctx,
        subject: "people-value",
        phase: Phase::Migration,
        mode: RuleMode::Upgrade,
        source: Some(&older),
        target: Some(&newer),
        field_transformer: None,
        extra_params: None,
    };
    let upgraded = engine.execute(&upgrade, SerdeValue::Json(json!({}))).unwrap().into_json().unwrap();
    assert_eq!(upgraded, json!({"trail": ["n1", "n2"]}));

    let downgrade = RuleInput {
        mode: RuleMode::Downgrade,
        source: Some(&newer),
        target: Some(&older),
        ..upgrade
    };
    let downgraded = engine.execute(&downgrade, SerdeValue::Json(json!({}))).unwrap().into_json().unwrap();
    assert_eq!(downgraded, json!({"trail": ["n2", "n1"]}));
}

#[test]
fn schema_without_rules_passes_values_through() {
    let schema = Schema::new("JSON", PERSON);

    let value = run_domain(&registry(), &schema, RuleMode::Write, json!({"name": "ann"})).unwrap();

    assert_eq!(value, json!({"name": "ann"}));
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

#[test]
fn condition_rules_keep_the_value_or_fail() {
    let passing = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "ok", "kind": "CONDITION", "mode": "WRITE", "type": "COND",
                         "params": {"result": "true"}})]),
    );
    let value = run_domain(&registry(), &passing, RuleMode::Write, json!({"name": "ann"})).unwrap();
    assert_eq!(value, json!({"name": "ann"}));

    let failing = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "nope", "kind": "CONDITION", "mode": "WRITE", "type": "COND",
                         "params": {"result": "false"}})]),
    );
    let err = run_domain(&registry(), &failing, RuleMode::Write, json!({"name": "ann"})).unwrap_err();
    match err {
        SerdeError::Rule {
            rule,
            message,
        } => {
            assert_eq!(rule, "nope");
            assert_eq!(message, "condition not satisfied");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn field_conditions_name_the_failing_field() {
    let schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "present", "kind": "CONDITION", "mode": "WRITE", "type": "NON_EMPTY",
                         "tags": ["PII"]})]),
    );

    let ok = run_domain(&registry(), &schema, RuleMode::Write, json!({"name": "ann", "city": ""}));
    assert!(ok.is_ok());

    let err = run_domain(&registry(), &schema, RuleMode::Write, json!({"name": "", "city": "oslo"})).unwrap_err();
    match err {
        SerdeError::Rule {
            message, ..
        } => assert!(message.contains("$.name"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// SECTION: Field Rules
// ============================================================================

#[test]
fn field_rules_match_inline_and_metadata_tags() {
    let mut schema = schema_with_rules(
        PERSON,
        &domain(&[json!({"name": "upper", "kind": "TRANSFORM", "mode": "WRITE", "type": "UPPER",
                         "tags": ["PII"]})]),
    );
    schema.metadata = Some(Metadata {
        tags: Some(BTreeMap::from([("$.city".to_string(), BTreeSet::from(["PII".to_string()]))])),
        ..Metadata::default()
    });

    let value =
        run_domain(&registry(), &schema, RuleMode::Write, json!({"name": "ann", "city": "oslo", "age": 3})).unwrap();

    assert_eq!(value, json!({"name": "ANN", "city": "OSLO", "age": 3}));
}

#[test]
fn untagged_field_rules_apply_to_every_field() {
    let schema = schema_with_rules(
        r#"{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"array","items":{"type":"string"}}}}"#,
        &domain(&[json!({"name": "upper", "kind": "TRANSFORM", "mode": "WRITE", "type": "UPPER"})]),
    );

    let value = run_domain(&registry(), &schema, RuleMode::Write, json!({"a": "x", "b": ["y", "z"]})).unwrap();

    assert_eq!(value, json!({"a": "X", "b": ["Y", "Z"]}));
}

#[test]
fn local_refs_are_followed_by_the_field_walker() {
    let schema = schema_with_rules(
        r##"{"type":"object","properties":{"home":{"$ref":"#/$defs/address"}},
             "$defs":{"address":{"type":"object","properties":{"street":{"type":"string","confluent:tags":["PII"]}}}}}"##,
        &domain(&[json!({"name": "upper", "kind": "TRANSFORM", "mode": "WRITE", "type": "UPPER",
                         "tags": ["PII"]})]),
    );

    let value =
        run_domain(&registry(), &schema, RuleMode::Write, json!({"home": {"street": "main st"}})).unwrap();

    assert_eq!(value, json!({"home": {"street": "MAIN ST"}}));
}

#[test]
fn field_rules_leave_encoded_bytes_alone() {
    let registry = registry();
    let ctx = SerializationContext::new("people", SerdeType::Value);
    let schema = schema_with_rules(
        PERSON,
        &json!({"encodingRules": [{"name": "upper", "kind": "TRANSFORM", "mode": "WRITE", "type": "UPPER"}]}),
    );
    let input = RuleInput {
        ser_ctx: &ctx,
        subject: "people-value",
        phase: Phase::Encoding,
        mode: RuleMode::Write,
        source: None,
        target: Some(&schema),
        field_transformer: None,
        extra_params: None,
    };

    let out = RuleEngine::new(&registry).execute(&input, SerdeValue::Bytes(b"raw".to_vec())).unwrap();

    assert_eq!(out.into_bytes().unwrap(), b"raw".to_vec());
}

#[test]
fn call_site_params_fill_in_behind_rule_params() {
    let registry = registry();
    let ctx = SerializationContext::new("people", SerdeType::Value);
    let schema = schema_with_rules(
        PERSON,
        &domain(&[
            json!({"name": "stamp", "kind": "TRANSFORM", "mode": "WRITE", "type": "SET_FIELD",
                   "params": {"field": "stamped"}}),
            json!({"name": "pinned", "kind": "TRANSFORM", "mode": "WRITE", "type": "SET_FIELD",
                   "params": {"field": "pinned", "value": "rule"}}),
        ]),
    );
    let extra = BTreeMap::from([("value".to_string(), "call".to_string())]);
    let input = RuleInput {
        ser_ctx: &ctx,
        subject: "people-value",
        phase: Phase::Domain,
        mode: RuleMode::Write,
        source: None,
        target: Some(&schema),
        field_transformer: None,
        extra_params: Some(&extra),
    };

    let out = RuleEngine::new(&registry).execute(&input, SerdeValue::Json(json!({}))).unwrap();

    assert_eq!(out.into_json().unwrap(), json!({"stamped": "call", "pinned": "rule"}));
}
