// crates/schema-registry-serdes/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: In-memory fake registry over HTTP plus test rule executors.
// Purpose: Exercise codecs end to end without a real registry.
// Dependencies: tiny_http, serde_json, schema-registry-serdes
// ============================================================================

//! ## Overview
//! [`FakeRegistry`] serves the registry endpoints the codecs use from an
//! in-memory list of registered versions, and records every request path.
//! The executors below are small, deterministic rule implementations.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;

use schema_registry_client::ClientConfig;
use schema_registry_client::SchemaRegistryClient;
use schema_registry_serdes::FieldContext;
use schema_registry_serdes::FieldTransform;
use schema_registry_serdes::RuleContext;
use schema_registry_serdes::RuleExecutor;
use schema_registry_serdes::SerdeError;
use schema_registry_serdes::SerdeValue;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Registry State
// ============================================================================

/// One registered schema version.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Subject.
    pub subject: String,
    /// Version within the subject.
    pub version: i32,
    /// Global id.
    pub id: i32,
    /// Guid string.
    pub guid: String,
    /// Schema text.
    pub schema: String,
    /// Optional rule set JSON.
    pub rule_set: Option<Value>,
}

impl Entry {
    /// Renders the registry's JSON for this entry.
    fn to_json(&self) -> Value {
        let mut body = json!({
            "id": self.id,
            "guid": self.guid,
            "subject": self.subject,
            "version": self.version,
            "schemaType": "JSON",
            "schema": self.schema,
        });
        if let Some(rule_set) = &self.rule_set {
            body["ruleSet"] = rule_set.clone();
        }
        body
    }
}

/// Mutable fake registry contents.
#[derive(Debug, Default)]
struct State {
    /// Registered versions.
    entries: Vec<Entry>,
    /// Associations as `(topic, association type, subject)`.
    associations: Vec<(String, String, String)>,
    /// Request paths received, with method.
    requests: Vec<String>,
}

/// Returns the guid used for an id.
pub fn guid_for(id: i32) -> String {
    format!("00000000-0000-0000-0000-{id:012}")
}

// ============================================================================
// SECTION: Fake Registry
// ============================================================================

/// In-memory registry behind a `tiny_http` server.
pub struct FakeRegistry {
    /// Base URL of the server.
    pub base_url: String,
    /// Shared contents.
    state: Arc<Mutex<State>>,
    /// Server handle used to unblock the accept loop.
    server: Arc<Server>,
    /// Accept loop thread.
    handle: Option<JoinHandle<()>>,
}

impl FakeRegistry {
    /// Starts an empty registry.
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let state = Arc::new(Mutex::new(State::default()));
        let accept_server = Arc::clone(&server);
        let accept_state = Arc::clone(&state);
        let handle = thread::spawn(move || {
            for mut request in accept_server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let method = request.method().to_string();
                let url = request.url().to_string();
                let (status, response) = route(&accept_state, &method, &url, &body);
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response =
                    Response::from_string(response).with_status_code(status).with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
            handle: Some(handle),
        }
    }

    /// Registers a version directly, returning its id.
    pub fn add(&self, subject: &str, schema: &str, rule_set: Option<Value>) -> i32 {
        let mut state = self.state.lock().unwrap();
        let id = 100 + i32::try_from(state.entries.len()).unwrap() + 1;
        let version = 1 + i32::try_from(state.entries.iter().filter(|entry| entry.subject == subject).count())
            .unwrap();
        state.entries.push(Entry {
            subject: subject.to_string(),
            version,
            id,
            guid: guid_for(id),
            schema: schema.to_string(),
            rule_set,
        });
        id
    }

    /// Binds a topic to a subject.
    pub fn associate(&self, topic: &str, association_type: &str, subject: &str) {
        self.state.lock().unwrap().associations.push((
            topic.to_string(),
            association_type.to_string(),
            subject.to_string(),
        ));
    }

    /// Returns a client pointed at this registry.
    pub fn client(&self) -> Arc<SchemaRegistryClient> {
        Arc::new(SchemaRegistryClient::new(ClientConfig::new(self.base_url.clone())).unwrap())
    }

    /// Returns the number of requests whose `METHOD path` starts with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.state.lock().unwrap().requests.iter().filter(|request| request.starts_with(prefix)).count()
    }

    /// Returns every `METHOD path` received.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Returns the registered entries.
    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().unwrap().entries.clone()
    }
}

impl Drop for FakeRegistry {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Answers one request from the shared state.
fn route(state: &Mutex<State>, method: &str, url: &str, body: &str) -> (u16, String) {
    let mut state = state.lock().unwrap();
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    state.requests.push(format!("{method} {path}"));
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let not_found = (404, json!({"error_code": 40401, "message": "not found"}).to_string());
    let schema_text = || {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|doc| doc.get("schema").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default()
    };
    match (method, segments.as_slice()) {
        ("GET", ["schemas", "ids", id]) => state
            .entries
            .iter()
            .find(|entry| entry.id.to_string() == *id)
            .map_or(not_found, |entry| (200, entry.to_json().to_string())),
        ("GET", ["schemas", "guids", guid]) => state
            .entries
            .iter()
            .find(|entry| entry.guid == *guid)
            .map_or(not_found, |entry| (200, entry.to_json().to_string())),
        ("POST", ["subjects", subject, "versions"]) => {
            let text = schema_text();
            if let Some(entry) =
                state.entries.iter().find(|entry| entry.subject == *subject && entry.schema == text)
            {
                return (200, json!({"id": entry.id, "guid": entry.guid}).to_string());
            }
            let id = 100 + i32::try_from(state.entries.len()).unwrap() + 1;
            let version =
                1 + i32::try_from(state.entries.iter().filter(|entry| entry.subject == *subject).count())
                    .unwrap();
            let rule_set = serde_json::from_str::<Value>(body).ok().and_then(|doc| doc.get("ruleSet").cloned());
            state.entries.push(Entry {
                subject: (*subject).to_string(),
                version,
                id,
                guid: guid_for(id),
                schema: text,
                rule_set,
            });
            (200, json!({"id": id, "guid": guid_for(id)}).to_string())
        }
        ("POST", ["subjects", subject]) => {
            let text = schema_text();
            state
                .entries
                .iter()
                .find(|entry| entry.subject == *subject && entry.schema == text)
                .map_or(not_found, |entry| (200, entry.to_json().to_string()))
        }
        ("GET", ["subjects", subject, "versions", "latest"] | ["subjects", subject, "metadata"]) => state
            .entries
            .iter()
            .filter(|entry| entry.subject == *subject)
            .max_by_key(|entry| entry.version)
            .map_or(not_found, |entry| (200, entry.to_json().to_string())),
        ("GET", ["subjects", subject, "versions", version]) => state
            .entries
            .iter()
            .find(|entry| entry.subject == *subject && entry.version.to_string() == *version)
            .map_or(not_found, |entry| (200, entry.to_json().to_string())),
        ("GET", ["associations"]) => {
            let wanted: BTreeMap<String, String> = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            let matches: Vec<Value> = state
                .associations
                .iter()
                .filter(|(topic, kind, _)| {
                    wanted.get("resourceName") == Some(topic)
                        && wanted.get("associationType").is_none_or(|wanted_kind| wanted_kind == kind)
                })
                .map(|(topic, kind, subject)| {
                    json!({"subject": subject, "resourceName": topic, "associationType": kind})
                })
                .collect();
            if matches.is_empty() {
                return not_found;
            }
            (200, Value::Array(matches).to_string())
        }
        _ => not_found,
    }
}

// ============================================================================
// SECTION: Test Executors
// ============================================================================

/// Sets `params.field` to `params.value` on JSON objects.
#[derive(Debug, Default)]
pub struct SetFieldExecutor;

impl RuleExecutor for SetFieldExecutor {
    fn rule_type(&self) -> &str {
        "SET_FIELD"
    }

    fn transform(&self, ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        let field = ctx.param("field").unwrap_or("field").to_string();
        let new_value = ctx.param("value").unwrap_or_default().to_string();
        match value {
            SerdeValue::Json(Value::Object(mut object)) => {
                object.insert(field, Value::String(new_value));
                Ok(SerdeValue::Json(Value::Object(object)))
            }
            other => Ok(other),
        }
    }
}

/// Appends `params.value` to the `trail` array, recording execution order.
#[derive(Debug, Default)]
pub struct TrailExecutor;

impl RuleExecutor for TrailExecutor {
    fn rule_type(&self) -> &str {
        "TRAIL"
    }

    fn transform(&self, ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        let mark = Value::String(ctx.param("value").unwrap_or(&ctx.rule.name).to_string());
        match value {
            SerdeValue::Json(Value::Object(mut object)) => {
                let trail = object.entry("trail").or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = trail {
                    items.push(mark);
                }
                Ok(SerdeValue::Json(Value::Object(object)))
            }
            other => Ok(other),
        }
    }
}

/// Always fails.
#[derive(Debug, Default)]
pub struct FailingExecutor;

impl RuleExecutor for FailingExecutor {
    fn rule_type(&self) -> &str {
        "FAIL"
    }

    fn transform(&self, _ctx: &RuleContext<'_>, _value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        Err(SerdeError::Serde("executor exploded".to_string()))
    }
}

/// Returns `params.result == "true"` as a condition verdict.
#[derive(Debug, Default)]
pub struct ConditionExecutor;

impl RuleExecutor for ConditionExecutor {
    fn rule_type(&self) -> &str {
        "COND"
    }

    fn transform(&self, ctx: &RuleContext<'_>, _value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        Ok(SerdeValue::Json(Value::Bool(ctx.param("result") == Some("true"))))
    }
}

/// XORs payload bytes with a fixed key; applying it twice is the identity.
#[derive(Debug, Default)]
pub struct XorExecutor;

impl RuleExecutor for XorExecutor {
    fn rule_type(&self) -> &str {
        "XOR"
    }

    fn transform(&self, _ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        match value {
            SerdeValue::Bytes(bytes) => {
                Ok(SerdeValue::Bytes(bytes.into_iter().map(|byte| byte ^ 0x5A).collect()))
            }
            other => Ok(other),
        }
    }
}

/// Counts configure calls and rejects `rule_config["reject"] == "true"`.
#[derive(Debug, Default)]
pub struct ConfiguredExecutor {
    /// Number of configure calls.
    pub configured: AtomicUsize,
}

impl RuleExecutor for ConfiguredExecutor {
    fn rule_type(&self) -> &str {
        "CONFIGURED"
    }

    fn configure(
        &self,
        _client_config: &ClientConfig,
        rule_config: &BTreeMap<String, String>,
    ) -> Result<(), SerdeError> {
        self.configured.fetch_add(1, Ordering::SeqCst);
        if rule_config.get("reject").map(String::as_str) == Some("true") {
            return Err(SerdeError::Config("rejected".to_string()));
        }
        Ok(())
    }

    fn transform(&self, _ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        Ok(value)
    }
}

/// Uppercases string fields; fails on non-strings.
#[derive(Debug, Default)]
pub struct UppercaseTransform;

impl FieldTransform for UppercaseTransform {
    fn transform(&self, _ctx: &RuleContext<'_>, field: &FieldContext, value: Value) -> Result<Value, SerdeError> {
        match value {
            Value::String(text) => Ok(Value::String(text.to_uppercase())),
            other => Err(SerdeError::Serde(format!("{} is not a string: {other}", field.full_name))),
        }
    }
}

/// Field condition: strings must be non-empty.
#[derive(Debug, Default)]
pub struct NonEmptyTransform;

impl FieldTransform for NonEmptyTransform {
    fn transform(&self, _ctx: &RuleContext<'_>, _field: &FieldContext, value: Value) -> Result<Value, SerdeError> {
        Ok(Value::Bool(value.as_str().is_some_and(|text| !text.is_empty())))
    }
}
