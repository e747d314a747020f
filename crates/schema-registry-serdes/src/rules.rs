// crates/schema-registry-serdes/src/rules.rs
// ============================================================================
// Module: Rule Registry
// Description: Rule executor and action contracts plus the registry that names them.
// Purpose: Let codecs dispatch rules by type name to pluggable implementations.
// Dependencies: schema-registry-client, serde_json, tracing
// ============================================================================

//! ## Overview
//! Executors and actions are open sets keyed by name. A [`RuleRegistry`]
//! starts with the builtin `ERROR`, `WARN`, and `NONE` actions; executors are
//! registered by the caller and configured once when a codec is built.
//!
//! Field-level rules implement [`FieldTransform`] and are wrapped in a
//! [`FieldRuleExecutor`], which walks the value through the codec's
//! [`FieldTransformer`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use schema_registry_client::ClientConfig;
use schema_registry_client::Rule;
use schema_registry_client::RuleKind;
use schema_registry_client::RuleMode;
use schema_registry_client::Schema;
use serde_json::Value;
use tracing::warn;

use crate::context::SerializationContext;
use crate::error::SerdeError;
use crate::value::SerdeValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Action that fails the pipeline.
pub const ERROR_ACTION: &str = "ERROR";
/// Action that logs and keeps the pre-rule value.
pub const WARN_ACTION: &str = "WARN";
/// Action that silently keeps the pre-rule value.
pub const NONE_ACTION: &str = "NONE";

// ============================================================================
// SECTION: Rule Context
// ============================================================================

/// Pipeline phase a rule set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between schema versions.
    Migration,
    /// Over decoded values.
    Domain,
    /// Over encoded bytes.
    Encoding,
}

/// Everything an executor or action may inspect about the running rule.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// Message facts.
    pub ser_ctx: &'a SerializationContext,
    /// Schema the value currently conforms to, for migrations.
    pub source: Option<&'a Schema>,
    /// Schema the rule set was taken from.
    pub target: Option<&'a Schema>,
    /// Subject being processed.
    pub subject: &'a str,
    /// Current direction.
    pub mode: RuleMode,
    /// Rule being run.
    pub rule: &'a Rule,
    /// Field walker for the target schema, when the value is decoded.
    pub field_transformer: Option<&'a dyn FieldTransformer>,
    /// Call-site parameters, consulted after the rule's own.
    pub extra_params: Option<&'a BTreeMap<String, String>>,
}

impl fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("subject", &self.subject)
            .field("mode", &self.mode)
            .field("rule", &self.rule.name)
            .finish_non_exhaustive()
    }
}

impl RuleContext<'_> {
    /// Returns a rule parameter, falling back to the call-site parameters.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.rule
            .params
            .as_ref()
            .and_then(|params| params.get(name))
            .or_else(|| self.extra_params.and_then(|extra| extra.get(name)))
            .map(String::as_str)
    }

    /// Returns the tags the target schema's metadata assigns to a field path.
    #[must_use]
    pub fn metadata_tags(&self, full_name: &str) -> BTreeSet<String> {
        self.target
            .and_then(|schema| schema.metadata.as_ref())
            .and_then(|metadata| metadata.tags.as_ref())
            .and_then(|tags| tags.get(full_name))
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Executors
// ============================================================================

/// Runs one rule type.
pub trait RuleExecutor: Send + Sync {
    /// Rule type name this executor handles.
    fn rule_type(&self) -> &str;

    /// Receives client and rule settings once at codec construction.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] when the settings are unusable.
    fn configure(
        &self,
        _client_config: &ClientConfig,
        _rule_config: &BTreeMap<String, String>,
    ) -> Result<(), SerdeError> {
        Ok(())
    }

    /// Transforms a value. `CONDITION` rules return `Json(true)` to pass.
    ///
    /// # Errors
    ///
    /// Any error is routed to the rule's `onFailure` action.
    fn transform(&self, ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError>;
}

/// Runs after a rule succeeds or fails.
pub trait RuleAction: Send + Sync {
    /// Action name.
    fn action_type(&self) -> &str;

    /// Handles the outcome; `error` is set when the rule failed.
    ///
    /// # Errors
    ///
    /// An error aborts the pipeline.
    fn run(&self, ctx: &RuleContext<'_>, error: Option<&SerdeError>) -> Result<(), SerdeError>;
}

// ============================================================================
// SECTION: Field Transforms
// ============================================================================

/// Primitive kind of a field reached by the field walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON integer.
    Integer,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON null.
    Null,
}

/// Field reached by the field walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldContext {
    /// Path from the root, such as `$.address.city`.
    pub full_name: String,
    /// Property name, or the parent's name for array items.
    pub name: String,
    /// Primitive kind.
    pub field_type: FieldType,
    /// Inline and metadata tags.
    pub tags: BTreeSet<String>,
}

/// Transforms one primitive field.
pub trait FieldTransform: Send + Sync {
    /// Returns the new field value. `CONDITION` rules return `true` to pass.
    ///
    /// # Errors
    ///
    /// Any error fails the whole rule.
    fn transform(&self, ctx: &RuleContext<'_>, field: &FieldContext, value: Value) -> Result<Value, SerdeError>;
}

/// Walks a decoded value along its schema, applying a field transform.
pub trait FieldTransformer {
    /// Applies `transform` to every matching field. Non-JSON values pass through.
    ///
    /// # Errors
    ///
    /// Returns the first field transform failure.
    fn transform_fields(
        &self,
        ctx: &RuleContext<'_>,
        transform: &dyn FieldTransform,
        value: SerdeValue,
    ) -> Result<SerdeValue, SerdeError>;
}

/// Executor adapter for field-level rules.
pub struct FieldRuleExecutor<T> {
    /// Rule type name.
    rule_type: String,
    /// Per-field transform.
    transform: T,
}

impl<T: FieldTransform> FieldRuleExecutor<T> {
    /// Wraps a field transform under a rule type name.
    #[must_use]
    pub fn new(rule_type: impl Into<String>, transform: T) -> Self {
        Self {
            rule_type: rule_type.into(),
            transform,
        }
    }
}

impl<T: FieldTransform> RuleExecutor for FieldRuleExecutor<T> {
    fn rule_type(&self) -> &str {
        &self.rule_type
    }

    fn transform(&self, ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        let transformed = match ctx.field_transformer {
            Some(walker) if value.is_json() => walker.transform_fields(ctx, &self.transform, value)?,
            _ => value,
        };
        if ctx.rule.kind == RuleKind::Condition {
            return Ok(SerdeValue::Json(Value::Bool(true)));
        }
        Ok(transformed)
    }
}

// ============================================================================
// SECTION: Builtin Actions
// ============================================================================

/// Fails the pipeline with a rule error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorAction;

impl RuleAction for ErrorAction {
    fn action_type(&self) -> &str {
        ERROR_ACTION
    }

    fn run(&self, ctx: &RuleContext<'_>, error: Option<&SerdeError>) -> Result<(), SerdeError> {
        let message = match error {
            Some(SerdeError::Rule {
                message, ..
            }) => message.clone(),
            Some(other) => other.to_string(),
            None => "rule failed".to_string(),
        };
        Err(SerdeError::Rule {
            rule: ctx.rule.name.clone(),
            message,
        })
    }
}

/// Logs the failure and keeps the pre-rule value.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarnAction;

impl RuleAction for WarnAction {
    fn action_type(&self) -> &str {
        WARN_ACTION
    }

    fn run(&self, ctx: &RuleContext<'_>, error: Option<&SerdeError>) -> Result<(), SerdeError> {
        if let Some(error) = error {
            warn!(
                rule = %ctx.rule.name,
                subject = ctx.subject,
                error = %error,
                "rule failed; keeping original value"
            );
        }
        Ok(())
    }
}

/// Keeps the pre-rule value silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAction;

impl RuleAction for NoneAction {
    fn action_type(&self) -> &str {
        NONE_ACTION
    }

    fn run(&self, _ctx: &RuleContext<'_>, _error: Option<&SerdeError>) -> Result<(), SerdeError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Executors and actions by name.
///
/// # Invariants
/// - The builtin actions are always present unless replaced by name.
#[derive(Clone)]
pub struct RuleRegistry {
    /// Executors keyed by rule type.
    executors: BTreeMap<String, Arc<dyn RuleExecutor>>,
    /// Actions keyed by action name.
    actions: BTreeMap<String, Arc<dyn RuleAction>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("executors", &self.executors.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self {
            executors: BTreeMap::new(),
            actions: BTreeMap::new(),
        };
        registry.register_action(Arc::new(ErrorAction));
        registry.register_action(Arc::new(WarnAction));
        registry.register_action(Arc::new(NoneAction));
        registry
    }
}

impl RuleRegistry {
    /// Creates a registry holding only the builtin actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor, returning the one it replaced.
    pub fn register_executor(&mut self, executor: Arc<dyn RuleExecutor>) -> Option<Arc<dyn RuleExecutor>> {
        self.executors.insert(executor.rule_type().to_string(), executor)
    }

    /// Registers an action, returning the one it replaced.
    pub fn register_action(&mut self, action: Arc<dyn RuleAction>) -> Option<Arc<dyn RuleAction>> {
        self.actions.insert(action.action_type().to_string(), action)
    }

    /// Returns the executor for a rule type.
    #[must_use]
    pub fn executor(&self, rule_type: &str) -> Option<&Arc<dyn RuleExecutor>> {
        self.executors.get(rule_type)
    }

    /// Returns the action with a name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Arc<dyn RuleAction>> {
        self.actions.get(name)
    }

    /// Returns the registered rule type names.
    #[must_use]
    pub fn executor_types(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    /// Configures every executor.
    ///
    /// # Errors
    ///
    /// Returns [`SerdeError::Config`] naming the first executor that rejected
    /// its settings.
    pub fn configure_executors(
        &self,
        client_config: &ClientConfig,
        rule_config: &BTreeMap<String, String>,
    ) -> Result<(), SerdeError> {
        for (rule_type, executor) in &self.executors {
            executor.configure(client_config, rule_config).map_err(|err| {
                SerdeError::Config(format!("failed to configure rule executor {rule_type}: {err}"))
            })?;
        }
        Ok(())
    }
}
