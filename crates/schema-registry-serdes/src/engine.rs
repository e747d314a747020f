// crates/schema-registry-serdes/src/engine.rs
// ============================================================================
// Module: Rule Engine
// Description: Selects and runs the rules of a phase with failure policies.
// Purpose: Apply encoding, domain, and migration rules in a fixed order.
// Dependencies: schema-registry-client, tracing
// ============================================================================

//! ## Overview
//! Rule selection follows the direction:
//! - `UPGRADE` runs the target schema's migration rules.
//! - `DOWNGRADE` runs the source schema's migration rules in reverse.
//! - Otherwise the target's encoding or domain rules run, reversed on `READ`.
//!
//! Each rule's outcome is handed to its `onSuccess` or `onFailure` action.
//! A failing rule whose action returns `Ok` leaves the value as it was
//! before the rule ran. The engine holds no mutable state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use schema_registry_client::Rule;
use schema_registry_client::RuleKind;
use schema_registry_client::RuleMode;
use schema_registry_client::Schema;
use serde_json::Value;
use tracing::debug;

use crate::context::SerializationContext;
use crate::error::SerdeError;
use crate::rules::ERROR_ACTION;
use crate::rules::FieldTransformer;
use crate::rules::NONE_ACTION;
use crate::rules::Phase;
use crate::rules::RuleContext;
use crate::rules::RuleRegistry;
use crate::value::SerdeValue;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// One rule-set invocation.
#[derive(Clone, Copy)]
pub struct RuleInput<'a> {
    /// Message facts.
    pub ser_ctx: &'a SerializationContext,
    /// Subject being processed.
    pub subject: &'a str,
    /// Phase whose rules run.
    pub phase: Phase,
    /// Current direction.
    pub mode: RuleMode,
    /// Schema the value conforms to before a migration step.
    pub source: Option<&'a Schema>,
    /// Schema whose rules run (or the migration target).
    pub target: Option<&'a Schema>,
    /// Field walker for decoded values.
    pub field_transformer: Option<&'a dyn FieldTransformer>,
    /// Parameters supplied by the caller for every rule in the run.
    pub extra_params: Option<&'a BTreeMap<String, String>>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Runs rule sets against values.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    /// Executors and actions.
    registry: &'a RuleRegistry,
}

impl<'a> RuleEngine<'a> {
    /// Creates an engine over a registry.
    #[must_use]
    pub const fn new(registry: &'a RuleRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Runs the selected rules over `value`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first action that aborts the pipeline.
    pub fn execute(&self, input: &RuleInput<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        let rules = select_rules(input);
        if rules.is_empty() {
            return Ok(value);
        }
        let mut value = value;
        for rule in rules {
            if rule.is_disabled() || !mode_applies(rule.mode, input.mode) {
                continue;
            }
            let ctx = RuleContext {
                ser_ctx: input.ser_ctx,
                source: input.source,
                target: input.target,
                subject: input.subject,
                mode: input.mode,
                rule,
                field_transformer: input.field_transformer,
                extra_params: input.extra_params,
            };
            value = self.run_rule(&ctx, value)?;
        }
        Ok(value)
    }

    /// Runs one rule and its outcome action.
    fn run_rule(&self, ctx: &RuleContext<'_>, value: SerdeValue) -> Result<SerdeValue, SerdeError> {
        let rule = ctx.rule;
        let outcome = match self.registry.executor(&rule.rule_type) {
            Some(executor) => executor.transform(ctx, value.clone()).and_then(|result| match rule.kind {
                RuleKind::Condition => check_condition(rule, &result).map(|()| value.clone()),
                RuleKind::Transform => Ok(result),
            }),
            None => Err(SerdeError::Rule {
                rule: rule.name.clone(),
                message: format!("no executor registered for rule type {}", rule.rule_type),
            }),
        };
        match outcome {
            Ok(result) => {
                self.run_action(ctx, false, None)?;
                Ok(result)
            }
            Err(err) => {
                debug!(rule = %rule.name, subject = ctx.subject, error = %err, "rule failed");
                self.run_action(ctx, true, Some(&err))?;
                Ok(value)
            }
        }
    }

    /// Resolves and runs the `onSuccess` or `onFailure` action.
    fn run_action(&self, ctx: &RuleContext<'_>, failed: bool, error: Option<&SerdeError>) -> Result<(), SerdeError> {
        let name = action_name(ctx.rule, ctx.mode, failed);
        let action = self.registry.action(&name).ok_or_else(|| SerdeError::Rule {
            rule: ctx.rule.name.clone(),
            message: format!("no rule action named {name}"),
        })?;
        action.run(ctx, error)
    }
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Returns the rules to run, in execution order.
fn select_rules<'a>(input: &RuleInput<'a>) -> Vec<&'a Rule> {
    let rule_set = |schema: Option<&'a Schema>| schema.and_then(|schema| schema.rule_set.as_ref());
    match input.mode {
        RuleMode::Upgrade => {
            rule_set(input.target).map(|set| set.migration().iter().collect()).unwrap_or_default()
        }
        RuleMode::Downgrade => {
            rule_set(input.source).map(|set| set.migration().iter().rev().collect()).unwrap_or_default()
        }
        mode => {
            let Some(set) = rule_set(input.target) else {
                return Vec::new();
            };
            let rules = match input.phase {
                Phase::Encoding => set.encoding(),
                Phase::Domain => set.domain(),
                Phase::Migration => set.migration(),
            };
            if mode == RuleMode::Read {
                rules.iter().rev().collect()
            } else {
                rules.iter().collect()
            }
        }
    }
}

/// Returns true when a rule declared for `rule_mode` runs in `mode`.
#[must_use]
pub fn mode_applies(rule_mode: RuleMode, mode: RuleMode) -> bool {
    match rule_mode {
        RuleMode::WriteRead => matches!(mode, RuleMode::Write | RuleMode::Read),
        RuleMode::UpDown => matches!(mode, RuleMode::Upgrade | RuleMode::Downgrade),
        declared => declared == mode,
    }
}

/// Resolves the action name for an outcome.
///
/// Pairs like `"ENCRYPT,DECRYPT"` on bidirectional rules pick the second
/// entry when reading or downgrading.
#[must_use]
pub fn action_name(rule: &Rule, mode: RuleMode, failed: bool) -> String {
    let (configured, default) = if failed {
        (rule.on_failure.as_deref(), ERROR_ACTION)
    } else {
        (rule.on_success.as_deref(), NONE_ACTION)
    };
    let Some(configured) = configured.map(str::trim).filter(|name| !name.is_empty()) else {
        return default.to_string();
    };
    if matches!(rule.mode, RuleMode::WriteRead | RuleMode::UpDown)
        && let Some((first, second)) = configured.split_once(',')
    {
        let chosen = if matches!(mode, RuleMode::Read | RuleMode::Downgrade) { second } else { first };
        let chosen = chosen.trim();
        return if chosen.is_empty() { default.to_string() } else { chosen.to_string() };
    }
    configured.to_string()
}

/// Fails unless a condition executor produced `true`.
fn check_condition(rule: &Rule, result: &SerdeValue) -> Result<(), SerdeError> {
    match result {
        SerdeValue::Json(Value::Bool(true)) => Ok(()),
        _ => Err(SerdeError::Rule {
            rule: rule.name.clone(),
            message: "condition not satisfied".to_string(),
        }),
    }
}
