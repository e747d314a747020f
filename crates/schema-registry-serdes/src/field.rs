// crates/schema-registry-serdes/src/field.rs
// ============================================================================
// Module: JSON Field Walker
// Description: Schema-directed traversal of JSON values for field-level rules.
// Purpose: Apply a field transform to the primitive fields a rule targets.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`JsonFieldTransformer`] walks a value alongside its JSON Schema:
//! `properties` descend into objects, `items` into arrays, local `$ref`
//! pointers are followed, and `allOf`/`anyOf`/`oneOf` pick the first branch
//! whose declared type fits the value. Primitive fields are transformed when
//! their `confluent:tags` (or metadata tags) intersect the rule's tags; a rule
//! without tags applies to every primitive field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use schema_registry_client::RuleKind;
use serde_json::Map;
use serde_json::Value;

use crate::error::SerdeError;
use crate::rules::FieldContext;
use crate::rules::FieldTransform;
use crate::rules::FieldTransformer;
use crate::rules::FieldType;
use crate::rules::RuleContext;
use crate::value::SerdeValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema keyword holding inline field tags.
pub const TAGS_KEYWORD: &str = "confluent:tags";
/// Maximum schema nesting followed before giving up.
const MAX_DEPTH: usize = 64;
/// Root path for field names.
const ROOT_PATH: &str = "$";

// ============================================================================
// SECTION: Walker
// ============================================================================

/// Field walker over one JSON Schema document.
#[derive(Debug, Clone, Copy)]
pub struct JsonFieldTransformer<'s> {
    /// Root schema document; local `$ref`s resolve against it.
    root: &'s Value,
}

impl<'s> JsonFieldTransformer<'s> {
    /// Creates a walker for a parsed schema document.
    #[must_use]
    pub const fn new(root: &'s Value) -> Self {
        Self {
            root,
        }
    }
}

impl FieldTransformer for JsonFieldTransformer<'_> {
    fn transform_fields(
        &self,
        ctx: &RuleContext<'_>,
        transform: &dyn FieldTransform,
        value: SerdeValue,
    ) -> Result<SerdeValue, SerdeError> {
        match value {
            SerdeValue::Json(json) => {
                let walk = FieldWalk {
                    root: self.root,
                    ctx,
                    transform,
                };
                walk.walk(self.root, ROOT_PATH, "", json, 0).map(SerdeValue::Json)
            }
            other => Ok(other),
        }
    }
}

/// One traversal of a value with a fixed rule and transform.
struct FieldWalk<'w, 'c> {
    /// Root schema document.
    root: &'w Value,
    /// Running rule.
    ctx: &'w RuleContext<'c>,
    /// Per-field transform.
    transform: &'w dyn FieldTransform,
}

impl<'w> FieldWalk<'w, '_> {
    /// Transforms `value` as described by `schema`.
    fn walk(
        &self,
        schema: &'w Value,
        path: &str,
        name: &str,
        value: Value,
        depth: usize,
    ) -> Result<Value, SerdeError> {
        if depth > MAX_DEPTH {
            return Err(SerdeError::Serde(format!("schema nesting exceeds {MAX_DEPTH} levels at {path}")));
        }
        let Value::Object(keywords) = schema else {
            return Ok(value);
        };
        if let Some(Value::String(reference)) = keywords.get("$ref") {
            let Some(resolved) = self.resolve_ref(reference)? else {
                return Ok(value);
            };
            return self.walk(resolved, path, name, value, depth + 1);
        }
        for combinator in ["allOf", "anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = keywords.get(combinator) {
                return match self.pick_branch(branches, &value)? {
                    Some(branch) => self.walk(branch, path, name, value, depth + 1),
                    None => Ok(value),
                };
            }
        }
        match value {
            Value::Object(fields) => self.walk_object(keywords, path, fields, depth),
            Value::Array(items) => match keywords.get("items") {
                Some(item_schema) => items
                    .into_iter()
                    .map(|item| self.walk(item_schema, path, name, item, depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                None => Ok(Value::Array(items)),
            },
            primitive => self.transform_primitive(keywords, path, name, primitive),
        }
    }

    /// Walks each declared property present in an object.
    fn walk_object(
        &self,
        keywords: &'w Map<String, Value>,
        path: &str,
        mut fields: Map<String, Value>,
        depth: usize,
    ) -> Result<Value, SerdeError> {
        let Some(Value::Object(properties)) = keywords.get("properties") else {
            return Ok(Value::Object(fields));
        };
        for (property, property_schema) in properties {
            let Some(field) = fields.remove(property) else {
                continue;
            };
            let field_path = format!("{path}.{property}");
            let field = self.walk(property_schema, &field_path, property, field, depth + 1)?;
            fields.insert(property.clone(), field);
        }
        Ok(Value::Object(fields))
    }

    /// Applies the transform to a primitive field when the rule targets it.
    fn transform_primitive(
        &self,
        keywords: &Map<String, Value>,
        path: &str,
        name: &str,
        value: Value,
    ) -> Result<Value, SerdeError> {
        let ctx = self.ctx;
        let mut tags = inline_tags(keywords);
        tags.extend(ctx.metadata_tags(path));
        let targeted = match ctx.rule.tags.as_ref() {
            Some(rule_tags) if !rule_tags.is_empty() => !rule_tags.is_disjoint(&tags),
            _ => true,
        };
        if !targeted {
            return Ok(value);
        }
        let field = FieldContext {
            full_name: path.to_string(),
            name: name.to_string(),
            field_type: field_type(&value),
            tags,
        };
        if ctx.rule.kind == RuleKind::Condition {
            let verdict = self.transform.transform(ctx, &field, value.clone())?;
            if verdict != Value::Bool(true) {
                return Err(SerdeError::Rule {
                    rule: ctx.rule.name.clone(),
                    message: format!("condition not satisfied for field {path}"),
                });
            }
            return Ok(value);
        }
        self.transform.transform(ctx, &field, value)
    }

    /// Resolves a local `$ref`; remote references are not followed.
    fn resolve_ref(&self, reference: &str) -> Result<Option<&'w Value>, SerdeError> {
        let Some(pointer) = reference.strip_prefix('#') else {
            return Ok(None);
        };
        self.root
            .pointer(pointer)
            .map(Some)
            .ok_or_else(|| SerdeError::Serde(format!("unresolvable schema reference {reference}")))
    }

    /// Returns the first combinator branch whose declared type fits `value`.
    fn pick_branch(&self, branches: &'w [Value], value: &Value) -> Result<Option<&'w Value>, SerdeError> {
        for branch in branches {
            let resolved = match branch.get("$ref").and_then(Value::as_str) {
                Some(reference) => self.resolve_ref(reference)?.unwrap_or(branch),
                None => branch,
            };
            if type_fits(resolved, value) {
                return Ok(Some(branch));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads `confluent:tags` from a schema node.
fn inline_tags(keywords: &Map<String, Value>) -> BTreeSet<String> {
    keywords
        .get(TAGS_KEYWORD)
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Classifies a primitive JSON value.
fn field_type(value: &Value) -> FieldType {
    match value {
        Value::String(_) => FieldType::String,
        Value::Number(number) if number.is_i64() || number.is_u64() => FieldType::Integer,
        Value::Number(_) => FieldType::Number,
        Value::Bool(_) => FieldType::Boolean,
        _ => FieldType::Null,
    }
}

/// Returns true when a schema's declared `type` admits `value`.
///
/// Schemas without `type` admit anything.
fn type_fits(schema: &Value, value: &Value) -> bool {
    let admits = |declared: &str| match declared {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    };
    match schema.get("type") {
        Some(Value::String(declared)) => admits(declared),
        Some(Value::Array(declared)) => declared.iter().filter_map(Value::as_str).any(admits),
        _ => true,
    }
}
