// crates/schema-registry-serdes/src/migration.rs
// ============================================================================
// Module: Migration Planner
// Description: Builds the version-by-version chain between writer and reader schemas.
// Purpose: Let decoded values evolve across registered schema versions.
// Dependencies: schema-registry-client, tracing
// ============================================================================

//! ## Overview
//! The writer schema's registered version is looked up under the subject
//! (deleted versions included). Equal versions need no migration. Otherwise
//! every version between writer and reader is loaded through the client,
//! which serves known versions from its store, and each adjacent pair becomes
//! one step. Downgrade steps run newest-first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use schema_registry_client::RegisteredSchema;
use schema_registry_client::RuleMode;
use schema_registry_client::Schema;
use schema_registry_client::SchemaRegistryClient;
use tracing::debug;

use crate::error::SerdeError;

// ============================================================================
// SECTION: Migrations
// ============================================================================

/// One migration step between adjacent versions.
///
/// # Invariants
/// - `mode` is `Upgrade` or `Downgrade`.
/// - For upgrades `target` is the newer version; for downgrades `source` is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Direction of the step.
    pub mode: RuleMode,
    /// Version the value conforms to before the step.
    pub source: RegisteredSchema,
    /// Version the value conforms to after the step.
    pub target: RegisteredSchema,
}

/// Plans the migration chain from `writer` to `reader` under `subject`.
///
/// # Errors
///
/// Returns [`SerdeError::Registry`] when a version cannot be fetched and
/// [`SerdeError::Serde`] when a registered schema has no version.
pub fn plan_migrations(
    client: &SchemaRegistryClient,
    subject: &str,
    writer: &Schema,
    reader: &RegisteredSchema,
) -> Result<Vec<Migration>, SerdeError> {
    let writer = client.get_by_schema(subject, writer, false, true)?;
    if writer.id.is_some() && writer.id == reader.id {
        return Ok(Vec::new());
    }
    let writer_version = version_of(&writer)?;
    let reader_version = version_of(reader)?;
    if writer_version == reader_version {
        return Ok(Vec::new());
    }
    let (mode, first, last) = if reader_version > writer_version {
        (RuleMode::Upgrade, writer, reader.clone())
    } else {
        (RuleMode::Downgrade, reader.clone(), writer)
    };
    let versions = schemas_between(client, subject, first, last)?;
    let mut migrations: Vec<Migration> = versions
        .windows(2)
        .filter_map(|pair| match pair {
            [older, newer] => Some(match mode {
                RuleMode::Upgrade => Migration {
                    mode,
                    source: older.clone(),
                    target: newer.clone(),
                },
                _ => Migration {
                    mode,
                    source: newer.clone(),
                    target: older.clone(),
                },
            }),
            _ => None,
        })
        .collect();
    if mode == RuleMode::Downgrade {
        migrations.reverse();
    }
    debug!(subject, writer_version, reader_version, steps = migrations.len(), "planned migrations");
    Ok(migrations)
}

/// Returns `first`, every registered version strictly between, and `last`.
fn schemas_between(
    client: &SchemaRegistryClient,
    subject: &str,
    first: RegisteredSchema,
    last: RegisteredSchema,
) -> Result<Vec<RegisteredSchema>, SerdeError> {
    let low = version_of(&first)?;
    let high = version_of(&last)?;
    let mut versions = Vec::with_capacity(usize::try_from(high - low + 1).unwrap_or(2));
    versions.push(first);
    for version in (low + 1)..high {
        versions.push(client.get_version(subject, version, true, None)?);
    }
    versions.push(last);
    Ok(versions)
}

/// Returns the version of a registered schema.
fn version_of(schema: &RegisteredSchema) -> Result<i32, SerdeError> {
    schema.version.ok_or_else(|| SerdeError::Serde("registered schema has no version".to_string()))
}
