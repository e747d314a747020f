// crates/schema-registry-client/src/store.rs
// ============================================================================
// Module: Schema Store
// Description: Immutable-fact cache of registered schemas under four lookup views.
// Purpose: Avoid registry round trips for schemas whose identity never changes.
// Dependencies: serde_jcs, sha2
// ============================================================================

//! ## Overview
//! A registered schema's id, guid, and version are immutable once assigned, so
//! the store never evicts. Four views share one reader/writer lock so a single
//! write updates all of them together:
//! - `(subject, content fingerprint)` to the registered schema,
//! - `(subject, version)` to the registered schema,
//! - `(subject, id)` to the guid and schema document,
//! - `guid` to the schema document.
//!
//! Content fingerprints are SHA-256 over RFC 8785 canonical JSON, so two
//! schema documents that differ only in key order share a fingerprint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::Digest;
use sha2::Sha256;

use crate::error::RegistryError;
use crate::model::RegisteredSchema;
use crate::model::Schema;

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns the hex SHA-256 of the schema's canonical JSON.
///
/// # Errors
///
/// Returns [`RegistryError::Parse`] when canonicalization fails.
pub fn schema_fingerprint(schema: &Schema) -> Result<String, RegistryError> {
    let bytes = serde_jcs::to_vec(schema).map_err(|err| RegistryError::Parse {
        context: "canonical schema",
        message: err.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Lookup views guarded together.
#[derive(Default)]
struct StoreViews {
    /// `(subject, fingerprint)` to registered schema.
    by_content: HashMap<(String, String), RegisteredSchema>,
    /// `(subject, version)` to registered schema.
    by_version: HashMap<(String, i32), RegisteredSchema>,
    /// `(subject, id)` to guid and schema.
    by_id: HashMap<(String, i32), (Option<String>, Schema)>,
    /// `guid` to schema.
    by_guid: HashMap<String, Schema>,
}

/// Process-local cache of immutable schema identities.
///
/// # Invariants
/// - Entries are never evicted, only cleared wholesale.
/// - All views are updated under one write lock.
/// - A missing subject is stored under the empty string.
#[derive(Default)]
pub struct SchemaStore {
    /// Guarded views.
    views: RwLock<StoreViews>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore").finish_non_exhaustive()
    }
}

impl SchemaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a schema by id and/or guid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn set_schema(
        &self,
        subject: Option<&str>,
        id: Option<i32>,
        guid: Option<&str>,
        schema: &Schema,
    ) -> Result<(), RegistryError> {
        let mut views = self.write()?;
        if let Some(id) = id {
            views.by_id.insert(
                (subject.unwrap_or_default().to_string(), id),
                (guid.map(str::to_string), schema.clone()),
            );
        }
        if let Some(guid) = guid {
            views.by_guid.insert(guid.to_string(), schema.clone());
        }
        Ok(())
    }

    /// Records a registered schema under every view its identity allows.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when fingerprinting fails or the lock is poisoned.
    pub fn set_registered_schema(
        &self,
        schema: &Schema,
        registered: &RegisteredSchema,
    ) -> Result<(), RegistryError> {
        let fingerprint = schema_fingerprint(schema)?;
        let subject = registered.subject.clone().unwrap_or_default();
        let mut views = self.write()?;
        views.by_content.insert((subject.clone(), fingerprint), registered.clone());
        if let Some(version) = registered.version {
            views.by_version.insert((subject.clone(), version), registered.clone());
        }
        if let Some(id) = registered.id {
            views.by_id.insert((subject, id), (registered.guid.clone(), schema.clone()));
        }
        if let Some(guid) = &registered.guid {
            views.by_guid.insert(guid.clone(), schema.clone());
        }
        Ok(())
    }

    /// Looks up a schema by subject and id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn get_by_subject_and_id(
        &self,
        subject: Option<&str>,
        id: i32,
    ) -> Result<Option<(Option<String>, Schema)>, RegistryError> {
        let views = self.read()?;
        Ok(views.by_id.get(&(subject.unwrap_or_default().to_string(), id)).cloned())
    }

    /// Looks up a schema by guid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn get_by_guid(&self, guid: &str) -> Result<Option<Schema>, RegistryError> {
        Ok(self.read()?.by_guid.get(guid).cloned())
    }

    /// Looks up a registered schema by subject and content.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when fingerprinting fails or the lock is poisoned.
    pub fn get_registered_by_schema(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        let fingerprint = schema_fingerprint(schema)?;
        let views = self.read()?;
        Ok(views.by_content.get(&(subject.to_string(), fingerprint)).cloned())
    }

    /// Looks up a registered schema by subject and version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn get_registered_by_version(
        &self,
        subject: &str,
        version: i32,
    ) -> Result<Option<RegisteredSchema>, RegistryError> {
        Ok(self.read()?.by_version.get(&(subject.to_string(), version)).cloned())
    }

    /// Removes every entry from every view.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Lock`] when the store lock is poisoned.
    pub fn clear(&self) -> Result<(), RegistryError> {
        *self.write()? = StoreViews::default();
        Ok(())
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreViews>, RegistryError> {
        self.views.read().map_err(|_| RegistryError::Lock("schema store"))
    }

    /// Acquires the write lock.
    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreViews>, RegistryError> {
        self.views.write().map_err(|_| RegistryError::Lock("schema store"))
    }
}
