//! # Módulo de Persistência de Objetos Gerenciados
//!
//! Um [`ManagedObjectContext`] é a área de rascunho da thread principal que
//! os steps alteram. O salvamento é parametrizado pela durabilidade:
//!
//! - `save(false)`: confirma o contexto só em memória
//! - `save(true)`: confirma e empurra para o store de apoio
//!
//! ## Para todos entenderem:
//!
//! É como editar um documento: inserir um registro é digitar, `save(false)`
//! é o "salvar" do editor e `save(true)` é também mandar uma cópia para o
//! arquivo em disco.
//!
//! [`InMemoryStore`] guarda o store de apoio como um snapshot e pode
//! espelhar os salvamentos duráveis num arquivo JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{ReferenceKind, StepError};
use crate::objects::MappedObject;

/// Context shared by the application and persistence steps.
pub type SharedContext = Arc<Mutex<dyn ManagedObjectContext>>;

/// The operations persistence steps need from a context.
pub trait ManagedObjectContext: Send {
    /// Inserts a new record of `entity` and returns it for configuration.
    fn insert(&mut self, entity: &str) -> Result<&mut ManagedRecord, StepError>;

    /// Deletes every record of `entity`, or of every entity when `None`.
    /// Returns how many records were removed.
    fn delete_all(&mut self, entity: Option<&str>) -> Result<usize, StepError>;

    /// Commits pending changes; `durable` also writes the backing store.
    fn save(&mut self, durable: bool) -> Result<(), StepError>;

    /// Records currently in the context, optionally filtered by entity.
    fn records(&self, entity: Option<&str>) -> Vec<&ManagedRecord>;

    fn count(&self, entity: Option<&str>) -> usize {
        self.records(entity).len()
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// A managed object: identity plus the entity's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedRecord {
    pub id: Uuid,
    pub object: MappedObject,
}

impl ManagedRecord {
    pub fn entity(&self) -> &str {
        self.object.class()
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.object.get(attribute)
    }

    pub fn set(&mut self, attribute: &str, value: Value) -> Result<(), StepError> {
        self.object.set(attribute, value)
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Counters describing which save paths were taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveLog {
    pub in_memory: usize,
    pub durable: usize,
}

/// Context with a model of entities and a snapshot backing store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    model: BTreeMap<String, BTreeSet<String>>,
    records: Vec<ManagedRecord>,
    persistent: Vec<ManagedRecord>,
    backing_file: Option<PathBuf>,
    has_changes: bool,
    saves: SaveLog,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an entity and its attributes.
    pub fn with_entity<I, S>(mut self, name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model
            .insert(name.into(), attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Mirrors durable saves to `path` as pretty JSON.
    pub fn with_backing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing_file = Some(path.into());
        self
    }

    /// Wraps the store for sharing with a step factory.
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.model.keys().map(String::as_str)
    }

    /// Records as of the last durable save.
    pub fn persistent_records(&self) -> &[ManagedRecord] {
        &self.persistent
    }

    pub fn saves(&self) -> SaveLog {
        self.saves
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    fn ensure_entity(&self, entity: &str) -> Result<&BTreeSet<String>, StepError> {
        self.model
            .get(entity)
            .ok_or_else(|| StepError::unresolved(ReferenceKind::Entity, format!("'{}'", entity)))
    }

    fn write_backing_file(&self) -> Result<(), StepError> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&self.persistent)
            .map_err(|e| StepError::PersistenceFailure(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| StepError::PersistenceFailure(format!("{}: {}", path.display(), e)))
    }
}

impl ManagedObjectContext for InMemoryStore {
    fn insert(&mut self, entity: &str) -> Result<&mut ManagedRecord, StepError> {
        let attributes = self.ensure_entity(entity)?;
        let object = MappedObject::with_properties(entity, attributes.iter().cloned());
        let record = ManagedRecord {
            id: Uuid::new_v4(),
            object,
        };
        debug!(entity, id = %record.id, "Inserted managed object");
        self.records.push(record);
        self.has_changes = true;
        let last = self.records.len() - 1;
        Ok(&mut self.records[last])
    }

    fn delete_all(&mut self, entity: Option<&str>) -> Result<usize, StepError> {
        let before = self.records.len();
        match entity {
            Some(name) => {
                self.ensure_entity(name)?;
                self.records.retain(|r| r.entity() != name);
            }
            None => self.records.clear(),
        }
        let removed = before - self.records.len();
        if removed > 0 {
            self.has_changes = true;
        }
        info!(entity = entity.unwrap_or("*"), removed, "Deleted managed objects");
        Ok(removed)
    }

    fn save(&mut self, durable: bool) -> Result<(), StepError> {
        if durable {
            let previous = std::mem::replace(&mut self.persistent, self.records.clone());
            if let Err(err) = self.write_backing_file() {
                self.persistent = previous;
                return Err(err);
            }
            self.saves.durable += 1;
        } else {
            self.saves.in_memory += 1;
        }
        self.has_changes = false;
        debug!(durable, records = self.records.len(), "Saved managed object context");
        Ok(())
    }

    fn records(&self, entity: Option<&str>) -> Vec<&ManagedRecord> {
        self.records
            .iter()
            .filter(|r| entity.map_or(true, |name| r.entity() == name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_entity("Person", ["name", "age"])
            .with_entity("Pet", ["name"])
    }

    #[test]
    fn test_insert_declares_entity_attributes() {
        let mut store = store();
        let record = store.insert("Person").unwrap();
        record.set("name", json!("Alice")).unwrap();
        assert!(record.set("species", json!("cat")).is_err());

        assert_eq!(store.count(Some("Person")), 1);
        assert!(store.has_changes());
    }

    #[test]
    fn test_insert_unknown_entity() {
        let mut store = store();
        let err = store.insert("Ghost").unwrap_err();
        assert!(matches!(
            err,
            StepError::UnresolvedReference { kind: ReferenceKind::Entity, .. }
        ));
    }

    #[test]
    fn test_in_memory_save_leaves_backing_store_alone() {
        let mut store = store();
        store.insert("Person").unwrap();
        store.save(false).unwrap();

        assert!(store.persistent_records().is_empty());
        assert_eq!(store.saves(), SaveLog { in_memory: 1, durable: 0 });
    }

    #[test]
    fn test_durable_save_snapshots_records() {
        let mut store = store();
        store.insert("Person").unwrap();
        store.save(true).unwrap();

        assert_eq!(store.persistent_records().len(), 1);
        assert_eq!(store.saves().durable, 1);
    }

    #[test]
    fn test_delete_all_by_entity_and_everything() {
        let mut store = store();
        store.insert("Person").unwrap();
        store.insert("Person").unwrap();
        store.insert("Pet").unwrap();

        assert_eq!(store.delete_all(Some("Person")).unwrap(), 2);
        assert_eq!(store.count(None), 1);
        assert_eq!(store.delete_all(None).unwrap(), 1);
        assert_eq!(store.count(None), 0);
    }

    #[test]
    fn test_backing_file_written_on_durable_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = store().with_backing_file(&path);
        store.insert("Pet").unwrap().set("name", json!("Rex")).unwrap();

        store.save(true).unwrap();

        let written: Vec<ManagedRecord> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].get("name"), Some(&json!("Rex")));
    }

    #[test]
    fn test_backing_file_failure_is_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store().with_backing_file(dir.path().join("missing/dir/store.json"));
        store.insert("Pet").unwrap();

        let err = store.save(true).unwrap_err();

        assert!(matches!(err, StepError::PersistenceFailure(_)));
        assert!(store.persistent_records().is_empty());
        assert_eq!(store.saves().durable, 0);
    }
}
