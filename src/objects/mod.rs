//! # Objetos de Domínio e Factories Nomeadas
//!
//! Um [`MappedObject`] é um nome de classe mais um conjunto fixo de
//! propriedades, decidido quando o objeto é construído. Atribuir uma chave
//! não declarada é um [`StepError::PropertyMismatch`].
//!
//! ## Para todos entenderem:
//!
//! [`FactoryRegistry`] é um catálogo de moldes: a suíte registra o molde
//! `"Person"` uma vez e pede quantas cópias novas quiser.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{ReferenceKind, StepError};

// ============================================================================
// MAPPED OBJECT
// ============================================================================

/// Instance of a domain class with a closed set of properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedObject {
    class: String,
    properties: Map<String, Value>,
}

impl MappedObject {
    /// Creates an object whose declared properties are the keys of `defaults`.
    pub fn new(class: impl Into<String>, defaults: Map<String, Value>) -> Self {
        Self {
            class: class.into(),
            properties: defaults,
        }
    }

    /// Creates an object with the given property names, all `null`.
    pub fn with_properties<I, S>(class: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let properties = names.into_iter().map(|n| (n.into(), Value::Null)).collect();
        Self::new(class, properties)
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Assigns a declared property.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), StepError> {
        match self.properties.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StepError::PropertyMismatch {
                key: key.to_string(),
                class: self.class.clone(),
            }),
        }
    }

    /// Assigns every entry of `mapping`, stopping at the first unknown key.
    pub fn apply(&mut self, mapping: &Map<String, Value>) -> Result<(), StepError> {
        for (key, value) in mapping {
            self.set(key, value.clone())?;
        }
        Ok(())
    }
}

// ============================================================================
// FACTORY REGISTRY
// ============================================================================

type Builder = Arc<dyn Fn() -> MappedObject + Send + Sync>;

/// Named object factories plus a log of the objects built through steps.
#[derive(Default)]
pub struct FactoryRegistry {
    builders: HashMap<String, Builder>,
    created: Mutex<Vec<MappedObject>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory called `name`.
    pub fn define<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn() -> MappedObject + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(builder));
    }

    /// Registers a factory that clones a template object.
    pub fn define_template(&mut self, name: impl Into<String>, template: MappedObject) {
        self.define(name, move || template.clone());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds a fresh object from the factory called `name`.
    pub fn build(&self, name: &str) -> Result<MappedObject, StepError> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| StepError::unresolved(ReferenceKind::Factory, format!("'{}'", name)))?;
        debug!(factory = %name, "Building object from factory");
        Ok(builder())
    }

    /// Keeps a finished object so tests and reports can inspect it.
    pub async fn record(&self, object: MappedObject) {
        self.created.lock().await.push(object);
    }

    /// Objects built by steps so far, in creation order.
    pub async fn created(&self) -> Vec<MappedObject> {
        self.created.lock().await.clone()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> MappedObject {
        MappedObject::with_properties("Person", ["name", "age"])
    }

    #[test]
    fn test_set_declared_property() {
        let mut object = person();
        object.set("name", json!("Alice")).unwrap();
        assert_eq!(object.get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn test_set_unknown_property_is_mismatch() {
        let mut object = person();
        let err = object.set("nickname", json!("Al")).unwrap_err();
        assert_eq!(
            err,
            StepError::PropertyMismatch {
                key: "nickname".to_string(),
                class: "Person".to_string()
            }
        );
    }

    #[test]
    fn test_apply_mapping() {
        let mut object = person();
        let mapping = json!({ "name": "Bob", "age": 42 });
        object.apply(mapping.as_object().unwrap()).unwrap();
        assert_eq!(object.get("age"), Some(&json!(42)));
    }

    #[test]
    fn test_registry_builds_fresh_instances() {
        let mut registry = FactoryRegistry::new();
        registry.define_template("Person", person());

        let mut first = registry.build("Person").unwrap();
        first.set("name", json!("Alice")).unwrap();
        let second = registry.build("Person").unwrap();

        assert_eq!(second.get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_registry_unknown_factory() {
        let registry = FactoryRegistry::new();
        let err = registry.build("Ghost").unwrap_err();
        assert!(matches!(
            err,
            StepError::UnresolvedReference { kind: ReferenceKind::Factory, .. }
        ));
    }

    #[tokio::test]
    async fn test_record_keeps_creation_order() {
        let registry = FactoryRegistry::new();
        registry.record(MappedObject::with_properties("A", ["x"])).await;
        registry.record(MappedObject::with_properties("B", ["x"])).await;

        let created = registry.created().await;
        assert_eq!(created.iter().map(|o| o.class()).collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
