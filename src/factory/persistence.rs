//! Steps que alteram o contexto de objetos gerenciados compartilhado.
//!
//! Obtidos via [`StepFactory::persistence`](super::StepFactory::persistence),
//! que falha na hora quando nenhum contexto foi fornecido à fábrica.

use serde_json::{Map, Value};
use tracing::info;

use crate::persistence::{ManagedObjectContext, ManagedRecord, SharedContext};
use crate::step::{ConfigurationCallback, Step};

/// Block run inside the context before it is saved. The flag starts as
/// `false`; set it to `true` to make the save durable.
pub type ContextBlock = Box<dyn FnOnce(&mut dyn ManagedObjectContext, &mut bool) + Send + 'static>;

/// Persistence step constructors bound to one shared context.
#[derive(Clone)]
pub struct PersistenceSteps {
    context: SharedContext,
}

impl PersistenceSteps {
    pub(super) fn new(context: SharedContext) -> Self {
        Self { context }
    }

    /// Inserts a new record of `entity`, yields it to `configure`, then
    /// saves: durably when `persisted`, in memory otherwise.
    pub fn step_to_insert_managed_object(
        &self,
        entity: impl Into<String>,
        persisted: bool,
        configure: Option<ConfigurationCallback<ManagedRecord>>,
    ) -> Step {
        let context = self.context.clone();
        let entity = entity.into();
        let description = format!(
            "Insert managed object for entity '{}' ({})",
            entity,
            if persisted { "saved to persistent store" } else { "saved in memory" }
        );
        Step::new(description, move || async move {
            let mut context = context.lock().await;
            let record = context.insert(&entity)?;
            if let Some(configure) = configure {
                configure(&mut *record);
            }
            let id = record.id;
            context.save(persisted)?;
            info!(entity = %entity, %id, persisted, "Inserted managed object");
            Ok(())
        })
    }

    /// Like [`step_to_insert_managed_object`](Self::step_to_insert_managed_object),
    /// but assigns `attributes` to the new record. An attribute the entity
    /// does not declare fails the step with
    /// [`StepError::PropertyMismatch`](crate::errors::StepError::PropertyMismatch)
    /// before anything is saved.
    pub fn step_to_insert_managed_object_with_attributes(
        &self,
        entity: impl Into<String>,
        persisted: bool,
        attributes: Map<String, Value>,
    ) -> Step {
        let context = self.context.clone();
        let entity = entity.into();
        let description = format!(
            "Insert managed object for entity '{}' with {} attribute(s) ({})",
            entity,
            attributes.len(),
            if persisted { "saved to persistent store" } else { "saved in memory" }
        );
        Step::new(description, move || async move {
            let mut context = context.lock().await;
            let record = context.insert(&entity)?;
            for (attribute, value) in attributes {
                record.set(&attribute, value)?;
            }
            let id = record.id;
            context.save(persisted)?;
            info!(entity = %entity, %id, persisted, "Inserted managed object");
            Ok(())
        })
    }

    /// Deletes every record of `entity`, or every record of every entity
    /// when `None`, and saves.
    pub fn step_to_delete_all_managed_objects(&self, entity: Option<&str>) -> Step {
        let context = self.context.clone();
        let entity = entity.map(str::to_string);
        let description = match &entity {
            Some(name) => format!("Delete all managed objects for entity '{}'", name),
            None => "Delete all managed objects".to_string(),
        };
        Step::new(description, move || async move {
            let mut context = context.lock().await;
            context.delete_all(entity.as_deref())?;
            context.save(false)
        })
    }

    /// Runs `block` against the context and saves according to the flag it
    /// leaves behind. Without a block the step only saves.
    pub fn step_to_perform_and_save(&self, block: Option<ContextBlock>) -> Step {
        let context = self.context.clone();
        let description = if block.is_some() {
            "Perform block and save managed object context"
        } else {
            "Save managed object context"
        };
        Step::new(description, move || async move {
            let mut context = context.lock().await;
            let mut save_to_persistent_store = false;
            if let Some(block) = block {
                block(&mut *context, &mut save_to_persistent_store);
            }
            context.save(save_to_persistent_store)
        })
    }
}
