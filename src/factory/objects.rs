//! Steps que constroem objetos de domínio a partir de factories nomeadas.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use super::StepFactory;
use crate::objects::MappedObject;
use crate::step::{ConfigurationCallback, Step};

impl StepFactory {
    /// Builds an object from the factory `name`, assigns `properties` onto
    /// it and yields it to `configure` before the step succeeds.
    pub fn step_to_create_object(
        &self,
        name: impl Into<String>,
        properties: Map<String, Value>,
        configure: Option<ConfigurationCallback<MappedObject>>,
    ) -> Step {
        let registry = Arc::clone(&self.factories);
        let name = name.into();
        let description = if properties.is_empty() {
            format!("Create object from factory '{}'", name)
        } else {
            let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
            format!(
                "Create object from factory '{}' with properties [{}]",
                name,
                keys.join(", ")
            )
        };
        Step::new(description, move || async move {
            let mut object = registry.build(&name)?;
            object.apply(&properties)?;
            if let Some(configure) = configure {
                configure(&mut object);
            }
            info!(factory = %name, class = %object.class(), "Created object from factory");
            registry.record(object).await;
            Ok(())
        })
    }

    /// One step per factory name, in the order given.
    pub fn steps_to_create_objects<I, S>(&self, names: I) -> Vec<Step>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(|name| self.step_to_create_object(name, Map::new(), None))
            .collect()
    }
}
