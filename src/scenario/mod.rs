//! # Módulo de Cenários
//!
//! Um cenário é um documento JSON que declara o mundo em processo de que a
//! execução precisa (rotas, factories de objetos, entidades, telas) e uma
//! lista ordenada de steps, cada um nomeando um método da fábrica.
//!
//! ## Para todos entenderem:
//!
//! O cenário é a receita; a fábrica é a cozinha. A receita lista os
//! ingredientes que precisam estar na bancada (o "mundo") e os passos
//! na ordem certa. O runner segue a receita passo a passo.
//!
//! ## Exemplo:
//!
//! ```json
//! {
//!   "name": "Offline profile",
//!   "base_url": "http://localhost:4567",
//!   "routes": [{ "kind": "class", "class": "User", "method": "GET", "path": "/users/:id" }],
//!   "factories": { "Person": { "properties": { "name": null } } },
//!   "entities": { "Person": ["name"] },
//!   "screens": ["ProfileScreen"],
//!   "steps": [
//!     { "action": "stub_reachability", "params": { "status": "not_reachable" } },
//!     { "action": "cache_response", "params": { "path": "/users/1", "method": "GET", "fixture": "users/1.json" } },
//!     { "action": "present_screen", "params": { "class": "ProfileScreen" } }
//!   ]
//! }
//! ```
//!
//! Só o formato do documento é verificado antes (veja [`validation`]).
//! Se uma rota, factory ou entidade existe só é descoberto quando o step
//! correspondente roda.

pub mod loader;
pub mod validation;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::client::{ObjectManager, ReachabilityStatus, Route, RouteSet};
use crate::config::StepsConfig;
use crate::factory::{ContextBlock, StepFactory};
use crate::fixtures::DirectoryFixtures;
use crate::objects::{FactoryRegistry, MappedObject};
use crate::persistence::{InMemoryStore, ManagedObjectContext, SharedContext};
use crate::presentation::{self, RecordingPresenter, Screen, ScreenPresenter};
use crate::step::Step;

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides the configured base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
    /// Factory name to template.
    #[serde(default)]
    pub factories: BTreeMap<String, FactoryDecl>,
    /// Entity name to attribute names. A non-empty map enables the
    /// persistence steps.
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    /// JSON file durable saves are mirrored to.
    #[serde(default)]
    pub store_file: Option<PathBuf>,
    /// Presentable screen classes. A non-empty list enables the
    /// presentation steps.
    #[serde(default)]
    pub screens: Vec<String>,
    #[serde(default)]
    pub default_navigation_bar_class: Option<String>,
    #[serde(default)]
    pub default_toolbar_class: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteDecl {
    Named {
        name: String,
        path: String,
        #[serde(default)]
        escapes_path: bool,
    },
    Class {
        class: String,
        #[serde(with = "http_method")]
        method: Method,
        path: String,
        #[serde(default)]
        escapes_path: bool,
    },
    Relationship {
        name: String,
        class: String,
        #[serde(with = "http_method")]
        method: Method,
        path: String,
        #[serde(default)]
        escapes_path: bool,
    },
}

impl RouteDecl {
    pub fn to_route(&self) -> Route {
        match self {
            Self::Named {
                name,
                path,
                escapes_path,
            } => Route::named(name, path).with_escaped_path(*escapes_path),
            Self::Class {
                class,
                method,
                path,
                escapes_path,
            } => Route::class(class, method.clone(), path).with_escaped_path(*escapes_path),
            Self::Relationship {
                name,
                class,
                method,
                path,
                escapes_path,
            } => Route::relationship(name, class, method.clone(), path)
                .with_escaped_path(*escapes_path),
        }
    }
}

/// Template for a named factory. `class` defaults to the factory name;
/// `properties` lists every property with its initial value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryDecl {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One entry of `steps`, mapped 1:1 onto a factory method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum ScenarioStep {
    SetSuspended {
        suspended: bool,
    },
    StubReachability {
        status: ReachabilityStatus,
    },
    StubNamedRoute {
        name: String,
        path_pattern: String,
    },
    StubClassRoute {
        class: String,
        #[serde(with = "http_method")]
        method: Method,
        path_pattern: String,
    },
    StubRelationshipRoute {
        relationship: String,
        class: String,
        #[serde(with = "http_method")]
        method: Method,
        path_pattern: String,
    },
    /// Exactly one of `body`, `body_base64` or `fixture`.
    CacheResponse {
        path: String,
        #[serde(with = "http_method")]
        method: Method,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        body_base64: Option<String>,
        #[serde(default)]
        fixture: Option<String>,
    },
    CreateObject {
        factory: String,
        #[serde(default)]
        properties: Map<String, Value>,
    },
    CreateObjects {
        factories: Vec<String>,
    },
    InsertManagedObject {
        entity: String,
        #[serde(default)]
        persisted: bool,
        #[serde(default)]
        attributes: Map<String, Value>,
    },
    DeleteAllManagedObjects {
        #[serde(default)]
        entity: Option<String>,
    },
    SaveContext {
        #[serde(default)]
        persist: bool,
    },
    PresentScreen {
        class: String,
        #[serde(default)]
        navigation_bar_class: Option<String>,
        #[serde(default)]
        toolbar_class: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        properties: Map<String, Value>,
    },
}

impl ScenarioStep {
    /// Snake-case action name as written in the file.
    pub fn action(&self) -> &'static str {
        match self {
            Self::SetSuspended { .. } => "set_suspended",
            Self::StubReachability { .. } => "stub_reachability",
            Self::StubNamedRoute { .. } => "stub_named_route",
            Self::StubClassRoute { .. } => "stub_class_route",
            Self::StubRelationshipRoute { .. } => "stub_relationship_route",
            Self::CacheResponse { .. } => "cache_response",
            Self::CreateObject { .. } => "create_object",
            Self::CreateObjects { .. } => "create_objects",
            Self::InsertManagedObject { .. } => "insert_managed_object",
            Self::DeleteAllManagedObjects { .. } => "delete_all_managed_objects",
            Self::SaveContext { .. } => "save_context",
            Self::PresentScreen { .. } => "present_screen",
        }
    }

    /// Builds the step(s) for this entry. Only the persistence and
    /// presentation entries can fail here, when the factory lacks the
    /// matching collaborator.
    pub fn to_steps(&self, factory: &StepFactory) -> Result<Vec<Step>> {
        let step = match self {
            Self::SetSuspended { suspended } => factory.step_to_set_suspended(*suspended),
            Self::StubReachability { status } => factory.step_to_stub_reachability(*status),
            Self::StubNamedRoute { name, path_pattern } => {
                factory.step_to_stub_named_route(name, path_pattern)
            }
            Self::StubClassRoute {
                class,
                method,
                path_pattern,
            } => factory.step_to_stub_class_route(class, method.clone(), path_pattern),
            Self::StubRelationshipRoute {
                relationship,
                class,
                method,
                path_pattern,
            } => factory.step_to_stub_relationship_route(
                relationship,
                class,
                method.clone(),
                path_pattern,
            ),
            Self::CacheResponse {
                path,
                method,
                body,
                body_base64,
                fixture,
            } => match (body, body_base64, fixture) {
                (Some(body), None, None) => {
                    factory.step_to_cache_response(path, method.clone(), body.as_bytes())
                }
                (None, Some(encoded), None) => {
                    let bytes = STANDARD
                        .decode(encoded)
                        .with_context(|| format!("Invalid body_base64 for {} {}", method, path))?;
                    factory.step_to_cache_response(path, method.clone(), bytes)
                }
                (None, None, Some(fixture)) => {
                    factory.step_to_cache_response_from_fixture(path, method.clone(), fixture)
                }
                _ => anyhow::bail!(
                    "cache_response for {} {} needs exactly one of body, body_base64 or fixture",
                    method,
                    path
                ),
            },
            Self::CreateObject {
                factory: name,
                properties,
            } => factory.step_to_create_object(name, properties.clone(), None),
            Self::CreateObjects { factories } => {
                return Ok(factory.steps_to_create_objects(factories.iter().cloned()))
            }
            Self::InsertManagedObject {
                entity,
                persisted,
                attributes,
            } if attributes.is_empty() => factory
                .persistence()?
                .step_to_insert_managed_object(entity, *persisted, None),
            Self::InsertManagedObject {
                entity,
                persisted,
                attributes,
            } => factory
                .persistence()?
                .step_to_insert_managed_object_with_attributes(entity, *persisted, attributes.clone()),
            Self::DeleteAllManagedObjects { entity } => factory
                .persistence()?
                .step_to_delete_all_managed_objects(entity.as_deref()),
            Self::SaveContext { persist } => {
                let block: Option<ContextBlock> = persist.then(|| {
                    Box::new(|_: &mut dyn ManagedObjectContext, durable: &mut bool| *durable = true)
                        as ContextBlock
                });
                factory.persistence()?.step_to_perform_and_save(block)
            }
            Self::PresentScreen {
                class,
                navigation_bar_class,
                toolbar_class,
                title,
                properties,
            } => {
                let configure = (title.is_some() || !properties.is_empty()).then(|| {
                    let title = title.clone();
                    let properties = properties.clone();
                    Box::new(move |screen: &mut Screen| {
                        if title.is_some() {
                            screen.title = title;
                        }
                        screen.properties.extend(properties);
                    }) as Box<dyn FnOnce(&mut Screen) + Send>
                });
                factory.presentation()?.step_to_present_screen(
                    class,
                    navigation_bar_class.as_deref(),
                    toolbar_class.as_deref(),
                    configure,
                )
            }
        };
        Ok(vec![step])
    }
}

// ============================================================================
// WORLD
// ============================================================================

/// The collaborators a scenario runs against, plus the factory bound to
/// them. Handles are kept so callers can inspect state after a run.
pub struct World {
    pub manager: Arc<ObjectManager>,
    pub registry: Arc<FactoryRegistry>,
    pub store: Option<Arc<Mutex<InMemoryStore>>>,
    pub presenter: Option<Arc<RecordingPresenter>>,
    pub factory: StepFactory,
}

impl Scenario {
    /// Builds the in-process world. Default bar classes named by the
    /// scenario are installed process-wide; unnamed ones are left as is.
    pub fn build_world(&self, config: &StepsConfig) -> Result<World> {
        let base_url = self.base_url.as_deref().unwrap_or(&config.base_url);

        let mut routes = RouteSet::new();
        for decl in &self.routes {
            routes
                .add_route(decl.to_route())
                .with_context(|| format!("Invalid route declarations in scenario '{}'", self.name))?;
        }
        let manager = Arc::new(
            ObjectManager::with_base_url(base_url)
                .with_context(|| format!("Invalid base URL for scenario '{}'", self.name))?
                .with_routes(routes),
        );

        let mut registry = FactoryRegistry::new();
        for (name, decl) in &self.factories {
            let class = decl.class.clone().unwrap_or_else(|| name.clone());
            registry.define_template(name.clone(), MappedObject::new(class, decl.properties.clone()));
        }
        let registry = Arc::new(registry);

        let mut builder = StepFactory::builder(Arc::clone(&manager))
            .fixtures(Arc::new(DirectoryFixtures::new(&config.fixture_root)))
            .factories(Arc::clone(&registry));

        let store = (!self.entities.is_empty()).then(|| {
            let mut store = InMemoryStore::new();
            for (entity, attributes) in &self.entities {
                store = store.with_entity(entity.clone(), attributes.iter().cloned());
            }
            if let Some(path) = &self.store_file {
                store = store.with_backing_file(path.clone());
            }
            store.shared()
        });
        if let Some(store) = &store {
            let context: SharedContext = store.clone();
            builder = builder.persistence(context);
        }

        let presenter = (!self.screens.is_empty())
            .then(|| Arc::new(RecordingPresenter::new(self.screens.iter().cloned())));
        if let Some(presenter) = &presenter {
            let presenter: Arc<dyn ScreenPresenter> = presenter.clone();
            builder = builder.presenter(presenter);
        }

        if let Some(class) = &self.default_navigation_bar_class {
            presentation::set_default_navigation_bar_class(Some(class.clone()));
        }
        if let Some(class) = &self.default_toolbar_class {
            presentation::set_default_toolbar_class(Some(class.clone()));
        }

        Ok(World {
            manager,
            registry,
            store,
            presenter,
            factory: builder.build(),
        })
    }

    /// The scenario's steps in file order.
    pub fn steps(&self, factory: &StepFactory) -> Result<Vec<Step>> {
        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, entry) in self.steps.iter().enumerate() {
            let built = entry
                .to_steps(factory)
                .with_context(|| format!("Step {} ({})", index + 1, entry.action()))?;
            steps.extend(built);
        }
        Ok(steps)
    }
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Standard HTTP methods as case-insensitive strings.
mod http_method {
    use reqwest::Method;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const ACCEPTED: [Method; 7] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
    ];

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let upper = raw.to_ascii_uppercase();
        ACCEPTED
            .iter()
            .find(|m| m.as_str() == upper)
            .cloned()
            .ok_or_else(|| D::Error::custom(format!("unsupported HTTP method '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResponseSource;
    use crate::runner::{RunStatus, SequentialRunner};
    use crate::step::StepStatus;
    use serde_json::json;
    use std::time::Duration;

    fn offline_profile() -> Scenario {
        serde_json::from_value(json!({
            "name": "Offline profile",
            "base_url": "http://localhost:4567",
            "routes": [
                { "kind": "named", "name": "current_user", "path": "/me" },
                { "kind": "class", "class": "User", "method": "get", "path": "/users/:id", "escapes_path": true }
            ],
            "factories": { "Person": { "properties": { "name": null, "age": null } } },
            "entities": { "Person": ["name"] },
            "screens": ["ProfileScreen"],
            "steps": [
                { "action": "set_suspended", "params": { "suspended": false } },
                { "action": "stub_reachability", "params": { "status": "not_reachable" } },
                { "action": "stub_class_route", "params": { "class": "User", "method": "GET", "path_pattern": "/people/:id" } },
                { "action": "cache_response", "params": { "path": "/people/1", "method": "GET", "body": "{\"id\":1}" } },
                { "action": "cache_response", "params": { "path": "/me", "method": "GET", "body_base64": "e30=" } },
                { "action": "create_object", "params": { "factory": "Person", "properties": { "name": "Alice" } } },
                { "action": "create_objects", "params": { "factories": ["Person", "Person"] } },
                { "action": "insert_managed_object", "params": { "entity": "Person", "attributes": { "name": "Bob" } } },
                { "action": "save_context", "params": { "persist": false } },
                { "action": "present_screen", "params": { "class": "ProfileScreen", "navigation_bar_class": "Bar", "toolbar_class": "Tools", "title": "Me" } },
                { "action": "delete_all_managed_objects", "params": {} }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_methods_case_insensitively() {
        let scenario = offline_profile();
        match &scenario.routes[1] {
            RouteDecl::Class { method, .. } => assert_eq!(method, Method::GET),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_method_is_rejected() {
        let parsed: Result<ScenarioStep, _> = serde_json::from_value(json!({
            "action": "stub_class_route",
            "params": { "class": "User", "method": "BREW", "path_pattern": "/x" }
        }));
        assert!(parsed.unwrap_err().to_string().contains("unsupported HTTP method"));
    }

    #[tokio::test]
    async fn test_batch_entries_expand_in_place() {
        let scenario = offline_profile();
        let world = scenario.build_world(&StepsConfig::default()).unwrap();

        let steps = scenario.steps(&world.factory).unwrap();

        assert_eq!(steps.len(), scenario.steps.len() + 1);
        assert_eq!(steps[6].description(), "Create object from factory 'Person'");
        assert!(steps.iter().all(|s| s.is_pending()));
    }

    #[tokio::test]
    async fn test_run_whole_scenario() {
        let scenario = offline_profile();
        let world = scenario.build_world(&StepsConfig::default()).unwrap();
        let steps = scenario.steps(&world.factory).unwrap();

        let report = SequentialRunner::new(Duration::from_secs(2), true)
            .run(&scenario.name, steps)
            .await;

        assert_eq!(report.status, RunStatus::Passed, "{:?}", report.steps);
        assert_eq!(world.registry.created().await.len(), 3);

        let loaded = world.manager.load(Method::GET, "/people/1").await.unwrap();
        assert_eq!(loaded.source, ResponseSource::Cache);
        assert_eq!(loaded.body, br#"{"id":1}"#);
        let me = world.manager.load(Method::GET, "/me").await.unwrap();
        assert_eq!(me.body, b"{}");

        let presented = world.presenter.as_ref().unwrap().presented().await;
        assert_eq!(presented[0].root.title.as_deref(), Some("Me"));
        assert_eq!(presented[0].toolbar_class.as_deref(), Some("Tools"));

        let store = world.store.as_ref().unwrap().lock().await;
        assert_eq!(store.count(None), 0);
    }

    #[tokio::test]
    async fn test_persistence_entries_need_entities() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "No store",
            "steps": [{ "action": "save_context", "params": {} }]
        }))
        .unwrap();
        let world = scenario.build_world(&StepsConfig::default()).unwrap();

        let err = scenario.steps(&world.factory).unwrap_err();

        assert!(world.store.is_none());
        assert!(format!("{:#}", err).contains("persistence context"));
    }

    #[tokio::test]
    async fn test_missing_factory_fails_only_when_run() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "Ghost",
            "steps": [
                { "action": "create_object", "params": { "factory": "Ghost" } },
                { "action": "set_suspended", "params": { "suspended": true } }
            ]
        }))
        .unwrap();
        let world = scenario.build_world(&StepsConfig::default()).unwrap();
        let steps = scenario.steps(&world.factory).unwrap();

        let report = SequentialRunner::new(Duration::from_secs(1), true)
            .run(&scenario.name, steps)
            .await;

        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.steps[1].status, StepStatus::Skipped);
        assert!(!world.manager.operation_queue().is_suspended());
    }

    #[tokio::test]
    async fn test_undeclared_attribute_fails_insert_step() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "Typo",
            "entities": { "Person": ["name"] },
            "steps": [
                { "action": "insert_managed_object", "params": { "entity": "Person", "persisted": true, "attributes": { "nmae": "Bob" } } }
            ]
        }))
        .unwrap();
        let world = scenario.build_world(&StepsConfig::default()).unwrap();
        let steps = scenario.steps(&world.factory).unwrap();

        let report = SequentialRunner::new(Duration::from_secs(1), true)
            .run(&scenario.name, steps)
            .await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.steps[0].error_code.as_deref(), Some("E3001"));
        let store = world.store.as_ref().unwrap().lock().await;
        assert!(store.persistent_records().is_empty());
    }

    #[test]
    fn test_duplicate_routes_fail_world_construction() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "Dup",
            "routes": [
                { "kind": "named", "name": "me", "path": "/me" },
                { "kind": "named", "name": "me", "path": "/self" }
            ],
            "steps": [{ "action": "set_suspended", "params": { "suspended": true } }]
        }))
        .unwrap();

        assert!(scenario.build_world(&StepsConfig::default()).is_err());
    }
}
