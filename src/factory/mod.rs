//! # Módulo de Fábrica de Steps
//!
//! Construtores puros de [`Step`](crate::step::Step)s. Cada método apenas
//! captura suas entradas e os colaboradores de que precisa; nada é
//! consultado, lido ou escrito até o runner chamar `run`.
//!
//! ## Para todos entenderem:
//!
//! A fábrica é como um bloco de pedidos de restaurante. O garçom anota
//! "um suco de laranja" sem ir até a cozinha conferir se tem laranja.
//! Se faltar laranja, o problema aparece quando o pedido é preparado,
//! não quando foi anotado. Da mesma forma, uma rota, factory ou entidade
//! desconhecida vira um step que falha ao rodar, nunca um erro de construção.
//!
//! ## Categorias:
//!
//! | Categoria    | Métodos                                                        |
//! |--------------|----------------------------------------------------------------|
//! | Stubbing     | `step_to_set_suspended`, `step_to_stub_reachability`, `step_to_stub_*_route` |
//! | Cache        | `step_to_cache_response`, `step_to_cache_response_from_fixture` |
//! | Objetos      | `step_to_create_object`, `steps_to_create_objects`             |
//! | Persistência | `persistence()?` e depois `step_to_insert_managed_object`, ... |
//! | Apresentação | `presentation()?` e depois `step_to_present_screen`            |
//!
//! ## Capacidades opcionais:
//!
//! Persistência e apresentação só existem quando o colaborador
//! correspondente foi fornecido. Pedir uma delas sem o colaborador falha
//! na hora com [`StepError::MissingCollaborator`].
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! let factory = StepFactory::builder(manager).fixtures(fixtures).build();
//! let steps = vec![
//!     factory.step_to_stub_reachability(ReachabilityStatus::NotReachable),
//!     factory.step_to_cache_response_from_fixture("/users/1", Method::GET, "users/1.json"),
//! ];
//! ```

mod caching;
mod objects;
mod persistence;
mod presentation;
mod stubbing;

use std::sync::Arc;

pub use persistence::{ContextBlock, PersistenceSteps};
pub use presentation::PresentationSteps;

use crate::client::ObjectManager;
use crate::errors::StepError;
use crate::fixtures::{DirectoryFixtures, FixtureSource};
use crate::objects::FactoryRegistry;
use crate::persistence::SharedContext;
use crate::presentation::ScreenPresenter;

/// Builds steps against a fixed set of collaborators.
#[derive(Clone)]
pub struct StepFactory {
    manager: Arc<ObjectManager>,
    fixtures: Arc<dyn FixtureSource>,
    factories: Arc<FactoryRegistry>,
    persistence: Option<SharedContext>,
    presenter: Option<Arc<dyn ScreenPresenter>>,
}

impl StepFactory {
    pub fn builder(manager: Arc<ObjectManager>) -> StepFactoryBuilder {
        StepFactoryBuilder {
            manager,
            fixtures: None,
            factories: None,
            persistence: None,
            presenter: None,
        }
    }

    pub fn manager(&self) -> &Arc<ObjectManager> {
        &self.manager
    }

    pub fn factories(&self) -> &Arc<FactoryRegistry> {
        &self.factories
    }

    /// Persistence step constructors, if a context was supplied.
    pub fn persistence(&self) -> Result<PersistenceSteps, StepError> {
        self.persistence
            .clone()
            .map(PersistenceSteps::new)
            .ok_or(StepError::MissingCollaborator("persistence context"))
    }

    /// Presentation step constructors, if a presenter was supplied.
    pub fn presentation(&self) -> Result<PresentationSteps, StepError> {
        self.presenter
            .clone()
            .map(PresentationSteps::new)
            .ok_or(StepError::MissingCollaborator("screen presenter"))
    }

    pub fn has_persistence(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn has_presentation(&self) -> bool {
        self.presenter.is_some()
    }
}

pub struct StepFactoryBuilder {
    manager: Arc<ObjectManager>,
    fixtures: Option<Arc<dyn FixtureSource>>,
    factories: Option<Arc<FactoryRegistry>>,
    persistence: Option<SharedContext>,
    presenter: Option<Arc<dyn ScreenPresenter>>,
}

impl StepFactoryBuilder {
    pub fn fixtures(mut self, fixtures: Arc<dyn FixtureSource>) -> Self {
        self.fixtures = Some(fixtures);
        self
    }

    pub fn factories(mut self, factories: Arc<FactoryRegistry>) -> Self {
        self.factories = Some(factories);
        self
    }

    pub fn persistence(mut self, context: SharedContext) -> Self {
        self.persistence = Some(context);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn ScreenPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Fixtures default to the `fixtures/` directory, factories to an
    /// empty registry.
    pub fn build(self) -> StepFactory {
        StepFactory {
            manager: self.manager,
            fixtures: self
                .fixtures
                .unwrap_or_else(|| Arc::new(DirectoryFixtures::new(crate::config::DEFAULT_FIXTURE_ROOT))),
            factories: self.factories.unwrap_or_default(),
            persistence: self.persistence,
            presenter: self.presenter,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;

    #[test]
    fn test_capabilities_fail_fast_without_collaborators() {
        let factory = test_support::factory();

        assert!(!factory.has_persistence());
        assert_eq!(
            factory.persistence().err(),
            Some(StepError::MissingCollaborator("persistence context"))
        );
        assert_eq!(
            factory.presentation().err(),
            Some(StepError::MissingCollaborator("screen presenter"))
        );
    }

    #[test]
    fn test_capabilities_available_when_supplied() {
        let store: SharedContext = InMemoryStore::new().shared();
        let factory = StepFactory::builder(test_support::manager())
            .persistence(store)
            .build();

        assert!(factory.has_persistence());
        assert!(factory.persistence().is_ok());
    }
}
