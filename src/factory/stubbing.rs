//! Steps que fazem stub do estado global do cliente: suspensão da fila,
//! reachability e padrões de rota.

use std::sync::Arc;

use reqwest::Method;
use tracing::info;

use super::StepFactory;
use crate::client::{ObjectManager, ReachabilityStatus, RouteKind};
use crate::errors::StepError;
use crate::step::Step;

impl StepFactory {
    /// Sets the suspended flag of the shared operation queue.
    pub fn step_to_set_suspended(&self, suspended: bool) -> Step {
        let manager = Arc::clone(&self.manager);
        Step::sync(
            format!("Set suspended to {} on the shared operation queue", suspended),
            move || {
                manager.operation_queue().set_suspended(suspended);
                Ok(())
            },
        )
    }

    /// Overwrites the cached reachability status, then posts the change
    /// notification so observers behave as on a real transition.
    pub fn step_to_stub_reachability(&self, status: ReachabilityStatus) -> Step {
        let manager = Arc::clone(&self.manager);
        Step::new(
            format!("Stub reachability status of the shared HTTP client to {:?}", status),
            move || async move {
                manager.http_client().stub_reachability(status).await;
                Ok(())
            },
        )
    }

    pub fn step_to_stub_named_route(
        &self,
        route_name: impl Into<String>,
        path_pattern: impl Into<String>,
    ) -> Step {
        let kind = RouteKind::Named {
            name: route_name.into(),
        };
        self.step_to_stub_route(kind, path_pattern.into())
    }

    pub fn step_to_stub_class_route(
        &self,
        class: impl Into<String>,
        method: Method,
        path_pattern: impl Into<String>,
    ) -> Step {
        let kind = RouteKind::Class {
            class: class.into(),
            method,
        };
        self.step_to_stub_route(kind, path_pattern.into())
    }

    pub fn step_to_stub_relationship_route(
        &self,
        relationship: impl Into<String>,
        class: impl Into<String>,
        method: Method,
        path_pattern: impl Into<String>,
    ) -> Step {
        let kind = RouteKind::Relationship {
            name: relationship.into(),
            class: class.into(),
            method,
        };
        self.step_to_stub_route(kind, path_pattern.into())
    }

    fn step_to_stub_route(&self, kind: RouteKind, path_pattern: String) -> Step {
        let manager = Arc::clone(&self.manager);
        let description = format!("Stub route {} to path pattern '{}'", kind, path_pattern);
        Step::new(description, move || stub_route(manager, kind, path_pattern))
    }
}

async fn stub_route(
    manager: Arc<ObjectManager>,
    kind: RouteKind,
    path_pattern: String,
) -> Result<(), StepError> {
    manager
        .routes()
        .write()
        .await
        .stub_path_pattern(&kind, &path_pattern)?;
    info!(route = %kind, %path_pattern, "Stubbed route path pattern");
    Ok(())
}
