//! Steps que preenchem o cache de respostas para que a próxima requisição
//! da aplicação para uma URL seja atendida sem tocar a rede.

use std::sync::Arc;

use reqwest::Method;
use tracing::info;

use super::StepFactory;
use crate::client::ObjectManager;
use crate::errors::StepError;
use crate::step::Step;

impl StepFactory {
    /// Caches `body` for `method` requests to `path` resolved against the
    /// base URL.
    pub fn step_to_cache_response(
        &self,
        path: impl Into<String>,
        method: Method,
        body: impl Into<Vec<u8>>,
    ) -> Step {
        let manager = Arc::clone(&self.manager);
        let path = path.into();
        let body = body.into();
        Step::new(
            format!("Cache response for {} {} relative to the base URL", method, path),
            move || cache_response(manager, path, method, body),
        )
    }

    /// Same as [`Self::step_to_cache_response`] with the body read from a
    /// fixture when the step runs.
    pub fn step_to_cache_response_from_fixture(
        &self,
        path: impl Into<String>,
        method: Method,
        fixture_path: impl Into<String>,
    ) -> Step {
        let manager = Arc::clone(&self.manager);
        let fixtures = Arc::clone(&self.fixtures);
        let path = path.into();
        let fixture_path = fixture_path.into();
        Step::new(
            format!(
                "Cache response for {} {} relative to the base URL from fixture '{}'",
                method, path, fixture_path
            ),
            move || async move {
                let body = fixtures.data(&fixture_path).await?;
                cache_response(manager, path, method, body).await
            },
        )
    }
}

async fn cache_response(
    manager: Arc<ObjectManager>,
    path: String,
    method: Method,
    body: Vec<u8>,
) -> Result<(), StepError> {
    let url = manager.resolve(&path)?;
    let cached = manager.response_cache().store(url, method, body).await;
    info!(
        url = %cached.url,
        method = %cached.method,
        bytes = cached.body.len(),
        etag = %cached.etag,
        "Cached response"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::client::{ReachabilityStatus, ResponseSource};
    use crate::step::{StepOutcome, TestStep};

    #[tokio::test]
    async fn test_cached_body_served_to_later_request() {
        let factory = test_support::factory();
        let manager = Arc::clone(factory.manager());
        let mut step = factory.step_to_cache_response("/things/1", Method::GET, b"B".to_vec());

        let url = manager.resolve("/things/1").unwrap();
        assert!(manager.response_cache().lookup(&url, &Method::GET).await.is_none());

        assert_eq!(step.run().await, StepOutcome::Succeeded);

        manager
            .http_client()
            .stub_reachability(ReachabilityStatus::NotReachable)
            .await;
        let loaded = manager.load(Method::GET, "/things/1").await.unwrap();
        assert_eq!(loaded.url.as_str(), "http://localhost:4567/things/1");
        assert_eq!(loaded.body, b"B");
        assert_eq!(loaded.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_single_method() {
        let factory = test_support::factory();
        factory
            .step_to_cache_response("/things/1", Method::GET, "{}")
            .run()
            .await;

        let manager = factory.manager();
        let url = manager.resolve("/things/1").unwrap();
        assert!(manager.response_cache().lookup(&url, &Method::POST).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_from_fixture() {
        let factory = test_support::factory();
        let mut step = factory.step_to_cache_response_from_fixture("/things/1", Method::GET, "things/1.json");

        assert_eq!(step.run().await, StepOutcome::Succeeded);

        let manager = factory.manager();
        let url = manager.resolve("/things/1").unwrap();
        let cached = manager.response_cache().lookup(&url, &Method::GET).await.unwrap();
        assert_eq!(cached.body, br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_unresolvable_path_reports_url_code() {
        let manager = Arc::new(ObjectManager::with_base_url("mailto:someone@example.com").unwrap());
        let factory = StepFactory::builder(manager).build();

        let outcome = factory.step_to_cache_response("/a", Method::GET, "b").run().await;

        match outcome {
            StepOutcome::Failed(err) => {
                assert!(matches!(err, StepError::UnresolvableUrl { .. }));
                assert!(err.user_message("cache").starts_with("[E2002]"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_fixture_fails_with_resource_unavailable() {
        let factory = test_support::factory();
        let mut step = factory.step_to_cache_response_from_fixture("/things/2", Method::GET, "things/2.json");

        let outcome = step.run().await;

        assert!(matches!(
            outcome,
            StepOutcome::Failed(StepError::ResourceUnavailable { ref resource, .. }) if resource == "things/2.json"
        ));
        assert_eq!(factory.manager().response_cache().len().await, 0);
    }
}
