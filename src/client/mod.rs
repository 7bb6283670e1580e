//! # Módulo do Cliente Compartilhado
//!
//! Modelo em processo do gerenciador de objetos em rede com o qual o
//! sistema sob teste conversa. As ações dos steps alteram esse estado.
//!
//! ## Para todos entenderem:
//!
//! Imagine uma central telefônica dentro do app. Ela sabe se a linha está
//! funcionando (reachability), se as ligações estão em espera (fila
//! suspensa), qual ramal atende cada assunto (rotas) e tem respostas
//! gravadas para perguntas frequentes (cache). Os steps mexem nessa
//! central antes do teste para que o app receba exatamente o que o teste
//! espera.
//!
//! ## Componentes:
//!
//! - [`OperationQueue`]: flag de suspensão que segura as requisições
//! - [`HttpClient`]: status de reachability em cache + notificações de mudança
//! - [`RouteSet`]: tabela de rotas (atrás de um `RwLock`)
//! - [`ResponseCache`]: respostas prontas indexadas por `(Url, Method)`
//!
//! [`ObjectManager::load`] é o caminho de requisição usado pela aplicação,
//! então uma resposta colocada no cache por um step é o que a aplicação recebe.

pub mod cache;
pub mod queue;
pub mod reachability;
pub mod routes;

use reqwest::{Client, Method, StatusCode, Url};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};

pub use cache::{CachedResponse, ResponseCache};
pub use queue::OperationQueue;
pub use reachability::{HttpClient, ReachabilityChange, ReachabilityStatus};
pub use routes::{Route, RouteKind, RouteSet};

use crate::errors::StepError;

/// Errors raised by the shared client itself.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url_parse::ParseError,
    },

    #[error("cannot resolve '{path}' against {base}: {source}")]
    Unresolvable {
        path: String,
        base: Url,
        source: url_parse::ParseError,
    },

    #[error("a route for {0} is already registered")]
    DuplicateRoute(String),

    #[error("network is not reachable and no cached response exists for {method} {url}")]
    Offline { method: Method, url: Url },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<ClientError> for StepError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unresolvable { path, source, .. } => StepError::UnresolvableUrl {
                path,
                reason: source.to_string(),
            },
            other => StepError::ClientFailure(other.to_string()),
        }
    }
}

// reqwest re-exports `Url` but not its parse error type.
mod url_parse {
    pub type ParseError = <reqwest::Url as std::str::FromStr>::Err;
}

/// Where a loaded body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct LoadedResponse {
    pub url: Url,
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

/// The process-wide client shared by the application and the steps.
#[derive(Debug)]
pub struct ObjectManager {
    base_url: Url,
    operation_queue: OperationQueue,
    http_client: HttpClient,
    routes: RwLock<RouteSet>,
    cache: ResponseCache,
    transport: Client,
}

impl ObjectManager {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            operation_queue: OperationQueue::new(),
            http_client: HttpClient::new(ReachabilityStatus::Unknown),
            routes: RwLock::new(RouteSet::new()),
            cache: ResponseCache::new(),
            transport: Client::new(),
        }
    }

    pub fn with_base_url(url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(url).map_err(|source| ClientError::InvalidBaseUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::new(base_url))
    }

    pub fn with_routes(self, routes: RouteSet) -> Self {
        Self {
            routes: RwLock::new(routes),
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn operation_queue(&self) -> &OperationQueue {
        &self.operation_queue
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    pub fn routes(&self) -> &RwLock<RouteSet> {
        &self.routes
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Resolves `path` relative to the base URL (RFC 3986 rules: a leading
    /// `/` replaces the base path).
    pub fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::Unresolvable {
                path: path.to_string(),
                base: self.base_url.clone(),
                source,
            })
    }

    /// Loads `path` the way the application does: wait for the queue,
    /// prefer the cache, refuse when offline, otherwise hit the network.
    #[instrument(name = "object_manager_load", skip(self), fields(source))]
    pub async fn load(&self, method: Method, path: &str) -> Result<LoadedResponse, ClientError> {
        let url = self.resolve(path)?;

        self.operation_queue.wait_until_resumed().await;

        if let Some(cached) = self.cache.lookup(&url, &method).await {
            tracing::Span::current().record("source", "cache");
            return Ok(LoadedResponse {
                url,
                status: cached.status,
                body: cached.body,
                source: ResponseSource::Cache,
            });
        }

        if self.http_client.reachability().await == ReachabilityStatus::NotReachable {
            return Err(ClientError::Offline { method, url });
        }

        tracing::Span::current().record("source", "network");
        let response = self.transport.request(method.clone(), url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        info!(%method, %url, status = status.as_u16(), bytes = body.len(), "Loaded from network");

        Ok(LoadedResponse {
            url,
            status,
            body,
            source: ResponseSource::Network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager() -> ObjectManager {
        ObjectManager::with_base_url("http://localhost:4567/api/").unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute_paths() {
        let manager = manager();
        assert_eq!(
            manager.resolve("things/1").unwrap().as_str(),
            "http://localhost:4567/api/things/1"
        );
        assert_eq!(
            manager.resolve("/things/1").unwrap().as_str(),
            "http://localhost:4567/things/1"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ObjectManager::with_base_url("not a url").unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_client_errors_map_to_distinct_step_errors() {
        let manager = ObjectManager::with_base_url("mailto:someone@example.com").unwrap();

        let unresolvable: StepError = manager.resolve("/a").unwrap_err().into();
        assert!(matches!(unresolvable, StepError::UnresolvableUrl { ref path, .. } if path == "/a"));
        assert_eq!(unresolvable.code().formatted(), "E2002");

        let duplicate: StepError = ClientError::DuplicateRoute("'me'".to_string()).into();
        assert_eq!(duplicate.code().formatted(), "E2003");
    }

    #[tokio::test]
    async fn test_load_serves_cache_even_when_offline() {
        let manager = manager();
        let url = manager.resolve("/things/1").unwrap();
        manager.response_cache().store(url, Method::GET, b"cached".to_vec()).await;
        manager
            .http_client()
            .stub_reachability(ReachabilityStatus::NotReachable)
            .await;

        let loaded = manager.load(Method::GET, "/things/1").await.unwrap();

        assert_eq!(loaded.source, ResponseSource::Cache);
        assert_eq!(loaded.body, b"cached");
    }

    #[tokio::test]
    async fn test_load_offline_without_cache() {
        let manager = manager();
        manager
            .http_client()
            .stub_reachability(ReachabilityStatus::NotReachable)
            .await;

        let err = manager.load(Method::GET, "/things/2").await.unwrap_err();
        assert!(matches!(err, ClientError::Offline { .. }));
    }

    #[tokio::test]
    async fn test_load_waits_for_suspended_queue() {
        let manager = Arc::new(manager());
        let url = manager.resolve("/things/1").unwrap();
        manager.response_cache().store(url, Method::GET, b"x".to_vec()).await;
        manager.operation_queue().set_suspended(true);

        let pending = tokio::time::timeout(Duration::from_millis(30), manager.load(Method::GET, "/things/1")).await;
        assert!(pending.is_err());

        manager.operation_queue().set_suspended(false);
        let loaded = manager.load(Method::GET, "/things/1").await.unwrap();
        assert_eq!(loaded.body, b"x");
    }
}
