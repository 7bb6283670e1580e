//! Tabela de rotas: como classes, relacionamentos e nomes viram paths de URL.
//!
//! Os padrões usam placeholders `:propriedade`, ex. `/users/:id/posts`,
//! que [`RouteSet::path_for_object`] preenche a partir de um [`MappedObject`].

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::Method;
use serde_json::Value;

use super::ClientError;
use crate::errors::{ReferenceKind, StepError};
use crate::objects::MappedObject;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_.]*)").expect("valid placeholder regex")
});

/// What a route is registered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    Named {
        name: String,
    },
    Class {
        class: String,
        method: Method,
    },
    Relationship {
        name: String,
        class: String,
        method: Method,
    },
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name } => write!(f, "'{}'", name),
            Self::Class { class, method } => write!(f, "class {} {}", class, method),
            Self::Relationship {
                name,
                class,
                method,
            } => write!(f, "relationship '{}' of {} {}", name, class, method),
        }
    }
}

/// A registered route. Only the path pattern is ever stubbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    kind: RouteKind,
    path_pattern: String,
    escapes_path: bool,
}

impl Route {
    pub fn named(name: impl Into<String>, path_pattern: impl Into<String>) -> Self {
        Self::new(RouteKind::Named { name: name.into() }, path_pattern)
    }

    pub fn class(class: impl Into<String>, method: Method, path_pattern: impl Into<String>) -> Self {
        Self::new(
            RouteKind::Class {
                class: class.into(),
                method,
            },
            path_pattern,
        )
    }

    pub fn relationship(
        name: impl Into<String>,
        class: impl Into<String>,
        method: Method,
        path_pattern: impl Into<String>,
    ) -> Self {
        Self::new(
            RouteKind::Relationship {
                name: name.into(),
                class: class.into(),
                method,
            },
            path_pattern,
        )
    }

    fn new(kind: RouteKind, path_pattern: impl Into<String>) -> Self {
        Self {
            kind,
            path_pattern: path_pattern.into(),
            escapes_path: false,
        }
    }

    /// Percent-encode interpolated values.
    pub fn with_escaped_path(mut self, escapes_path: bool) -> Self {
        self.escapes_path = escapes_path;
        self
    }

    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn escapes_path(&self) -> bool {
        self.escapes_path
    }

    pub fn set_path_pattern(&mut self, path_pattern: impl Into<String>) {
        self.path_pattern = path_pattern.into();
    }

    /// Fills `:property` placeholders from the object. Missing or `null`
    /// properties interpolate as empty strings.
    pub fn interpolate(&self, object: &MappedObject) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.path_pattern, |caps: &Captures| {
                let raw = match object.get(&caps[1]) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                if self.escapes_path {
                    urlencoding::encode(&raw).into_owned()
                } else {
                    raw
                }
            })
            .into_owned()
    }
}

/// Every route the shared client knows about.
#[derive(Debug, Default, Clone)]
pub struct RouteSet {
    routes: Vec<Route>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. A second route for the same name, class+method or
    /// relationship+class+method is rejected.
    pub fn add_route(&mut self, route: Route) -> Result<(), ClientError> {
        if self.routes.iter().any(|r| r.kind == route.kind) {
            return Err(ClientError::DuplicateRoute(route.kind.to_string()));
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route_named(&self, name: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| matches!(&r.kind, RouteKind::Named { name: n } if n == name))
    }

    pub fn route_named_mut(&mut self, name: &str) -> Option<&mut Route> {
        self.routes
            .iter_mut()
            .find(|r| matches!(&r.kind, RouteKind::Named { name: n } if n == name))
    }

    pub fn route_for_class(&self, class: &str, method: &Method) -> Option<&Route> {
        self.routes.iter().find(|r| is_class_route(r, class, method))
    }

    pub fn route_for_class_mut(&mut self, class: &str, method: &Method) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| is_class_route(r, class, method))
    }

    pub fn route_for_relationship(&self, name: &str, class: &str, method: &Method) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| is_relationship_route(r, name, class, method))
    }

    pub fn route_for_relationship_mut(
        &mut self,
        name: &str,
        class: &str,
        method: &Method,
    ) -> Option<&mut Route> {
        self.routes
            .iter_mut()
            .find(|r| is_relationship_route(r, name, class, method))
    }

    /// Finds the route for `kind` and overwrites its path pattern.
    pub fn stub_path_pattern(&mut self, kind: &RouteKind, path_pattern: &str) -> Result<(), StepError> {
        let route = match kind {
            RouteKind::Named { name } => self.route_named_mut(name),
            RouteKind::Class { class, method } => self.route_for_class_mut(class, method),
            RouteKind::Relationship {
                name,
                class,
                method,
            } => self.route_for_relationship_mut(name, class, method),
        };
        let route = route.ok_or_else(|| StepError::unresolved(ReferenceKind::Route, kind.to_string()))?;
        route.set_path_pattern(path_pattern);
        Ok(())
    }

    /// Path for an object using its class route.
    pub fn path_for_object(&self, object: &MappedObject, method: &Method) -> Option<String> {
        self.route_for_class(object.class(), method)
            .map(|route| route.interpolate(object))
    }
}

fn is_class_route(route: &Route, class: &str, method: &Method) -> bool {
    matches!(&route.kind, RouteKind::Class { class: c, method: m } if c == class && m == method)
}

fn is_relationship_route(route: &Route, name: &str, class: &str, method: &Method) -> bool {
    matches!(
        &route.kind,
        RouteKind::Relationship { name: n, class: c, method: m } if n == name && c == class && m == method
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: Value) -> MappedObject {
        let mut object = MappedObject::with_properties("User", ["id", "name"]);
        object.set("id", id).unwrap();
        object
    }

    #[test]
    fn test_lookup_by_each_kind() {
        let mut routes = RouteSet::new();
        routes.add_route(Route::named("me", "/me")).unwrap();
        routes.add_route(Route::class("User", Method::GET, "/users/:id")).unwrap();
        routes
            .add_route(Route::relationship("posts", "User", Method::GET, "/users/:id/posts"))
            .unwrap();

        assert_eq!(routes.route_named("me").unwrap().path_pattern(), "/me");
        assert_eq!(
            routes.route_for_class("User", &Method::GET).unwrap().path_pattern(),
            "/users/:id"
        );
        assert!(routes.route_for_class("User", &Method::POST).is_none());
        assert_eq!(
            routes
                .route_for_relationship("posts", "User", &Method::GET)
                .unwrap()
                .path_pattern(),
            "/users/:id/posts"
        );
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut routes = RouteSet::new();
        routes.add_route(Route::named("me", "/me")).unwrap();
        let err = routes.add_route(Route::named("me", "/other")).unwrap_err();
        assert!(matches!(err, ClientError::DuplicateRoute(_)));
    }

    #[test]
    fn test_stub_only_touches_pattern() {
        let mut routes = RouteSet::new();
        routes
            .add_route(Route::class("User", Method::GET, "/users/:id").with_escaped_path(true))
            .unwrap();
        let kind = RouteKind::Class {
            class: "User".to_string(),
            method: Method::GET,
        };

        routes.stub_path_pattern(&kind, "/v2/users/:id").unwrap();

        let route = routes.route_for_class("User", &Method::GET).unwrap();
        assert_eq!(route.path_pattern(), "/v2/users/:id");
        assert!(route.escapes_path());
        assert_eq!(route.kind(), &kind);
    }

    #[test]
    fn test_stub_missing_route() {
        let mut routes = RouteSet::new();
        let kind = RouteKind::Named {
            name: "ghost".to_string(),
        };
        let err = routes.stub_path_pattern(&kind, "/x").unwrap_err();
        assert!(matches!(
            err,
            StepError::UnresolvedReference { kind: ReferenceKind::Route, .. }
        ));
    }

    #[test]
    fn test_path_for_object_interpolates() {
        let mut routes = RouteSet::new();
        routes.add_route(Route::class("User", Method::GET, "/users/:id")).unwrap();

        assert_eq!(
            routes.path_for_object(&user(json!(7)), &Method::GET).as_deref(),
            Some("/users/7")
        );
    }

    #[test]
    fn test_escaped_interpolation() {
        let route = Route::class("User", Method::GET, "/users/:id").with_escaped_path(true);
        assert_eq!(route.interpolate(&user(json!("a b/c"))), "/users/a%20b%2Fc");
    }
}
