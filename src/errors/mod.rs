//! # Módulo de Erros de Steps
//!
//! Toda falha que um step pode reportar é um [`StepError`]. As ações
//! retornam `Result<(), StepError>` e [`crate::step::Step::run`] converte o
//! erro num resultado terminal, então nada escapa da fronteira do step.
//!
//! ## Para todos entenderem:
//!
//! Cada erro carrega um "número de protocolo" ([`ErrorCode`]). Com o número
//! dá para saber de onde veio o problema sem ler a mensagem inteira, e
//! dá para agrupar falhas parecidas num relatório.
//!
//! ## Categorias de Erro
//!
//! | Faixa | Categoria    | Descrição                                          |
//! |-------|--------------|----------------------------------------------------|
//! | E1xxx | Referência   | Rota, factory, entidade ou tela desconhecida        |
//! | E2xxx | Recurso      | Fixture, resolução de URL ou falha do cliente       |
//! | E3xxx | Propriedade  | Chave de mapeamento inexistente no objeto           |
//! | E4xxx | Persistência | Falha ao salvar ou colaborador ausente              |
//! | E5xxx | Execução     | Timeout, panic, execução dupla, conclusão perdida   |
//!
//! ## Exemplo:
//!
//! ```text
//! [E1001] no route named 'user' is registered (step: Stub route 'user')
//! ```
//!
//! Com o código E1001 você sabe que:
//! - É um erro de referência (1xxx)
//! - Especificamente uma rota desconhecida (001)

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// ERROR CODE
// ============================================================================

/// Numbered error code: first digit is the category, the rest the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ------------------------------------------------------------------------
    // E1xxx: unresolved references
    // ------------------------------------------------------------------------

    /// No route matched the name, class or relationship lookup.
    pub const UNKNOWN_ROUTE: Self = Self(1001);

    /// No object factory is registered under the given name.
    pub const UNKNOWN_FACTORY: Self = Self(1002);

    /// The persistence model has no entity with the given name.
    pub const UNKNOWN_ENTITY: Self = Self(1003);

    /// The presenter cannot instantiate the given screen class.
    pub const UNKNOWN_SCREEN: Self = Self(1004);

    // ------------------------------------------------------------------------
    // E2xxx: resources
    // ------------------------------------------------------------------------

    /// Fixture could not be located or read.
    pub const FIXTURE_UNAVAILABLE: Self = Self(2001);

    /// Relative path could not be resolved against the base URL.
    pub const URL_UNRESOLVABLE: Self = Self(2002);

    /// The shared client refused or failed the operation.
    pub const CLIENT_FAILURE: Self = Self(2003);

    // ------------------------------------------------------------------------
    // E3xxx: property mapping
    // ------------------------------------------------------------------------

    /// Property mapping key does not exist on the constructed object.
    pub const UNKNOWN_PROPERTY: Self = Self(3001);

    // ------------------------------------------------------------------------
    // E4xxx: persistence and capabilities
    // ------------------------------------------------------------------------

    /// Saving the managed object context failed.
    pub const SAVE_FAILED: Self = Self(4001);

    /// A factory category was used without its collaborator.
    pub const MISSING_COLLABORATOR: Self = Self(4002);

    // ------------------------------------------------------------------------
    // E5xxx: execution
    // ------------------------------------------------------------------------

    /// Step did not reach a terminal outcome within its bound.
    pub const TIMEOUT: Self = Self(5001);

    /// Step action panicked.
    pub const ACTION_PANICKED: Self = Self(5002);

    /// Step was run more than once.
    pub const ALREADY_EXECUTED: Self = Self(5003);

    /// Completion signal was dropped without reporting a result.
    pub const COMPLETION_DROPPED: Self = Self(5004);

    /// Numeric value of the code.
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Code rendered with the `E` prefix, e.g. `E1001`.
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    /// Category derived from the leading digit.
    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Reference,
            2 => ErrorCategory::Resource,
            3 => ErrorCategory::Property,
            4 => ErrorCategory::Persistence,
            5 => ErrorCategory::Execution,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Short human readable description.
    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Route not found",
            1002 => "Object factory not found",
            1003 => "Entity not found",
            1004 => "Screen class not found",
            2001 => "Fixture unavailable",
            2002 => "URL could not be resolved",
            2003 => "Shared client failure",
            3001 => "Unknown property",
            4001 => "Context save failed",
            4002 => "Collaborator not configured",
            5001 => "Step timed out",
            5002 => "Step action panicked",
            5003 => "Step already executed",
            5004 => "Completion signal dropped",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Category of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Reference,
    Resource,
    Property,
    Persistence,
    Execution,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "Unresolved reference"),
            Self::Resource => write!(f, "Resource unavailable"),
            Self::Property => write!(f, "Property mismatch"),
            Self::Persistence => write!(f, "Persistence"),
            Self::Execution => write!(f, "Execution"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// STEP ERROR
// ============================================================================

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Route,
    Factory,
    Entity,
    Screen,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route => write!(f, "route"),
            Self::Factory => write!(f, "object factory"),
            Self::Entity => write!(f, "entity"),
            Self::Screen => write!(f, "screen class"),
        }
    }
}

/// Failure reported by a step, or by a factory that lacks a collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("no {kind} matching {name} is registered")]
    UnresolvedReference { kind: ReferenceKind, name: String },

    #[error("resource '{resource}' is unavailable: {reason}")]
    ResourceUnavailable { resource: String, reason: String },

    #[error("cannot resolve '{path}' against the base URL: {reason}")]
    UnresolvableUrl { path: String, reason: String },

    #[error("shared client failure: {0}")]
    ClientFailure(String),

    #[error("'{class}' has no property named '{key}'")]
    PropertyMismatch { key: String, class: String },

    #[error("failed to save managed object context: {0}")]
    PersistenceFailure(String),

    #[error("no terminal outcome within {0:?}")]
    Timeout(Duration),

    #[error("step action panicked: {0}")]
    ActionPanicked(String),

    #[error("step has already been executed")]
    AlreadyExecuted,

    #[error("completion signal dropped before the step finished")]
    CompletionDropped,

    #[error("no {0} was supplied to the step factory")]
    MissingCollaborator(&'static str),
}

impl StepError {
    pub fn unresolved(kind: ReferenceKind, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind,
            name: name.into(),
        }
    }

    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Numbered code for reports.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnresolvedReference { kind, .. } => match kind {
                ReferenceKind::Route => ErrorCode::UNKNOWN_ROUTE,
                ReferenceKind::Factory => ErrorCode::UNKNOWN_FACTORY,
                ReferenceKind::Entity => ErrorCode::UNKNOWN_ENTITY,
                ReferenceKind::Screen => ErrorCode::UNKNOWN_SCREEN,
            },
            Self::ResourceUnavailable { .. } => ErrorCode::FIXTURE_UNAVAILABLE,
            Self::UnresolvableUrl { .. } => ErrorCode::URL_UNRESOLVABLE,
            Self::ClientFailure(_) => ErrorCode::CLIENT_FAILURE,
            Self::PropertyMismatch { .. } => ErrorCode::UNKNOWN_PROPERTY,
            Self::PersistenceFailure(_) => ErrorCode::SAVE_FAILED,
            Self::Timeout(_) => ErrorCode::TIMEOUT,
            Self::ActionPanicked(_) => ErrorCode::ACTION_PANICKED,
            Self::AlreadyExecuted => ErrorCode::ALREADY_EXECUTED,
            Self::CompletionDropped => ErrorCode::COMPLETION_DROPPED,
            Self::MissingCollaborator(_) => ErrorCode::MISSING_COLLABORATOR,
        }
    }

    /// `[E1001] message (step: description)`, the form the runner prints.
    pub fn user_message(&self, description: &str) -> String {
        format!("[{}] {} (step: {})", self.code(), self, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::UNKNOWN_ROUTE.formatted(), "E1001");
        assert_eq!(ErrorCode::FIXTURE_UNAVAILABLE.formatted(), "E2001");
        assert_eq!(ErrorCode::TIMEOUT.to_string(), "E5001");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNKNOWN_ENTITY.category(), ErrorCategory::Reference);
        assert_eq!(ErrorCode::FIXTURE_UNAVAILABLE.category(), ErrorCategory::Resource);
        assert_eq!(ErrorCode::UNKNOWN_PROPERTY.category(), ErrorCategory::Property);
        assert_eq!(ErrorCode::SAVE_FAILED.category(), ErrorCategory::Persistence);
        assert_eq!(ErrorCode::ACTION_PANICKED.category(), ErrorCategory::Execution);
    }

    #[test]
    fn test_step_error_codes_follow_reference_kind() {
        let route = StepError::unresolved(ReferenceKind::Route, "'user'");
        let entity = StepError::unresolved(ReferenceKind::Entity, "'Person'");
        assert_eq!(route.code(), ErrorCode::UNKNOWN_ROUTE);
        assert_eq!(entity.code(), ErrorCode::UNKNOWN_ENTITY);
        assert_eq!(route.to_string(), "no route matching 'user' is registered");
    }

    #[test]
    fn test_resource_faults_have_distinct_codes() {
        let fixture = StepError::unavailable("users/1.json", "no such fixture");
        let url = StepError::UnresolvableUrl {
            path: "/a".to_string(),
            reason: "relative URL with a cannot-be-a-base base".to_string(),
        };
        let client = StepError::ClientFailure("network is not reachable".to_string());

        assert_eq!(fixture.code(), ErrorCode::FIXTURE_UNAVAILABLE);
        assert_eq!(url.code(), ErrorCode::URL_UNRESOLVABLE);
        assert_eq!(client.code(), ErrorCode::CLIENT_FAILURE);
        assert_eq!(url.code().category(), ErrorCategory::Resource);
        assert_eq!(client.code().description(), "Shared client failure");
    }

    #[test]
    fn test_user_message_names_the_step() {
        let err = StepError::PropertyMismatch {
            key: "nickname".to_string(),
            class: "Person".to_string(),
        };
        let msg = err.user_message("Create object from factory 'Person'");
        assert!(msg.starts_with("[E3001]"));
        assert!(msg.contains("nickname"));
        assert!(msg.contains("(step: Create object from factory 'Person')"));
    }
}
