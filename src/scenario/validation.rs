//! # Validação Estrutural de Cenários
//!
//! Verificações feitas antes de construir o mundo de um cenário.
//!
//! ## Para leigos:
//!
//! É a revisão do formulário antes de enviar: cenário sem steps, base64 inválido,
//! duas fontes de corpo no mesmo step, rota declarada duas vezes. Um step que
//! nomeia uma rota, factory ou entidade inexistente passa por aqui sem
//! problema; ele falha quando roda, como qualquer outro step.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Url;
use thiserror::Error;

use super::{Scenario, ScenarioStep};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("scenario '{name}' defines no steps")]
    EmptyScenario { name: String },

    #[error("step {index}: cache_response needs exactly one of body, body_base64 or fixture, found {found}")]
    BodySourceCount { index: usize, found: usize },

    #[error("step {index}: body_base64 is not valid base64: {reason}")]
    InvalidBase64 { index: usize, reason: String },

    #[error("step {index}: create_objects lists no factories")]
    EmptyBatch { index: usize },

    #[error("base URL '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("route {route} is declared more than once")]
    DuplicateRoute { route: String },
}

/// `Ok(())` or every problem found, in document order.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

pub fn validate_scenario(scenario: &Scenario) -> ValidationResult {
    let mut errors = Vec::new();

    if let Some(url) = &scenario.base_url {
        if let Some(reason) = base_url_problem(url) {
            errors.push(ValidationError::InvalidBaseUrl {
                url: url.clone(),
                reason,
            });
        }
    }

    let mut seen = HashSet::new();
    for decl in &scenario.routes {
        let route = decl.to_route().kind().to_string();
        if !seen.insert(route.clone()) {
            errors.push(ValidationError::DuplicateRoute { route });
        }
    }

    if scenario.steps.is_empty() {
        errors.push(ValidationError::EmptyScenario {
            name: scenario.name.clone(),
        });
        return Err(errors);
    }

    for (i, step) in scenario.steps.iter().enumerate() {
        validate_step(i + 1, step, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_step(index: usize, step: &ScenarioStep, errors: &mut Vec<ValidationError>) {
    match step {
        ScenarioStep::CacheResponse {
            body,
            body_base64,
            fixture,
            ..
        } => {
            let found = [body.is_some(), body_base64.is_some(), fixture.is_some()]
                .iter()
                .filter(|present| **present)
                .count();
            if found != 1 {
                errors.push(ValidationError::BodySourceCount { index, found });
            }
            if let Some(encoded) = body_base64 {
                if let Err(e) = STANDARD.decode(encoded) {
                    errors.push(ValidationError::InvalidBase64 {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        ScenarioStep::CreateObjects { factories } if factories.is_empty() => {
            errors.push(ValidationError::EmptyBatch { index });
        }
        _ => {}
    }
}

fn base_url_problem(url: &str) -> Option<String> {
    match Url::parse(url) {
        Err(e) => Some(e.to_string()),
        Ok(parsed) if parsed.cannot_be_a_base() => Some("URL cannot be a base".to_string()),
        Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => {
            Some(format!("unsupported scheme '{}'", parsed.scheme()))
        }
        Ok(_) => None,
    }
}
