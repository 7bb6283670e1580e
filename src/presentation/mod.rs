//! # Módulo de Apresentação de Telas
//!
//! Steps de apresentação instanciam uma classe de tela, embrulham num
//! container de navegação, passam para um callback de configuração
//! opcional e apresentam.
//!
//! As classes de barra de navegação e toolbar usadas quando um step não
//! nomeia nenhuma são padrões globais do processo. Começam vazias,
//! normalmente são definidas uma vez por execução e são lidas a cada vez
//! que um step de apresentação roda.

use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::{ReferenceKind, StepError};

// ============================================================================
// PROCESS-WIDE DEFAULTS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentationDefaults {
    pub navigation_bar_class: Option<String>,
    pub toolbar_class: Option<String>,
}

static DEFAULTS: Lazy<RwLock<PresentationDefaults>> =
    Lazy::new(|| RwLock::new(PresentationDefaults::default()));

fn with_defaults<R>(f: impl FnOnce(&mut PresentationDefaults) -> R) -> R {
    // A poisoned lock only means a writer panicked mid-assignment of an
    // Option<String>; the value is still usable.
    let mut guard = DEFAULTS.write().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

pub fn set_default_navigation_bar_class(class: Option<String>) {
    with_defaults(|d| d.navigation_bar_class = class);
}

pub fn set_default_toolbar_class(class: Option<String>) {
    with_defaults(|d| d.toolbar_class = class);
}

pub fn default_navigation_bar_class() -> Option<String> {
    with_defaults(|d| d.navigation_bar_class.clone())
}

pub fn default_toolbar_class() -> Option<String> {
    with_defaults(|d| d.toolbar_class.clone())
}

/// Snapshot of both defaults.
pub fn defaults() -> PresentationDefaults {
    with_defaults(|d| d.clone())
}

/// Back to the initial, unset state.
pub fn reset_defaults() {
    with_defaults(|d| *d = PresentationDefaults::default());
}

// ============================================================================
// SCREENS
// ============================================================================

/// An instantiated screen controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub class: String,
    pub title: Option<String>,
    pub properties: Map<String, Value>,
}

impl Screen {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: None,
            properties: Map::new(),
        }
    }
}

/// Navigation container a screen is presented in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationContainer {
    pub navigation_bar_class: Option<String>,
    pub toolbar_class: Option<String>,
    pub root: Screen,
}

/// UI collaborator that creates and presents screens.
#[async_trait]
pub trait ScreenPresenter: Send + Sync {
    fn instantiate(&self, class: &str) -> Result<Screen, StepError>;

    /// Resolves once the presentation transition has finished.
    async fn present(&self, container: NavigationContainer) -> Result<(), StepError>;
}

// ============================================================================
// RECORDING PRESENTER
// ============================================================================

/// Presenter for headless runs: knows a set of screen classes, waits out a
/// simulated transition and records what was presented.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    classes: BTreeSet<String>,
    transition: Duration,
    presented: Mutex<Vec<NavigationContainer>>,
}

impl RecordingPresenter {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            transition: Duration::ZERO,
            presented: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    pub async fn presented(&self) -> Vec<NavigationContainer> {
        self.presented.lock().await.clone()
    }
}

#[async_trait]
impl ScreenPresenter for RecordingPresenter {
    fn instantiate(&self, class: &str) -> Result<Screen, StepError> {
        if self.classes.contains(class) {
            Ok(Screen::new(class))
        } else {
            Err(StepError::unresolved(ReferenceKind::Screen, format!("'{}'", class)))
        }
    }

    async fn present(&self, container: NavigationContainer) -> Result<(), StepError> {
        if !self.transition.is_zero() {
            tokio::time::sleep(self.transition).await;
        }
        info!(
            screen = %container.root.class,
            navigation_bar = container.navigation_bar_class.as_deref().unwrap_or("default"),
            toolbar = container.toolbar_class.as_deref().unwrap_or("default"),
            "Presented screen"
        );
        self.presented.lock().await.push(container);
        Ok(())
    }
}
