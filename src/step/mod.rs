//! # Steps - Ações Adiadas, Descritíveis e de Execução Única
//!
//! Um [`Step`] é uma descrição mais uma ação que ainda não rodou.
//! Construir um step nunca toca o estado compartilhado; só [`Step::run`] faz isso.
//!
//! ## Para todos entenderem:
//!
//! Um step é como um bilhete de rifa: ele só pode ser sorteado uma vez.
//! Depois de rodar, o step guarda o resultado e qualquer nova tentativa
//! de rodar devolve `Failed(AlreadyExecuted)` sem repetir a ação.
//!
//! ## Ciclo de vida:
//!
//! ```text
//! factory call ──> Step (pending) ──> runner calls run() ──> StepOutcome
//!                                        │
//!                                        ├─ Ok(())          -> Succeeded
//!                                        ├─ Err(StepError)  -> Failed
//!                                        ├─ panic           -> Failed(ActionPanicked)
//!                                        └─ bound elapsed   -> TimedOut
//! ```
//!
//! ## Detalhes de execução:
//!
//! - A ação roda numa task do tokio, então um panic é capturado e
//!   reportado em vez de derrubar o loop do runner.
//! - Ações que precisam esperar um evento externo usam [`Step::awaiting`]
//!   e resolvem o [`CompletionSignal`] recebido quando o evento chega.
//! - Se o tempo limite estoura, a task é abortada e o step termina como
//!   `TimedOut`.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::StepError;

/// Boxed future returned by a step action.
pub type StepFuture = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;

type Action = Box<dyn FnOnce() -> StepFuture + Send>;

/// Post-action hook invoked with the object a step produced, after the
/// primary action and before the step reports success.
pub type ConfigurationCallback<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

// ============================================================================
// OUTCOME
// ============================================================================

/// Terminal result of running a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded,
    Failed(StepError),
    TimedOut,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Failure reason, if any. Timeouts render as a reason too so reports
    /// always carry text for non-successful steps.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Succeeded => None,
            Self::Failed(err) => Some(err.to_string()),
            Self::TimedOut => Some("step timed out".to_string()),
        }
    }

    pub fn status(&self) -> StepStatus {
        match self {
            Self::Succeeded => StepStatus::Passed,
            Self::Failed(_) => StepStatus::Failed,
            Self::TimedOut => StepStatus::TimedOut,
        }
    }
}

/// Serialisable status used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

// ============================================================================
// CONTRACT
// ============================================================================

/// The shape a runner needs: a fixed description and a one-shot `run`.
#[async_trait]
pub trait TestStep: Send {
    /// Description set at construction, used verbatim in failure reports.
    fn describe(&self) -> &str;

    /// Performs the action. Must be called at most once.
    async fn run(&mut self) -> StepOutcome;
}

// ============================================================================
// COMPLETION SIGNAL
// ============================================================================

/// Handle given to [`Step::awaiting`] actions; the step finishes when this
/// is resolved. Dropping it unresolved fails the step.
pub struct CompletionSignal {
    tx: oneshot::Sender<Result<(), StepError>>,
}

impl CompletionSignal {
    pub fn succeed(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, error: StepError) {
        let _ = self.tx.send(Err(error));
    }

    pub fn complete(self, result: Result<(), StepError>) {
        let _ = self.tx.send(result);
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ============================================================================
// STEP
// ============================================================================

/// A named unit of deferred work.
pub struct Step {
    id: Uuid,
    description: String,
    timeout: Option<Duration>,
    action: Option<Action>,
}

impl Step {
    /// Builds a step around an asynchronous action.
    pub fn new<F, Fut>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            timeout: None,
            action: Some(Box::new(move || Box::pin(action()))),
        }
    }

    /// Builds a step whose action completes synchronously.
    pub fn sync<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<(), StepError> + Send + 'static,
    {
        Self::new(description, move || async move { action() })
    }

    /// Builds a step that finishes when the action's [`CompletionSignal`]
    /// is resolved, possibly long after the action itself returned.
    pub fn awaiting<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(CompletionSignal) -> Result<(), StepError> + Send + 'static,
    {
        Self::new(description, move || async move {
            let (tx, rx) = oneshot::channel();
            action(CompletionSignal { tx })?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(StepError::CompletionDropped),
            }
        })
    }

    /// Bounds how long `run` waits for a terminal outcome.
    pub fn with_timeout(mut self, bound: Duration) -> Self {
        self.timeout = Some(bound);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// `true` until `run` has been called.
    pub fn is_pending(&self) -> bool {
        self.action.is_some()
    }

    /// Runs the action with an additional bound on top of the step's own.
    pub async fn run_with_timeout(&mut self, bound: Duration) -> StepOutcome {
        let effective = self.timeout.map_or(bound, |own| own.min(bound));
        self.timeout = Some(effective);
        self.run_once().await
    }

    async fn run_once(&mut self) -> StepOutcome {
        let Some(action) = self.action.take() else {
            warn!(step_id = %self.id, description = %self.description, "Step run twice");
            return StepOutcome::Failed(StepError::AlreadyExecuted);
        };

        debug!(step_id = %self.id, description = %self.description, "Running step");

        let mut handle = tokio::spawn(async move { action().await });
        let _guard = AbortOnDrop(handle.abort_handle());

        let joined = match self.timeout {
            Some(bound) => match tokio::time::timeout(bound, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(step_id = %self.id, bound_ms = bound.as_millis() as u64, "Step timed out");
                    return StepOutcome::TimedOut;
                }
            },
            None => (&mut handle).await,
        };

        match joined {
            Ok(Ok(())) => StepOutcome::Succeeded,
            Ok(Err(err)) => StepOutcome::Failed(err),
            Err(join_err) if join_err.is_panic() => {
                StepOutcome::Failed(StepError::ActionPanicked(panic_message(join_err.into_panic())))
            }
            Err(_) => StepOutcome::Failed(StepError::ActionPanicked("task cancelled".to_string())),
        }
    }
}

#[async_trait]
impl TestStep for Step {
    fn describe(&self) -> &str {
        &self.description
    }

    async fn run(&mut self) -> StepOutcome {
        self.run_once().await
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Aborts the action task if `run` is dropped or times out.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
