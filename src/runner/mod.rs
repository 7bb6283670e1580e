//! # Módulo do Runner Sequencial
//!
//! Roda os steps estritamente um por vez, em ordem, cada um sob o limite
//! de tempo do runner, e monta um [`RunReport`] serializável.
//!
//! ## Para todos entenderem:
//!
//! É uma fila de dominós: cada peça só cai depois da anterior. Se uma peça
//! emperra e `stop_on_failure` está ligado, as peças seguintes nem são
//! tocadas e aparecem no relatório como `skipped`.
//!
//! ```text
//! steps ──> [step 1] ─ passed ─> [step 2] ─ failed ─> [step 3: skipped] ...
//! ```

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::StepsConfig;
use crate::errors::ErrorCode;
use crate::step::{Step, StepOutcome, StepStatus};

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step_id: String,
    pub description: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub name: String,
    pub status: RunStatus,
    /// RFC 3339.
    pub start_time: String,
    pub end_time: String,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

// ============================================================================
// RUNNER
// ============================================================================

#[derive(Debug, Clone)]
pub struct SequentialRunner {
    step_timeout: Duration,
    stop_on_failure: bool,
}

impl SequentialRunner {
    pub fn new(step_timeout: Duration, stop_on_failure: bool) -> Self {
        Self {
            step_timeout,
            stop_on_failure,
        }
    }

    pub fn from_config(config: &StepsConfig) -> Self {
        Self::new(config.step_timeout, config.stop_on_failure)
    }

    #[instrument(skip(self, steps), fields(step_count = steps.len()))]
    pub async fn run(&self, name: &str, steps: Vec<Step>) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let start_time = Utc::now();
        info!(%run_id, "Starting run");

        let mut reports = Vec::with_capacity(steps.len());
        let mut halted = false;

        for mut step in steps {
            if halted {
                reports.push(StepReport {
                    step_id: step.id().to_string(),
                    description: step.description().to_string(),
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                    error: None,
                    error_code: None,
                });
                continue;
            }

            let started = Instant::now();
            let outcome = step.run_with_timeout(self.step_timeout).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            let report = step_report(&step, &outcome, duration_ms);

            match &outcome {
                StepOutcome::Succeeded => info!(
                    step_id = %report.step_id,
                    description = %report.description,
                    duration_ms,
                    "Step passed"
                ),
                StepOutcome::Failed(err) => error!(
                    step_id = %report.step_id,
                    code = %err.code(),
                    "{}",
                    err.user_message(step.description())
                ),
                StepOutcome::TimedOut => warn!(
                    step_id = %report.step_id,
                    description = %report.description,
                    duration_ms,
                    "Step timed out"
                ),
            }

            if !outcome.is_success() && self.stop_on_failure {
                halted = true;
            }
            reports.push(report);
        }

        let status = if reports.iter().all(|r| r.status == StepStatus::Passed) {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        let end_time = Utc::now();
        info!(%run_id, ?status, "Run finished");

        RunReport {
            run_id,
            name: name.to_string(),
            status,
            start_time: start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            steps: reports,
        }
    }
}

fn step_report(step: &Step, outcome: &StepOutcome, duration_ms: u64) -> StepReport {
    let error_code = match outcome {
        StepOutcome::Succeeded => None,
        StepOutcome::Failed(err) => Some(err.code().formatted()),
        StepOutcome::TimedOut => Some(ErrorCode::TIMEOUT.formatted()),
    };
    StepReport {
        step_id: step.id().to_string(),
        description: step.description().to_string(),
        status: outcome.status(),
        duration_ms,
        error: outcome.reason(),
        error_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ReferenceKind, StepError};
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Step {
        let log = Arc::clone(log);
        Step::sync(format!("record {}", label), move || {
            log.lock().unwrap().push(label);
            Ok(())
        })
    }

    fn failing(name: &str) -> Step {
        let name = name.to_string();
        Step::sync("fail on purpose", move || {
            Err(StepError::unresolved(ReferenceKind::Factory, name))
        })
    }

    #[tokio::test]
    async fn test_all_steps_pass_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = SequentialRunner::new(Duration::from_secs(1), true);

        let report = runner
            .run("ordered", vec![recording(&log, "a"), recording(&log, "b"), recording(&log, "c")])
            .await;

        assert!(report.passed());
        assert_eq!(report.count(StepStatus::Passed), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.steps[1].description, "record b");
    }

    #[tokio::test]
    async fn test_stop_on_failure_skips_remaining() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = SequentialRunner::new(Duration::from_secs(1), true);

        let report = runner
            .run("halting", vec![recording(&log, "a"), failing("Ghost"), recording(&log, "c")])
            .await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert_eq!(report.steps[1].error_code.as_deref(), Some("E1002"));
        assert_eq!(report.steps[2].status, StepStatus::Skipped);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_keep_going_runs_everything() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = SequentialRunner::new(Duration::from_secs(1), false);

        let report = runner
            .run("lenient", vec![failing("Ghost"), recording(&log, "b")])
            .await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.count(StepStatus::Failed), 1);
        assert_eq!(report.count(StepStatus::Passed), 1);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_runner_bound_times_out_hanging_step() {
        let runner = SequentialRunner::new(Duration::from_millis(30), true);
        let hanging = Step::awaiting("wait for an event that never comes", |signal| {
            std::mem::forget(signal);
            Ok(())
        });

        let report = runner.run("hanging", vec![hanging]).await;

        assert_eq!(report.steps[0].status, StepStatus::TimedOut);
        assert_eq!(report.steps[0].error_code.as_deref(), Some("E5001"));
        assert!(report.steps[0].error.is_some());
    }

    #[tokio::test]
    async fn test_report_serialises_lowercase_statuses() {
        let runner = SequentialRunner::new(Duration::from_secs(1), true);
        let report = runner.run("json", vec![failing("Ghost")]).await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["steps"][0]["status"], "failed");
        assert!(chrono::DateTime::parse_from_rfc3339(json["start_time"].as_str().unwrap()).is_ok());
    }
}
