//! # Módulo de Configuração
//!
//! Configurações compartilhadas pela CLI, pelo mundo do cenário e pelo runner.
//!
//! | Campo             | Padrão                   | Variável de ambiente    |
//! |-------------------|--------------------------|-------------------------|
//! | `base_url`        | `http://localhost:4567`  | `STEPS_BASE_URL`        |
//! | `fixture_root`    | `fixtures`               | `STEPS_FIXTURE_PATH`    |
//! | `step_timeout`    | 10 s                     | `STEPS_TIMEOUT_SECS`    |
//! | `stop_on_failure` | `true`                   | `STEPS_STOP_ON_FAILURE` |
//!
//! As flags da linha de comando são aplicadas por cima do ambiente.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Base URL of the shared client when neither the scenario nor the
/// environment names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4567";

/// Directory fixture paths are resolved against.
pub const DEFAULT_FIXTURE_ROOT: &str = "fixtures";

/// Bound applied to every step by the runner.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsConfig {
    pub base_url: String,

    pub fixture_root: PathBuf,

    /// Upper bound on any single step. A step's own timeout wins when it is
    /// shorter.
    pub step_timeout: Duration,

    /// Skip the remaining steps once one fails or times out.
    pub stop_on_failure: bool,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fixture_root: PathBuf::from(DEFAULT_FIXTURE_ROOT),
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            stop_on_failure: true,
        }
    }
}

impl StepsConfig {
    /// Defaults overridden by `STEPS_*` environment variables. Values that
    /// fail to parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("STEPS_BASE_URL") {
            config.base_url = val;
        }

        if let Some(val) = lookup("STEPS_FIXTURE_PATH") {
            config.fixture_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("STEPS_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.step_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(val) = lookup("STEPS_STOP_ON_FAILURE") {
            if let Some(flag) = parse_flag(&val) {
                config.stop_on_failure = flag;
            }
        }

        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
