//! # Módulo de Fixtures
//!
//! Fixtures de resposta são procuradas por um caminho relativo a uma raiz.
//! Uma fixture ausente ou ilegível é um [`StepError::ResourceUnavailable`],
//! reportado quando o step roda, nunca quando é construído.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::StepError;

/// Resolves a relative fixture path to its bytes.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn data(&self, path: &str) -> Result<Vec<u8>, StepError>;
}

// ============================================================================
// DIRECTORY FIXTURES
// ============================================================================

/// Fixtures stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryFixtures {
    root: PathBuf,
}

impl DirectoryFixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `path` onto the root, refusing anything that would escape it.
    fn locate(&self, path: &str) -> Result<PathBuf, StepError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StepError::unavailable(path, "fixture paths must stay inside the fixture root"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FixtureSource for DirectoryFixtures {
    async fn data(&self, path: &str) -> Result<Vec<u8>, StepError> {
        let full = self.locate(path)?;
        debug!(fixture = %full.display(), "Reading fixture");
        tokio::fs::read(&full)
            .await
            .map_err(|e| StepError::unavailable(path, e))
    }
}

// ============================================================================
// IN-MEMORY FIXTURES
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryFixtures {
    files: HashMap<String, Vec<u8>>,
}

impl InMemoryFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }
}

#[async_trait]
impl FixtureSource for InMemoryFixtures {
    async fn data(&self, path: &str) -> Result<Vec<u8>, StepError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StepError::unavailable(path, "no such fixture"))
    }
}
