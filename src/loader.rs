//! Template acquisition.
//!
//! How a locator resolves (a path, a key, a URL) is entirely the loader's
//! concern. The engine issues at most one load per call and surfaces the
//! loader's error verbatim.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::LoadError;

/// Source of raw template text.
#[async_trait]
pub trait TemplateLoader: Send + Sync + std::fmt::Debug {
    /// Fetch the raw text for `locator`.
    async fn load(&self, locator: &str) -> Result<String, LoadError>;
}

/// Reads templates from the filesystem.
///
/// Relative locators are resolved against the base directory when one is
/// set, otherwise against the process working directory.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    base_dir: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(locator),
            None => PathBuf::from(locator),
        }
    }
}

#[async_trait]
impl TemplateLoader for FsLoader {
    async fn load(&self, locator: &str) -> Result<String, LoadError> {
        let path = self.resolve(locator);
        tracing::debug!(path = %path.display(), "Reading template file");
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// In-memory templates keyed by locator.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: RwLock<HashMap<String, String>>,
}

/// Returned by [`MemoryLoader`] for unknown locators.
#[derive(Debug, thiserror::Error)]
#[error("no template registered for '{0}'")]
pub struct MissingTemplate(pub String);

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`MemoryLoader::insert`].
    pub fn with(self, locator: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(locator, source);
        self
    }

    pub fn insert(&self, locator: impl Into<String>, source: impl Into<String>) {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        templates.insert(locator.into(), source.into());
    }
}

#[async_trait]
impl TemplateLoader for MemoryLoader {
    async fn load(&self, locator: &str) -> Result<String, LoadError> {
        let templates = self
            .templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        templates
            .get(locator)
            .cloned()
            .ok_or_else(|| MissingTemplate(locator.to_string()).into())
    }
}
