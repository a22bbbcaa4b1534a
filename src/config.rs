//! Engine configuration: tag markers and the shared context.
//!
//! ```toml
//! open = "{%"
//! close = "%}"
//!
//! [context]
//! site = "example.org"
//! year = 2024
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::helpers::{Helper, HelperResult};
use crate::scanner::{DEFAULT_CLOSE, DEFAULT_OPEN};

fn default_open() -> String {
    DEFAULT_OPEN.to_string()
}

fn default_close() -> String {
    DEFAULT_CLOSE.to_string()
}

/// Options for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Open tag marker. Default: `<%`.
    #[serde(default = "default_open")]
    pub open: String,

    /// Close tag marker. Default: `%>`.
    #[serde(default = "default_close")]
    pub close: String,

    /// Bindings shared by every template rendered with this configuration.
    #[serde(default)]
    pub context: Context,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            open: default_open(),
            close: default_close(),
            context: Context::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn with_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open = open.into();
        self.close = close.into();
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// Shared bindings: the middle tier of variable resolution.
///
/// Values usually come from configuration; helpers can only be registered in
/// code. Context helpers shadow API helpers of the same name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Context {
    values: Map<String, Value>,
    helpers: BTreeMap<String, Helper>,
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            helpers: BTreeMap::new(),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a shared value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Register a shared helper function.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> HelperResult + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::new(f));
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.helpers.is_empty()
    }
}
