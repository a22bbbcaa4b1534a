//! # Template Error Types
//!
//! Compile-time, lookup, load and evaluation failures surfaced by the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Engine operation result type
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Opaque error produced by a [`TemplateLoader`](crate::loader::TemplateLoader).
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Name reported for templates compiled without a cache key or locator.
pub const ANONYMOUS_TEMPLATE: &str = "<anonymous>";

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template tag '{open}{marker}' in {template}")]
    UnknownTagType {
        marker: String,
        open: String,
        template: String,
    },

    #[error("syntax error in {template} at line {line}: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },

    #[error("template not found: {key}")]
    TemplateNotFound { key: String },

    #[error("failed to load template '{locator}': {source}")]
    Load { locator: String, source: LoadError },

    #[error("error rendering {template}: {source}")]
    Evaluation {
        template: String,
        #[source]
        source: EvalError,
    },
}

impl TemplateError {
    /// Create a template-not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::TemplateNotFound { key: key.into() }
    }

    /// Create a load failure wrapping the loader's own error verbatim
    pub fn load(locator: impl Into<String>, source: impl Into<LoadError>) -> Self {
        Self::Load {
            locator: locator.into(),
            source: source.into(),
        }
    }

    /// Whether the error was raised while compiling (as opposed to loading or rendering)
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            TemplateError::UnknownTagType { .. } | TemplateError::Syntax { .. }
        )
    }
}

/// Errors raised while executing a compiled template
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{name} is not defined")]
    UndefinedVariable { name: String },

    #[error("{name} is not a helper function")]
    NotCallable { name: String },

    #[error("helper '{name}' cannot be used as a value")]
    HelperAsValue { name: String },

    #[error("cannot read property '{property}' of null")]
    NullAccess { property: String },

    #[error("cannot set property '{property}' on {target}")]
    InvalidPropertyAssignment { property: String, target: String },

    #[error("helper '{name}' failed: {message}")]
    Helper { name: String, message: String },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid tag markers: {0}")]
    InvalidMarkers(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_tag_type() {
        let err = TemplateError::UnknownTagType {
            marker: "!".to_string(),
            open: "<%".to_string(),
            template: "page.html".to_string(),
        };
        assert_eq!(format!("{err}"), "unknown template tag '<%!' in page.html");
    }

    #[test]
    fn test_display_not_found() {
        let err = TemplateError::not_found("layout");
        assert_eq!(format!("{err}"), "template not found: layout");
    }

    #[test]
    fn test_load_error_keeps_source_verbatim() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = TemplateError::load("views/a.html", io_err);
        match &err {
            TemplateError::Load { locator, source } => {
                assert_eq!(locator, "views/a.html");
                assert_eq!(source.to_string(), "no such file");
            }
            _ => panic!("Expected Load variant"),
        }
        assert!(!err.is_compile_error());
    }

    #[test]
    fn test_is_compile_error() {
        let syntax = TemplateError::Syntax {
            template: ANONYMOUS_TEMPLATE.to_string(),
            line: 3,
            message: "unexpected '}'".to_string(),
        };
        assert!(syntax.is_compile_error());
        assert!(!TemplateError::not_found("x").is_compile_error());
    }

    #[test]
    fn test_evaluation_error_source() {
        let err = TemplateError::Evaluation {
            template: "t".to_string(),
            source: EvalError::UndefinedVariable {
                name: "user".to_string(),
            },
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("user is not defined"));
    }
}
