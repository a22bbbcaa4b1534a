//! Minimal tag-based template compiler.
//!
//! Templates are text with embedded tags: `<% statement %>`, `<%= escaped %>`,
//! `<%== raw %>` (or `<%- raw %>`) and `<%# comment %>`. A template compiles
//! to a [`CompiledTemplate`] that can be rendered any number of times.
//! Tag code is parsed into a small sandboxed language and interpreted; it
//! never runs as host code.
//!
//! # Modules
//!
//! ## Compilation
//! - [`scanner`]: Splits raw text into literal chunks and tags
//! - [`macros`]: Ordered textual rewrites of statement tags (`for (x in xs)`)
//! - [`codegen`]: Ordered instruction list for a scanned template
//! - [`script`]: Lexer, AST and parser for tag code
//!
//! ## Rendering
//! - [`runtime`]: Interpreter and the local → scope → context → API lookup
//! - [`helpers`]: Escaping and HTML helpers (`escapeText`, `attr`, `sprintf`, ...)
//! - [`template`]: Compiled template artifact
//!
//! ## Orchestration
//! - [`engine`]: Public operations: `render`, `precompile`, `render_template`, `render_file`
//! - [`cache`]: Compiled-template cache
//! - [`loader`]: Template loaders (filesystem, in-memory)
//! - [`config`]: Markers and shared context, loadable from TOML

pub mod cache;
pub mod codegen;
pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod loader;
pub mod macros;
pub mod runtime;
pub mod scanner;
pub mod script;
pub mod template;

pub use cache::TemplateCache;
pub use config::{Context, EngineConfig};
pub use engine::Engine;
pub use error::{ConfigError, EvalError, LoadError, TemplateError, TemplateResult};
pub use helpers::{Helper, HelperApi, HelperError, HelperResult};
pub use loader::{FsLoader, MemoryLoader, TemplateLoader};
pub use macros::{MacroRule, MacroSet};
pub use template::CompiledTemplate;
