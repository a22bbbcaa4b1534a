//! The small statement/expression language inside template tags.
//!
//! Tag code is never executed as host code. It is parsed into a [`Program`]
//! over a restricted JavaScript-like grammar and run by the interpreter in
//! [`crate::runtime`]. Only helpers registered with the engine are callable.

pub mod ast;
mod lexer;
mod parser;

pub use ast::Program;
pub use parser::{parse_expression, parse_program};

/// A parse failure, located by template line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}
