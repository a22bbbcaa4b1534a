//! Turns scanned segments into an ordered instruction list.

use std::fmt;

use crate::error::TemplateError;
use crate::macros::MacroSet;
use crate::scanner::{escape_literal, Segment, TagType};

/// Tag content together with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub source: String,
    pub line: usize,
}

/// One step of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Append fixed text to the output.
    AppendLiteral(String),
    /// Run statement code (control flow, bindings); writes nothing itself.
    Execute(Code),
    /// Evaluate an expression and append it HTML-escaped.
    AppendEscaped(Code),
    /// Evaluate an expression and append it unescaped.
    AppendRaw(Code),
    /// A comment tag.
    Noop,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::AppendLiteral(text) => write!(f, "append('{}');", escape_literal(text)),
            Instruction::Execute(code) => f.write_str(&code.source),
            Instruction::AppendEscaped(code) => write!(f, "append(escapeText({}));", code.source),
            Instruction::AppendRaw(code) => write!(f, "append({});", code.source),
            Instruction::Noop => f.write_str("// comment"),
        }
    }
}

/// Generate instructions for `segments` in source order.
///
/// Every literal chunk is emitted, including empty ones and the chunk after
/// the last tag. Tags with empty content emit nothing. `macros` rewrite
/// statement content only.
pub fn generate(
    segments: &[Segment],
    macros: &MacroSet,
    open: &str,
    template: &str,
) -> Result<Vec<Instruction>, TemplateError> {
    let mut instructions = Vec::with_capacity(segments.len());
    for segment in segments {
        let tag = match segment {
            Segment::Literal(text) => {
                instructions.push(Instruction::AppendLiteral(text.clone()));
                continue;
            }
            Segment::Tag(tag) => tag,
        };
        let tag_type = TagType::from_marker(&tag.marker).ok_or_else(|| {
            TemplateError::UnknownTagType {
                marker: tag.marker.clone(),
                open: open.to_string(),
                template: template.to_string(),
            }
        })?;
        if tag.content.is_empty() {
            continue;
        }
        let code = |source: String| Code {
            source,
            line: tag.line,
        };
        instructions.push(match tag_type {
            TagType::Statement => Instruction::Execute(code(macros.apply(&tag.content))),
            TagType::Escaped => Instruction::AppendEscaped(code(tag.content.clone())),
            TagType::Raw => Instruction::AppendRaw(code(tag.content.clone())),
            TagType::Comment => Instruction::Noop,
        });
    }
    Ok(instructions)
}

/// Render instructions one per line.
pub fn listing(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
