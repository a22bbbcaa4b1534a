//! Splits template text into literal chunks and tags.
//!
//! A tag is `open [type-marker] content close`. The type marker is a run of
//! symbol characters (no whitespace, word characters or `}`) right after the
//! open marker; whitespace around the content is trimmed. Scanning is global
//! and non-overlapping, and content is matched lazily, so a tag ends at the
//! first close marker that follows it.

use regex::Regex;

use crate::error::ConfigError;

pub const DEFAULT_OPEN: &str = "<%";
pub const DEFAULT_CLOSE: &str = "%>";

/// How a tag's content is turned into an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    /// No marker: statement code.
    Statement,
    /// `=`: expression written HTML-escaped.
    Escaped,
    /// `==`, or `-` for compatibility with EJS: expression written as is.
    Raw,
    /// `#`: ignored.
    Comment,
}

impl TagType {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "" => Some(Self::Statement),
            "=" => Some(Self::Escaped),
            "==" | "-" => Some(Self::Raw),
            "#" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// One recognized tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Type marker as written; empty when absent.
    pub marker: String,
    /// Trimmed content.
    pub content: String,
    /// 1-based line of the open marker.
    pub line: usize,
}

/// A piece of scanned template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Tag(Tag),
}

/// Tag recognizer for one open/close marker pair.
#[derive(Debug, Clone)]
pub struct TagScanner {
    pattern: Regex,
    open: String,
    close: String,
}

impl TagScanner {
    pub fn new(open: &str, close: &str) -> Result<Self, ConfigError> {
        if open.is_empty() || close.is_empty() {
            return Err(ConfigError::InvalidMarkers(
                "open and close markers must not be empty".to_string(),
            ));
        }
        let source = format!(
            r"{}([^\s\w}}]+)?\s*([\s\S]*?)\s*{}",
            regex::escape(open),
            regex::escape(close)
        );
        let pattern = Regex::new(&source).map_err(|e| ConfigError::InvalidMarkers(e.to_string()))?;
        Ok(Self {
            pattern,
            open: open.to_string(),
            close: close.to_string(),
        })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    /// Scan `source` into alternating literals and tags.
    ///
    /// The result always starts and ends with a literal, possibly empty.
    pub fn scan(&self, source: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut last = 0;
        let mut line = 1;
        for caps in self.pattern.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            let literal = &source[last..whole.start()];
            line += literal.matches('\n').count();
            segments.push(Segment::Literal(literal.to_string()));
            segments.push(Segment::Tag(Tag {
                marker: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                content: caps.get(2).map_or("", |m| m.as_str()).to_string(),
                line,
            }));
            line += whole.as_str().matches('\n').count();
            last = whole.end();
        }
        segments.push(Segment::Literal(source[last..].to_string()));
        segments
    }
}

impl Default for TagScanner {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN, DEFAULT_CLOSE).expect("default markers form a valid tag pattern")
    }
}

/// Encode literal text as the body of a single-quoted string constant.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}
