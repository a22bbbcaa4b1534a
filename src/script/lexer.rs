//! Tokenizer for tag content.

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "(", ")", "{", "}",
    "[", "]", ",", ";", ".", "?", ":", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize `source`, whose first line is `line`.
pub fn tokenize(source: &str, line: usize) -> Result<Vec<Token>, SyntaxError> {
    Lexer {
        chars: source.char_indices().peekable(),
        source,
        line,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(&(start, c)) = self.chars.peek() {
            if c == '\n' {
                self.line += 1;
                self.chars.next();
            } else if c.is_whitespace() {
                self.chars.next();
            } else if self.source[start..].starts_with("//") {
                self.skip_line_comment();
            } else if self.source[start..].starts_with("/*") {
                self.skip_block_comment()?;
            } else if is_ident_start(c) {
                let ident = self.take_while(start, is_ident_continue);
                self.push(TokenKind::Ident(ident));
            } else if c.is_ascii_digit() || (c == '.' && self.next_is_digit(start)) {
                let number = self.number(start)?;
                self.push(TokenKind::Number(number));
            } else if c == '"' || c == '\'' {
                let line = self.line;
                let text = self.string(c)?;
                self.tokens.push(Token {
                    kind: TokenKind::Str(text),
                    line,
                });
            } else {
                let rest = &self.source[start..];
                let punct = PUNCTUATION
                    .iter()
                    .find(|p| rest.starts_with(**p))
                    .copied()
                    .ok_or_else(|| self.error(format!("unexpected character '{c}'")))?;
                for _ in 0..punct.len() {
                    self.chars.next();
                }
                self.push(TokenKind::Punct(punct));
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line)
    }

    fn next_is_digit(&self, start: usize) -> bool {
        self.source[start + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn take_while(&mut self, start: usize, pred: fn(char) -> bool) -> String {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        self.source[start..end].to_string()
    }

    fn number(&mut self, start: usize) -> Result<f64, SyntaxError> {
        let mut end = start;
        let mut prev = ' ';
        while let Some(&(i, c)) = self.chars.peek() {
            let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
            if !(c.is_ascii_alphanumeric() || c == '.' || exponent_sign) {
                break;
            }
            end = i + c.len_utf8();
            prev = c;
            self.chars.next();
        }
        let text = &self.source[start..end];
        text.parse()
            .map_err(|_| self.error(format!("invalid number '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        self.chars.next();
        let mut text = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(self.error("unterminated string"));
            };
            match c {
                c if c == quote => return Ok(text),
                '\n' => return Err(self.error("unterminated string")),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(self.error("unterminated string"));
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => text.push(c),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), SyntaxError> {
        self.chars.next();
        self.chars.next();
        let mut prev = ' ';
        while let Some((_, c)) = self.chars.next() {
            if c == '\n' {
                self.line += 1;
            }
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }
        Err(self.error("unterminated comment"))
    }
}
