//! Parses a template's instruction list into one [`Program`].
//!
//! Statement tags rarely hold a complete statement: `<% if (x) { %>` opens a
//! block that a later `<% } %>` closes. All statement fragments are therefore
//! tokenized into a single stream in which every output instruction sits as
//! an opaque item, and that stream is parsed as a whole.

use crate::codegen::Instruction;
use crate::runtime::value::number;

use super::ast::{
    AssignOp, BinaryOp, Expr, LogicalOp, Output, Program, Stmt, UnaryOp, UpdateOp,
};
use super::lexer::{tokenize, Token, TokenKind};
use super::SyntaxError;

const RESERVED: &[&str] = &[
    "if", "else", "for", "while", "var", "let", "const", "break", "continue", "in",
];

/// Deepest statement or expression nesting accepted.
const MAX_NESTING: usize = 128;

#[derive(Debug)]
enum Item {
    Token(Token),
    Emit(Output, usize),
}

impl Item {
    fn line(&self) -> usize {
        match self {
            Item::Token(token) => token.line,
            Item::Emit(_, line) => *line,
        }
    }
}

/// Parse compiled instructions into a program.
pub fn parse_program(instructions: &[Instruction]) -> Result<Program, SyntaxError> {
    let mut items = Vec::with_capacity(instructions.len());
    let mut line = 1;
    for instruction in instructions {
        match instruction {
            Instruction::AppendLiteral(text) => {
                items.push(Item::Emit(Output::Literal(text.clone()), line));
                line += text.matches('\n').count();
            }
            Instruction::Execute(code) => {
                line = code.line;
                items.extend(tokenize(&code.source, code.line)?.into_iter().map(Item::Token));
            }
            Instruction::AppendEscaped(code) => {
                line = code.line;
                let expr = parse_expression(&code.source, code.line)?;
                items.push(Item::Emit(Output::Escaped(expr), code.line));
            }
            Instruction::AppendRaw(code) => {
                line = code.line;
                let expr = parse_expression(&code.source, code.line)?;
                items.push(Item::Emit(Output::Raw(expr), code.line));
            }
            Instruction::Noop => {}
        }
    }
    let mut parser = Parser::new(items);
    let mut body = Vec::new();
    while !parser.at_end() {
        if parser.peek_punct("}") {
            return Err(parser.error("unexpected '}' without a matching '{'"));
        }
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

/// Parse a complete expression, such as the content of an output tag.
pub fn parse_expression(source: &str, line: usize) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source, line)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("expected an expression", line));
    }
    let mut parser = Parser::new(tokens.into_iter().map(Item::Token).collect());
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(parser.error(format!("unexpected {} after expression", parser.describe())));
    }
    Ok(expr)
}

struct Parser {
    items: Vec<Item>,
    pos: usize,
    loop_depth: usize,
    depth: usize,
}

impl Parser {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            pos: 0,
            loop_depth: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        match self.items.get(self.pos) {
            Some(Item::Token(token)) => Some(&token.kind),
            _ => None,
        }
    }

    fn peek_punct(&self, punct: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Punct(p)) if *p == punct)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Ident(name)) if name == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.peek_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), SyntaxError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{punct}' but found {}", self.describe())))
        }
    }

    fn line(&self) -> usize {
        self.items
            .get(self.pos)
            .or_else(|| self.items.last())
            .map_or(1, Item::line)
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line())
    }

    fn describe(&self) -> String {
        match self.items.get(self.pos) {
            None => "end of template".to_string(),
            Some(Item::Emit(Output::Literal(_), _)) => "template text".to_string(),
            Some(Item::Emit(_, _)) => "an output tag".to_string(),
            Some(Item::Token(token)) => match &token.kind {
                TokenKind::Ident(name) => format!("'{name}'"),
                TokenKind::Number(n) => format!("number {n}"),
                TokenKind::Str(_) => "a string".to_string(),
                TokenKind::Punct(p) => format!("'{p}'"),
            },
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, SyntaxError> {
        if let Some(Item::Emit(output, _)) = self.items.get(self.pos) {
            let output = output.clone();
            self.pos += 1;
            return Ok(Stmt::Output(output));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.peek_punct("{") {
            return self.block();
        }
        let keyword = match self.peek_kind() {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "if" => self.if_statement(),
            "for" => self.for_statement(),
            "while" => self.while_statement(),
            "var" | "let" | "const" => {
                let declaration = self.declaration()?;
                self.eat_punct(";");
                Ok(declaration)
            }
            "break" | "continue" => {
                if self.loop_depth == 0 {
                    return Err(self.error(format!("'{keyword}' outside of a loop")));
                }
                self.pos += 1;
                self.eat_punct(";");
                Ok(if keyword == "break" {
                    Stmt::Break
                } else {
                    Stmt::Continue
                })
            }
            "else" => Err(self.error("'else' without a matching 'if'")),
            _ => {
                let expr = self.expression()?;
                self.eat_punct(";");
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.error("missing '}' to close block"));
            }
            body.push(self.statement()?);
        }
        Ok(Stmt::Block(body))
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.pos += 1;
        let test = self.condition()?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.peek_keyword("else") {
            self.pos += 1;
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then,
            otherwise,
        })
    }

    fn condition(&mut self) -> Result<Expr, SyntaxError> {
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        Ok(test)
    }

    fn for_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.pos += 1;
        self.expect_punct("(")?;
        let init = if self.peek_punct(";") {
            None
        } else if ["var", "let", "const"].iter().any(|k| self.peek_keyword(k)) {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;
        let test = if self.peek_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.peek_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.loop_body()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.pos += 1;
        let test = self.condition()?;
        let body = Box::new(self.loop_body()?);
        Ok(Stmt::While { test, body })
    }

    fn loop_body(&mut self) -> Result<Stmt, SyntaxError> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn declaration(&mut self) -> Result<Stmt, SyntaxError> {
        self.pos += 1;
        let mut bindings = Vec::new();
        loop {
            let name = self.binding_name()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            bindings.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Declare(bindings))
    }

    fn binding_name(&mut self) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected a variable name but found {}", self.describe()))),
        }
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.assignment()?;
        if !self.peek_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, SyntaxError> {
        let target = self.conditional()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Punct("=")) => AssignOp::Set,
            Some(TokenKind::Punct("+=")) => AssignOp::Add,
            Some(TokenKind::Punct("-=")) => AssignOp::Sub,
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(self.error("invalid assignment target"));
        }
        self.pos += 1;
        let value = self.assignment()?;
        Ok(Expr::Assign(op, Box::new(target), Box::new(value)))
    }

    fn conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        while let Some((precedence, op)) = self.peek_kind().and_then(binary_operator) {
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let right = Box::new(self.binary(precedence + 1)?);
            left = match op {
                Operator::Logical(op) => Expr::Logical(op, Box::new(left), right),
                Operator::Binary(op) => Expr::Binary(op, Box::new(left), right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Punct("!")) => Some(UnaryOp::Not),
            Some(TokenKind::Punct("-")) => Some(UnaryOp::Neg),
            Some(TokenKind::Punct("+")) => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        if let Some(op) = self.peek_update() {
            self.pos += 1;
            let target = self.nested(Self::unary)?;
            return self.update(op, true, target);
        }
        let expr = self.postfix()?;
        match self.peek_update() {
            Some(op) => {
                self.pos += 1;
                self.update(op, false, expr)
            }
            None => Ok(expr),
        }
    }

    fn peek_update(&self) -> Option<UpdateOp> {
        match self.peek_kind() {
            Some(TokenKind::Punct("++")) => Some(UpdateOp::Increment),
            Some(TokenKind::Punct("--")) => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn update(&self, op: UpdateOp, prefix: bool, target: Expr) -> Result<Expr, SyntaxError> {
        if !target.is_assignable() {
            return Err(self.error("invalid increment/decrement target"));
        }
        Ok(Expr::Update {
            op,
            prefix,
            target: Box::new(target),
        })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                match self.peek_kind() {
                    Some(TokenKind::Ident(name)) => {
                        let name = name.clone();
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), name);
                    }
                    _ => {
                        return Err(self.error(format!(
                            "expected a property name but found {}",
                            self.describe()
                        )))
                    }
                }
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek_punct("(") {
                let Expr::Ident(name) = expr else {
                    return Err(self.error("only named helpers can be called"));
                };
                self.pos += 1;
                let args = self.list(")")?;
                expr = Expr::Call(name, args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut elements = Vec::new();
        while !self.eat_punct(close) {
            elements.push(self.assignment()?);
            if !self.eat_punct(",") {
                self.expect_punct(close)?;
                break;
            }
        }
        Ok(elements)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let Some(Item::Token(token)) = self.items.get(self.pos) else {
            return Err(self.error(format!("expected an expression but found {}", self.describe())));
        };
        let expr = match &token.kind {
            TokenKind::Number(n) => Expr::Literal(number(*n)),
            TokenKind::Str(s) => Expr::Literal(s.clone().into()),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(true.into()),
                "false" => Expr::Literal(false.into()),
                "null" | "undefined" => Expr::Literal(serde_json::Value::Null),
                reserved if RESERVED.contains(&reserved) => {
                    return Err(self.error(format!("unexpected keyword '{reserved}'")))
                }
                _ => Expr::Ident(name.clone()),
            },
            TokenKind::Punct("(") => {
                self.pos += 1;
                let expr = self.expression()?;
                self.expect_punct(")")?;
                return Ok(expr);
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                return Ok(Expr::Array(self.list("]")?));
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                return self.object();
            }
            TokenKind::Punct(_) => {
                return Err(self.error(format!("expected an expression but found {}", self.describe())))
            }
        };
        self.pos += 1;
        Ok(expr)
    }

    fn object(&mut self) -> Result<Expr, SyntaxError> {
        let mut entries = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.peek_kind() {
                Some(TokenKind::Ident(name)) | Some(TokenKind::Str(name)) => name.clone(),
                Some(TokenKind::Number(n)) => crate::runtime::value::to_text(&number(*n)),
                _ => {
                    return Err(self.error(format!(
                        "expected a property name but found {}",
                        self.describe()
                    )))
                }
            };
            self.pos += 1;
            self.expect_punct(":")?;
            entries.push((key, self.assignment()?));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

enum Operator {
    Logical(LogicalOp),
    Binary(BinaryOp),
}

fn binary_operator(kind: &TokenKind) -> Option<(u8, Operator)> {
    let TokenKind::Punct(punct) = kind else {
        return None;
    };
    Some(match *punct {
        "||" => (1, Operator::Logical(LogicalOp::Or)),
        "&&" => (2, Operator::Logical(LogicalOp::And)),
        "==" | "===" => (3, Operator::Binary(BinaryOp::Eq)),
        "!=" | "!==" => (3, Operator::Binary(BinaryOp::NotEq)),
        "<" => (4, Operator::Binary(BinaryOp::Lt)),
        "<=" => (4, Operator::Binary(BinaryOp::LtEq)),
        ">" => (4, Operator::Binary(BinaryOp::Gt)),
        ">=" => (4, Operator::Binary(BinaryOp::GtEq)),
        "+" => (5, Operator::Binary(BinaryOp::Add)),
        "-" => (5, Operator::Binary(BinaryOp::Sub)),
        "*" => (6, Operator::Binary(BinaryOp::Mul)),
        "/" => (6, Operator::Binary(BinaryOp::Div)),
        "%" => (6, Operator::Binary(BinaryOp::Rem)),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, Code};
    use crate::macros::MacroSet;
    use crate::scanner::TagScanner;
    use serde_json::json;

    fn program(source: &str) -> Result<Program, SyntaxError> {
        let segments = TagScanner::default().scan(source);
        let instructions = generate(&segments, &MacroSet::default(), "<%", "test").unwrap();
        parse_program(&instructions)
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + b * 2 > 3 && !c", 1).unwrap();
        let expected = Expr::Logical(
            LogicalOp::And,
            Box::new(Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Binary(
                    BinaryOp::Add,
                    ident("a"),
                    Box::new(Expr::Binary(
                        BinaryOp::Mul,
                        ident("b"),
                        Box::new(Expr::Literal(json!(2))),
                    )),
                )),
                Box::new(Expr::Literal(json!(3))),
            )),
            Box::new(Expr::Unary(UnaryOp::Not, ident("c"))),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let expr = parse_expression("a - b - c", 1).unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, ident("a"), ident("b"))),
                ident("c"),
            )
        );
    }

    #[test]
    fn test_member_index_and_call() {
        let expr = parse_expression("attr('href', links[0].url, [id])", 1).unwrap();
        match expr {
            Expr::Call(name, args) => {
                assert_eq!(name, "attr");
                assert_eq!(args.len(), 3);
                assert!(matches!(args[1], Expr::Member(_, ref p) if p == "url"));
                assert!(matches!(args[2], Expr::Array(ref items) if items.len() == 1));
            }
            other => panic!("Expected Call, got {other:?}"),
        }
    }

    #[test]
    fn test_object_literal() {
        let expr = parse_expression("dynalist({active: on, 'is-open': 1,})", 1).unwrap();
        let Expr::Call(_, args) = expr else {
            panic!("Expected Call");
        };
        match &args[0] {
            Expr::Object(entries) => {
                let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["active", "is-open"]);
            }
            other => panic!("Expected Object, got {other:?}"),
        }
    }

    #[test]
    fn test_method_calls_rejected() {
        let err = parse_expression("name.toUpperCase()", 1).unwrap_err();
        assert!(err.message.contains("only named helpers"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_expression("a b", 1).is_err());
        assert!(parse_expression("", 1).is_err());
    }

    #[test]
    fn test_assignment_target_checked() {
        assert!(parse_expression("a.b[0] = 1", 1).is_ok());
        assert!(parse_expression("1 = a", 1).is_err());
        assert!(parse_expression("f(x)++", 1).is_err());
    }

    #[test]
    fn test_blocks_span_tags() {
        let program = program("<% if (a) { %>yes<% } else { %>no<% } %>").unwrap();
        assert_eq!(program.body.len(), 3);
        match &program.body[1] {
            Stmt::If {
                then, otherwise, ..
            } => {
                assert!(matches!(**then, Stmt::Block(ref b) if b.len() == 1));
                assert!(otherwise.is_some());
            }
            other => panic!("Expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_for_in_macro_parses() {
        let program = program("<% for (x in items) { %><%= x %>,<% } %>").unwrap();
        match &program.body[1] {
            Stmt::For { init, test, update, body } => {
                assert!(matches!(init.as_deref(), Some(Stmt::Declare(b)) if b.len() == 3));
                assert!(matches!(test, Some(Expr::Sequence(_))));
                assert!(matches!(
                    update,
                    Some(Expr::Update { prefix: true, .. })
                ));
                assert!(matches!(**body, Stmt::Block(ref b) if b.len() == 3));
            }
            other => panic!("Expected For, got {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = program("<% if (a) { %>\nx").unwrap_err();
        assert!(err.message.contains("missing '}'"));
        let err = program("a\n<% } %>").unwrap_err();
        assert!(err.message.contains("unexpected '}'"));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(program("<% break %>").is_err());
        assert!(program("<% while (true) { break; } %>").is_ok());
    }

    #[test]
    fn test_orphan_else() {
        let err = program("<% if (a) { %>x<% } %>\n<% else { %>y<% } %>").unwrap_err();
        assert!(err.message.contains("'else'"));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("<%= {}1{} %>", "(".repeat(100_000), ")".repeat(100_000));
        let err = program(&deep).unwrap_err();
        assert!(err.message.contains("nesting deeper than"));

        let err = program(&format!("<%= {}x %>", "!".repeat(100_000))).unwrap_err();
        assert!(err.message.contains("nesting deeper than"));

        let err = program(&format!("<% {} %>", "{".repeat(10_000))).unwrap_err();
        assert!(err.message.contains("nesting deeper than"));

        let arrays = format!("<%= {}{} %>", "[".repeat(100_000), "]".repeat(100_000));
        assert!(program(&arrays).is_err());
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        let parens = format!("<%= {}1{} %>", "(".repeat(50), ")".repeat(50));
        assert!(program(&parens).is_ok());
        let blocks = format!("<% {} %>x<% {} %>", "{".repeat(50), "}".repeat(50));
        assert!(program(&blocks).is_ok());
    }

    #[test]
    fn test_output_tag_error_reports_line() {
        let instructions = vec![
            Instruction::AppendLiteral("a\n".to_string()),
            Instruction::AppendEscaped(Code {
                source: "x +".to_string(),
                line: 2,
            }),
        ];
        let err = parse_program(&instructions).unwrap_err();
        assert_eq!(err.line, 2);
    }
}
