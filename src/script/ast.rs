//! Syntax tree of a compiled template program.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// Only named helpers are callable.
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    /// Comma operator: evaluates all, yields the last.
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Whether the expression can appear left of `=`.
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Ident(_) => true,
            Expr::Member(target, _) | Expr::Index(target, _) => target.is_assignable(),
            _ => false,
        }
    }
}

/// Output produced in place by an expression or literal tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Literal(String),
    Escaped(Expr),
    Raw(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Output(Output),
    Expr(Expr),
    Declare(Vec<(String, Option<Expr>)>),
    Block(Vec<Stmt>),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Empty,
}

/// Top-level statement list of a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}
