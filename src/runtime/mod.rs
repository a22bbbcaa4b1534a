//! Executes a parsed template program.
//!
//! Free identifiers resolve innermost first: template locals, then the
//! per-call scope, then the shared context, then the helper API. Locals only
//! exist for the duration of one call, so caller data is never mutated.

pub mod value;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::Context;
use crate::error::EvalError;
use crate::helpers::{escape_text, Helper, HelperApi};
use crate::script::ast::{
    AssignOp, BinaryOp, Expr, LogicalOp, Output, Program, Stmt, UnaryOp, UpdateOp,
};

use value::{
    add, compare, get_index, get_property, is_truthy, number, property_key, strict_equals,
    to_number, to_text, type_name,
};

/// Run `program` and return everything it wrote.
pub fn run(
    program: &Program,
    scope: &Value,
    context: &Context,
    api: &HelperApi,
) -> Result<String, EvalError> {
    let mut machine = Machine {
        env: Environment::new(scope, context, api),
        out: String::new(),
    };
    for stmt in &program.body {
        machine.exec(stmt)?;
    }
    Ok(machine.out)
}

/// The bindings visible to one template call.
#[derive(Debug)]
pub struct Environment<'a> {
    locals: HashMap<String, Value>,
    scope: Option<&'a Map<String, Value>>,
    context: &'a Context,
    api: &'a HelperApi,
}

impl<'a> Environment<'a> {
    /// `scope` contributes bindings only when it is an object.
    pub fn new(scope: &'a Value, context: &'a Context, api: &'a HelperApi) -> Self {
        Self {
            locals: HashMap::new(),
            scope: scope.as_object(),
            context,
            api,
        }
    }

    fn value_ref(&self, name: &str) -> Option<&Value> {
        self.locals
            .get(name)
            .or_else(|| self.scope.and_then(|scope| scope.get(name)))
            .or_else(|| self.context.value(name))
    }

    fn helper_ref(&self, name: &str) -> Option<&Helper> {
        self.context.helper(name).or_else(|| self.api.get(name))
    }

    /// Resolve an identifier used as a value.
    pub fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.value_ref(name) {
            return Ok(value.clone());
        }
        if self.helper_ref(name).is_some() {
            return Err(EvalError::HelperAsValue {
                name: name.to_string(),
            });
        }
        Err(EvalError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Resolve an identifier used as a callee.
    ///
    /// A value binding in an inner tier shadows a helper of the same name.
    pub fn helper(&self, name: &str) -> Result<&Helper, EvalError> {
        if self.value_ref(name).is_some() {
            return Err(EvalError::NotCallable {
                name: name.to_string(),
            });
        }
        self.helper_ref(name)
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn declare(&mut self, name: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.locals.insert(name.to_string(), value);
            }
            None if self.value_ref(name).is_none() => {
                self.locals.insert(name.to_string(), Value::Null);
            }
            None => {}
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    /// Mutable local binding for `name`, copied in from an outer tier if needed.
    fn local_mut(&mut self, name: &str) -> Result<&mut Value, EvalError> {
        if !self.locals.contains_key(name) {
            let value = self.lookup(name)?;
            self.locals.insert(name.to_string(), value);
        }
        self.locals
            .get_mut(name)
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

struct Machine<'a> {
    env: Environment<'a>,
    out: String,
}

impl Machine<'_> {
    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Output(output) => {
                self.write(output)?;
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Declare(bindings) => {
                for (name, init) in bindings {
                    let value = init.as_ref().map(|e| self.eval(e)).transpose()?;
                    self.env.declare(name, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => {
                for stmt in body {
                    let flow = self.exec(stmt)?;
                    if flow != Flow::Normal {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if is_truthy(&self.eval(test)?) {
                    self.exec(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec(init)?;
                }
                loop {
                    if let Some(test) = test {
                        if !is_truthy(&self.eval(test)?) {
                            break;
                        }
                    }
                    if self.exec(body)? == Flow::Break {
                        break;
                    }
                    if let Some(update) = update {
                        self.eval(update)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { test, body } => {
                while is_truthy(&self.eval(test)?) {
                    if self.exec(body)? == Flow::Break {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn write(&mut self, output: &Output) -> Result<(), EvalError> {
        match output {
            Output::Literal(text) => self.out.push_str(text),
            Output::Escaped(expr) => {
                let value = self.eval(expr)?;
                self.out.push_str(&escape_text(&to_text(&value)));
            }
            Output::Raw(expr) => {
                let value = self.eval(expr)?;
                self.out.push_str(&to_text(&value));
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.env.lookup(name),
            Expr::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member(target, property) => get_property(&self.eval(target)?, property),
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                get_index(&target, &self.eval(index)?)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.env
                    .helper(name)?
                    .call(&args)
                    .map_err(|e| EvalError::Helper {
                        name: name.clone(),
                        message: e.0,
                    })
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!is_truthy(&value)),
                    UnaryOp::Neg => number(-to_number(&value)),
                    UnaryOp::Plus => number(to_number(&value)),
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                match (op, is_truthy(&left)) {
                    (LogicalOp::Or, true) | (LogicalOp::And, false) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Expr::Conditional(test, then, otherwise) => {
                if is_truthy(&self.eval(test)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign(op, target, value) => {
                let value = self.eval(value)?;
                let value = match op {
                    AssignOp::Set => value,
                    AssignOp::Add => add(&self.eval(target)?, &value),
                    AssignOp::Sub => number(to_number(&self.eval(target)?) - to_number(&value)),
                };
                self.store(target, value.clone())?;
                Ok(value)
            }
            Expr::Update { op, prefix, target } => {
                let old = to_number(&self.eval(target)?);
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.store(target, number(new))?;
                Ok(number(if *prefix { new } else { old }))
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Null;
                for expr in exprs {
                    last = self.eval(expr)?;
                }
                Ok(last)
            }
        }
    }

    fn store(&mut self, target: &Expr, value: Value) -> Result<(), EvalError> {
        let (root, path) = self.place(target)?;
        let Some((last, parents)) = path.split_last() else {
            self.env.assign(&root, value);
            return Ok(());
        };
        let mut slot = self.env.local_mut(&root)?;
        for key in parents {
            slot = child_mut(slot, key)?;
        }
        set_child(slot, last, value)
    }

    /// Split an assignable expression into its root name and property path.
    fn place(&mut self, expr: &Expr) -> Result<(String, Vec<String>), EvalError> {
        match expr {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member(target, property) => {
                let (root, mut path) = self.place(target)?;
                path.push(property.clone());
                Ok((root, path))
            }
            Expr::Index(target, index) => {
                let (root, mut path) = self.place(target)?;
                path.push(property_key(&self.eval(index)?));
                Ok((root, path))
            }
            other => Err(EvalError::InvalidPropertyAssignment {
                property: String::new(),
                target: format!("{other:?}"),
            }),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(left, right, |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, |a, b| a * b),
        BinaryOp::Div => arithmetic(left, right, |a, b| a / b),
        BinaryOp::Rem => arithmetic(left, right, |a, b| a % b),
        BinaryOp::Eq => Value::Bool(strict_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!strict_equals(left, right)),
        BinaryOp::Lt => ordered(left, right, Ordering::is_lt),
        BinaryOp::LtEq => ordered(left, right, Ordering::is_le),
        BinaryOp::Gt => ordered(left, right, Ordering::is_gt),
        BinaryOp::GtEq => ordered(left, right, Ordering::is_ge),
    }
}

fn arithmetic(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Value {
    number(f(to_number(left), to_number(right)))
}

/// Unordered operands (`NaN`, mixed string/number) compare false.
fn ordered(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> Value {
    Value::Bool(compare(left, right).is_some_and(accept))
}

fn child_mut<'v>(slot: &'v mut Value, key: &str) -> Result<&'v mut Value, EvalError> {
    let target = type_name(slot);
    let child = match slot {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => {
            return Err(EvalError::InvalidPropertyAssignment {
                property: key.to_string(),
                target: target.to_string(),
            })
        }
    };
    match child {
        Some(child) if !child.is_null() => Ok(child),
        _ => Err(EvalError::NullAccess {
            property: key.to_string(),
        }),
    }
}

fn set_child(slot: &mut Value, key: &str, value: Value) -> Result<(), EvalError> {
    let invalid = |target: &str| EvalError::InvalidPropertyAssignment {
        property: key.to_string(),
        target: target.to_string(),
    };
    match slot {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = key.parse::<usize>().map_err(|_| invalid("array"))?;
            // Arrays grow by at most one element per assignment.
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(invalid("array"));
            }
            Ok(())
        }
        Value::Null => Err(EvalError::NullAccess {
            property: key.to_string(),
        }),
        other => Err(invalid(type_name(other))),
    }
}
