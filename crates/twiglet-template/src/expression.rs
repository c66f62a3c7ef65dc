/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled expressions.
//!
//! Compiling an [`Expression`] binds every function name to its registry
//! descriptor, so unknown functions fail the compile instead of the render.
//! Sub-trees made only of literals and operators are folded to constants.
//!
//! Calculation runs against a [`RenderContext`] and fails with
//! calculation-kind errors; function failures are wrapped at the call site.

use crate::ast::{BinaryOp, Expression, ExpressionKind, SourcePosition, UnaryOp};
use crate::error::{TemplateError, TemplateResult};
use crate::functions::{FunctionDescriptor, FunctionRegistry};
use crate::math;
use crate::render::RenderContext;
use crate::value::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// An expression ready to be calculated.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    kind: CompiledKind,
    position: SourcePosition,
}

#[derive(Debug, Clone)]
enum CompiledKind {
    Constant(Value),
    List(Vec<CompiledExpression>),
    Map(Vec<(String, CompiledExpression)>),
    Variable(String),
    Attribute {
        target: Box<CompiledExpression>,
        name: String,
    },
    Index {
        target: Box<CompiledExpression>,
        index: Box<CompiledExpression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpression>,
        right: Box<CompiledExpression>,
    },
    Conditional {
        condition: Box<CompiledExpression>,
        then: Box<CompiledExpression>,
        otherwise: Box<CompiledExpression>,
    },
    Call {
        function: Arc<FunctionDescriptor>,
        args: Vec<CompiledExpression>,
    },
}

impl Expression {
    /// Bind functions and fold constant sub-trees.
    pub fn compile(&self, functions: &FunctionRegistry) -> TemplateResult<CompiledExpression> {
        let boxed = |e: &Expression| e.compile(functions).map(Box::new);
        let kind = match &self.kind {
            ExpressionKind::Literal(value) => CompiledKind::Constant(value.clone()),
            ExpressionKind::List(items) => CompiledKind::List(
                items
                    .iter()
                    .map(|item| item.compile(functions))
                    .collect::<TemplateResult<_>>()?,
            ),
            ExpressionKind::Map(entries) => CompiledKind::Map(
                entries
                    .iter()
                    .map(|(key, value)| value.compile(functions).map(|v| (key.clone(), v)))
                    .collect::<TemplateResult<_>>()?,
            ),
            ExpressionKind::Variable(name) => CompiledKind::Variable(name.clone()),
            ExpressionKind::Attribute { target, name } => CompiledKind::Attribute {
                target: boxed(target)?,
                name: name.clone(),
            },
            ExpressionKind::Index { target, index } => CompiledKind::Index {
                target: boxed(target)?,
                index: boxed(index)?,
            },
            ExpressionKind::Unary { op, operand } => CompiledKind::Unary {
                op: *op,
                operand: boxed(operand)?,
            },
            ExpressionKind::Binary { op, left, right } => CompiledKind::Binary {
                op: *op,
                left: boxed(left)?,
                right: boxed(right)?,
            },
            ExpressionKind::Conditional {
                condition,
                then,
                otherwise,
            } => CompiledKind::Conditional {
                condition: boxed(condition)?,
                then: boxed(then)?,
                otherwise: boxed(otherwise)?,
            },
            ExpressionKind::Call { name, args } => {
                let function = functions.get(name).ok_or_else(|| {
                    TemplateError::compile(format!(
                        "Unknown function '{}' at {}",
                        name, self.position
                    ))
                })?;
                CompiledKind::Call {
                    function,
                    args: args
                        .iter()
                        .map(|arg| arg.compile(functions))
                        .collect::<TemplateResult<_>>()?,
                }
            }
        };

        let compiled = CompiledExpression {
            kind,
            position: self.position,
        };
        Ok(compiled.fold())
    }
}

impl CompiledExpression {
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// The value of this expression if it is known without rendering.
    pub fn constant(&self) -> Option<&Value> {
        match &self.kind {
            CompiledKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Replace an operator node whose operands are all constants by its value.
    ///
    /// Folding failures (e.g. `1 // 0`) leave the node alone so the error is
    /// reported when the expression is actually calculated.
    fn fold(self) -> Self {
        let folded = match &self.kind {
            CompiledKind::List(items) => items
                .iter()
                .map(|item| item.constant().cloned())
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            CompiledKind::Map(entries) => entries
                .iter()
                .map(|(key, value)| value.constant().map(|v| (key.clone(), v.clone())))
                .collect::<Option<Map>>()
                .map(Value::Map),
            CompiledKind::Unary { op, operand } => operand
                .constant()
                .and_then(|value| apply_unary(*op, value).ok()),
            CompiledKind::Binary { op, left, right } => match (left.constant(), right.constant()) {
                (Some(l), Some(r)) => apply_binary(*op, l, r).ok(),
                _ => None,
            },
            CompiledKind::Conditional {
                condition,
                then,
                otherwise,
            } => condition.constant().and_then(|c| {
                if c.is_truthy() {
                    then.constant().cloned()
                } else {
                    otherwise.constant().cloned()
                }
            }),
            _ => None,
        };

        match folded {
            Some(value) => CompiledExpression {
                kind: CompiledKind::Constant(value),
                position: self.position,
            },
            None => self,
        }
    }

    /// Calculate the value of this expression in the current scope.
    pub fn calculate(&self, ctx: &RenderContext<'_>) -> TemplateResult<Value> {
        match &self.kind {
            CompiledKind::Constant(value) => Ok(value.clone()),
            CompiledKind::List(items) => items
                .iter()
                .map(|item| item.calculate(ctx))
                .collect::<TemplateResult<Vec<_>>>()
                .map(Value::List),
            CompiledKind::Map(entries) => entries
                .iter()
                .map(|(key, value)| value.calculate(ctx).map(|v| (key.clone(), v)))
                .collect::<TemplateResult<Map>>()
                .map(Value::Map),
            CompiledKind::Variable(_)
            | CompiledKind::Attribute { .. }
            | CompiledKind::Index { .. } => self.lookup(ctx, ctx.options().strict_variables),
            CompiledKind::Unary { op, operand } => apply_unary(*op, &operand.calculate(ctx)?),
            CompiledKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => Ok(Value::Bool(
                left.calculate(ctx)?.is_truthy() && right.calculate(ctx)?.is_truthy(),
            )),
            CompiledKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => Ok(Value::Bool(
                left.calculate(ctx)?.is_truthy() || right.calculate(ctx)?.is_truthy(),
            )),
            CompiledKind::Binary { op, left, right } => {
                apply_binary(*op, &left.calculate(ctx)?, &right.calculate(ctx)?)
            }
            CompiledKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if condition.calculate(ctx)?.is_truthy() {
                    then.calculate(ctx)
                } else {
                    otherwise.calculate(ctx)
                }
            }
            CompiledKind::Call { function, args } => {
                // `default` exists to handle undefined values, so its first
                // argument never fails a strict lookup.
                let lenient = function.name() == "default";
                let args = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| {
                        if lenient && i == 0 {
                            arg.lookup(ctx, false)
                        } else {
                            arg.calculate(ctx)
                        }
                    })
                    .collect::<TemplateResult<Vec<_>>>()?;
                function
                    .call(&args, ctx.function_env())
                    .map_err(TemplateError::into_calculation)
            }
        }
    }

    /// Resolve a variable, attribute or index chain.
    ///
    /// With `strict` unset, a missing name or key anywhere along the chain
    /// yields null. Other expressions are calculated normally.
    fn lookup(&self, ctx: &RenderContext<'_>, strict: bool) -> TemplateResult<Value> {
        match &self.kind {
            CompiledKind::Variable(name) => match ctx.lookup(name) {
                Some(value) => Ok(value.clone()),
                None if strict => Err(TemplateError::calculation(format!(
                    "Variable '{}' is not defined",
                    name
                ))),
                None => Ok(Value::Null),
            },
            CompiledKind::Attribute { target, name } => {
                let target = target.lookup(ctx, strict)?;
                match target.attribute(name) {
                    Some(value) => Ok(value.clone()),
                    None => missing(strict, &target, name),
                }
            }
            CompiledKind::Index { target, index } => {
                let target = target.lookup(ctx, strict)?;
                let index = index.calculate(ctx)?;
                match target.index(&index) {
                    Some(value) => Ok(value.clone()),
                    None => missing(strict, &target, &index.to_string()),
                }
            }
            _ => self.calculate(ctx),
        }
    }
}

fn missing(strict: bool, target: &Value, key: &str) -> TemplateResult<Value> {
    if strict {
        Err(TemplateError::calculation(format!(
            "Key '{}' does not exist on {}",
            key,
            target.type_name()
        )))
    } else {
        Ok(Value::Null)
    }
}

fn apply_unary(op: UnaryOp, value: &Value) -> TemplateResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Negate => math::negate(value),
        UnaryOp::Plus => math::to_number(value).map(Value::from).ok_or_else(|| {
            TemplateError::calculation(format!("Cannot apply '+' to {}", value.type_name()))
        }),
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> TemplateResult<Value> {
    let ordered = |accept: fn(Ordering) -> bool| {
        math::compare(left, right).map(|o| Value::Bool(accept(o))).ok_or_else(|| {
            TemplateError::calculation(format!(
                "Cannot compare {} and {} with '{}'",
                left.type_name(),
                right.type_name(),
                op.symbol()
            ))
        })
    };

    match op {
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Equal => Ok(Value::Bool(math::loose_eq(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!math::loose_eq(left, right))),
        BinaryOp::Less => ordered(Ordering::is_lt),
        BinaryOp::Greater => ordered(Ordering::is_gt),
        BinaryOp::LessEqual => ordered(Ordering::is_le),
        BinaryOp::GreaterEqual => ordered(Ordering::is_ge),
        BinaryOp::In => contains(right, left).map(Value::Bool),
        BinaryOp::NotIn => contains(right, left).map(|found| Value::Bool(!found)),
        BinaryOp::Concat => Ok(Value::String(format!("{}{}", left, right))),
        BinaryOp::Add => math::add(left, right),
        BinaryOp::Subtract => math::subtract(left, right),
        BinaryOp::Multiply => math::multiply(left, right),
        BinaryOp::Divide => math::divide(left, right),
        BinaryOp::FloorDivide => math::floor_divide(left, right),
        BinaryOp::Modulo => math::remainder(left, right),
        BinaryOp::Power => math::power(left, right),
    }
}

/// Membership test behind `in`: list element, map key or substring.
fn contains(haystack: &Value, needle: &Value) -> TemplateResult<bool> {
    match haystack {
        Value::List(items) => Ok(items.iter().any(|item| math::loose_eq(item, needle))),
        Value::Map(map) => Ok(map.contains_key(&needle.to_string())),
        Value::String(s) => Ok(s.contains(&needle.to_string())),
        Value::Null => Ok(false),
        other => Err(TemplateError::calculation(format!(
            "Cannot test membership in {}",
            other.type_name()
        ))),
    }
}
