/*
 * executable.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Executable template tree.
//!
//! Every AST node compiles to exactly one [`Executable`]. The tree is never
//! modified after compilation and holds no render state, so one tree can be
//! executed by many renders at once.

use crate::ast::SourcePosition;
use crate::error::{TemplateError, TemplateResult};
use crate::expression::CompiledExpression;
use crate::render::{RenderContext, Scope};
use crate::value::{Map, Value};
use std::sync::Arc;

/// A compiled node.
#[derive(Debug, Clone)]
pub enum Executable {
    /// Literal text.
    Text(String),

    /// `{{ expr }}`
    Output(CompiledExpression),

    If {
        branches: Vec<(CompiledExpression, Vec<Executable>)>,
        else_body: Vec<Executable>,
    },

    For(ForLoop),

    Set {
        name: String,
        value: CompiledExpression,
    },

    Include(IncludeNode),

    /// A template that extends `parent`: `prelude` holds the child's own
    /// top-level `set` tags, `body` is the parent tree with overrides applied.
    Extends {
        parent: String,
        prelude: Vec<Executable>,
        body: Vec<Executable>,
    },

    /// A block, with its most-derived body.
    Block {
        name: String,
        body: Arc<[Executable]>,
    },

    /// Comments and other nodes without output.
    Nothing,
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    pub key: Option<String>,
    pub value: String,
    pub iterable: CompiledExpression,
    pub body: Vec<Executable>,
    pub else_body: Vec<Executable>,
}

#[derive(Debug, Clone)]
pub struct IncludeNode {
    /// Full reference of the included resource.
    pub reference: String,
    pub with: Option<CompiledExpression>,
    /// Hide the including template's scopes.
    pub isolated: bool,
    pub body: Arc<[Executable]>,
    pub position: SourcePosition,
}

/// Execute a node sequence in order.
pub fn execute_all(nodes: &[Executable], ctx: &mut RenderContext<'_>) -> TemplateResult<()> {
    nodes.iter().try_for_each(|node| node.execute(ctx))
}

impl Executable {
    /// Write this node's output to the context's sink.
    pub fn execute(&self, ctx: &mut RenderContext<'_>) -> TemplateResult<()> {
        match self {
            Executable::Text(text) => ctx.write(text),

            Executable::Output(expression) => {
                let value = calculate(expression, ctx)?;
                ctx.write(&value.to_string())
            }

            Executable::If {
                branches,
                else_body,
            } => {
                for (condition, body) in branches {
                    if calculate(condition, ctx)?.is_truthy() {
                        return execute_all(body, ctx);
                    }
                }
                execute_all(else_body, ctx)
            }

            Executable::For(for_loop) => for_loop.execute(ctx),

            Executable::Set { name, value } => {
                let value = calculate(value, ctx)?;
                ctx.set(name.clone(), value);
                Ok(())
            }

            Executable::Include(include) => include.execute(ctx),

            Executable::Extends { prelude, body, .. } => {
                execute_all(prelude, ctx)?;
                execute_all(body, ctx)
            }

            Executable::Block { body, .. } => {
                let mut scope = ctx.push_scope(Scope::new());
                execute_all(body, &mut scope)
            }

            Executable::Nothing => Ok(()),
        }
    }
}

fn calculate(expression: &CompiledExpression, ctx: &RenderContext<'_>) -> TemplateResult<Value> {
    expression
        .calculate(ctx)
        .map_err(|e| e.into_render_at(expression.position()))
}

fn loop_variable(index: usize, length: usize) -> Value {
    let as_value = |n: usize| Value::Integer(i64::try_from(n).unwrap_or(i64::MAX));
    let mut map = Map::new();
    map.insert("index".to_string(), as_value(index + 1));
    map.insert("index0".to_string(), as_value(index));
    map.insert("revindex".to_string(), as_value(length - index));
    map.insert("revindex0".to_string(), as_value(length - index - 1));
    map.insert("first".to_string(), Value::Bool(index == 0));
    map.insert("last".to_string(), Value::Bool(index + 1 == length));
    map.insert("length".to_string(), as_value(length));
    Value::Map(map)
}

impl ForLoop {
    fn execute(&self, ctx: &mut RenderContext<'_>) -> TemplateResult<()> {
        let iterable = calculate(&self.iterable, ctx)?;
        let entries: Vec<(Value, Value)> = match iterable {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::Integer(i64::try_from(i).unwrap_or(i64::MAX)), item))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, item)| (Value::String(key), item))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(TemplateError::render(format!(
                    "{}: Cannot iterate over {}",
                    self.iterable.position(),
                    other.type_name()
                )));
            }
        };

        if entries.is_empty() {
            return execute_all(&self.else_body, ctx);
        }

        let length = entries.len();
        for (index, (key, item)) in entries.into_iter().enumerate() {
            let mut scope = Scope::new();
            if let Some(key_name) = &self.key {
                scope.set(key_name.clone(), key);
            }
            scope.set(self.value.clone(), item);
            scope.set("loop", loop_variable(index, length));

            let mut guard = ctx.push_scope(scope);
            execute_all(&self.body, &mut guard)?;
        }
        Ok(())
    }
}

impl IncludeNode {
    fn execute(&self, ctx: &mut RenderContext<'_>) -> TemplateResult<()> {
        let variables = match &self.with {
            None => Map::new(),
            Some(with) => match calculate(with, ctx)? {
                Value::Map(map) => map,
                other => {
                    return Err(TemplateError::render(format!(
                        "{}: Unable to include '{}', got {}: Include 'with' must be given a map.",
                        self.position,
                        self.reference,
                        other.type_name()
                    )));
                }
            },
        };

        tracing::trace!(reference = %self.reference, isolated = self.isolated, "executing include");
        let mut guard = ctx.push_scope(Scope::from_map(variables, self.isolated));
        execute_all(&self.body, &mut guard)
    }
}
