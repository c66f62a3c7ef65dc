/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render-time state.
//!
//! A [`RenderContext`] is created for exactly one render. It owns the scope
//! stack and borrows the output sink; nothing in it is shared with other
//! renders of the same template.
//!
//! Scopes are pushed through [`RenderContext::push_scope`], which returns a
//! [`ScopeGuard`]. The guard pops the scope when dropped, so a scope never
//! outlives the node that pushed it, whether that node finishes normally or
//! returns an error.

use crate::error::{TemplateError, TemplateResult};
use crate::functions::FunctionEnv;
use crate::value::{Map, Value};
use std::io::Write;
use std::ops::{Deref, DerefMut};

/// One frame of the scope stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    variables: Map,
    isolated: bool,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame that hides every frame below it.
    pub fn isolated() -> Self {
        Self {
            variables: Map::new(),
            isolated: true,
        }
    }

    pub fn from_map(variables: Map, isolated: bool) -> Self {
        Self {
            variables,
            isolated,
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

/// Settings read during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub strict_variables: bool,
    pub function_env: FunctionEnv,
}

/// Mutable state of a single render.
pub struct RenderContext<'a> {
    out: &'a mut dyn Write,
    scopes: Vec<Scope>,
    options: RenderOptions,
}

impl<'a> RenderContext<'a> {
    /// Start a render whose outermost scope is `root`.
    pub fn new(out: &'a mut dyn Write, root: Scope, options: RenderOptions) -> Self {
        Self {
            out,
            scopes: vec![root],
            options,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn function_env(&self) -> &FunctionEnv {
        &self.options.function_env
    }

    /// Append text to the output sink.
    pub fn write(&mut self, text: &str) -> TemplateResult<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| TemplateError::from(e).into_render())
    }

    /// Push a scope; it is popped when the returned guard is dropped.
    pub fn push_scope(&mut self, scope: Scope) -> ScopeGuard<'_, 'a> {
        self.scopes.push(scope);
        ScopeGuard { context: self }
    }

    /// Number of frames on the scope stack, including the root.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Look a name up, innermost scope first.
    ///
    /// The search includes the first isolated frame it meets and stops there.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value);
            }
            if scope.is_isolated() {
                break;
            }
        }
        None
    }

    /// Bind a name in the innermost scope.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.set(name, value);
        }
    }
}

/// Pops its scope on drop.
///
/// The guard dereferences to the [`RenderContext`], so nested nodes execute
/// through it while the scope is active.
pub struct ScopeGuard<'c, 'a> {
    context: &'c mut RenderContext<'a>,
}

impl<'a> Deref for ScopeGuard<'_, 'a> {
    type Target = RenderContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<'a> DerefMut for ScopeGuard<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.context.scopes.pop();
    }
}
