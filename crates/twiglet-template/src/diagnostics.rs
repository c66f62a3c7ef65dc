/*
 * diagnostics.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Non-fatal compile diagnostics.
//!
//! Compilation never logs from node construction. Anything worth telling the
//! caller that does not stop the compile (for example text outside of blocks
//! in a template that extends another) is collected here and returned with
//! the compiled [`Template`](crate::Template).

use crate::ast::SourcePosition;
use crate::resource::ResourceId;
use std::fmt;

/// A single diagnostic with the resource and position it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// `None` for templates compiled from a string.
    pub resource: Option<ResourceId>,
    pub position: SourcePosition,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource = self.resource.as_ref().map_or("<string>", ResourceId::as_str);
        write!(
            f,
            "warning: {}:{}:{}: {}",
            resource, self.position.line, self.position.column, self.message
        )
    }
}

/// Collector for diagnostics produced while compiling one template tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning with source location.
    pub fn warn_at(
        &mut self,
        message: impl Into<String>,
        resource: Option<&ResourceId>,
        position: SourcePosition,
    ) {
        self.diagnostics.push(Diagnostic {
            message: message.into(),
            resource: resource.cloned(),
            position,
        });
    }

    /// Append everything collected by a nested compile.
    pub fn merge(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Consume the collector and return the diagnostics, sorted by resource
    /// and then by source location.
    pub fn into_vec(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by(|a, b| {
            let key_a = (a.resource.as_ref().map(ResourceId::as_str), a.position.offset);
            let key_b = (b.resource.as_ref().map(ResourceId::as_str), b.position.offset);
            key_a.cmp(&key_b)
        });
        self.diagnostics
    }
}
