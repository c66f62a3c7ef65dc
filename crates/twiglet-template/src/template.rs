/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled, renderable templates.

use crate::context::Context;
use crate::diagnostics::Diagnostics;
use crate::error::{TemplateError, TemplateResult};
use crate::executable::{Executable, execute_all};
use crate::render::{RenderContext, RenderOptions, Scope};
use crate::resource::ResourceId;
use std::io::Write;
use std::sync::Arc;

/// A compiled template.
///
/// Compilation is finished by the time a `Template` exists: includes are
/// loaded, blocks are resolved and functions are bound. Rendering only reads
/// the tree, so a template can be rendered from many threads at once and
/// always produces the same output for the same context.
#[derive(Debug, Clone)]
pub struct Template {
    name: Option<ResourceId>,
    root: Arc<[Executable]>,
    options: RenderOptions,
    diagnostics: Diagnostics,
}

impl Template {
    pub(crate) fn new(
        name: Option<ResourceId>,
        root: Vec<Executable>,
        options: RenderOptions,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            name,
            root: Arc::from(root),
            options,
            diagnostics,
        }
    }

    /// The resource this template was loaded from, if any.
    pub fn name(&self) -> Option<&ResourceId> {
        self.name.as_ref()
    }

    /// Warnings collected while compiling.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Render to a string.
    pub fn render(&self, context: &Context) -> TemplateResult<String> {
        let mut out = Vec::new();
        self.render_to(context, &mut out)?;
        String::from_utf8(out).map_err(|e| TemplateError::render(e.to_string()))
    }

    /// Render into `out`.
    ///
    /// On error, whatever was written before the failure stays in `out`.
    pub fn render_to(&self, context: &Context, out: &mut dyn Write) -> TemplateResult<()> {
        tracing::trace!(
            template = self.name.as_ref().map_or("<string>", ResourceId::as_str),
            "rendering template"
        );
        let root = Scope::from_map(context.variables().clone(), false);
        let mut ctx = RenderContext::new(out, root, self.options);
        execute_all(&self.root, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use pretty_assertions::assert_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_template_is_send_and_sync() {
        assert_send_sync::<Template>();
        assert_send_sync::<Environment>();
    }

    #[test]
    fn test_render_to_keeps_partial_output() {
        let template = Environment::default()
            .compile_str("before {% for x in 5 %}{% endfor %} after")
            .unwrap();
        let mut out = Vec::new();
        let err = template.render_to(&Context::new(), &mut out).unwrap_err();
        assert_eq!(String::from_utf8(out).unwrap(), "before ");
        assert_eq!(
            err.to_string(),
            "Render error: line 1, column 20: Cannot iterate over integer"
        );
    }

    #[test]
    fn test_context_is_not_modified() {
        let template = Environment::default()
            .compile_str("{% set x = 2 %}{{ x }}")
            .unwrap();
        let context = Context::new().with("x", 1);
        assert_eq!(template.render(&context).unwrap(), "2");
        assert_eq!(context.get("x"), Some(&crate::value::Value::Integer(1)));
    }
}
