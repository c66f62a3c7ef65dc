/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile-time resolution.
//!
//! [`CompileContext`] carries everything node compilation needs. Its
//! configuration (resolver, functions, parser, options) sits behind an `Arc`
//! and is shared by every context derived from it. The rest (current
//! resource, block registry, include depth, diagnostics) belongs to one
//! template unit and is copied, never shared, when compilation descends
//! into an included or extended resource.
//!
//! All resource I/O happens here. Execution never resolves anything.

use crate::ast::{Block, Expression, Extends, For, If, Include, SourcePosition, TemplateNode};
use crate::config::{EngineConfig, IncludeIsolation};
use crate::diagnostics::Diagnostics;
use crate::error::{TemplateError, TemplateResult};
use crate::executable::{Executable, ForLoop, IncludeNode};
use crate::expression::CompiledExpression;
use crate::functions::FunctionRegistry;
use crate::parser::Parser;
use crate::resource::{Resource, ResourceId, ResourceResolver, resolve_reference};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The immutable part of a compile context.
#[derive(Clone)]
pub struct CompileShared {
    pub resolver: Arc<dyn ResourceResolver>,
    pub functions: Arc<FunctionRegistry>,
    pub parser: Parser,
    pub config: EngineConfig,
}

impl std::fmt::Debug for CompileShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileShared")
            .field("functions", &self.functions)
            .field("parser", &self.parser)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Block bodies registered by extending templates, most-derived first.
pub type BlockRegistry = HashMap<String, Arc<[Executable]>>;

/// State for compiling one template unit.
#[derive(Debug, Clone)]
pub struct CompileContext {
    shared: Arc<CompileShared>,
    current: Option<ResourceId>,
    blocks: BlockRegistry,
    declared_blocks: HashSet<String>,
    depth: usize,
    diagnostics: Diagnostics,
}

impl CompileContext {
    /// A context for a top-level template with identity `current`.
    pub fn new(shared: Arc<CompileShared>, current: Option<ResourceId>) -> Self {
        Self {
            shared,
            current,
            blocks: BlockRegistry::new(),
            declared_blocks: HashSet::new(),
            depth: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.shared.functions
    }

    /// Identity of the resource being compiled; `None` for string sources.
    pub fn current(&self) -> Option<&ResourceId> {
        self.current.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Load a resource, resolving relative references against the current one.
    pub fn retrieve(&self, reference: &str) -> TemplateResult<Resource> {
        let full = resolve_reference(reference, self.current.as_ref());
        tracing::debug!(reference, resolved = %full, "retrieving resource");
        self.shared.resolver.resolve(&full)
    }

    /// Parse a resource's content.
    pub fn parse(&self, resource: &Resource) -> TemplateResult<Vec<TemplateNode>> {
        self.shared.parser.parse(resource.content())
    }

    fn warn_at(&mut self, message: impl Into<String>, position: SourcePosition) {
        self.diagnostics
            .warn_at(message, self.current.as_ref(), position);
    }

    /// A clone positioned inside `resource`, one level deeper.
    ///
    /// The clone gets its own current resource, duplicate-block tracking and
    /// diagnostics; `blocks` seeds its block registry.
    fn descend(&self, resource: &Resource, blocks: BlockRegistry) -> Self {
        let mut child = self.clone();
        child.current = Some(resource.id().clone());
        child.blocks = blocks;
        child.declared_blocks = HashSet::new();
        child.depth = self.depth + 1;
        child.diagnostics = Diagnostics::new();
        child
    }

    /// Retrieve, parse and compile a nested resource.
    ///
    /// Every failure, including resolver and parse errors, comes back as a
    /// compile error naming `what` and the reference.
    fn compile_nested(
        &mut self,
        what: &str,
        reference: &str,
        position: SourcePosition,
        blocks: BlockRegistry,
    ) -> TemplateResult<(String, Vec<Executable>)> {
        let context = || format!("Unable to {} '{}' at {}", what, reference, position);

        if self.depth >= self.config().max_include_depth {
            return Err(TemplateError::compile(format!(
                "{}: maximum nesting depth of {} exceeded",
                context(),
                self.config().max_include_depth
            )));
        }

        let resource = self
            .retrieve(reference)
            .map_err(|e| e.into_compile(context()))?;
        let nodes = self
            .parse(&resource)
            .map_err(|e| e.into_compile(context()))?;

        let mut child = self.descend(&resource, blocks);
        let body = child.compile_template(&nodes)?;
        self.diagnostics.merge(child.into_diagnostics());
        Ok((resource.id().to_string(), body))
    }

    /// Compile a node sequence.
    pub fn compile_nodes(&mut self, nodes: &[TemplateNode]) -> TemplateResult<Vec<Executable>> {
        nodes.iter().map(|node| node.compile(self)).collect()
    }

    /// Compile the root sequence of a template, handling `extends`.
    pub fn compile_template(&mut self, nodes: &[TemplateNode]) -> TemplateResult<Vec<Executable>> {
        let first = nodes.iter().position(|node| !node.is_insignificant());
        match first.map(|idx| (idx, &nodes[idx])) {
            Some((idx, TemplateNode::Extends(extends))) => {
                let node = self.compile_extends(extends, &nodes[idx + 1..])?;
                Ok(vec![node])
            }
            _ => self.compile_nodes(nodes),
        }
    }

    fn compile_expression(&self, expression: &Expression) -> TemplateResult<CompiledExpression> {
        expression.compile(self.functions())
    }

    /// A path expression that must fold to a constant string.
    fn constant_path(&self, tag: &str, path: &Expression) -> TemplateResult<String> {
        let compiled = self.compile_expression(path)?;
        match compiled.constant() {
            Some(crate::value::Value::String(s)) => Ok(s.clone()),
            _ => Err(TemplateError::compile(format!(
                "The path of '{}' at {} must be a constant string",
                tag, path.position
            ))),
        }
    }

    fn compile_include(&mut self, include: &Include) -> TemplateResult<Executable> {
        let reference = self.constant_path("include", &include.path)?;
        let (reference, body) =
            self.compile_nested("include", &reference, include.position, BlockRegistry::new())?;
        let with = include
            .with
            .as_ref()
            .map(|with| self.compile_expression(with))
            .transpose()?;
        let isolated = include.only || self.config().include_isolation == IncludeIsolation::Isolated;

        Ok(Executable::Include(IncludeNode {
            reference,
            with,
            isolated,
            body: Arc::from(body),
            position: include.position,
        }))
    }

    /// Register the child's blocks, then compile the parent with them.
    fn compile_extends(
        &mut self,
        extends: &Extends,
        rest: &[TemplateNode],
    ) -> TemplateResult<Executable> {
        let reference = self.constant_path("extends", &extends.path)?;
        let mut prelude = Vec::new();

        for node in rest {
            match node {
                TemplateNode::Block(block) => {
                    self.compile_block(block)?;
                }
                TemplateNode::Set(_) => prelude.push(node.compile(self)?),
                TemplateNode::Extends(other) => {
                    return Err(TemplateError::compile(format!(
                        "A template can only extend one parent, second 'extends' at {}",
                        other.position
                    )));
                }
                node if node.is_insignificant() => {}
                node => self.warn_at(
                    "Content outside of blocks is ignored in a template that extends another",
                    node.position(),
                ),
            }
        }

        let blocks = self.blocks.clone();
        let (parent, body) = self.compile_nested("extend", &reference, extends.position, blocks)?;
        Ok(Executable::Extends {
            parent,
            prelude,
            body,
        })
    }

    fn declare_block(&mut self, block: &Block) -> TemplateResult<()> {
        if self.declared_blocks.insert(block.name.clone()) {
            return Ok(());
        }
        let resource = self.current.as_ref().map_or("<string>", ResourceId::as_str);
        Err(TemplateError::compile(format!(
            "Block '{}' is defined twice in '{}' (second definition at {})",
            block.name, resource, block.position
        )))
    }

    /// Compile a block, preferring a body registered by an extending template.
    ///
    /// A block compiled from its own body is registered too, so blocks nested
    /// inside an override can be overridden again further down the chain.
    fn compile_block(&mut self, block: &Block) -> TemplateResult<Executable> {
        self.declare_block(block)?;
        let body = match self.blocks.get(&block.name) {
            Some(body) => Arc::clone(body),
            None => {
                let body: Arc<[Executable]> = Arc::from(self.compile_nodes(&block.body)?);
                self.blocks.insert(block.name.clone(), Arc::clone(&body));
                body
            }
        };
        Ok(Executable::Block {
            name: block.name.clone(),
            body,
        })
    }

    fn compile_if(&mut self, node: &If) -> TemplateResult<Executable> {
        let mut branches = Vec::with_capacity(node.branches.len());
        for (condition, body) in &node.branches {
            branches.push((self.compile_expression(condition)?, self.compile_nodes(body)?));
        }
        let else_body = match &node.else_body {
            Some(body) => self.compile_nodes(body)?,
            None => Vec::new(),
        };
        Ok(Executable::If {
            branches,
            else_body,
        })
    }

    fn compile_for(&mut self, node: &For) -> TemplateResult<Executable> {
        let iterable = self.compile_expression(&node.iterable)?;
        let body = self.compile_nodes(&node.body)?;
        let else_body = match &node.else_body {
            Some(body) => self.compile_nodes(body)?,
            None => Vec::new(),
        };
        Ok(Executable::For(ForLoop {
            key: node.key.clone(),
            value: node.value.clone(),
            iterable,
            body,
            else_body,
        }))
    }
}

impl TemplateNode {
    /// Compile this node into exactly one executable node.
    pub fn compile(&self, ctx: &mut CompileContext) -> TemplateResult<Executable> {
        match self {
            TemplateNode::Text(text) => Ok(Executable::Text(text.text.clone())),
            TemplateNode::Comment(_) => Ok(Executable::Nothing),
            TemplateNode::Output(output) => {
                Ok(Executable::Output(ctx.compile_expression(&output.expression)?))
            }
            TemplateNode::If(node) => ctx.compile_if(node),
            TemplateNode::For(node) => ctx.compile_for(node),
            TemplateNode::Set(set) => Ok(Executable::Set {
                name: set.name.clone(),
                value: ctx.compile_expression(&set.value)?,
            }),
            TemplateNode::Include(include) => ctx.compile_include(include),
            TemplateNode::Block(block) => ctx.compile_block(block),
            TemplateNode::Extends(extends) => Err(TemplateError::compile(format!(
                "'extends' at {} must be the first tag of a template",
                extends.position
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResolver;

    fn shared(templates: &[(&str, &str)], config: EngineConfig) -> Arc<CompileShared> {
        Arc::new(CompileShared {
            resolver: Arc::new(MemoryResolver::with_templates(templates.iter().copied())),
            functions: Arc::new(FunctionRegistry::with_builtins()),
            parser: Parser::default(),
            config,
        })
    }

    fn compile(templates: &[(&str, &str)], source: &str) -> TemplateResult<CompileContext> {
        let mut ctx = CompileContext::new(shared(templates, EngineConfig::default()), None);
        let nodes = Parser::default().parse(source)?;
        ctx.compile_template(&nodes)?;
        Ok(ctx)
    }

    #[test]
    fn test_clone_shares_configuration_but_not_current_resource() {
        let ctx = CompileContext::new(shared(&[], EngineConfig::default()), Some(ResourceId::new("a")));
        let resource = Resource::new("dir/b", "");
        let child = ctx.descend(&resource, BlockRegistry::new());

        assert!(Arc::ptr_eq(&ctx.shared, &child.shared));
        assert_eq!(ctx.current().map(ResourceId::as_str), Some("a"));
        assert_eq!(child.current().map(ResourceId::as_str), Some("dir/b"));
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_retrieve_relative_to_current() {
        let ctx = CompileContext::new(
            shared(&[("pages/card", "x")], EngineConfig::default()),
            Some(ResourceId::new("pages/home")),
        );
        assert_eq!(ctx.retrieve("./card").unwrap().content(), "x");
        assert_eq!(
            ctx.retrieve("card").unwrap_err().kind(),
            crate::error::ErrorKind::Resource
        );
    }

    #[test]
    fn test_missing_include_is_compile_error() {
        let err = compile(&[], "a{% include 'missing' %}b").unwrap_err();
        assert_eq!(
            err.kind_chain(),
            vec![crate::error::ErrorKind::Compile, crate::error::ErrorKind::Resource]
        );
        assert_eq!(
            err.to_string(),
            "Compile error: Unable to include 'missing' at line 1, column 2: Resource error: 'missing': not found"
        );
    }

    #[test]
    fn test_parse_error_in_include_is_compile_error() {
        let err = compile(&[("bad", "{% if %}")], "{% include 'bad' %}").unwrap_err();
        assert_eq!(
            err.kind_chain(),
            vec![crate::error::ErrorKind::Compile, crate::error::ErrorKind::Parse]
        );
    }

    #[test]
    fn test_include_path_must_be_constant() {
        let err = compile(&[], "{% include name %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: The path of 'include' at line 1, column 12 must be a constant string"
        );
        // Constant expressions are folded.
        assert!(compile(&[("a/b", "")], "{% include 'a' ~ '/' ~ 'b' %}").is_ok());
    }

    #[test]
    fn test_recursive_include_is_bounded() {
        let config = EngineConfig::default().with_max_include_depth(5);
        let mut ctx = CompileContext::new(shared(&[("loop", "{% include 'loop' %}")], config), None);
        let nodes = Parser::default().parse("{% include 'loop' %}").unwrap();
        let err = ctx.compile_template(&nodes).unwrap_err();
        assert!(
            err.to_string().ends_with("maximum nesting depth of 5 exceeded"),
            "{}",
            err
        );
    }

    #[test]
    fn test_duplicate_block_is_compile_error() {
        let err = compile(&[], "{% block a %}{% endblock %}{% block a %}{% endblock %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: Block 'a' is defined twice in '<string>' (second definition at line 1, column 28)"
        );
    }

    #[test]
    fn test_extends_must_come_first() {
        let err = compile(&[("base", "")], "x{% extends 'base' %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: 'extends' at line 1, column 2 must be the first tag of a template"
        );
    }

    #[test]
    fn test_content_outside_blocks_is_a_warning() {
        let ctx = compile(
            &[("base", "{% block body %}{% endblock %}")],
            "{% extends 'base' %}\nstray text\n{% block body %}x{% endblock %}",
        )
        .unwrap();
        let diagnostics = ctx.into_diagnostics().into_vec();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position.line, 1);
        assert!(diagnostics[0].message.starts_with("Content outside of blocks"));
    }

    #[test]
    fn test_unknown_function_in_include_fails_compile() {
        let err = compile(&[("bad", "{{ nope() }}")], "{% include 'bad' %}").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Compile);
        assert!(err.to_string().contains("Unknown function 'nope'"));
    }
}
