/*
 * environment.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Entry point tying configuration, resolution and compilation together.

use crate::compile::{CompileContext, CompileShared};
use crate::config::EngineConfig;
use crate::error::TemplateResult;
use crate::functions::{FunctionEnv, FunctionRegistry, Signature};
use crate::parser::Parser;
use crate::render::RenderOptions;
use crate::resource::{Resource, ResourceId, ResourceResolver, ResolverChain};
use crate::template::Template;
use std::sync::Arc;

/// Compiles templates with a fixed resolver, function registry and
/// configuration.
///
/// Setup happens through the `with_*` builders; afterwards an environment is
/// only read, so it can be shared between threads and used for any number of
/// compiles.
#[derive(Debug, Clone)]
pub struct Environment {
    shared: Arc<CompileShared>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl Environment {
    /// An environment with the built-in functions and no resolvers.
    ///
    /// Fails with a configuration error when the delimiters are unusable.
    pub fn new(config: EngineConfig) -> TemplateResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(CompileShared {
                resolver: Arc::new(ResolverChain::new()),
                functions: Arc::new(FunctionRegistry::with_builtins()),
                parser: Parser::new(config.syntax.clone()),
                config,
            }),
        }
    }

    /// Replace the resource resolver. Use a [`ResolverChain`] to combine several.
    pub fn with_resolver(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        Arc::make_mut(&mut self.shared).resolver = Arc::new(resolver);
        self
    }

    /// Replace the whole function registry.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        Arc::make_mut(&mut self.shared).functions = Arc::new(functions);
        self
    }

    /// Add one overload to the function registry.
    pub fn with_function(mut self, name: impl Into<String>, signature: Signature) -> Self {
        let shared = Arc::make_mut(&mut self.shared);
        Arc::make_mut(&mut shared.functions).register(name, signature);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.shared.functions
    }

    /// Compile a template from a string.
    ///
    /// Relative includes inside it resolve as if it had no directory.
    pub fn compile_str(&self, source: &str) -> TemplateResult<Template> {
        self.compile_source(None, source)
    }

    /// Compile an already loaded resource.
    pub fn compile_resource(&self, resource: &Resource) -> TemplateResult<Template> {
        self.compile_source(Some(resource.id().clone()), resource.content())
    }

    /// Resolve `reference` and compile it.
    pub fn load(&self, reference: &str) -> TemplateResult<Template> {
        tracing::debug!(reference, "loading template");
        let resource = self
            .shared
            .resolver
            .resolve(reference)
            .map_err(|e| e.into_compile(format!("Unable to load template '{}'", reference)))?;
        self.compile_resource(&resource)
    }

    fn compile_source(&self, name: Option<ResourceId>, source: &str) -> TemplateResult<Template> {
        let nodes = self.shared.parser.parse(source)?;
        let mut ctx = CompileContext::new(Arc::clone(&self.shared), name.clone());
        let root = ctx.compile_template(&nodes)?;
        let diagnostics = ctx.into_diagnostics();
        tracing::debug!(
            template = name.as_ref().map_or("<string>", ResourceId::as_str),
            warnings = diagnostics.len(),
            "compiled template"
        );

        let config = self.config();
        let options = RenderOptions {
            strict_variables: config.strict_variables,
            function_env: FunctionEnv::new(config.utc_offset()),
        };
        Ok(Template::new(name, root, options, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::functions::ParamType;
    use crate::resource::MemoryResolver;
    use crate::value::Value;

    #[test]
    fn test_compile_str() {
        let template = Environment::default().compile_str("Hi {{ name }}").unwrap();
        let output = template.render(&Context::new().with("name", "Ada")).unwrap();
        assert_eq!(output, "Hi Ada");
    }

    #[test]
    fn test_load_missing_template() {
        let env = Environment::default().with_resolver(MemoryResolver::new());
        let err = env.load("nope").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: Unable to load template 'nope': Resource error: 'nope': not found"
        );
    }

    #[test]
    fn test_custom_function() {
        let env = Environment::default().with_function(
            "shout",
            Signature::new([ParamType::String], |args, _| {
                Ok(Value::from(format!("{}!", args[0])))
            }),
        );
        let template = env.compile_str("{{ 'hey' | shout }}").unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "hey!");
        // The default environment is unaffected.
        assert!(!Environment::default().functions().contains("shout"));
    }

    #[test]
    fn test_custom_syntax() {
        let config = EngineConfig::default().with_syntax(crate::config::SyntaxConfig {
            output_start: "${".to_string(),
            output_end: "}".to_string(),
            ..Default::default()
        });
        let template = Environment::new(config)
            .unwrap()
            .compile_str("${ x } {{ x }}")
            .unwrap();
        assert_eq!(template.render(&Context::new().with("x", 1)).unwrap(), "1 {{ x }}");
    }

    #[test]
    fn test_rejects_empty_comment_delimiter() {
        let config = EngineConfig::default().with_syntax(crate::config::SyntaxConfig {
            comment_start: String::new(),
            comment_end: String::new(),
            ..Default::default()
        });
        let err = Environment::new(config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert_eq!(
            err.to_string(),
            "Configuration error: Delimiter 'comment-start' is empty"
        );
    }
}
