/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Twig-style template engine.
//!
//! Templates go through two phases:
//!
//! 1. **Compile.** The source is parsed into an AST, then compiled into an
//!    executable tree. Includes are loaded and compiled in place, `extends`
//!    chains are flattened with the most-derived block bodies, functions are
//!    bound by name and constant expressions are folded.
//! 2. **Render.** The executable tree is walked with a per-render scope
//!    stack and writes into any [`std::io::Write`] sink.
//!
//! Supported syntax:
//!
//! - Output: `{{ user.name | upper }}`
//! - Tags: `if`/`elseif`/`else`, `for ... in ... else`, `set`,
//!   `include ... with ... only`, `extends`, `block`
//! - Comments: `{# ... #}`
//! - Whitespace control: `{{-`, `-}}`, `{%-`, `-%}`
//!
//! # Architecture
//!
//! An [`Environment`] owns the configuration, the [`ResourceResolver`] and the
//! [`FunctionRegistry`]. Compiling produces a [`Template`], which is immutable
//! and may be rendered concurrently. Compile problems surface as
//! [`TemplateError`]s before any output is written; non-fatal findings are
//! kept as [`Diagnostics`] on the template.
//!
//! # Example
//!
//! ```
//! use twiglet_template::{Context, Environment, MemoryResolver};
//!
//! let mut templates = MemoryResolver::new();
//! templates.add("greeting.twig", "Hello, {{ name | upper }}!");
//!
//! let env = Environment::default().with_resolver(templates);
//! let template = env.load("greeting.twig")?;
//!
//! let output = template.render(&Context::new().with("name", "world"))?;
//! assert_eq!(output, "Hello, WORLD!");
//! # Ok::<(), twiglet_template::TemplateError>(())
//! ```

pub mod ast;
pub mod compile;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod executable;
pub mod expression;
pub mod functions;
pub mod math;
pub mod parser;
pub mod render;
pub mod resource;
pub mod template;
pub mod value;

// Re-export main types at crate root
pub use ast::{Expression, SourcePosition, TemplateNode};
pub use compile::CompileContext;
pub use config::{EngineConfig, IncludeIsolation, SyntaxConfig};
pub use context::Context;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use environment::Environment;
pub use error::{ErrorKind, TemplateError, TemplateResult};
pub use executable::Executable;
pub use expression::CompiledExpression;
pub use functions::{FunctionEnv, FunctionRegistry, ParamType, Signature};
pub use parser::Parser;
pub use render::{RenderContext, Scope};
pub use resource::{
    FileSystemResolver, MemoryResolver, Resource, ResourceId, ResourceResolver, ResolverChain,
};
pub use template::Template;
pub use value::{Map, Value};
