/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.
//!
//! Every failure is a [`TemplateError`]. Errors raised deep inside one phase
//! are wrapped into the error kind of the phase that observed them: a resource
//! failure while compiling an include becomes a compile error, a calculation
//! failure while writing an output node becomes a render error. The original
//! error stays reachable through [`std::error::Error::source`].

use crate::ast::SourcePosition;
use thiserror::Error;

/// The broad category of a [`TemplateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Parse,
    Resource,
    Compile,
    Calculation,
    Function,
    Render,
    Io,
}

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The engine configuration is unusable.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Lexical or syntax error in template source.
    #[error("Parse error at {position}: {message}")]
    Parse {
        message: String,
        position: SourcePosition,
    },

    /// A resolver could not find or load a resource.
    #[error("Resource error: '{reference}': {message}")]
    Resource { reference: String, message: String },

    /// Compile-time resolution failed.
    #[error("Compile error: {message}")]
    Compile {
        message: String,
        #[source]
        source: Option<Box<TemplateError>>,
    },

    /// An expression could not be calculated.
    #[error("Calculation error: {message}")]
    Calculation {
        message: String,
        #[source]
        source: Option<Box<TemplateError>>,
    },

    /// No overload matched, or a function precondition failed.
    #[error("Function error in '{name}': {message}")]
    Function { name: String, message: String },

    /// Rendering failed.
    #[error("Render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<Box<TemplateError>>,
    },

    /// I/O error (e.g., writing to the output sink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

impl TemplateError {
    pub fn config(message: impl Into<String>) -> Self {
        TemplateError::Config {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>, position: SourcePosition) -> Self {
        TemplateError::Parse {
            message: message.into(),
            position,
        }
    }

    pub fn resource(reference: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Resource {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        TemplateError::Compile {
            message: message.into(),
            source: None,
        }
    }

    pub fn calculation(message: impl Into<String>) -> Self {
        TemplateError::Calculation {
            message: message.into(),
            source: None,
        }
    }

    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        TemplateError::Render {
            message: message.into(),
            source: None,
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::Config { .. } => ErrorKind::Config,
            TemplateError::Parse { .. } => ErrorKind::Parse,
            TemplateError::Resource { .. } => ErrorKind::Resource,
            TemplateError::Compile { .. } => ErrorKind::Compile,
            TemplateError::Calculation { .. } => ErrorKind::Calculation,
            TemplateError::Function { .. } => ErrorKind::Function,
            TemplateError::Render { .. } => ErrorKind::Render,
            TemplateError::Io(_) => ErrorKind::Io,
        }
    }

    /// Kinds along the wrapping chain, outermost first.
    pub fn kind_chain(&self) -> Vec<ErrorKind> {
        let mut kinds = vec![self.kind()];
        let mut current = self.wrapped();
        while let Some(inner) = current {
            kinds.push(inner.kind());
            current = inner.wrapped();
        }
        kinds
    }

    fn wrapped(&self) -> Option<&TemplateError> {
        match self {
            TemplateError::Compile { source, .. }
            | TemplateError::Calculation { source, .. }
            | TemplateError::Render { source, .. } => source.as_deref(),
            _ => None,
        }
    }

    /// Wrap into a compile error attributed to `context`.
    ///
    /// Compile errors pass through unchanged so nested includes do not stack
    /// one wrapper per level.
    pub fn into_compile(self, context: impl std::fmt::Display) -> Self {
        match self {
            TemplateError::Compile { .. } => self,
            other => TemplateError::Compile {
                message: format!("{}: {}", context, other),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Wrap into a calculation error (function failures at a call site).
    pub fn into_calculation(self) -> Self {
        match self {
            TemplateError::Calculation { .. } => self,
            other => TemplateError::Calculation {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Wrap into a render error raised by the node at `position`.
    pub fn into_render_at(self, position: SourcePosition) -> Self {
        match self {
            TemplateError::Render { .. } => self,
            other => TemplateError::Render {
                message: format!("{}: {}", position, other),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Wrap into a render error.
    pub fn into_render(self) -> Self {
        match self {
            TemplateError::Render { .. } => self,
            other => TemplateError::Render {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_wrapped_into_compile() {
        let err = TemplateError::resource("header.twig", "not found")
            .into_compile("Unable to include 'header.twig'");

        assert_eq!(err.kind(), ErrorKind::Compile);
        assert_eq!(err.kind_chain(), vec![ErrorKind::Compile, ErrorKind::Resource]);
        assert_eq!(
            err.to_string(),
            "Compile error: Unable to include 'header.twig': Resource error: 'header.twig': not found"
        );
    }

    #[test]
    fn test_compile_error_not_rewrapped() {
        let err = TemplateError::compile("bad").into_compile("outer");
        assert_eq!(err.kind_chain(), vec![ErrorKind::Compile]);
        assert_eq!(err.to_string(), "Compile error: bad");
    }

    #[test]
    fn test_function_error_surfaces_as_render() {
        let err = TemplateError::function("date_modify", "Unknown unit 'fortnight'")
            .into_calculation()
            .into_render();

        assert_eq!(
            err.kind_chain(),
            vec![ErrorKind::Render, ErrorKind::Calculation, ErrorKind::Function]
        );
        assert!(err.to_string().ends_with("Unknown unit 'fortnight'"));
    }

    #[test]
    fn test_render_at_position() {
        let err = TemplateError::calculation("Variable 'x' is not defined")
            .into_render_at(SourcePosition::new(12, 2, 4));
        assert_eq!(
            err.to_string(),
            "Render error: line 2, column 4: Calculation error: Variable 'x' is not defined"
        );
        assert_eq!(err.kind_chain(), vec![ErrorKind::Render, ErrorKind::Calculation]);
    }

    #[test]
    fn test_render_message_is_preserved() {
        let err = TemplateError::render("Include 'with' must be given a map.").into_render();
        assert_eq!(err.to_string(), "Render error: Include 'with' must be given a map.");
    }
}
