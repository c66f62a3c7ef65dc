/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.
//!
//! [`EngineConfig`] is plain data and deserializes from any serde format, so
//! hosts can keep it in their own configuration files. Resolvers and
//! functions are installed on the [`Environment`](crate::Environment) in code.

use crate::error::{TemplateError, TemplateResult};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

/// Whether the outer scope is visible inside an included template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncludeIsolation {
    /// The included template sees the including template's variables.
    #[default]
    Inherit,
    /// The included template only sees its `with` variables.
    Isolated,
}

/// Tag delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SyntaxConfig {
    pub output_start: String,
    pub output_end: String,
    pub tag_start: String,
    pub tag_end: String,
    pub comment_start: String,
    pub comment_end: String,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        Self {
            output_start: "{{".to_string(),
            output_end: "}}".to_string(),
            tag_start: "{%".to_string(),
            tag_end: "%}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
        }
    }
}

impl SyntaxConfig {
    /// Reject delimiters the lexer cannot tell apart.
    ///
    /// Every delimiter must be non-empty and free of whitespace, and the three
    /// opening delimiters must differ from each other.
    pub fn validate(&self) -> TemplateResult<()> {
        let delimiters = [
            ("output-start", &self.output_start),
            ("output-end", &self.output_end),
            ("tag-start", &self.tag_start),
            ("tag-end", &self.tag_end),
            ("comment-start", &self.comment_start),
            ("comment-end", &self.comment_end),
        ];
        for (name, delimiter) in delimiters {
            if delimiter.is_empty() {
                return Err(TemplateError::config(format!("Delimiter '{}' is empty", name)));
            }
            if delimiter.chars().any(char::is_whitespace) {
                return Err(TemplateError::config(format!(
                    "Delimiter '{}' contains whitespace: {:?}",
                    name, delimiter
                )));
            }
        }

        let openers = [
            ("output-start", &self.output_start),
            ("tag-start", &self.tag_start),
            ("comment-start", &self.comment_start),
        ];
        for (i, (name, delimiter)) in openers.iter().enumerate() {
            if let Some((other, _)) = openers[i + 1..].iter().find(|(_, d)| d == delimiter) {
                return Err(TemplateError::config(format!(
                    "Delimiters '{}' and '{}' are both '{}'",
                    name, other, delimiter
                )));
            }
        }
        Ok(())
    }
}

/// Options read while compiling and rendering templates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Treat undefined variables and attributes as calculation errors.
    pub strict_variables: bool,

    /// Scope visibility for includes without `only`.
    pub include_isolation: IncludeIsolation,

    /// Maximum nesting of includes and extends before compilation fails.
    pub max_include_depth: usize,

    /// Offset from UTC, in minutes, used when date functions need "now".
    pub timezone_offset_minutes: i32,

    pub syntax: SyntaxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_variables: false,
            include_isolation: IncludeIsolation::default(),
            max_include_depth: 50,
            timezone_offset_minutes: 0,
            syntax: SyntaxConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn with_include_isolation(mut self, isolation: IncludeIsolation) -> Self {
        self.include_isolation = isolation;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_timezone_offset_minutes(mut self, minutes: i32) -> Self {
        self.timezone_offset_minutes = minutes;
        self
    }

    pub fn with_syntax(mut self, syntax: SyntaxConfig) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn validate(&self) -> TemplateResult<()> {
        self.syntax.validate()
    }

    /// The configured timezone; out-of-range offsets fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        self.timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.strict_variables);
        assert_eq!(config.include_isolation, IncludeIsolation::Inherit);
        assert_eq!(config.max_include_depth, 50);
        assert_eq!(config.syntax.tag_start, "{%");
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"strict-variables": true, "include-isolation": "isolated", "syntax": {"output-start": "[[", "output-end": "]]"}}"#,
        )
        .unwrap();

        assert!(config.strict_variables);
        assert_eq!(config.include_isolation, IncludeIsolation::Isolated);
        assert_eq!(config.syntax.output_start, "[[");
        assert_eq!(config.syntax.tag_start, "{%");
        assert_eq!(config.max_include_depth, 50);
    }

    #[test]
    fn test_validate_syntax() {
        assert!(EngineConfig::default().validate().is_ok());

        let empty = SyntaxConfig {
            comment_start: String::new(),
            ..SyntaxConfig::default()
        };
        assert_eq!(
            empty.validate().unwrap_err().to_string(),
            "Configuration error: Delimiter 'comment-start' is empty"
        );

        let empty_end = SyntaxConfig {
            comment_end: String::new(),
            ..SyntaxConfig::default()
        };
        assert!(empty_end.validate().is_err());

        let spaced = SyntaxConfig {
            tag_end: "% }".to_string(),
            ..SyntaxConfig::default()
        };
        assert!(spaced.validate().is_err());

        let clash = SyntaxConfig {
            tag_start: "{{".to_string(),
            ..SyntaxConfig::default()
        };
        assert_eq!(
            clash.validate().unwrap_err().to_string(),
            "Configuration error: Delimiters 'output-start' and 'tag-start' are both '{{'"
        );
    }

    #[test]
    fn test_utc_offset() {
        let config = EngineConfig::default().with_timezone_offset_minutes(90);
        assert_eq!(config.utc_offset().local_minus_utc(), 5400);

        let invalid = EngineConfig::default().with_timezone_offset_minutes(100_000);
        assert_eq!(invalid.utc_offset().local_minus_utc(), 0);
    }
}
