/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree produced by the parser.
//! Nodes are plain data: they are never mutated after parsing and carry no
//! behavior besides what compilation reads from them.

use crate::value::Value;
use std::fmt;

/// A location in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl SourcePosition {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text to be output as-is.
    Text(Text),

    /// Expression output: `{{ expr }}`
    Output(Output),

    /// Conditional: `{% if c %}...{% elseif c %}...{% else %}...{% endif %}`
    If(If),

    /// Loop: `{% for x in e %}...{% else %}...{% endfor %}`
    For(For),

    /// Include: `{% include "path" with e only %}`
    Include(Include),

    /// Inheritance: `{% extends "path" %}`
    Extends(Extends),

    /// Overridable block: `{% block name %}...{% endblock %}`
    Block(Block),

    /// Assignment: `{% set x = e %}`
    Set(Set),

    /// Comment (not rendered): `{# ... #}`
    Comment(Comment),
}

impl TemplateNode {
    pub fn position(&self) -> SourcePosition {
        match self {
            TemplateNode::Text(n) => n.position,
            TemplateNode::Output(n) => n.position,
            TemplateNode::If(n) => n.position,
            TemplateNode::For(n) => n.position,
            TemplateNode::Include(n) => n.position,
            TemplateNode::Extends(n) => n.position,
            TemplateNode::Block(n) => n.position,
            TemplateNode::Set(n) => n.position,
            TemplateNode::Comment(n) => n.position,
        }
    }

    /// Whitespace-only text and comments.
    pub fn is_insignificant(&self) -> bool {
        match self {
            TemplateNode::Text(t) => t.text.trim().is_empty(),
            TemplateNode::Comment(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub expression: Expression,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    /// (condition, body) pairs for the `if` and each `elseif`.
    pub branches: Vec<(Expression, Vec<TemplateNode>)>,
    pub else_body: Option<Vec<TemplateNode>>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    /// Key variable in `for key, value in ...`.
    pub key: Option<String>,
    pub value: String,
    pub iterable: Expression,
    pub body: Vec<TemplateNode>,
    /// Rendered when the iterable is empty.
    pub else_body: Option<Vec<TemplateNode>>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Path of the included resource; must fold to a constant string.
    pub path: Expression,
    /// Variables passed to the included template.
    pub with: Option<Expression>,
    /// `only`: hide the outer scope from the included template.
    pub only: bool,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extends {
    pub path: Expression,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub body: Vec<TemplateNode>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub name: String,
    pub value: Expression,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub position: SourcePosition,
}

/// An uncompiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: SourcePosition,
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }

    pub fn literal(value: impl Into<Value>, position: SourcePosition) -> Self {
        Self::new(ExpressionKind::Literal(value.into()), position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// `null`, `true`, `42`, `1.5`, `"text"`
    Literal(Value),
    /// `[a, b]`
    List(Vec<Expression>),
    /// `{key: value, "other": value}`
    Map(Vec<(String, Expression)>),
    /// `name`
    Variable(String),
    /// `target.name`
    Attribute {
        target: Box<Expression>,
        name: String,
    },
    /// `target[index]`
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `condition ? then : otherwise`
    Conditional {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    /// `name(args)`, and filters: `x | name(args)` is `name(x, args)`.
    Call { name: String, args: Vec<Expression> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    In,
    NotIn,
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Concat => "~",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_position_display() {
        assert_eq!(SourcePosition::new(14, 2, 5).to_string(), "line 2, column 5");
    }

    #[test]
    fn test_insignificant_nodes() {
        let pos = SourcePosition::default();
        let blank = TemplateNode::Text(Text {
            text: "  \n\t".to_string(),
            position: pos,
        });
        let comment = TemplateNode::Comment(Comment {
            text: "note".to_string(),
            position: pos,
        });
        let text = TemplateNode::Text(Text {
            text: " x ".to_string(),
            position: pos,
        });

        assert!(blank.is_insignificant());
        assert!(comment.is_insignificant());
        assert!(!text.is_insignificant());
    }

    #[test]
    fn test_node_position() {
        let pos = SourcePosition::new(3, 1, 4);
        let node = TemplateNode::Set(Set {
            name: "x".to_string(),
            value: Expression::literal(1, pos),
            position: pos,
        });
        assert_eq!(node.position(), pos);
    }
}
