/*
 * parser/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser producing the template AST.
//!
//! The parser consumes raw source text and has no other inputs: it never
//! touches a resolver, and parsing the same source twice yields equal trees.

mod lexer;

pub use lexer::{Lexer, Token, TokenKind};

use crate::ast::{
    BinaryOp, Block, Comment, Expression, ExpressionKind, Extends, For, If, Include, Output, Set,
    SourcePosition, TemplateNode, Text, UnaryOp,
};
use crate::config::SyntaxConfig;
use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

/// Tags that only close or continue another tag.
const CLOSING_TAGS: [&str; 5] = ["elseif", "else", "endif", "endfor", "endblock"];

/// Deepest nesting of tags and expressions accepted by the parser.
///
/// Compilation and rendering recurse over the same tree, so this also bounds
/// their stack use.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Template parser for one delimiter syntax.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    syntax: SyntaxConfig,
}

impl Parser {
    pub fn new(syntax: SyntaxConfig) -> Self {
        Self { syntax }
    }

    pub fn syntax(&self) -> &SyntaxConfig {
        &self.syntax
    }

    /// Parse source text into its root node sequence.
    pub fn parse(&self, source: &str) -> TemplateResult<Vec<TemplateNode>> {
        let tokens = Lexer::new(source, &self.syntax).tokenize()?;
        let mut stream = TokenStream {
            tokens,
            pos: 0,
            depth: 0,
        };
        let (nodes, _) = stream.parse_body(&[])?;
        Ok(nodes)
    }
}

/// Name and position of the tag that ended a body.
struct EndTag {
    name: String,
    position: SourcePosition,
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    /// Current nesting of tags and expressions.
    depth: usize,
}

impl TokenStream {
    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Symbol(s) if *s == symbol)
    }

    fn at_name(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Name(n) if n == name)
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let found = self.at_symbol(symbol);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_name(&mut self, name: &str) -> bool {
        let found = self.at_name(name);
        if found {
            self.pos += 1;
        }
        found
    }

    fn unexpected(&self, expected: &str) -> TemplateError {
        let token = self.peek();
        TemplateError::parse(
            format!("Expected {}, got {}", expected, token.kind.describe()),
            token.position,
        )
    }

    fn expect_symbol(&mut self, symbol: &str) -> TemplateResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", symbol)))
        }
    }

    fn expect_name(&mut self) -> TemplateResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> TemplateResult<()> {
        if self.eat_name(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn check_depth(&self) -> TemplateResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(TemplateError::parse(
                format!("Template is nested more than {} levels deep", MAX_NESTING_DEPTH),
                self.peek().position,
            ));
        }
        Ok(())
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        self.check_depth()?;
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Count one more link of a left-nested chain such as `a + b + c`.
    ///
    /// The caller subtracts `links` from the depth once the chain ends.
    fn extend_chain(&mut self, links: &mut usize) -> TemplateResult<()> {
        self.check_depth()?;
        self.depth += 1;
        *links += 1;
        Ok(())
    }

    fn expect_tag_end(&mut self) -> TemplateResult<()> {
        if matches!(self.peek().kind, TokenKind::TagEnd) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected("end of tag"))
        }
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Parse nodes until one of `terminators` opens a tag.
    ///
    /// The terminator's name is consumed; the rest of its tag is left for
    /// the caller. With no terminators the body runs to the end of input.
    fn parse_body(
        &mut self,
        terminators: &[&str],
    ) -> TemplateResult<(Vec<TemplateNode>, Option<EndTag>)> {
        let mut nodes = Vec::new();
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => {
                    if terminators.is_empty() {
                        return Ok((nodes, None));
                    }
                    let expected: Vec<String> =
                        terminators.iter().map(|t| format!("'{}'", t)).collect();
                    return Err(TemplateError::parse(
                        format!(
                            "Unexpected end of template, expected {}",
                            expected.join(" or ")
                        ),
                        token.position,
                    ));
                }
                TokenKind::Text(text) => nodes.push(TemplateNode::Text(Text {
                    text,
                    position: token.position,
                })),
                TokenKind::Comment(text) => nodes.push(TemplateNode::Comment(Comment {
                    text,
                    position: token.position,
                })),
                TokenKind::OutputStart => {
                    let expression = self.parse_expression()?;
                    if !matches!(self.peek().kind, TokenKind::OutputEnd) {
                        return Err(self.unexpected("end of output"));
                    }
                    self.pos += 1;
                    nodes.push(TemplateNode::Output(Output {
                        expression,
                        position: token.position,
                    }));
                }
                TokenKind::TagStart => {
                    let tag_position = self.peek().position;
                    let name = self.expect_name()?;
                    if terminators.contains(&name.as_str()) {
                        return Ok((
                            nodes,
                            Some(EndTag {
                                name,
                                position: tag_position,
                            }),
                        ));
                    }
                    nodes.push(self.parse_tag(&name, token.position, tag_position)?);
                }
                other => {
                    return Err(TemplateError::parse(
                        format!("Unexpected {}", other.describe()),
                        token.position,
                    ));
                }
            }
        }
    }

    fn parse_tag(
        &mut self,
        name: &str,
        position: SourcePosition,
        name_position: SourcePosition,
    ) -> TemplateResult<TemplateNode> {
        match name {
            "if" => self.nested(|s| s.parse_if(position)),
            "for" => self.nested(|s| s.parse_for(position)),
            "set" => self.parse_set(position),
            "include" => self.parse_include(position),
            "extends" => {
                let path = self.parse_expression()?;
                self.expect_tag_end()?;
                Ok(TemplateNode::Extends(Extends { path, position }))
            }
            "block" => self.nested(|s| s.parse_block(position)),
            other if CLOSING_TAGS.contains(&other) => Err(TemplateError::parse(
                format!("Unexpected '{}' tag", other),
                name_position,
            )),
            other => Err(TemplateError::parse(
                format!("Unknown tag '{}'", other),
                name_position,
            )),
        }
    }

    fn parse_if(&mut self, position: SourcePosition) -> TemplateResult<TemplateNode> {
        let mut branches = Vec::new();
        let mut condition = self.parse_expression()?;
        self.expect_tag_end()?;

        loop {
            let (body, end) = self.parse_body(&["elseif", "else", "endif"])?;
            branches.push((condition, body));
            match end.map(|e| e.name).as_deref() {
                Some("elseif") => {
                    condition = self.parse_expression()?;
                    self.expect_tag_end()?;
                }
                Some("else") => {
                    self.expect_tag_end()?;
                    let (else_body, _) = self.parse_body(&["endif"])?;
                    self.expect_tag_end()?;
                    return Ok(TemplateNode::If(If {
                        branches,
                        else_body: Some(else_body),
                        position,
                    }));
                }
                _ => {
                    self.expect_tag_end()?;
                    return Ok(TemplateNode::If(If {
                        branches,
                        else_body: None,
                        position,
                    }));
                }
            }
        }
    }

    fn parse_for(&mut self, position: SourcePosition) -> TemplateResult<TemplateNode> {
        let first = self.expect_name()?;
        let (key, value) = if self.eat_symbol(",") {
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };
        self.expect_keyword("in")?;
        let iterable = self.parse_expression()?;
        self.expect_tag_end()?;

        let (body, end) = self.parse_body(&["else", "endfor"])?;
        self.expect_tag_end()?;
        let else_body = match end {
            Some(end) if end.name == "else" => {
                let (else_body, _) = self.parse_body(&["endfor"])?;
                self.expect_tag_end()?;
                Some(else_body)
            }
            _ => None,
        };

        Ok(TemplateNode::For(For {
            key,
            value,
            iterable,
            body,
            else_body,
            position,
        }))
    }

    fn parse_set(&mut self, position: SourcePosition) -> TemplateResult<TemplateNode> {
        let name = self.expect_name()?;
        self.expect_symbol("=")?;
        let value = self.parse_expression()?;
        self.expect_tag_end()?;
        Ok(TemplateNode::Set(Set {
            name,
            value,
            position,
        }))
    }

    fn parse_include(&mut self, position: SourcePosition) -> TemplateResult<TemplateNode> {
        let path = self.parse_expression()?;
        let with = if self.eat_name("with") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let only = self.eat_name("only");
        self.expect_tag_end()?;
        Ok(TemplateNode::Include(Include {
            path,
            with,
            only,
            position,
        }))
    }

    fn parse_block(&mut self, position: SourcePosition) -> TemplateResult<TemplateNode> {
        let name = self.expect_name()?;
        self.expect_tag_end()?;
        let (body, end) = self.parse_body(&["endblock"])?;

        if let TokenKind::Name(closing) = &self.peek().kind {
            if *closing != name {
                let at = end.map_or(self.peek().position, |e| e.position);
                return Err(TemplateError::parse(
                    format!("Block '{}' closed by 'endblock {}'", name, closing),
                    at,
                ));
            }
            self.pos += 1;
        }
        self.expect_tag_end()?;
        Ok(TemplateNode::Block(Block {
            name,
            body,
            position,
        }))
    }

    // ---------------------------------------------------------------------
    // Expressions, lowest precedence first
    // ---------------------------------------------------------------------

    fn parse_expression(&mut self) -> TemplateResult<Expression> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> TemplateResult<Expression> {
        let condition = self.parse_or()?;
        if !self.eat_symbol("?") {
            return Ok(condition);
        }
        let then = self.nested(Self::parse_conditional)?;
        self.expect_symbol(":")?;
        let otherwise = self.nested(Self::parse_conditional)?;
        let position = condition.position;
        Ok(Expression::new(
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            position,
        ))
    }

    fn parse_or(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_and()?;
        let mut links = 0;
        while self.eat_name("or") {
            self.extend_chain(&mut links)?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn parse_and(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_comparison()?;
        let mut links = 0;
        while self.eat_name("and") {
            self.extend_chain(&mut links)?;
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn comparison_op(&self) -> Option<(BinaryOp, usize)> {
        match &self.peek().kind {
            TokenKind::Symbol("==") => Some((BinaryOp::Equal, 1)),
            TokenKind::Symbol("!=") => Some((BinaryOp::NotEqual, 1)),
            TokenKind::Symbol("<") => Some((BinaryOp::Less, 1)),
            TokenKind::Symbol(">") => Some((BinaryOp::Greater, 1)),
            TokenKind::Symbol("<=") => Some((BinaryOp::LessEqual, 1)),
            TokenKind::Symbol(">=") => Some((BinaryOp::GreaterEqual, 1)),
            TokenKind::Name(n) if n == "in" => Some((BinaryOp::In, 1)),
            TokenKind::Name(n) if n == "not" => match self.peek_at(1) {
                TokenKind::Name(next) if next == "in" => Some((BinaryOp::NotIn, 2)),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_concat()?;
        let mut links = 0;
        while let Some((op, width)) = self.comparison_op() {
            self.pos += width;
            self.extend_chain(&mut links)?;
            let right = self.parse_concat()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn parse_concat(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_additive()?;
        let mut links = 0;
        while self.eat_symbol("~") {
            self.extend_chain(&mut links)?;
            let right = self.parse_additive()?;
            left = binary(BinaryOp::Concat, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn parse_additive(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        let mut links = 0;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Symbol("+") => BinaryOp::Add,
                TokenKind::Symbol("-") => BinaryOp::Subtract,
                _ => break,
            };
            self.pos += 1;
            self.extend_chain(&mut links)?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> TemplateResult<Expression> {
        let mut left = self.parse_unary()?;
        let mut links = 0;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Symbol("*") => BinaryOp::Multiply,
                TokenKind::Symbol("/") => BinaryOp::Divide,
                TokenKind::Symbol("//") => BinaryOp::FloorDivide,
                TokenKind::Symbol("%") => BinaryOp::Modulo,
                _ => break,
            };
            self.pos += 1;
            self.extend_chain(&mut links)?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn parse_unary(&mut self) -> TemplateResult<Expression> {
        let position = self.peek().position;
        let op = match &self.peek().kind {
            TokenKind::Name(n) if n == "not" => UnaryOp::Not,
            TokenKind::Symbol("-") => UnaryOp::Negate,
            TokenKind::Symbol("+") => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression::new(
            ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    /// `**` is right-associative and binds tighter than unary minus.
    fn parse_power(&mut self) -> TemplateResult<Expression> {
        let base = self.parse_filtered()?;
        if self.eat_symbol("**") {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    /// `x | f(a)` becomes the call `f(x, a)`.
    fn parse_filtered(&mut self) -> TemplateResult<Expression> {
        let mut value = self.parse_postfix()?;
        let mut links = 0;
        while self.at_symbol("|") {
            self.pos += 1;
            self.extend_chain(&mut links)?;
            let position = self.peek().position;
            let name = self.expect_name()?;
            let mut args = vec![value];
            if self.at_symbol("(") {
                args.extend(self.parse_arguments()?);
            }
            value = Expression::new(ExpressionKind::Call { name, args }, position);
        }
        self.depth -= links;
        Ok(value)
    }

    fn parse_postfix(&mut self) -> TemplateResult<Expression> {
        let mut target = self.parse_primary()?;
        let mut links = 0;
        loop {
            let position = self.peek().position;
            if self.at_symbol(".") || self.at_symbol("[") {
                self.extend_chain(&mut links)?;
            }
            if self.eat_symbol(".") {
                let name = match &self.peek().kind {
                    TokenKind::Name(name) => name.clone(),
                    TokenKind::Integer(i) => i.to_string(),
                    _ => return Err(self.unexpected("an attribute name")),
                };
                self.pos += 1;
                target = Expression::new(
                    ExpressionKind::Attribute {
                        target: Box::new(target),
                        name,
                    },
                    position,
                );
            } else if self.eat_symbol("[") {
                let index = self.parse_expression()?;
                self.expect_symbol("]")?;
                target = Expression::new(
                    ExpressionKind::Index {
                        target: Box::new(target),
                        index: Box::new(index),
                    },
                    position,
                );
            } else {
                break;
            }
        }
        self.depth -= links;
        Ok(target)
    }

    fn parse_arguments(&mut self) -> TemplateResult<Vec<Expression>> {
        self.expect_symbol("(")?;
        let mut args = Vec::new();
        if self.eat_symbol(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.eat_symbol(")") {
                return Ok(args);
            }
            self.expect_symbol(",")?;
        }
    }

    fn parse_primary(&mut self) -> TemplateResult<Expression> {
        let token = self.peek().clone();
        let position = token.position;
        match token.kind {
            TokenKind::Integer(i) => {
                self.pos += 1;
                Ok(Expression::literal(i, position))
            }
            TokenKind::Float(f) => {
                self.pos += 1;
                Ok(Expression::literal(f, position))
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                Ok(Expression::literal(s, position))
            }
            TokenKind::Name(name) => {
                self.pos += 1;
                match name.as_str() {
                    "true" | "TRUE" => Ok(Expression::literal(true, position)),
                    "false" | "FALSE" => Ok(Expression::literal(false, position)),
                    "null" | "none" | "NULL" => Ok(Expression::literal(Value::Null, position)),
                    _ if self.at_symbol("(") => {
                        let args = self.parse_arguments()?;
                        Ok(Expression::new(ExpressionKind::Call { name, args }, position))
                    }
                    _ => Ok(Expression::new(ExpressionKind::Variable(name), position)),
                }
            }
            TokenKind::Symbol("(") => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            TokenKind::Symbol("[") => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat_symbol("]") {
                    items.push(self.parse_expression()?);
                    if !self.at_symbol("]") {
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Expression::new(ExpressionKind::List(items), position))
            }
            TokenKind::Symbol("{") => {
                self.pos += 1;
                let mut entries = Vec::new();
                while !self.eat_symbol("}") {
                    let key = match &self.peek().kind {
                        TokenKind::Name(k) | TokenKind::Str(k) => k.clone(),
                        TokenKind::Integer(i) => i.to_string(),
                        _ => return Err(self.unexpected("a map key")),
                    };
                    self.pos += 1;
                    self.expect_symbol(":")?;
                    entries.push((key, self.parse_expression()?));
                    if !self.at_symbol("}") {
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Expression::new(ExpressionKind::Map(entries), position))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    let position = left.position;
    Expression::new(
        ExpressionKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        position,
    )
}
