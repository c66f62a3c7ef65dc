/*
 * parser/lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer for template source.
//!
//! Outside of delimiters the lexer emits text; inside `{{ }}` and `{% %}` it
//! emits expression tokens. Comments are emitted whole. Whitespace control
//! (`{{-`, `-%}` and friends) is applied here by trimming the neighbouring
//! text tokens, so the parser never sees it.

use crate::ast::SourcePosition;
use crate::config::SyntaxConfig;
use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    Comment(String),
    OutputStart,
    OutputEnd,
    TagStart,
    TagEnd,
    Name(String),
    Str(String),
    Integer(i64),
    Float(f64),
    /// Operators and punctuation, e.g. `"=="`, `"("`, `"|"`.
    Symbol(&'static str),
    Eof,
}

impl TokenKind {
    /// Human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Text(_) => "text".to_string(),
            TokenKind::Comment(_) => "comment".to_string(),
            TokenKind::OutputStart => "start of output".to_string(),
            TokenKind::OutputEnd => "end of output".to_string(),
            TokenKind::TagStart => "start of tag".to_string(),
            TokenKind::TagEnd => "end of tag".to_string(),
            TokenKind::Name(n) => format!("'{}'", n),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::Integer(i) => format!("number {}", i),
            TokenKind::Float(f) => format!("number {}", f),
            TokenKind::Symbol(s) => format!("'{}'", s),
            TokenKind::Eof => "end of template".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: SourcePosition,
}

/// Longest symbols first so that `//` wins over `/`.
const SYMBOLS: [&str; 27] = [
    "//", "**", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "~", "<", ">", "=", "|", "?",
    ":", ",", ".", "(", ")", "[", "]", "{", "}", "!",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Output,
    Tag,
}

/// Maps byte offsets to line/column positions.
///
/// Lookups mostly move forward, so the last answer is kept and columns are
/// counted from there when the next offset is later on the same line.
struct LineIndex {
    line_starts: Vec<usize>,
    last: SourcePosition,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            line_starts,
            last: SourcePosition::new(0, 1, 1),
        }
    }

    fn position(&mut self, source: &str, offset: usize) -> SourcePosition {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let (from, column) = if self.last.line == line + 1 && self.last.offset <= offset {
            (self.last.offset, self.last.column)
        } else {
            (self.line_starts[line], 1)
        };
        let column = column + source[from..offset].chars().count();
        self.last = SourcePosition::new(offset, line + 1, column);
        self.last
    }
}

/// Next occurrence of an opening delimiter at or after some cursor.
#[derive(Debug, Clone, Copy)]
enum Found {
    At(usize),
    Absent,
}

pub struct Lexer<'a> {
    source: &'a str,
    syntax: &'a SyntaxConfig,
    cursor: usize,
    mode: Mode,
    trim_next_text: bool,
    /// Unclosed `{` inside the current output or tag.
    brace_depth: usize,
    /// Search results for output, tag and comment openers.
    openers: [Option<Found>; 3],
    lines: LineIndex,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, syntax: &'a SyntaxConfig) -> Self {
        Self {
            source,
            syntax,
            cursor: 0,
            mode: Mode::Text,
            trim_next_text: false,
            brace_depth: 0,
            openers: [None; 3],
            lines: LineIndex::new(source),
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole source. The last token is always [`TokenKind::Eof`].
    ///
    /// Fails without reading the source when the delimiters are unusable.
    pub fn tokenize(mut self) -> TemplateResult<Vec<Token>> {
        self.syntax.validate()?;
        while self.cursor < self.source.len() {
            match self.mode {
                Mode::Text => self.lex_text()?,
                Mode::Output | Mode::Tag => self.lex_inside()?,
            }
        }
        if self.mode != Mode::Text {
            let syntax = self.syntax;
            let delimiter = match self.mode {
                Mode::Output => &syntax.output_end,
                _ => &syntax.tag_end,
            };
            return Err(TemplateError::parse(
                format!("Unclosed delimiter, expected '{}'", delimiter),
                self.position(self.source.len()),
            ));
        }
        let eof = self.position(self.source.len());
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            position: eof,
        });
        Ok(self.tokens)
    }

    fn position(&mut self, offset: usize) -> SourcePosition {
        self.lines.position(self.source, offset)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.cursor..]
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        let position = self.position(offset);
        self.tokens.push(Token { kind, position });
    }

    /// Remove trailing whitespace from the previous text token (`{{-`).
    fn trim_previous_text(&mut self) {
        if let Some(Token {
            kind: TokenKind::Text(text),
            ..
        }) = self.tokens.last_mut()
        {
            let trimmed_len = text.trim_end().len();
            text.truncate(trimmed_len);
            if text.is_empty() {
                self.tokens.pop();
            }
        }
    }

    /// Offset of the next `delimiter` at or after the cursor.
    ///
    /// Earlier answers stay valid until the cursor passes them, which keeps
    /// lexing linear when one opener is rare or missing.
    fn find_opener(&mut self, slot: usize, delimiter: &str) -> Option<usize> {
        match self.openers[slot] {
            Some(Found::At(offset)) if offset >= self.cursor => return Some(offset),
            Some(Found::Absent) => return None,
            _ => {}
        }
        let found = self.rest().find(delimiter).map(|idx| self.cursor + idx);
        self.openers[slot] = Some(found.map_or(Found::Absent, Found::At));
        found
    }

    fn lex_text(&mut self) -> TemplateResult<()> {
        let syntax = self.syntax;
        let openers = [
            (&syntax.output_start, Mode::Output),
            (&syntax.tag_start, Mode::Tag),
            (&syntax.comment_start, Mode::Text),
        ];

        // Earliest delimiter wins; on a tie the longer one does.
        let mut next: Option<(usize, usize, Mode)> = None;
        for (slot, (delimiter, mode)) in openers.into_iter().enumerate() {
            let Some(offset) = self.find_opener(slot, delimiter) else {
                continue;
            };
            let candidate = (offset - self.cursor, delimiter.len(), mode);
            let keep = next.is_some_and(|(best, best_len, _)| {
                best < candidate.0 || (best == candidate.0 && best_len >= candidate.1)
            });
            if !keep {
                next = Some(candidate);
            }
        }
        let rest = self.rest();

        let text_len = next.map_or(rest.len(), |(idx, ..)| idx);
        if text_len > 0 {
            let mut text = &rest[..text_len];
            if self.trim_next_text {
                text = text.trim_start();
            }
            if !text.is_empty() {
                let offset = self.cursor + (text_len - text.len());
                self.push(TokenKind::Text(text.to_string()), offset);
            }
            self.cursor += text_len;
        }
        self.trim_next_text = false;

        let Some((_, len, mode)) = next else {
            return Ok(());
        };
        let start = self.cursor;
        self.cursor += len;

        if self.rest().starts_with('-') {
            self.cursor += 1;
            self.trim_previous_text();
        }

        if mode == Mode::Text {
            return self.lex_comment(start);
        }

        let kind = match mode {
            Mode::Output => TokenKind::OutputStart,
            _ => TokenKind::TagStart,
        };
        self.push(kind, start);
        self.mode = mode;
        self.brace_depth = 0;
        Ok(())
    }

    fn lex_comment(&mut self, start: usize) -> TemplateResult<()> {
        let syntax = self.syntax;
        let end = &syntax.comment_end;
        let end_len = end.len();
        let rest = self.rest();
        let Some(idx) = rest.find(end.as_str()) else {
            return Err(TemplateError::parse(
                format!("Unclosed comment, expected '{}'", end),
                self.position(start),
            ));
        };
        let (body, trim) = match rest[..idx].strip_suffix('-') {
            Some(body) => (body, true),
            None => (&rest[..idx], false),
        };
        let text = body.trim().to_string();
        self.cursor += idx + end_len;
        self.push(TokenKind::Comment(text), start);
        self.trim_next_text = trim;
        Ok(())
    }

    /// Check for the closing delimiter of the current mode, with optional `-`.
    fn closing(&self) -> Option<(usize, bool)> {
        let syntax = self.syntax;
        let end = match self.mode {
            Mode::Output => &syntax.output_end,
            _ => &syntax.tag_end,
        };
        let rest = self.rest();
        if rest.starts_with(end.as_str()) {
            Some((end.len(), false))
        } else if rest.starts_with('-') && rest[1..].starts_with(end.as_str()) {
            Some((end.len() + 1, true))
        } else {
            None
        }
    }

    fn lex_inside(&mut self) -> TemplateResult<()> {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.cursor += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            return Ok(());
        }

        let start = self.cursor;
        // Map literals close with `}`, so a closer like `}}` only ends the
        // output once every `{` opened inside it is closed.
        let closing = if self.brace_depth == 0 { self.closing() } else { None };
        if let Some((len, trim)) = closing {
            let kind = match self.mode {
                Mode::Output => TokenKind::OutputEnd,
                _ => TokenKind::TagEnd,
            };
            self.cursor += len;
            self.push(kind, start);
            self.mode = Mode::Text;
            self.trim_next_text = trim;
            return Ok(());
        }

        let first = trimmed.chars().next().unwrap_or_default();
        if first == '"' || first == '\'' {
            return self.lex_string(first);
        }
        if first.is_ascii_digit() {
            return self.lex_number();
        }
        if first.is_alphabetic() || first == '_' {
            let len = trimmed
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                .map_or(trimmed.len(), |(i, _)| i);
            self.cursor += len;
            self.push(TokenKind::Name(trimmed[..len].to_string()), start);
            return Ok(());
        }
        if let Some(symbol) = SYMBOLS.iter().find(|s| trimmed.starts_with(**s)) {
            match *symbol {
                "{" => self.brace_depth += 1,
                "}" => self.brace_depth = self.brace_depth.saturating_sub(1),
                _ => {}
            }
            self.cursor += symbol.len();
            self.push(TokenKind::Symbol(*symbol), start);
            return Ok(());
        }

        Err(TemplateError::parse(
            format!("Unexpected character '{}'", first),
            self.position(start),
        ))
    }

    fn lex_string(&mut self, quote: char) -> TemplateResult<()> {
        let start = self.cursor;
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.cursor += idx + c.len_utf8();
                self.push(TokenKind::Str(value), start);
                return Ok(());
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        Err(TemplateError::parse("Unterminated string literal", self.position(start)))
    }

    fn lex_number(&mut self) -> TemplateResult<()> {
        let start = self.cursor;
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        let mut is_float = false;
        if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).is_some_and(u8::is_ascii_digit) {
            is_float = true;
            len += 1;
            len += bytes[len..].iter().take_while(|b| b.is_ascii_digit()).count();
        }
        let literal = &rest[..len];
        let parsed = if is_float {
            literal.parse().map(TokenKind::Float).ok()
        } else {
            literal.parse().map(TokenKind::Integer).ok()
        };
        let Some(kind) = parsed else {
            return Err(TemplateError::parse(
                format!("Invalid number '{}'", literal),
                self.position(start),
            ));
        };
        self.cursor += len;
        self.push(kind, start);
        Ok(())
    }
}
