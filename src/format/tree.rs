//! Offset-carrying parse tree for JSON with comments.

use super::scanner::{ScanError, Scanner, SyntaxKind};
use serde_json::{Map, Number, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    Property,
    String,
    Number,
    Boolean,
    Null,
}

/// A node of the parse tree.
///
/// Property nodes span from the start of the key to the end of the value and
/// have exactly two children: the key (a string node) and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub offset: usize,
    pub length: usize,
    pub children: Vec<Node>,
    /// Decoded literal for leaf nodes; `Null` for containers and properties.
    pub value: Value,
}

impl Node {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Key of a property node.
    pub fn key(&self) -> Option<&str> {
        if self.kind != NodeKind::Property {
            return None;
        }
        self.children.first().and_then(|k| k.value.as_str())
    }

    /// Value node of a property.
    pub fn property_value(&self) -> Option<&Node> {
        if self.kind != NodeKind::Property {
            return None;
        }
        self.children.get(1)
    }

    /// Plain value view of this node.
    pub fn to_value(&self) -> Value {
        match self.kind {
            NodeKind::Object => {
                let mut map = Map::new();
                for property in &self.children {
                    if let (Some(key), Some(value)) = (property.key(), property.property_value()) {
                        map.insert(key.to_string(), value.to_value());
                    }
                }
                Value::Object(map)
            }
            NodeKind::Array => Value::Array(self.children.iter().map(Node::to_value).collect()),
            NodeKind::Property => self
                .property_value()
                .map(Node::to_value)
                .unwrap_or(Value::Null),
            _ => self.value.clone(),
        }
    }
}

/// A segment of a location inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    /// One past the last element of an array.
    Append,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "{index}"),
            PathSegment::Append => write!(f, "-1"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Render a path as `a.b[0].c` for messages.
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            other => {
                out.push('[');
                out.push_str(&other.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Find the node addressed by `path`, starting at `root`.
pub fn find_node<'a>(root: &'a Node, path: &[PathSegment]) -> Option<&'a Node> {
    let mut node = root;
    for segment in path {
        node = match segment {
            PathSegment::Key(key) => {
                if node.kind != NodeKind::Object {
                    return None;
                }
                node.children
                    .iter()
                    .find(|p| p.key() == Some(key.as_str()))
                    .and_then(Node::property_value)?
            }
            PathSegment::Index(index) => {
                if node.kind != NodeKind::Array {
                    return None;
                }
                node.children.get(*index)?
            }
            PathSegment::Append => return None,
        };
    }
    Some(node)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidSymbol,
    InvalidNumberFormat,
    PropertyNameExpected,
    ValueExpected,
    ColonExpected,
    CommaExpected,
    CloseBraceExpected,
    CloseBracketExpected,
    EndOfFileExpected,
    InvalidCommentToken,
    TrailingCommaNotAllowed,
    UnexpectedEndOfComment,
    UnexpectedEndOfString,
    UnexpectedEndOfNumber,
    InvalidUnicode,
    InvalidEscapeCharacter,
    InvalidCharacter,
    NestingTooDeep,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub length: usize,
}

/// Deepest nesting of objects and arrays accepted, matching `serde_json`.
pub const MAX_NESTING_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub allow_comments: bool,
    pub allow_trailing_comma: bool,
}

impl ParseOptions {
    pub const JSON: ParseOptions = ParseOptions {
        allow_comments: false,
        allow_trailing_comma: false,
    };
    pub const JSONC: ParseOptions = ParseOptions {
        allow_comments: true,
        allow_trailing_comma: true,
    };
}

/// Parse `text` into a tree. Returns `Ok(None)` for a document without any
/// value (empty, or only whitespace and comments).
pub fn parse_tree(text: &str, options: ParseOptions) -> Result<Option<Node>, ParseError> {
    let mut parser = Parser {
        scanner: Scanner::new(text, true),
        options,
        depth: 0,
    };
    parser.advance()?;
    if parser.token() == SyntaxKind::Eof {
        return Ok(None);
    }
    let root = parser.parse_value()?;
    if parser.token() != SyntaxKind::Eof {
        return Err(parser.error(ParseErrorKind::EndOfFileExpected));
    }
    Ok(Some(root))
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    options: ParseOptions,
    depth: usize,
}

impl Parser<'_> {
    fn token(&self) -> SyntaxKind {
        self.scanner.token()
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.scanner.token_offset(),
            length: self.scanner.token_len(),
        }
    }

    /// Move to the next significant token, skipping comments.
    fn advance(&mut self) -> Result<SyntaxKind, ParseError> {
        loop {
            let token = self.scanner.scan();
            let scan_error = match self.scanner.token_error() {
                ScanError::None => None,
                ScanError::UnexpectedEndOfComment => Some(ParseErrorKind::UnexpectedEndOfComment),
                ScanError::UnexpectedEndOfString => Some(ParseErrorKind::UnexpectedEndOfString),
                ScanError::UnexpectedEndOfNumber => Some(ParseErrorKind::UnexpectedEndOfNumber),
                ScanError::InvalidUnicode => Some(ParseErrorKind::InvalidUnicode),
                ScanError::InvalidEscapeCharacter => Some(ParseErrorKind::InvalidEscapeCharacter),
                ScanError::InvalidCharacter => Some(ParseErrorKind::InvalidCharacter),
            };
            if let Some(kind) = scan_error {
                return Err(self.error(kind));
            }
            match token {
                SyntaxKind::LineComment | SyntaxKind::BlockComment => {
                    if !self.options.allow_comments {
                        return Err(self.error(ParseErrorKind::InvalidCommentToken));
                    }
                }
                SyntaxKind::Unknown => return Err(self.error(ParseErrorKind::InvalidSymbol)),
                _ => return Ok(token),
            }
        }
    }

    fn parse_value(&mut self) -> Result<Node, ParseError> {
        match self.token() {
            SyntaxKind::OpenBrace | SyntaxKind::OpenBracket => {
                if self.depth >= MAX_NESTING_DEPTH {
                    return Err(self.error(ParseErrorKind::NestingTooDeep));
                }
                self.depth += 1;
                let node = if self.token() == SyntaxKind::OpenBrace {
                    self.parse_object()
                } else {
                    self.parse_array()
                };
                self.depth -= 1;
                node
            }
            SyntaxKind::String => self.parse_string(),
            _ => self.parse_literal(),
        }
    }

    fn leaf(&self, kind: NodeKind, value: Value) -> Node {
        Node {
            kind,
            offset: self.scanner.token_offset(),
            length: self.scanner.token_len(),
            children: Vec::new(),
            value,
        }
    }

    fn parse_string(&mut self) -> Result<Node, ParseError> {
        let node = self.leaf(
            NodeKind::String,
            Value::String(self.scanner.token_value().to_string()),
        );
        self.advance()?;
        Ok(node)
    }

    fn parse_literal(&mut self) -> Result<Node, ParseError> {
        let node = match self.token() {
            SyntaxKind::Number => {
                let literal = self.scanner.token_value();
                let number = serde_json::from_str::<Number>(literal)
                    .map_err(|_| self.error(ParseErrorKind::InvalidNumberFormat))?;
                self.leaf(NodeKind::Number, Value::Number(number))
            }
            SyntaxKind::True => self.leaf(NodeKind::Boolean, Value::Bool(true)),
            SyntaxKind::False => self.leaf(NodeKind::Boolean, Value::Bool(false)),
            SyntaxKind::Null => self.leaf(NodeKind::Null, Value::Null),
            _ => return Err(self.error(ParseErrorKind::ValueExpected)),
        };
        self.advance()?;
        Ok(node)
    }

    fn parse_object(&mut self) -> Result<Node, ParseError> {
        let offset = self.scanner.token_offset();
        let mut children = Vec::new();
        self.advance()?;
        let mut need_comma = false;
        while !matches!(self.token(), SyntaxKind::CloseBrace | SyntaxKind::Eof) {
            if self.token() == SyntaxKind::Comma {
                if !need_comma {
                    return Err(self.error(ParseErrorKind::ValueExpected));
                }
                let comma = self.error(ParseErrorKind::TrailingCommaNotAllowed);
                self.advance()?;
                if self.token() == SyntaxKind::CloseBrace {
                    if !self.options.allow_trailing_comma {
                        return Err(comma);
                    }
                    break;
                }
            } else if need_comma {
                return Err(self.error(ParseErrorKind::CommaExpected));
            }
            children.push(self.parse_property()?);
            need_comma = true;
        }
        if self.token() != SyntaxKind::CloseBrace {
            return Err(self.error(ParseErrorKind::CloseBraceExpected));
        }
        let end = self.scanner.token_end();
        self.advance()?;
        Ok(Node {
            kind: NodeKind::Object,
            offset,
            length: end - offset,
            children,
            value: Value::Null,
        })
    }

    fn parse_property(&mut self) -> Result<Node, ParseError> {
        if self.token() != SyntaxKind::String {
            return Err(self.error(ParseErrorKind::PropertyNameExpected));
        }
        let key = self.parse_string()?;
        if self.token() != SyntaxKind::Colon {
            return Err(self.error(ParseErrorKind::ColonExpected));
        }
        self.advance()?;
        let value = self.parse_value()?;
        Ok(Node {
            kind: NodeKind::Property,
            offset: key.offset,
            length: value.end() - key.offset,
            children: vec![key, value],
            value: Value::Null,
        })
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        let offset = self.scanner.token_offset();
        let mut children = Vec::new();
        self.advance()?;
        let mut need_comma = false;
        while !matches!(self.token(), SyntaxKind::CloseBracket | SyntaxKind::Eof) {
            if self.token() == SyntaxKind::Comma {
                if !need_comma {
                    return Err(self.error(ParseErrorKind::ValueExpected));
                }
                let comma = self.error(ParseErrorKind::TrailingCommaNotAllowed);
                self.advance()?;
                if self.token() == SyntaxKind::CloseBracket {
                    if !self.options.allow_trailing_comma {
                        return Err(comma);
                    }
                    break;
                }
            } else if need_comma {
                return Err(self.error(ParseErrorKind::CommaExpected));
            }
            children.push(self.parse_value()?);
            need_comma = true;
        }
        if self.token() != SyntaxKind::CloseBracket {
            return Err(self.error(ParseErrorKind::CloseBracketExpected));
        }
        let end = self.scanner.token_end();
        self.advance()?;
        Ok(Node {
            kind: NodeKind::Array,
            offset,
            length: end - offset,
            children,
            value: Value::Null,
        })
    }
}
