//! Document tree produced from YAML text.
//!
//! The tree mirrors what the decoder needs from a YAML document and nothing
//! more: a kind, a resolved short tag, the raw scalar text, ordered children
//! (mapping children alternate key/value) and a 1-based source position.

use core::fmt;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::error::Error;
use crate::span::{Span, Spanned};

pub(crate) const NULL_TAG: &str = "!!null";
pub(crate) const BOOL_TAG: &str = "!!bool";
pub(crate) const INT_TAG: &str = "!!int";
pub(crate) const FLOAT_TAG: &str = "!!float";
pub(crate) const STR_TAG: &str = "!!str";
pub(crate) const SEQ_TAG: &str = "!!seq";
pub(crate) const MAP_TAG: &str = "!!map";

const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// The shape of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// No node at all (an empty document).
    Null,
    /// A leaf value.
    Scalar,
    /// An ordered list of nodes.
    Sequence,
    /// Alternating key/value nodes.
    Mapping,
    /// A reference to an anchored node. Aliases are not resolved.
    Alias,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Null => "null",
            NodeKind::Scalar => "scalar",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
            NodeKind::Alias => "alias",
        };
        f.write_str(name)
    }
}

/// A node of a parsed YAML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The node kind.
    pub kind: NodeKind,
    /// Short form of the resolved or explicit tag (`!!str`, `!!int`, `!foo`).
    pub tag: String,
    /// Raw scalar text. Empty for collections.
    pub value: String,
    /// Child nodes. A mapping stores `[key, value, key, value, ...]`.
    pub children: Vec<Node>,
    /// 1-based source line, 0 for synthesized nodes.
    pub line: usize,
    /// 1-based source column, 0 for synthesized nodes.
    pub column: usize,
}

impl Node {
    /// A scalar with an explicit tag and no source position.
    pub fn scalar(tag: &str, value: impl Into<String>) -> Self {
        Node {
            kind: NodeKind::Scalar,
            tag: tag.to_string(),
            value: value.into(),
            children: Vec::new(),
            line: 0,
            column: 0,
        }
    }

    /// A string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Node::scalar(STR_TAG, value)
    }

    /// The `null` scalar.
    pub fn null() -> Self {
        Node::scalar(NULL_TAG, "null")
    }

    /// A sequence of the given items.
    pub fn sequence(items: Vec<Node>) -> Self {
        Node {
            kind: NodeKind::Sequence,
            tag: SEQ_TAG.to_string(),
            value: String::new(),
            children: items,
            line: 0,
            column: 0,
        }
    }

    /// A mapping built from key/value pairs.
    pub fn mapping(pairs: Vec<(Node, Node)>) -> Self {
        let mut children = Vec::with_capacity(pairs.len() * 2);
        for (key, value) in pairs {
            children.push(key);
            children.push(value);
        }
        Node {
            kind: NodeKind::Mapping,
            tag: MAP_TAG.to_string(),
            value: String::new(),
            children,
            line: 0,
            column: 0,
        }
    }

    /// Returns `true` if the node carries the `!!null` tag.
    pub fn is_null(&self) -> bool {
        self.tag == NULL_TAG
    }

    /// Iterates over the key/value pairs of a mapping node.
    pub fn pairs(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.children
            .chunks_exact(2)
            .map(|pair| (&pair[0], &pair[1]))
    }
}

/// Parses YAML text into a document tree.
///
/// Returns `Ok(None)` for a stream without any document content. A stream
/// holding more than one document is rejected with
/// [`Error::MultipleDocuments`] rather than decoding the first one and
/// ignoring the rest.
pub fn parse(source: &str) -> Result<Option<Node>, Error> {
    let mut builder = TreeBuilder::new(source);
    let mut parser = Parser::new_from_str(source);
    parser.load(&mut builder, true).map_err(|err| {
        let marker = err.marker();
        let column = marker.col() + 1;
        Error::Syntax {
            message: Spanned {
                node: err.info().to_string(),
                span: Span::from_line_column(source, marker.line(), column, 1),
            },
            source_code: Some(source.to_string()),
        }
    })?;

    let mut roots = builder.roots.into_iter();
    let root = roots.next();
    if roots.next().is_some() {
        return Err(Error::MultipleDocuments);
    }
    Ok(root)
}

struct TreeBuilder<'a> {
    lines: Vec<&'a str>,
    stack: Vec<Node>,
    roots: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        TreeBuilder {
            lines: source.split('\n').collect(),
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    // The scanner reports an omitted value as a plain `~`; yaml text that
    // really says `~` is told apart by looking at the source.
    fn is_written(&self, mark: &Marker, text: &str) -> bool {
        self.lines
            .get(mark.line().wrapping_sub(1))
            .and_then(|line| line.chars().nth(mark.col()))
            .is_some_and(|c| text.starts_with(c))
    }
}

impl TreeBuilder<'_> {
    fn is_flow_start(&self, node: &Node) -> bool {
        self.lines
            .get(node.line.wrapping_sub(1))
            .and_then(|line| line.chars().nth(node.column.wrapping_sub(1)))
            == Some('{')
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        let (line, column) = (mark.line(), mark.col() + 1);
        match event {
            Event::Scalar(mut value, style, _, tag) => {
                if style == TScalarStyle::Plain && value == "~" && !self.is_written(&mark, "~") {
                    value.clear();
                }
                let tag = match tag {
                    Some(tag) => short_tag(&tag),
                    None if style != TScalarStyle::Plain => STR_TAG.to_string(),
                    None => resolve_plain(&value).to_string(),
                };
                self.push(Node {
                    kind: NodeKind::Scalar,
                    tag,
                    value,
                    children: Vec::new(),
                    line,
                    column,
                });
            }
            Event::SequenceStart(_, tag) => self.stack.push(Node {
                kind: NodeKind::Sequence,
                tag: tag.map_or_else(|| SEQ_TAG.to_string(), |t| short_tag(&t)),
                value: String::new(),
                children: Vec::new(),
                line,
                column,
            }),
            Event::MappingStart(_, tag) => self.stack.push(Node {
                kind: NodeKind::Mapping,
                tag: tag.map_or_else(|| MAP_TAG.to_string(), |t| short_tag(&t)),
                value: String::new(),
                children: Vec::new(),
                line,
                column,
            }),
            Event::SequenceEnd => {
                if let Some(node) = self.stack.pop() {
                    self.push(node);
                }
            }
            Event::MappingEnd => {
                if let Some(mut node) = self.stack.pop() {
                    // A block mapping starts at its first key.
                    if !self.is_flow_start(&node) {
                        if let Some(first) = node.children.first() {
                            (node.line, node.column) = (first.line, first.column);
                        }
                    }
                    self.push(node);
                }
            }
            Event::Alias(_) => self.push(Node {
                kind: NodeKind::Alias,
                tag: String::new(),
                value: String::new(),
                children: Vec::new(),
                line,
                column,
            }),
            _ => {}
        }
    }
}

fn short_tag(tag: &Tag) -> String {
    let full = format!("{}{}", tag.handle, tag.suffix);
    if let Some(rest) = full.strip_prefix(YAML_TAG_PREFIX) {
        format!("!!{rest}")
    } else {
        full
    }
}

/// Resolves the tag of an untagged plain scalar using the YAML 1.2 core
/// schema.
pub(crate) fn resolve_plain(value: &str) -> &'static str {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => NULL_TAG,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => BOOL_TAG,
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf" | "-.INF"
        | ".nan" | ".NaN" | ".NAN" => FLOAT_TAG,
        _ if is_int(value) => INT_TAG,
        _ if is_float(value) => FLOAT_TAG,
        _ => STR_TAG,
    }
}

fn is_int(value: &str) -> bool {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (body, radix) = if let Some(rest) = unsigned.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = unsigned.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = unsigned.strip_prefix("0b") {
        (rest, 2)
    } else {
        (unsigned, 10)
    };
    body.chars().any(|c| c != '_') && body.chars().all(|c| c == '_' || c.is_digit(radix))
}

// [-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?
fn is_float(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'-' | b'+')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}
