//! Block-style YAML text for a [`Node`] tree.

use alloc::string::String;
use alloc::vec::Vec;

use crate::node::{MAP_TAG, Node, NodeKind, STR_TAG, SEQ_TAG, resolve_plain};

/// A sink for YAML output.
pub trait YamlWrite {
    /// Writes a chunk of bytes.
    fn write(&mut self, buf: &[u8]);

    /// Hints that `additional` more bytes are coming.
    fn reserve(&mut self, additional: usize);
}

impl YamlWrite for Vec<u8> {
    fn write(&mut self, buf: &[u8]) {
        self.extend_from_slice(buf);
    }

    fn reserve(&mut self, additional: usize) {
        Vec::reserve(self, additional);
    }
}

impl YamlWrite for String {
    fn write(&mut self, buf: &[u8]) {
        // Emitted chunks are always whole UTF-8 sequences.
        self.push_str(&String::from_utf8_lossy(buf));
    }

    fn reserve(&mut self, additional: usize) {
        String::reserve(self, additional);
    }
}

impl<W: YamlWrite + ?Sized> YamlWrite for &mut W {
    fn write(&mut self, buf: &[u8]) {
        (**self).write(buf);
    }

    fn reserve(&mut self, additional: usize) {
        (**self).reserve(additional);
    }
}

/// Writes `node` as a YAML document, indenting nested blocks by `indent`
/// spaces.
pub fn emit<W: YamlWrite>(node: &Node, indent: usize, writer: &mut W) {
    let mut emitter = Emitter { writer, indent };
    emitter.emit_block(node, 0, true);
}

struct Emitter<'w, W: YamlWrite> {
    writer: &'w mut W,
    indent: usize,
}

impl<W: YamlWrite> Emitter<'_, W> {
    fn write_indent(&mut self, width: usize) {
        for _ in 0..width {
            self.writer.write(b" ");
        }
    }

    fn write_newline(&mut self) {
        self.writer.write(b"\n");
    }

    /// Writes a node whose first line starts at the cursor. Following lines
    /// are indented by `column`.
    fn emit_block(&mut self, node: &Node, column: usize, inline: bool) {
        match node.kind {
            NodeKind::Mapping if !node.children.is_empty() => self.emit_mapping(node, column, inline),
            NodeKind::Sequence if !node.children.is_empty() => {
                self.emit_sequence(node, column, inline)
            }
            NodeKind::Mapping => {
                self.writer.write(b"{}");
                self.write_newline();
            }
            NodeKind::Sequence => {
                self.writer.write(b"[]");
                self.write_newline();
            }
            _ => {
                self.write_scalar(node);
                self.write_newline();
            }
        }
    }

    fn emit_mapping(&mut self, node: &Node, column: usize, inline: bool) {
        for (i, (key, value)) in node.pairs().enumerate() {
            if i > 0 || !inline {
                self.write_indent(column);
            }
            self.write_scalar(key);
            self.writer.write(b":");
            self.emit_value(value, column);
        }
    }

    fn emit_sequence(&mut self, node: &Node, column: usize, inline: bool) {
        for (i, item) in node.children.iter().enumerate() {
            if i > 0 || !inline {
                self.write_indent(column);
            }
            self.writer.write(b"- ");
            self.emit_block(item, column + 2, true);
        }
    }

    /// Writes the value of a mapping pair, starting right after the `:`.
    fn emit_value(&mut self, value: &Node, column: usize) {
        let is_block = matches!(value.kind, NodeKind::Mapping | NodeKind::Sequence)
            && !value.children.is_empty();
        if is_block {
            self.write_newline();
            self.emit_block(value, column + self.indent, false);
        } else {
            self.writer.write(b" ");
            self.emit_block(value, column, true);
        }
    }

    fn write_scalar(&mut self, node: &Node) {
        let text = node.value.as_str();
        let quoted = match node.tag.as_str() {
            STR_TAG => needs_quotes(text),
            MAP_TAG | SEQ_TAG => false,
            _ => text.is_empty(),
        };
        if quoted {
            let escaped = escape_double_quoted(text);
            self.writer.reserve(escaped.len() + 2);
            self.writer.write(b"\"");
            self.writer.write(escaped.as_bytes());
            self.writer.write(b"\"");
        } else {
            self.writer.write(text.as_bytes());
        }
    }
}

const OLD_BOOLS: [&str; 16] = [
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "on", "On", "ON", "off", "Off",
    "OFF",
];

/// Whether a string must be quoted to read back as the same string.
fn needs_quotes(text: &str) -> bool {
    if resolve_plain(text) != STR_TAG || OLD_BOOLS.contains(&text) {
        return true;
    }
    let Some(first) = text.chars().next() else {
        return true;
    };
    if matches!(
        first,
        ' ' | '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
            | '\'' | '"' | '%' | '@' | '`'
    ) {
        return true;
    }
    text.ends_with([' ', ':'])
        || text.contains(": ")
        || text.contains(" #")
        || text.chars().any(|c| c.is_control() || c == '\u{feff}')
}

fn escape_double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{feff}' => out.push_str("\\uFEFF"),
            c if c.is_control() && (c as u32) < 0x100 => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
