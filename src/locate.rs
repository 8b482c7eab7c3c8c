//! Maps validator field paths back onto document nodes.
//!
//! Paths look like `foo`, `foo.bar`, `foo[0]` or `foo["key"]`. The walk never
//! fails: it stops at the deepest node it can reach.

use prost_reflect::{FieldDescriptor, MessageDescriptor};

use crate::field::find_field;
use crate::node::{Node, NodeKind};

/// Returns the node closest to `path`, starting from `root` decoded as
/// `message`.
///
/// With `to_key`, a path ending in a map entry yields the entry's key node.
/// An unparsable path yields `root`.
pub fn node_closest_to_path<'n>(
    root: &'n Node,
    message: &MessageDescriptor,
    path: &str,
    to_key: bool,
) -> &'n Node {
    match parse_field_path(path) {
        Some(segments) => find_node_by_path(root, message, &segments, to_key),
        None => root,
    }
}

fn parse_field_path(path: &str) -> Option<Vec<String>> {
    if path.is_empty() {
        return Some(Vec::new());
    }
    let (next, mut rest) = next_field_name(path);
    let mut result = vec![next.to_string()];
    while let Some(first) = rest.as_bytes().first() {
        let (next, remaining) = match first {
            b'[' => next_value(&rest[1..]),
            b'.' => {
                let (name, remaining) = next_field_name(&rest[1..]);
                (name.to_string(), remaining)
            }
            _ => return None,
        };
        result.push(next);
        rest = remaining;
    }
    Some(result)
}

fn next_field_name(path: &str) -> (&str, &str) {
    match path.find(['.', '[']) {
        Some(i) => path.split_at(i),
        None => (path, ""),
    }
}

/// Reads an index or key after `[`, returning it and the text after `]`.
fn next_value(path: &str) -> (String, &str) {
    let bytes = path.as_bytes();
    if bytes.first() == Some(&b'"') {
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'"' => {
                    return match unquote(&path[1..i]) {
                        Some(key) => (key, path.get(i + 2..).unwrap_or("")),
                        None => (String::new(), ""),
                    };
                }
                _ => {}
            }
            i += 1;
        }
        return (path.to_string(), "");
    }
    match path.find(']') {
        Some(i) => (path[..i].to_string(), &path[i + 1..]),
        None => (path.to_string(), ""),
    }
}

fn unquote(text: &str) -> Option<String> {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next()? {
            '"' => result.push('"'),
            '\\' => result.push('\\'),
            '\'' => result.push('\''),
            'n' => result.push('\n'),
            't' => result.push('\t'),
            'r' => result.push('\r'),
            _ => return None,
        }
    }
    Some(result)
}

fn find_node_by_path<'n>(
    root: &'n Node,
    message: &MessageDescriptor,
    path: &[String],
    to_key: bool,
) -> &'n Node {
    let mut cur = root;
    let mut cur_msg = Some(message.clone());
    let mut cur_map: Option<FieldDescriptor> = None;
    for (i, key) in path.iter().enumerate() {
        match cur.kind {
            NodeKind::Mapping => {
                if let Some(msg) = cur_msg.take() {
                    let Some(field) = find_field(key, &msg) else {
                        return cur;
                    };
                    let Some(value) = find_node_by_field(cur, &field) else {
                        return cur;
                    };
                    cur = value;
                    if field.is_map() {
                        cur_map = Some(field);
                    } else {
                        cur_msg = field.kind().as_message().cloned();
                    }
                } else if let Some(map) = cur_map.take() {
                    let Some((key_node, value)) = find_entry_by_key(cur, key) else {
                        return cur;
                    };
                    if i == path.len() - 1 && to_key {
                        return key_node;
                    }
                    cur = value;
                    cur_msg = map
                        .kind()
                        .as_message()
                        .and_then(|entry| entry.map_entry_value_field().kind().as_message().cloned());
                } else {
                    return cur;
                }
            }
            NodeKind::Sequence => match key.parse::<usize>() {
                Ok(idx) if idx < cur.children.len() => cur = &cur.children[idx],
                _ => return cur,
            },
            _ => return cur,
        }
    }
    cur
}

fn find_node_by_field<'n>(cur: &'n Node, field: &FieldDescriptor) -> Option<&'n Node> {
    let number = field.number().to_string();
    cur.pairs()
        .find(|(key, _)| {
            key.value == field.name() || key.value == field.json_name() || key.value == number
        })
        .map(|(_, value)| value)
}

fn find_entry_by_key<'n>(cur: &'n Node, key: &str) -> Option<(&'n Node, &'n Node)> {
    cur.pairs().find(|(k, _)| k.value == key)
}
