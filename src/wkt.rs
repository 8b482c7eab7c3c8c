//! Decoding rules for the well-known types.

use alloc::sync::Arc;
use std::collections::HashMap;

use prost::Message as _;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};

use crate::deserialize::{CustomUnmarshaler, Unmarshaler};
use crate::duration::parse_duration;
use crate::error::DecodeErrorKind;
use crate::field::type_url;
use crate::node::{Node, NodeKind};
use crate::timestamp::parse_timestamp;

pub(crate) const ANY: &str = "google.protobuf.Any";
pub(crate) const DURATION: &str = "google.protobuf.Duration";
pub(crate) const TIMESTAMP: &str = "google.protobuf.Timestamp";
pub(crate) const VALUE: &str = "google.protobuf.Value";
pub(crate) const LIST_VALUE: &str = "google.protobuf.ListValue";
pub(crate) const STRUCT: &str = "google.protobuf.Struct";
pub(crate) const NULL_VALUE: &str = "google.protobuf.NullValue";

pub(crate) const WRAPPERS: [&str; 9] = [
    "google.protobuf.BoolValue",
    "google.protobuf.BytesValue",
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int32Value",
    "google.protobuf.Int64Value",
    "google.protobuf.UInt32Value",
    "google.protobuf.UInt64Value",
    "google.protobuf.StringValue",
];

/// Types whose YAML form is not a mapping of their fields. Inside an `Any`
/// their payload sits under a `value` key.
pub(crate) fn has_custom_representation(full_name: &str) -> bool {
    matches!(
        full_name,
        ANY | DURATION | TIMESTAMP | VALUE | LIST_VALUE | STRUCT
    ) || WRAPPERS.contains(&full_name)
}

/// The decoders every [`Unmarshaler`] starts with.
pub(crate) fn builtin_unmarshalers() -> HashMap<String, CustomUnmarshaler> {
    let mut table: HashMap<String, CustomUnmarshaler> = HashMap::new();
    table.insert(ANY.into(), Arc::new(unmarshal_any));
    table.insert(DURATION.into(), Arc::new(unmarshal_duration));
    table.insert(TIMESTAMP.into(), Arc::new(unmarshal_timestamp));
    for name in WRAPPERS {
        table.insert(name.into(), Arc::new(unmarshal_wrapper));
    }
    table.insert(VALUE.into(), Arc::new(unmarshal_value_msg));
    table.insert(LIST_VALUE.into(), Arc::new(unmarshal_list_value_msg));
    table.insert(STRUCT.into(), Arc::new(unmarshal_struct_msg));
    table
}

/// Replaces the contents of `message` with a generated well-known value.
pub(crate) fn store<T: prost::Message>(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
    value: &T,
) {
    message.clear();
    if let Err(e) = message.transcode_from(value) {
        unm.add_error(
            node,
            DecodeErrorKind::Custom(format!(
                "failed to store {}: {e}",
                message.descriptor().full_name()
            )),
        );
    }
}

fn unmarshal_any(unm: &mut Unmarshaler<'_>, node: &Node, message: &mut DynamicMessage) -> bool {
    if node.kind != NodeKind::Mapping || node.children.is_empty() {
        return false;
    }
    log::trace!("unmarshal_any");
    let Some(url_node) = type_url_node(node) else {
        unm.add_error(node, DecodeErrorKind::MissingType);
        return true;
    };
    let Some(desc) = unm.resolve_any_type(node, url_node) else {
        return true;
    };

    let mut payload = DynamicMessage::new(desc.clone());
    if has_custom_representation(desc.full_name()) {
        for (key, value) in node.pairs() {
            if !unm.check_kind(key, NodeKind::Scalar) {
                continue;
            }
            match key.value.as_str() {
                "@type" => {}
                "value" => unm.unmarshal_message(value, &mut payload),
                _ if unm.options.discard_unknown => {}
                _ => unm.add_error(
                    key,
                    DecodeErrorKind::UnknownField {
                        field: key.value.clone(),
                        expected: vec!["@type".into(), "value".into()],
                        suggestion: None,
                    },
                ),
            }
        }
    } else {
        unm.unmarshal_fields(node, &mut payload, &desc, &[]);
    }

    let any = prost_types::Any {
        type_url: type_url(&desc),
        value: payload.encode_to_vec(),
    };
    store(unm, node, message, &any);
    true
}

/// The value node of the first `@type` key of a mapping.
pub(crate) fn type_url_node(node: &Node) -> Option<&Node> {
    node.pairs()
        .find(|(key, _)| key.value == "@type")
        .map(|(_, value)| value)
}

impl Unmarshaler<'_> {
    /// Resolves the `@type` of an `Any`-shaped mapping. Failures are reported
    /// at `node`.
    pub(crate) fn resolve_any_type(
        &mut self,
        node: &Node,
        url_node: &Node,
    ) -> Option<MessageDescriptor> {
        if !self.check_kind(url_node, NodeKind::Scalar) || url_node.value.is_empty() {
            return None;
        }
        let url = &url_node.value;
        match self.resolver().find_message_by_url(url) {
            Some(desc) => Some(desc),
            None => {
                self.add_error(
                    node,
                    DecodeErrorKind::UnknownType {
                        url: url.clone(),
                        reason: "not found".into(),
                    },
                );
                None
            }
        }
    }
}

fn unmarshal_duration(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
) -> bool {
    if node.kind != NodeKind::Scalar || node.value.is_empty() {
        return false;
    }
    match parse_duration(&node.value) {
        Ok(duration) => store(unm, node, message, &duration),
        Err(e) => unm.add_error(node, DecodeErrorKind::InvalidDuration(e.to_string())),
    }
    true
}

fn unmarshal_timestamp(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
) -> bool {
    if node.kind != NodeKind::Scalar || node.value.is_empty() {
        return false;
    }
    match parse_timestamp(&node.value) {
        Ok(timestamp) => store(unm, node, message, &timestamp),
        Err(e) => unm.add_error(node, DecodeErrorKind::InvalidTimestamp(e)),
    }
    true
}

/// Wrappers are written as their bare `value`.
fn unmarshal_wrapper(unm: &mut Unmarshaler<'_>, node: &Node, message: &mut DynamicMessage) -> bool {
    let Some(value_field) = message.descriptor().get_field_by_name("value") else {
        return false;
    };
    if node.kind == NodeKind::Mapping {
        return false;
    }
    unm.unmarshal_field(node, &value_field.into(), message);
    true
}

fn unmarshal_value_msg(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
) -> bool {
    let value = unm.unmarshal_value(node, None, false);
    store(unm, node, message, &value);
    true
}

fn unmarshal_list_value_msg(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
) -> bool {
    if node.kind != NodeKind::Sequence {
        return false;
    }
    let list = unm.unmarshal_list_value(node, None);
    store(unm, node, message, &list);
    true
}

fn unmarshal_struct_msg(
    unm: &mut Unmarshaler<'_>,
    node: &Node,
    message: &mut DynamicMessage,
) -> bool {
    if node.kind != NodeKind::Mapping {
        return false;
    }
    let value = unm.unmarshal_struct(node, None, None);
    store(unm, node, message, &value);
    true
}
