//! Encodes messages as YAML.
//!
//! A message is first lowered to a [`Node`] tree shaped like its canonical
//! JSON form, then written out in block style.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::trace;
use prost_reflect::{
    Cardinality, DynamicMessage, EnumDescriptor, Kind, MapKey, ReflectMessage, Value,
};

use crate::duration::format_duration;
use crate::emit::{YamlWrite, emit};
use crate::error::{MarshalError, Result};
use crate::field::{Field, TypeResolver};
use crate::node::{BOOL_TAG, FLOAT_TAG, INT_TAG, Node};
use crate::timestamp::format_timestamp;
use crate::wkt;

const DEFAULT_INDENT: usize = 4;

/// Configuration for encoding messages as YAML.
#[derive(Clone, Default)]
pub struct MarshalOptions {
    indent: usize,
    allow_partial: bool,
    use_proto_names: bool,
    use_enum_numbers: bool,
    emit_unpopulated: bool,
    resolver: Option<Arc<dyn TypeResolver>>,
}

impl fmt::Debug for MarshalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalOptions")
            .field("indent", &self.indent)
            .field("allow_partial", &self.allow_partial)
            .field("use_proto_names", &self.use_proto_names)
            .field("use_enum_numbers", &self.use_enum_numbers)
            .field("emit_unpopulated", &self.emit_unpopulated)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl MarshalOptions {
    /// Creates options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spaces per nesting level. `0` selects the default of 4.
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Encodes messages with unset required fields.
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Uses proto field names instead of lowerCamelCase names as keys.
    pub fn use_proto_names(mut self, enable: bool) -> Self {
        self.use_proto_names = enable;
        self
    }

    /// Writes enum values as numbers instead of names.
    pub fn use_enum_numbers(mut self, enable: bool) -> Self {
        self.use_enum_numbers = enable;
        self
    }

    /// Writes fields that are not set.
    pub fn emit_unpopulated(mut self, enable: bool) -> Self {
        self.emit_unpopulated = enable;
        self
    }

    /// Resolves `Any` type URLs with `resolver` instead of the descriptor
    /// pool of the encoded message.
    pub fn resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Encodes `message` as a YAML document.
    pub fn marshal<M: ReflectMessage>(&self, message: &M) -> Result<String> {
        let mut out = String::new();
        self.marshal_to_writer(message, &mut out)?;
        Ok(out)
    }

    /// Encodes `message` as a YAML document into `writer`.
    pub fn marshal_to_writer<M: ReflectMessage, W: YamlWrite>(
        &self,
        message: &M,
        mut writer: W,
    ) -> Result<()> {
        let node = self.to_node(message)?;
        let indent = if self.indent == 0 {
            DEFAULT_INDENT
        } else {
            self.indent
        };
        emit(&node, indent, &mut writer);
        Ok(())
    }

    /// Lowers `message` to a document tree without writing it.
    pub fn to_node<M: ReflectMessage>(&self, message: &M) -> core::result::Result<Node, MarshalError> {
        let message = message.transcode_to_dynamic();
        let resolver: Arc<dyn TypeResolver> = match &self.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(message.descriptor().parent_pool().clone()),
        };
        let marshaler = Marshaler {
            options: self,
            resolver,
        };
        marshaler.message_to_node(&message)
    }
}

struct Marshaler<'a> {
    options: &'a MarshalOptions,
    resolver: Arc<dyn TypeResolver>,
}

impl Marshaler<'_> {
    fn message_to_node(&self, message: &DynamicMessage) -> core::result::Result<Node, MarshalError> {
        let desc = message.descriptor();
        trace!("serializing {}", desc.full_name());
        if let Some(node) = self.well_known_to_node(message)? {
            return Ok(node);
        }

        let mut pairs = Vec::new();
        for field in desc.fields() {
            let populated = message.has_field(&field);
            if !populated && !self.options.allow_partial && field.cardinality() == Cardinality::Required {
                return Err(MarshalError::RequiredNotSet {
                    field: field.full_name().to_string(),
                });
            }
            if !populated && (!self.options.emit_unpopulated || field.containing_oneof().is_some()) {
                continue;
            }
            let key = if self.options.use_proto_names {
                field.name()
            } else {
                field.json_name()
            };
            let explicit_null = !populated
                && !field.is_list()
                && !field.is_map()
                && (field.supports_presence() || field.kind().as_message().is_some());
            let value = if explicit_null {
                Node::null()
            } else {
                self.field_to_node(&field.clone().into(), &message.get_field(&field))?
            };
            pairs.push((Node::string(key), value));
        }

        let mut extensions: Vec<_> = message.extensions().collect();
        extensions.sort_by_key(|(ext, _)| ext.number());
        for (ext, value) in extensions {
            let key = format!("[{}]", ext.full_name());
            let value = self.field_to_node(&ext.clone().into(), value)?;
            pairs.push((Node::string(key), value));
        }

        Ok(Node::mapping(pairs))
    }

    fn field_to_node(&self, field: &Field, value: &Value) -> core::result::Result<Node, MarshalError> {
        let kind = field.kind();
        match value {
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.single_to_node(&kind, item))
                    .collect::<core::result::Result<Vec<_>, _>>()?;
                Ok(Node::sequence(items))
            }
            Value::Map(entries) => {
                let value_kind = match field.map_entry() {
                    Some((_, value_field)) => value_field.kind(),
                    None => kind,
                };
                let mut sorted: Vec<_> = entries.iter().collect();
                sorted.sort_by(|(a, _), (b, _)| compare_map_keys(a, b));
                let pairs = sorted
                    .into_iter()
                    .map(|(key, value)| Ok((map_key_to_node(key), self.single_to_node(&value_kind, value)?)))
                    .collect::<core::result::Result<Vec<_>, MarshalError>>()?;
                Ok(Node::mapping(pairs))
            }
            value => self.single_to_node(&kind, value),
        }
    }

    fn single_to_node(&self, kind: &Kind, value: &Value) -> core::result::Result<Node, MarshalError> {
        let node = match value {
            Value::Bool(v) => bool_node(*v),
            Value::I32(v) => int_node(*v),
            Value::I64(v) => int_node(*v),
            Value::U32(v) => int_node(*v),
            Value::U64(v) => int_node(*v),
            Value::F32(v) => float_node(f64::from(*v), ryu::Buffer::new().format(*v)),
            Value::F64(v) => float_node(*v, ryu::Buffer::new().format(*v)),
            Value::String(v) => Node::string(v.as_str()),
            Value::Bytes(v) => Node::string(STANDARD.encode(v)),
            Value::EnumNumber(number) => match kind {
                Kind::Enum(desc) => self.enum_to_node(desc, *number),
                _ => int_node(*number),
            },
            Value::Message(message) => self.message_to_node(message)?,
            Value::List(_) | Value::Map(_) => {
                return Err(MarshalError::InvalidValue {
                    message: format!("{kind:?}"),
                    reason: "nested collection".into(),
                });
            }
        };
        Ok(node)
    }

    fn enum_to_node(&self, desc: &EnumDescriptor, number: i32) -> Node {
        if desc.full_name() == wkt::NULL_VALUE {
            return Node::null();
        }
        if !self.options.use_enum_numbers {
            if let Some(value) = desc.get_value(number) {
                return Node::string(value.name());
            }
        }
        int_node(number)
    }

    // ========================================================================
    // Well-known types
    // ========================================================================

    fn well_known_to_node(
        &self,
        message: &DynamicMessage,
    ) -> core::result::Result<Option<Node>, MarshalError> {
        let desc = message.descriptor();
        let name = desc.full_name();
        let node = match name {
            wkt::ANY => self.any_to_node(message)?,
            wkt::DURATION => {
                let duration: prost_types::Duration = transcode(message)?;
                let text = format_duration(&duration).ok_or_else(|| MarshalError::InvalidValue {
                    message: name.to_string(),
                    reason: format!("seconds {} and nanos {} are out of range", duration.seconds, duration.nanos),
                })?;
                Node::string(text)
            }
            wkt::TIMESTAMP => {
                let timestamp: prost_types::Timestamp = transcode(message)?;
                let text = format_timestamp(&timestamp).ok_or_else(|| MarshalError::InvalidValue {
                    message: name.to_string(),
                    reason: format!("seconds {} and nanos {} are out of range", timestamp.seconds, timestamp.nanos),
                })?;
                Node::string(text)
            }
            wkt::VALUE => {
                let value: prost_types::Value = transcode(message)?;
                value_to_node(&value)?
            }
            wkt::LIST_VALUE => {
                let list: prost_types::ListValue = transcode(message)?;
                list_to_node(&list)?
            }
            wkt::STRUCT => {
                let fields: prost_types::Struct = transcode(message)?;
                struct_to_node(&fields)?
            }
            name if wkt::WRAPPERS.contains(&name) => {
                let Some(field) = desc.get_field_by_name("value") else {
                    return Ok(None);
                };
                self.field_to_node(&field.clone().into(), &message.get_field(&field))?
            }
            _ => return Ok(None),
        };
        Ok(Some(node))
    }

    /// An `Any` becomes its payload's mapping with a leading `@type` key.
    /// Payloads that are not mappings sit under `value`.
    fn any_to_node(&self, message: &DynamicMessage) -> core::result::Result<Node, MarshalError> {
        let any: prost_types::Any = transcode(message)?;
        if any.type_url.is_empty() && any.value.is_empty() {
            return Ok(Node::mapping(Vec::new()));
        }
        let desc = self
            .resolver
            .find_message_by_url(&any.type_url)
            .ok_or_else(|| MarshalError::UnknownType {
                url: any.type_url.clone(),
            })?;
        let payload = DynamicMessage::decode(desc.clone(), any.value.as_slice()).map_err(|e| {
            MarshalError::InvalidPayload {
                message: desc.full_name().to_string(),
                reason: e.to_string(),
            }
        })?;
        let inner = self.message_to_node(&payload)?;
        let type_pair = (Node::string("@type"), Node::string(any.type_url));
        if wkt::has_custom_representation(desc.full_name()) {
            return Ok(Node::mapping(vec![type_pair, (Node::string("value"), inner)]));
        }
        let mut node = Node::mapping(vec![type_pair]);
        node.children.extend(inner.children);
        Ok(node)
    }
}

fn transcode<T: prost::Message + Default>(
    message: &DynamicMessage,
) -> core::result::Result<T, MarshalError> {
    message
        .transcode_to::<T>()
        .map_err(|e| MarshalError::InvalidPayload {
            message: message.descriptor().full_name().to_string(),
            reason: e.to_string(),
        })
}

fn value_to_node(value: &prost_types::Value) -> core::result::Result<Node, MarshalError> {
    use prost_types::value::Kind as ValueKind;
    let node = match &value.kind {
        Some(ValueKind::NullValue(_)) => Node::null(),
        Some(ValueKind::NumberValue(v)) => float_node(*v, ryu::Buffer::new().format(*v)),
        Some(ValueKind::StringValue(v)) => Node::string(v.as_str()),
        Some(ValueKind::BoolValue(v)) => bool_node(*v),
        Some(ValueKind::StructValue(v)) => struct_to_node(v)?,
        Some(ValueKind::ListValue(v)) => list_to_node(v)?,
        None => {
            return Err(MarshalError::InvalidValue {
                message: wkt::VALUE.to_string(),
                reason: "none of the oneof fields is set".into(),
            });
        }
    };
    Ok(node)
}

fn list_to_node(list: &prost_types::ListValue) -> core::result::Result<Node, MarshalError> {
    let items = list
        .values
        .iter()
        .map(value_to_node)
        .collect::<core::result::Result<Vec<_>, _>>()?;
    Ok(Node::sequence(items))
}

fn struct_to_node(fields: &prost_types::Struct) -> core::result::Result<Node, MarshalError> {
    // BTreeMap iteration is already sorted by key.
    let pairs = fields
        .fields
        .iter()
        .map(|(key, value)| Ok((Node::string(key.as_str()), value_to_node(value)?)))
        .collect::<core::result::Result<Vec<_>, MarshalError>>()?;
    Ok(Node::mapping(pairs))
}

// ============================================================================
// Scalars
// ============================================================================

fn bool_node(value: bool) -> Node {
    Node::scalar(BOOL_TAG, if value { "true" } else { "false" })
}

fn int_node<I: itoa::Integer>(value: I) -> Node {
    Node::scalar(INT_TAG, itoa::Buffer::new().format(value))
}

/// `formatted` is the shortest round-trip text of `value`.
fn float_node(value: f64, formatted: &str) -> Node {
    if value.is_nan() {
        return Node::string("nan");
    }
    if value.is_infinite() {
        return Node::string(if value > 0.0 { "inf" } else { "-inf" });
    }
    let text = formatted.strip_suffix(".0").unwrap_or(formatted);
    Node::scalar(FLOAT_TAG, text)
}

fn map_key_to_node(key: &MapKey) -> Node {
    match key {
        MapKey::Bool(v) => bool_node(*v),
        MapKey::I32(v) => int_node(*v),
        MapKey::I64(v) => int_node(*v),
        MapKey::U32(v) => int_node(*v),
        MapKey::U64(v) => int_node(*v),
        MapKey::String(v) => Node::string(v.as_str()),
    }
}

fn compare_map_keys(a: &MapKey, b: &MapKey) -> Ordering {
    match (a, b) {
        (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
        (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
        (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
        (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
        (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
        (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Encodes a message as a YAML document with the default options.
pub fn to_string<M: ReflectMessage>(message: &M) -> Result<String> {
    MarshalOptions::default().marshal(message)
}

/// Encodes a dynamic message as a YAML document with the default options.
pub fn to_string_dynamic(message: &DynamicMessage) -> Result<String> {
    MarshalOptions::default().marshal(message)
}

/// Encodes a message as a YAML document into `writer`.
pub fn to_writer<M: ReflectMessage, W: YamlWrite>(message: &M, writer: W) -> Result<()> {
    MarshalOptions::default().marshal_to_writer(message, writer)
}
