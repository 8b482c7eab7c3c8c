//! Recursive descent YAML deserializer driven by message descriptors.
//!
//! The document tree and the message schema are walked together. Errors are
//! collected instead of returned early: a bad node stops descent into that
//! node only, and every sibling is still decoded.

use alloc::sync::Arc;
use core::fmt;
use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use prost::bytes::Bytes;
use prost_reflect::{
    Cardinality, DynamicMessage, EnumDescriptor, Kind, MapKey, MessageDescriptor, ReflectMessage,
    Value,
};

use crate::error::{DecodeErrorKind, Error, NodeError, Result, UnmarshalErrors, find_similar_name};
use crate::field::{Field, TypeResolver, field_names, find_field, truncate_names};
use crate::literal::{parse_float, parse_signed, parse_unsigned};
use crate::locate::node_closest_to_path;
use crate::node::{BOOL_TAG, Node, NodeKind, parse};
use crate::validate::{ValidationError, Validator};
use crate::wkt;

const DEFAULT_RECURSION_LIMIT: usize = 100;
const VALUE_MESSAGE: &str = "google.protobuf.Value";
const NULL_VALUE_ENUM: &str = "google.protobuf.NullValue";

/// Decodes a node into a message of one specific type.
///
/// Returns `true` when the node was handled. Returning `false` falls back to
/// decoding the node as a plain mapping of fields.
pub type CustomUnmarshaler =
    Arc<dyn Fn(&mut Unmarshaler<'_>, &Node, &mut DynamicMessage) -> bool + Send + Sync>;

// ============================================================================
// Options
// ============================================================================

/// Configuration for decoding YAML into messages.
#[derive(Clone)]
pub struct UnmarshalOptions {
    path: String,
    validator: Option<Arc<dyn Validator>>,
    resolver: Option<Arc<dyn TypeResolver>>,
    allow_partial: bool,
    pub(crate) discard_unknown: bool,
    recursion_limit: usize,
    custom: HashMap<String, CustomUnmarshaler>,
}

impl Default for UnmarshalOptions {
    fn default() -> Self {
        UnmarshalOptions {
            path: String::new(),
            validator: None,
            resolver: None,
            allow_partial: false,
            discard_unknown: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            custom: HashMap::new(),
        }
    }
}

impl fmt::Debug for UnmarshalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmarshalOptions")
            .field("path", &self.path)
            .field("validator", &self.validator.is_some())
            .field("resolver", &self.resolver.is_some())
            .field("allow_partial", &self.allow_partial)
            .field("discard_unknown", &self.discard_unknown)
            .field("recursion_limit", &self.recursion_limit)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl UnmarshalOptions {
    /// Creates options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Label printed in front of each rendered error, usually a file path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Runs `validator` on the decoded message.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Resolves `Any` type URLs and extensions with `resolver` instead of the
    /// descriptor pool of the target message.
    pub fn resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Accepts messages with unset required fields.
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Skips mapping keys that name no field instead of reporting them.
    pub fn discard_unknown(mut self, discard: bool) -> Self {
        self.discard_unknown = discard;
        self
    }

    /// Maximum message nesting depth.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Decodes messages named `full_name` with `unmarshaler`. Takes
    /// precedence over the built-in handling of well-known types.
    pub fn custom_unmarshaler<F>(mut self, full_name: impl Into<String>, unmarshaler: F) -> Self
    where
        F: Fn(&mut Unmarshaler<'_>, &Node, &mut DynamicMessage) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(full_name.into(), Arc::new(unmarshaler));
        self
    }

    /// Decodes YAML text into `message`.
    ///
    /// The input must hold at most one document. An empty stream leaves
    /// `message` untouched, and a second document is
    /// [`Error::MultipleDocuments`].
    pub fn unmarshal(&self, input: &str, message: &mut DynamicMessage) -> Result<()> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let root = parse(input)?;
        self.unmarshal_node(root.as_ref(), input, message)
    }

    /// Decodes UTF-8 YAML bytes into `message`.
    pub fn unmarshal_slice(&self, input: &[u8], message: &mut DynamicMessage) -> Result<()> {
        let input = core::str::from_utf8(input).map_err(Error::InvalidUtf8)?;
        self.unmarshal(input, message)
    }

    /// Decodes YAML text into a generated message type.
    pub fn from_str<M>(&self, input: &str) -> Result<M>
    where
        M: ReflectMessage + Default,
    {
        let mut message = DynamicMessage::new(M::default().descriptor());
        self.unmarshal(input, &mut message)?;
        Ok(message.transcode_to::<M>()?)
    }

    /// Decodes an already parsed document. `source` is the text the document
    /// was parsed from and is only used for error snippets.
    ///
    /// A missing root (an empty document) leaves `message` untouched.
    pub fn unmarshal_node(
        &self,
        root: Option<&Node>,
        source: &str,
        message: &mut DynamicMessage,
    ) -> Result<()> {
        let Some(root) = root else {
            return Ok(());
        };
        let descriptor = message.descriptor();
        let mut unm = Unmarshaler::new(self, source, &descriptor);
        unm.unmarshal_message(root, message);

        if let Some(validator) = &self.validator {
            log::debug!("validating {}", descriptor.full_name());
            match validator.validate(message) {
                Ok(()) => {}
                Err(ValidationError::Violations(violations)) => {
                    for violation in violations {
                        let closest = node_closest_to_path(
                            root,
                            &descriptor,
                            &violation.field_path,
                            violation.for_key,
                        );
                        unm.add_error(closest, DecodeErrorKind::Violation(violation));
                    }
                }
                Err(ValidationError::Other(msg)) => {
                    unm.add_error(root, DecodeErrorKind::Validation(msg));
                }
            }
        }

        unm.finish().map_err(Error::from)
    }
}

// ============================================================================
// Decode context
// ============================================================================

/// State for decoding one document.
///
/// Handed to custom unmarshalers so they can report errors and delegate
/// nested decoding back to the generic rules.
pub struct Unmarshaler<'a> {
    pub(crate) options: &'a UnmarshalOptions,
    resolver: Arc<dyn TypeResolver>,
    pub(crate) custom: HashMap<String, CustomUnmarshaler>,
    source: Arc<str>,
    errors: Vec<NodeError>,
    depth: usize,
}

impl<'a> Unmarshaler<'a> {
    fn new(options: &'a UnmarshalOptions, source: &str, root: &MessageDescriptor) -> Self {
        let mut custom = wkt::builtin_unmarshalers();
        custom.extend(
            options
                .custom
                .iter()
                .map(|(name, f)| (name.clone(), Arc::clone(f))),
        );
        let resolver = match &options.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(root.parent_pool().clone()),
        };
        Unmarshaler {
            options,
            resolver,
            custom,
            source: Arc::from(source),
            errors: Vec::new(),
            depth: 0,
        }
    }

    fn finish(self) -> core::result::Result<(), UnmarshalErrors> {
        if self.errors.is_empty() {
            return Ok(());
        }
        log::debug!("decode finished with {} error(s)", self.errors.len());
        Err(UnmarshalErrors::new(
            self.options.path.clone(),
            self.source,
            self.errors,
        ))
    }

    /// The resolver used for `Any` type URLs and extensions.
    pub fn resolver(&self) -> &dyn TypeResolver {
        self.resolver.as_ref()
    }

    /// Records an error at `node`. Decoding continues.
    pub fn add_error(&mut self, node: &Node, kind: DecodeErrorKind) {
        log::trace!("error at {}:{}: {kind}", node.line, node.column);
        self.errors
            .push(NodeError::new(kind, node, Arc::clone(&self.source)));
    }

    /// Reports a kind mismatch unless `node` is of the `expected` kind.
    pub fn check_kind(&mut self, node: &Node, expected: NodeKind) -> bool {
        if node.kind != expected {
            self.add_error(
                node,
                DecodeErrorKind::KindMismatch {
                    expected,
                    got: node.kind,
                },
            );
            return false;
        }
        true
    }

    fn check_tag(&mut self, node: &Node, expected: &'static str) {
        if !node.tag.is_empty() && node.tag != expected {
            self.add_error(
                node,
                DecodeErrorKind::TagMismatch {
                    expected,
                    got: node.tag.clone(),
                },
            );
        }
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Decodes `node` into `message`.
    ///
    /// A `!!null` node leaves the message untouched. Registered custom
    /// unmarshalers run first; otherwise the node must be a mapping of field
    /// names to values.
    pub fn unmarshal_message(&mut self, node: &Node, message: &mut DynamicMessage) {
        let descriptor = message.descriptor();
        if node.is_null() && descriptor.full_name() != VALUE_MESSAGE {
            return;
        }
        log::trace!("unmarshal_message: {}", descriptor.full_name());

        if !self.enter(node) {
            return;
        }
        self.unmarshal_message_inner(node, message, &descriptor);
        self.leave();
    }

    /// Descends one nesting level. Past the recursion limit the error is
    /// reported at `node` and `false` is returned.
    pub(crate) fn enter(&mut self, node: &Node) -> bool {
        if self.depth >= self.options.recursion_limit {
            self.add_error(
                node,
                DecodeErrorKind::DepthExceeded {
                    limit: self.options.recursion_limit,
                },
            );
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    fn unmarshal_message_inner(
        &mut self,
        node: &Node,
        message: &mut DynamicMessage,
        descriptor: &MessageDescriptor,
    ) {
        if let Some(custom) = self.custom.get(descriptor.full_name()).cloned() {
            if custom(self, node, message) {
                return;
            }
        }
        if node.kind != NodeKind::Mapping {
            self.add_error(
                node,
                DecodeErrorKind::ExpectedFields {
                    message: descriptor.full_name().to_string(),
                    got: node.kind,
                },
            );
            return;
        }
        self.unmarshal_fields(node, message, descriptor, &[]);
    }

    /// Decodes the pairs of a mapping node as fields of `message`, skipping
    /// `@type` and any key listed in `reserved`.
    pub(crate) fn unmarshal_fields(
        &mut self,
        node: &Node,
        message: &mut DynamicMessage,
        descriptor: &MessageDescriptor,
        reserved: &[&str],
    ) {
        for (key, value) in node.pairs() {
            if !self.check_kind(key, NodeKind::Scalar)
                || key.value == "@type"
                || reserved.contains(&key.value.as_str())
            {
                continue;
            }
            match self.resolve_field(&key.value, descriptor) {
                Some(field) => self.unmarshal_field(value, &field, message),
                None if self.options.discard_unknown => {
                    log::trace!("skipping unknown field: {}", key.value);
                }
                None => {
                    let expected = field_names(descriptor);
                    let all: Vec<String> =
                        descriptor.fields().map(|f| f.name().to_string()).collect();
                    self.add_error(
                        key,
                        DecodeErrorKind::UnknownField {
                            field: key.value.clone(),
                            suggestion: find_similar_name(&key.value, &all),
                            expected,
                        },
                    );
                }
            }
        }

        if !self.options.allow_partial {
            for field in descriptor.fields() {
                if field.cardinality() == Cardinality::Required && !message.has_field(&field) {
                    self.add_error(
                        node,
                        DecodeErrorKind::RequiredNotSet {
                            field: field.full_name().to_string(),
                        },
                    );
                }
            }
        }
    }

    /// Finds the field for a mapping key: a field name, JSON name or number,
    /// or a bracketed extension name such as `[pkg.ext]`.
    fn resolve_field(&self, key: &str, descriptor: &MessageDescriptor) -> Option<Field> {
        if let Some(field) = find_field(key, descriptor) {
            return Some(field.into());
        }
        let name = key.strip_prefix('[')?.strip_suffix(']')?;
        let ext = self.resolver.find_extension_by_name(name)?;
        (ext.containing_message().full_name() == descriptor.full_name()).then(|| ext.into())
    }

    /// Decodes `node` into `field` of `message`.
    pub fn unmarshal_field(&mut self, node: &Node, field: &Field, message: &mut DynamicMessage) {
        if field.is_list() {
            self.unmarshal_list(node, field, message);
        } else if field.is_map() {
            self.unmarshal_map(node, field, message);
        } else if let Kind::Message(desc) = field.kind() {
            if node.is_null() && desc.full_name() != VALUE_MESSAGE {
                return;
            }
            if let Value::Message(child) = field.get_mut(message) {
                self.unmarshal_message(node, child);
            }
        } else {
            let value = self.unmarshal_scalar(node, &field.kind(), false);
            field.set(message, value);
        }
    }

    fn unmarshal_list(&mut self, node: &Node, field: &Field, message: &mut DynamicMessage) {
        log::trace!("unmarshal_list: {}", field.full_name());
        if !self.check_kind(node, NodeKind::Sequence) {
            return;
        }
        let kind = field.kind();
        let mut items = Vec::with_capacity(node.children.len());
        for item in &node.children {
            let value = match &kind {
                Kind::Message(desc) => {
                    let mut element = DynamicMessage::new(desc.clone());
                    self.unmarshal_message(item, &mut element);
                    Value::Message(element)
                }
                other => self.unmarshal_scalar(item, other, false),
            };
            items.push(value);
        }
        if let Value::List(list) = field.get_mut(message) {
            list.extend(items);
        }
    }

    fn unmarshal_map(&mut self, node: &Node, field: &Field, message: &mut DynamicMessage) {
        log::trace!("unmarshal_map: {}", field.full_name());
        if !self.check_kind(node, NodeKind::Mapping) {
            return;
        }
        let Some((key_field, value_field)) = field.map_entry() else {
            return;
        };
        let key_kind = key_field.kind();
        let value_kind = value_field.kind();
        let mut entries = Vec::with_capacity(node.children.len() / 2);
        for (key_node, value_node) in node.pairs() {
            let key = self.unmarshal_scalar(key_node, &key_kind, true);
            let value = match &value_kind {
                Kind::Message(desc) => {
                    let mut entry = DynamicMessage::new(desc.clone());
                    self.unmarshal_message(value_node, &mut entry);
                    Value::Message(entry)
                }
                other => self.unmarshal_scalar(value_node, other, false),
            };
            if let Some(key) = map_key(key) {
                entries.push((key, value));
            }
        }
        if let Value::Map(map) = field.get_mut(message) {
            map.extend(entries);
        }
    }

    // ------------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------------

    /// Decodes a scalar node as a value of `kind`. Map keys (`for_key`) skip
    /// the tag check on bools.
    ///
    /// Errors are recorded and yield the default value of the kind.
    pub fn unmarshal_scalar(&mut self, node: &Node, kind: &Kind, for_key: bool) -> Value {
        match kind {
            Kind::Bool => Value::Bool(self.unmarshal_bool(node, for_key)),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
                Value::I32(self.unmarshal_integer(node, 32) as i32)
            }
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
                Value::I64(self.unmarshal_integer(node, 64))
            }
            Kind::Uint32 | Kind::Fixed32 => Value::U32(self.unmarshal_unsigned(node, 32) as u32),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(self.unmarshal_unsigned(node, 64)),
            Kind::Float => Value::F32(self.unmarshal_float(node, 32) as f32),
            Kind::Double => Value::F64(self.unmarshal_float(node, 64)),
            Kind::String => {
                self.check_kind(node, NodeKind::Scalar);
                Value::String(node.value.clone())
            }
            Kind::Bytes => Value::Bytes(self.unmarshal_bytes(node)),
            Kind::Enum(desc) => Value::EnumNumber(self.unmarshal_enum(node, desc)),
            Kind::Message(desc) => {
                self.add_error(
                    node,
                    DecodeErrorKind::Custom(format!(
                        "unimplemented scalar type {}",
                        desc.full_name()
                    )),
                );
                Value::Message(DynamicMessage::new(desc.clone()))
            }
        }
    }

    fn unmarshal_bool(&mut self, node: &Node, for_key: bool) -> bool {
        if !self.check_kind(node, NodeKind::Scalar) {
            return false;
        }
        let parsed = match node.value.as_str() {
            "true" => true,
            "false" => false,
            _ => {
                self.add_error(
                    node,
                    DecodeErrorKind::InvalidBool {
                        got: node.value.clone(),
                    },
                );
                return false;
            }
        };
        if !for_key {
            self.check_tag(node, BOOL_TAG);
        }
        parsed
    }

    fn unmarshal_integer(&mut self, node: &Node, bits: u32) -> i64 {
        if !self.check_kind(node, NodeKind::Scalar) {
            return 0;
        }
        let (negative, magnitude) = match parse_signed(&node.value) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.add_error(node, DecodeErrorKind::InvalidInteger(e));
                return 0;
            }
        };
        let limit = 1u64 << (bits - 1);
        if negative {
            if magnitude <= limit {
                return (-i128::from(magnitude)) as i64;
            }
            self.add_error(
                node,
                DecodeErrorKind::IntegerTooSmall {
                    min: (-i128::from(limit)) as i64,
                },
            );
            return 0;
        }
        if magnitude >= limit {
            self.add_error(node, DecodeErrorKind::IntegerTooLarge { max: limit - 1 });
            return 0;
        }
        magnitude as i64
    }

    fn unmarshal_unsigned(&mut self, node: &Node, bits: u32) -> u64 {
        if !self.check_kind(node, NodeKind::Scalar) {
            return 0;
        }
        let parsed = match parse_unsigned(&node.value) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.add_error(node, DecodeErrorKind::InvalidInteger(e));
                return 0;
            }
        };
        if bits < 64 && parsed >= 1 << bits {
            self.add_error(
                node,
                DecodeErrorKind::IntegerTooLarge {
                    max: (1 << bits) - 1,
                },
            );
            return 0;
        }
        parsed
    }

    fn unmarshal_float(&mut self, node: &Node, bits: u32) -> f64 {
        if !self.check_kind(node, NodeKind::Scalar) {
            return 0.0;
        }
        match parse_float(&node.value, bits) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.add_error(node, DecodeErrorKind::InvalidFloat(e));
                0.0
            }
        }
    }

    fn unmarshal_bytes(&mut self, node: &Node) -> Bytes {
        if !self.check_kind(node, NodeKind::Scalar) {
            return Bytes::new();
        }
        match decode_base64(&node.value) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                self.add_error(node, DecodeErrorKind::InvalidBase64(e.to_string()));
                Bytes::new()
            }
        }
    }

    fn unmarshal_enum(&mut self, node: &Node, desc: &EnumDescriptor) -> i32 {
        self.check_kind(node, NodeKind::Scalar);
        if desc.full_name() == NULL_VALUE_ENUM {
            return 0;
        }
        if let Some(value) = desc.get_value_by_name(&node.value) {
            return value.number();
        }
        match parse_signed(&node.value) {
            Ok((true, magnitude)) if magnitude <= 1 << 31 => (-i128::from(magnitude)) as i32,
            Ok((false, magnitude)) if magnitude < 1 << 31 => magnitude as i32,
            _ => {
                self.add_error(
                    node,
                    DecodeErrorKind::UnknownEnumValue {
                        value: node.value.clone(),
                        expected: truncate_names(desc.values().map(|v| v.name().to_string())),
                    },
                );
                0
            }
        }
    }
}

/// Standard base64, ignoring the line breaks a YAML block scalar leaves in.
pub(crate) fn decode_base64(text: &str) -> core::result::Result<Vec<u8>, base64::DecodeError> {
    if text.contains(['\r', '\n']) {
        let joined: String = text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
        return STANDARD.decode(joined);
    }
    STANDARD.decode(text)
}

fn map_key(value: Value) -> Option<MapKey> {
    match value {
        Value::Bool(v) => Some(MapKey::Bool(v)),
        Value::I32(v) => Some(MapKey::I32(v)),
        Value::I64(v) => Some(MapKey::I64(v)),
        Value::U32(v) => Some(MapKey::U32(v)),
        Value::U64(v) => Some(MapKey::U64(v)),
        Value::String(v) => Some(MapKey::String(v)),
        _ => None,
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Decodes YAML text into a generated message type.
///
/// Errors include source code context for rich diagnostic display when
/// using [`miette`]'s reporting features.
pub fn from_str<M>(input: &str) -> Result<M>
where
    M: ReflectMessage + Default,
{
    UnmarshalOptions::default().from_str(input)
}

/// Decodes YAML bytes into a generated message type.
pub fn from_slice<M>(input: &[u8]) -> Result<M>
where
    M: ReflectMessage + Default,
{
    let input = core::str::from_utf8(input).map_err(Error::InvalidUtf8)?;
    from_str(input)
}

/// Decodes YAML text into a new dynamic message of type `descriptor`.
pub fn from_str_dynamic(input: &str, descriptor: MessageDescriptor) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(descriptor);
    UnmarshalOptions::default().unmarshal(input, &mut message)?;
    Ok(message)
}
