//! Decoding of `google.protobuf.Value`, `ListValue` and `Struct`.
//!
//! The document shape alone picks the variant. When a field descriptor is
//! known (a `Struct` standing in for a concrete message) it is only used to
//! report values the field could not hold.

use prost_reflect::{DynamicMessage, Kind, MessageDescriptor};
use prost_types::value::Kind as ValueKind;
use prost_types::{ListValue, Struct, Value};

use crate::deserialize::{Unmarshaler, decode_base64};
use crate::error::DecodeErrorKind;
use crate::field::{Field, find_field};
use crate::literal::{LiteralError, parse_float, parse_signed};
use crate::node::{BOOL_TAG, NULL_TAG, Node, NodeKind};
use crate::wkt::type_url_node;

/// What a field accepts, as named in error messages.
fn expected_node_kind(field: &Field, for_list: bool) -> &'static str {
    if field.is_list() && !for_list {
        return "sequence";
    }
    match field.kind() {
        Kind::Enum(_) => "enum",
        Kind::Bool => "boolean",
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => "int32",
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => "int64",
        Kind::Uint32 | Kind::Fixed32 => "uint32",
        Kind::Uint64 | Kind::Fixed64 => "uint64",
        Kind::Float => "float",
        Kind::Double => "double",
        Kind::Message(_) => "mapping",
        _ => "scalar",
    }
}

impl Unmarshaler<'_> {
    fn value_mismatch(&mut self, node: &Node, field: &Field, for_list: bool, got: &'static str) {
        self.add_error(
            node,
            DecodeErrorKind::UnexpectedValue {
                expected: expected_node_kind(field, for_list),
                field: field.full_name().to_string(),
                got,
            },
        );
    }

    fn check_bytes(&mut self, node: &Node, field: &Field) {
        if let Err(e) = decode_base64(&node.value) {
            self.add_error(
                node,
                DecodeErrorKind::InvalidBase64Value {
                    field: field.full_name().to_string(),
                    reason: e.to_string(),
                },
            );
        }
    }

    /// Decodes any node as a dynamic value, checking it against `field` when
    /// given.
    pub(crate) fn unmarshal_value(
        &mut self,
        node: &Node,
        field: Option<&Field>,
        for_list: bool,
    ) -> Value {
        let mut field = field;
        if let Some(f) = field {
            if let (Kind::Message(desc), false) = (f.kind(), f.is_map()) {
                if let Some(custom) = self.custom.get(desc.full_name()).cloned() {
                    let mut scratch = DynamicMessage::new(desc);
                    if custom(self, node, &mut scratch) {
                        // The custom decoder has already reported any errors.
                        field = None;
                    }
                }
            }
        }

        let kind = match node.kind {
            NodeKind::Sequence | NodeKind::Mapping if !self.enter(node) => None,
            NodeKind::Sequence => {
                let list = self.unmarshal_list_value(node, field);
                self.leave();
                Some(ValueKind::ListValue(list))
            }
            NodeKind::Mapping => {
                let fields = self.unmarshal_struct(node, None, field);
                self.leave();
                Some(ValueKind::StructValue(fields))
            }
            NodeKind::Scalar => {
                if let Some(f) = field {
                    if f.is_list() && !for_list {
                        self.value_mismatch(node, f, for_list, "scalar");
                    }
                }
                Some(self.unmarshal_scalar_value(node, field))
            }
            NodeKind::Null => Some(ValueKind::NullValue(0)),
            NodeKind::Alias => {
                self.add_error(node, DecodeErrorKind::UnimplementedValueKind(node.kind));
                None
            }
        };
        Value { kind }
    }

    pub(crate) fn unmarshal_list_value(&mut self, node: &Node, field: Option<&Field>) -> ListValue {
        log::trace!("unmarshal_list_value");
        if let Some(f) = field {
            if !f.is_list() {
                self.value_mismatch(node, f, false, "sequence");
            }
        }
        let values = node
            .children
            .iter()
            .map(|item| self.unmarshal_value(item, field, true))
            .collect();
        ListValue { values }
    }

    /// Decodes a mapping as a `Struct`.
    ///
    /// The mapping may stand for a message (`descriptor`, or the type named
    /// by an `@type` key) or for a map field (`field`).
    pub(crate) fn unmarshal_struct(
        &mut self,
        node: &Node,
        descriptor: Option<MessageDescriptor>,
        field: Option<&Field>,
    ) -> Struct {
        log::trace!("unmarshal_struct");
        let mut descriptor = descriptor;
        if let Some(f) = field {
            if !f.is_map() && !matches!(f.kind(), Kind::Message(_)) {
                self.value_mismatch(node, f, false, "mapping");
            }
        } else if descriptor.is_none() {
            if let Some(url_node) = type_url_node(node) {
                descriptor = self.resolve_any_type(node, url_node);
            }
        }
        let entry = field.and_then(Field::map_entry);

        let mut result = Struct::default();
        for (key, value) in node.pairs() {
            if !self.check_kind(key, NodeKind::Scalar) {
                continue;
            }
            if let Some((key_field, _)) = &entry {
                self.unmarshal_value(key, Some(&key_field.clone().into()), false);
            }

            let value_field: Option<Field> = match (&descriptor, &entry) {
                (Some(desc), _) => find_field(&key.value, desc).map(Field::from),
                (None, Some((_, value_field))) => Some(value_field.clone().into()),
                (None, None) => None,
            };
            let decoded = self.unmarshal_value(value, value_field.as_ref(), false);
            result.fields.insert(key.value.clone(), decoded);
        }
        result
    }

    fn unmarshal_scalar_value(&mut self, node: &Node, field: Option<&Field>) -> ValueKind {
        match node.tag.as_str() {
            NULL_TAG => {
                if let Some(f) = field {
                    match f.kind() {
                        Kind::Bytes => self.check_bytes(node, f),
                        Kind::Message(_) | Kind::String => {}
                        _ => self.value_mismatch(node, f, true, "null"),
                    }
                }
                ValueKind::NullValue(0)
            }
            BOOL_TAG => {
                if let Some(f) = field {
                    match f.kind() {
                        Kind::Bool | Kind::String => {}
                        Kind::Bytes => self.check_bytes(node, f),
                        _ => self.value_mismatch(node, f, true, "bool"),
                    }
                }
                match node.value.as_str() {
                    "true" => ValueKind::BoolValue(true),
                    "false" => ValueKind::BoolValue(false),
                    _ => {
                        if let Some(f) = field {
                            if !matches!(f.kind(), Kind::String) {
                                self.value_mismatch(node, f, true, "string");
                            }
                        }
                        ValueKind::StringValue(node.value.clone())
                    }
                }
            }
            _ => self.unmarshal_scalar_text(node, field),
        }
    }

    /// A scalar that is a string, a float or an integer.
    fn unmarshal_scalar_text(&mut self, node: &Node, field: Option<&Field>) -> ValueKind {
        let number = match parse_float(&node.value, 64) {
            Ok(number) => number,
            Err(_) => {
                if let Some(f) = field {
                    match f.kind() {
                        Kind::String => {}
                        Kind::Bytes => self.check_bytes(node, f),
                        _ => self.value_mismatch(node, f, true, "string"),
                    }
                }
                return ValueKind::StringValue(node.value.clone());
            }
        };

        if !number.is_finite() {
            if let Some(f) = field {
                match f.kind() {
                    Kind::String | Kind::Float | Kind::Double => {}
                    Kind::Bytes => self.check_bytes(node, f),
                    _ => self.value_mismatch(node, f, true, "float"),
                }
            }
            return ValueKind::StringValue(node.value.clone());
        }

        self.unmarshal_scalar_number(node, field, number)
    }

    /// Keeps a number as a number unless it is an integer literal the float
    /// cannot hold exactly, in which case the text is kept.
    fn unmarshal_scalar_number(
        &mut self,
        node: &Node,
        field: Option<&Field>,
        number: f64,
    ) -> ValueKind {
        let integer = parse_signed(&node.value);
        let as_uint = number.abs() as u64;
        let kind = match &integer {
            Ok((_, magnitude)) if as_uint != *magnitude => {
                ValueKind::StringValue(node.value.clone())
            }
            _ => ValueKind::NumberValue(number),
        };

        if let Some(f) = field {
            self.check_number_fits(node, f, number, &integer);
        }
        kind
    }

    fn check_number_fits(
        &mut self,
        node: &Node,
        field: &Field,
        number: f64,
        integer: &Result<(bool, u64), LiteralError>,
    ) {
        let invalid = |expected: &'static str, reason: String| DecodeErrorKind::InvalidValue {
            expected,
            field: field.full_name().to_string(),
            reason,
        };
        let unexpected = |expected: &'static str, got: &'static str| {
            DecodeErrorKind::UnexpectedValue {
                expected,
                field: field.full_name().to_string(),
                got,
            }
        };

        let error = match (field.kind(), integer) {
            (Kind::String, _) => None,
            (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Err(e)) => {
                Some(invalid("int32", e.to_string()))
            }
            (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Ok((negative, magnitude))) => {
                let over = if *negative {
                    *magnitude > 1 << 31
                } else {
                    *magnitude >= 1 << 31
                };
                over.then(|| unexpected("int32", "int64"))
            }
            (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Err(e)) => {
                Some(invalid("int64", e.to_string()))
            }
            (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Ok((true, magnitude))) => {
                (*magnitude > 1 << 63).then(|| invalid("int64", "out of range".into()))
            }
            (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Ok((false, magnitude))) => {
                (*magnitude >= 1 << 63).then(|| unexpected("int64", "uint64"))
            }
            (Kind::Uint32 | Kind::Fixed32, Err(e)) => Some(invalid("uint32", e.to_string())),
            (Kind::Uint32 | Kind::Fixed32, Ok((true, _))) => Some(unexpected("uint32", "negative")),
            (Kind::Uint32 | Kind::Fixed32, Ok((false, magnitude))) => {
                (*magnitude >= 1 << 32).then(|| unexpected("uint32", "uint64"))
            }
            (Kind::Uint64 | Kind::Fixed64, Err(e)) => Some(invalid("uint64", e.to_string())),
            (Kind::Uint64 | Kind::Fixed64, Ok((true, _))) => Some(unexpected("uint64", "negative")),
            (Kind::Uint64 | Kind::Fixed64, Ok((false, _))) => None,
            (Kind::Float, _) => {
                let expected = expected_node_kind(field, true);
                if number.abs() > f64::from(f32::MAX) {
                    Some(unexpected(expected, "float64"))
                } else {
                    match integer {
                        Ok((_, magnitude)) if (number.abs() as f32) as u64 != *magnitude => {
                            Some(unexpected(expected, "integer"))
                        }
                        _ => None,
                    }
                }
            }
            (Kind::Double, Ok((_, magnitude))) if number.abs() as u64 != *magnitude => {
                Some(unexpected(expected_node_kind(field, true), "integer"))
            }
            (Kind::Double, _) => None,
            (Kind::Bytes, _) => {
                self.check_bytes(node, field);
                None
            }
            _ => Some(unexpected(expected_node_kind(field, true), "number")),
        };
        if let Some(error) = error {
            self.add_error(node, error);
        }
    }
}
