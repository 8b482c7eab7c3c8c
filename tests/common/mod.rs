//! Shared test schema, built from descriptor protos at runtime.
//!
//! ```proto
//! // test.proto (proto3)
//! package test.v1;
//! enum Color { COLOR_UNSPECIFIED = 0; COLOR_RED = 1; COLOR_GREEN = 2; }
//! message Scalars {
//!   int32 int32_value = 1;  int64 int64_value = 2;
//!   uint32 uint32_value = 3; uint64 uint64_value = 4;
//!   float float_value = 5;  double double_value = 6;
//!   bool bool_value = 7;    string string_value = 8;  bytes bytes_value = 9;
//!   Color color = 10;
//!   repeated int32 numbers = 11;
//!   map<string, int32> counts = 12;
//!   Scalars child = 13;
//!   repeated Scalars children = 14;
//!   map<int32, Scalars> by_id = 15;
//!   google.protobuf.Duration timeout = 16;
//!   google.protobuf.Timestamp created_at = 17;
//!   google.protobuf.Any details = 18;
//!   google.protobuf.Value dynamic = 19;
//!   google.protobuf.Struct attributes = 20;
//!   google.protobuf.Int32Value maybe_count = 21;
//!   google.protobuf.NullValue nothing = 22;
//!   google.protobuf.ListValue items = 23;
//!   optional string nickname = 24;
//! }
//!
//! // legacy.proto (proto2)
//! package test.v1;
//! message Legacy { required string name = 1; optional int32 size = 2; extensions 100 to 199; }
//! extend Legacy { optional string note = 100; }
//! ```

#![allow(dead_code)]

use std::sync::OnceLock;

use prost_reflect::{DescriptorPool, DynamicMessage, ExtensionDescriptor, MessageDescriptor, ReflectMessage};
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};

fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn field(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(Into::into),
        json_name: Some(json_name(name)),
        ..Default::default()
    }
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

fn map_entry(name: &str, key: Type, value: Type, value_type: Option<&str>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.into()),
        field: vec![field("key", 1, key, None), field("value", 2, value, value_type)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn test_file() -> FileDescriptorProto {
    let color = EnumDescriptorProto {
        name: Some("Color".into()),
        value: ["COLOR_UNSPECIFIED", "COLOR_RED", "COLOR_GREEN"]
            .iter()
            .enumerate()
            .map(|(i, name)| EnumValueDescriptorProto {
                name: Some((*name).into()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let mut nickname = field("nickname", 24, Type::String, None);
    nickname.proto3_optional = Some(true);
    nickname.oneof_index = Some(0);

    let scalars = DescriptorProto {
        name: Some("Scalars".into()),
        field: vec![
            field("int32_value", 1, Type::Int32, None),
            field("int64_value", 2, Type::Int64, None),
            field("uint32_value", 3, Type::Uint32, None),
            field("uint64_value", 4, Type::Uint64, None),
            field("float_value", 5, Type::Float, None),
            field("double_value", 6, Type::Double, None),
            field("bool_value", 7, Type::Bool, None),
            field("string_value", 8, Type::String, None),
            field("bytes_value", 9, Type::Bytes, None),
            field("color", 10, Type::Enum, Some(".test.v1.Color")),
            repeated(field("numbers", 11, Type::Int32, None)),
            repeated(field("counts", 12, Type::Message, Some(".test.v1.Scalars.CountsEntry"))),
            field("child", 13, Type::Message, Some(".test.v1.Scalars")),
            repeated(field("children", 14, Type::Message, Some(".test.v1.Scalars"))),
            repeated(field("by_id", 15, Type::Message, Some(".test.v1.Scalars.ByIdEntry"))),
            field("timeout", 16, Type::Message, Some(".google.protobuf.Duration")),
            field("created_at", 17, Type::Message, Some(".google.protobuf.Timestamp")),
            field("details", 18, Type::Message, Some(".google.protobuf.Any")),
            field("dynamic", 19, Type::Message, Some(".google.protobuf.Value")),
            field("attributes", 20, Type::Message, Some(".google.protobuf.Struct")),
            field("maybe_count", 21, Type::Message, Some(".google.protobuf.Int32Value")),
            field("nothing", 22, Type::Enum, Some(".google.protobuf.NullValue")),
            field("items", 23, Type::Message, Some(".google.protobuf.ListValue")),
            nickname,
        ],
        nested_type: vec![
            map_entry("CountsEntry", Type::String, Type::Int32, None),
            map_entry("ByIdEntry", Type::Int32, Type::Message, Some(".test.v1.Scalars")),
        ],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("_nickname".into()),
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("test.proto".into()),
        package: Some("test.v1".into()),
        dependency: vec![
            "google/protobuf/any.proto".into(),
            "google/protobuf/duration.proto".into(),
            "google/protobuf/struct.proto".into(),
            "google/protobuf/timestamp.proto".into(),
            "google/protobuf/wrappers.proto".into(),
        ],
        message_type: vec![scalars],
        enum_type: vec![color],
        syntax: Some("proto3".into()),
        ..Default::default()
    }
}

fn legacy_file() -> FileDescriptorProto {
    let mut name = field("name", 1, Type::String, None);
    name.label = Some(Label::Required as i32);

    let mut note = field("note", 100, Type::String, None);
    note.extendee = Some(".test.v1.Legacy".into());

    FileDescriptorProto {
        name: Some("legacy.proto".into()),
        package: Some("test.v1".into()),
        message_type: vec![DescriptorProto {
            name: Some("Legacy".into()),
            field: vec![name, field("size", 2, Type::Int32, None)],
            extension_range: vec![ExtensionRange {
                start: Some(100),
                end: Some(200),
                ..Default::default()
            }],
            ..Default::default()
        }],
        extension: vec![note],
        syntax: Some("proto2".into()),
        ..Default::default()
    }
}

/// The well-known types plus the test files.
pub fn pool() -> DescriptorPool {
    static POOL: OnceLock<DescriptorPool> = OnceLock::new();
    POOL.get_or_init(|| {
        let mut pool = prost_types::Duration::default()
            .descriptor()
            .parent_pool()
            .clone();
        pool.add_file_descriptor_proto(test_file())
            .expect("test.proto is valid");
        pool.add_file_descriptor_proto(legacy_file())
            .expect("legacy.proto is valid");
        pool
    })
    .clone()
}

pub fn scalars() -> MessageDescriptor {
    pool().get_message_by_name("test.v1.Scalars").unwrap()
}

pub fn legacy() -> MessageDescriptor {
    pool().get_message_by_name("test.v1.Legacy").unwrap()
}

pub fn note_extension() -> ExtensionDescriptor {
    pool().get_extension_by_name("test.v1.note").unwrap()
}

/// Decodes `yaml` as a `test.v1.Scalars`, panicking on errors.
pub fn decode(yaml: &str) -> DynamicMessage {
    protoyaml::from_str_dynamic(yaml, scalars()).unwrap_or_else(|e| panic!("{e}"))
}

/// Decodes `yaml` as a `test.v1.Scalars` and returns each error message.
pub fn decode_errors(yaml: &str) -> Vec<String> {
    decode_errors_with(protoyaml::UnmarshalOptions::new(), yaml, scalars())
}

pub fn decode_errors_with(
    options: protoyaml::UnmarshalOptions,
    yaml: &str,
    descriptor: MessageDescriptor,
) -> Vec<String> {
    let mut message = DynamicMessage::new(descriptor);
    match options.unmarshal(yaml, &mut message) {
        Ok(()) => Vec::new(),
        Err(protoyaml::Error::Unmarshal(errors)) => {
            errors.errors().iter().map(|e| e.kind.to_string()).collect()
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

/// Reads a singular field by name.
pub fn get(message: &DynamicMessage, name: &str) -> prost_reflect::Value {
    message
        .get_field_by_name(name)
        .unwrap_or_else(|| panic!("no field {name}"))
        .into_owned()
}
