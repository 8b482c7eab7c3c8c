mod common;

use common::{decode, decode_errors, get, scalars};
use prost::Message as _;
use prost_reflect::DynamicMessage;
use prost_types::{Any, Duration, Timestamp};

fn field_as<T: prost::Message + Default>(msg: &DynamicMessage, name: &str) -> T {
    get(msg, name)
        .as_message()
        .unwrap_or_else(|| panic!("{name} is not a message"))
        .transcode_to()
        .unwrap()
}

// ============================================================================
// Duration
// ============================================================================

#[test]
fn durations() {
    let cases = [
        ("1.5s", 1, 500_000_000),
        ("-0.25s", 0, -250_000_000),
        ("1h30m", 5400, 0),
        ("250ms", 0, 250_000_000),
        ("0", 0, 0),
    ];
    for (text, seconds, nanos) in cases {
        let msg = decode(&format!("timeout: {text}"));
        assert_eq!(
            field_as::<Duration>(&msg, "timeout"),
            Duration { seconds, nanos },
            "{text}"
        );
    }
}

#[test]
fn invalid_durations() {
    let errors = decode_errors("timeout: 5x");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("invalid duration: "), "{errors:?}");
    assert!(errors[0].contains("unknown unit"), "{errors:?}");

    let errors = decode_errors("timeout: soon");
    assert!(errors[0].starts_with("invalid duration: "), "{errors:?}");
}

#[test]
fn duration_as_fields() {
    let msg = decode("timeout:\n  seconds: 3\n  nanos: 7\n");
    assert_eq!(
        field_as::<Duration>(&msg, "timeout"),
        Duration {
            seconds: 3,
            nanos: 7
        }
    );
}

// ============================================================================
// Timestamp
// ============================================================================

#[test]
fn timestamps() {
    let msg = decode("createdAt: 2023-01-02T03:04:05.5Z");
    assert_eq!(
        field_as::<Timestamp>(&msg, "created_at"),
        Timestamp {
            seconds: 1_672_628_645,
            nanos: 500_000_000
        }
    );

    let msg = decode("createdAt: 1970-01-01T01:00:00+01:00");
    assert_eq!(field_as::<Timestamp>(&msg, "created_at"), Timestamp::default());
}

#[test]
fn invalid_timestamps() {
    let errors = decode_errors("createdAt: yesterday");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("invalid timestamp: "), "{errors:?}");
}

// ============================================================================
// Wrappers
// ============================================================================

#[test]
fn wrappers_take_bare_values() {
    let msg = decode("maybeCount: 5");
    let wrapper = get(&msg, "maybe_count");
    let wrapper = wrapper.as_message().unwrap();
    assert_eq!(get(wrapper, "value").as_i32(), Some(5));

    assert_eq!(
        decode_errors("maybeCount: lots"),
        [r#"invalid integer: parsing "lots": invalid syntax"#]
    );
}

// ============================================================================
// Any
// ============================================================================

#[test]
fn any_with_inline_fields() {
    let msg = decode(
        r#"
details:
  "@type": type.googleapis.com/test.v1.Scalars
  int32Value: 3
"#,
    );
    let any: Any = field_as(&msg, "details");
    assert_eq!(any.type_url, "type.googleapis.com/test.v1.Scalars");
    let inner = DynamicMessage::decode(scalars(), any.value.as_slice()).unwrap();
    assert_eq!(get(&inner, "int32_value").as_i32(), Some(3));
}

#[test]
fn any_type_url_is_normalized() {
    let msg = decode("details:\n  \"@type\": example.com/x/test.v1.Scalars\n");
    let any: Any = field_as(&msg, "details");
    assert_eq!(any.type_url, "type.googleapis.com/test.v1.Scalars");
}

#[test]
fn any_with_custom_payload_uses_value_key() {
    let msg = decode(
        r#"
details:
  "@type": type.googleapis.com/google.protobuf.Duration
  value: 2s
"#,
    );
    let any: Any = field_as(&msg, "details");
    assert_eq!(
        Duration::decode(any.value.as_slice()).unwrap(),
        Duration {
            seconds: 2,
            nanos: 0
        }
    );
}

#[test]
fn any_holding_a_dynamic_value() {
    let msg = decode(
        r#"
details:
  "@type": type.googleapis.com/google.protobuf.Value
  value: 1
"#,
    );
    let any: Any = field_as(&msg, "details");
    let value = prost_types::Value::decode(any.value.as_slice()).unwrap();
    assert_eq!(value.kind, Some(prost_types::value::Kind::NumberValue(1.0)));
}

#[test]
fn any_errors() {
    assert_eq!(
        decode_errors("details:\n  int32Value: 1\n"),
        [r#"missing "@type""#]
    );
    assert_eq!(
        decode_errors("details:\n  \"@type\": type.googleapis.com/nope.Missing\n"),
        [r#"unknown type "type.googleapis.com/nope.Missing": not found"#]
    );
    assert_eq!(
        decode_errors(
            "details:\n  \"@type\": type.googleapis.com/google.protobuf.Duration\n  other: 1\n"
        ),
        [r#"unknown field "other", expected one of [@type value]"#]
    );
    assert_eq!(
        decode_errors(
            "details:\n  \"@type\": type.googleapis.com/test.v1.Scalars\n  int32Value: x\n"
        ),
        [r#"invalid integer: parsing "x": invalid syntax"#]
    );
}
