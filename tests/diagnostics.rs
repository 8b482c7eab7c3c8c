//! Tests for error rendering: the plain `path:line:col` report and miette's
//! GraphicalReportHandler.

mod common;

use common::scalars;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use prost_reflect::DynamicMessage;
use protoyaml::{Error, UnmarshalOptions};

fn unmarshal_err(options: UnmarshalOptions, yaml: &str) -> Error {
    let mut message = DynamicMessage::new(scalars());
    options
        .unmarshal(yaml, &mut message)
        .expect_err("document should be rejected")
}

/// Render an error using miette's GraphicalReportHandler with unicode theme.
fn render_error(err: &dyn Diagnostic) -> String {
    let mut buf = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    handler.render_report(&mut buf, err).unwrap();
    buf
}

// ============================================================================
// Plain reports
// ============================================================================

#[test]
fn report_lists_every_error_with_a_snippet() {
    let err = unmarshal_err(
        UnmarshalOptions::new().path("config.yaml"),
        "int32Value: abc\ncolor: COLOR_BLUE\n",
    );
    insta::assert_snapshot!(err.to_string(), @r#"
config.yaml:1:13 invalid integer: parsing "abc": invalid syntax
   1 | int32Value: abc
     |             ^........................... invalid integer: parsing "abc": invalid syntax
config.yaml:2:8 unknown enum value "COLOR_BLUE", expected one of [COLOR_UNSPECIFIED COLOR_RED COLOR_GREEN]
   2 | color: COLOR_BLUE
     |        ^................................ unknown enum value "COLOR_BLUE", expected one of [COLOR_UNSPECIFIED COLOR_RED COLOR_GREEN]
"#);
}

#[test]
fn marker_spans_at_least_forty_columns() {
    let err = unmarshal_err(UnmarshalOptions::new(), "stringValue: ok\nboolValue: 1\n");
    let Error::Unmarshal(errors) = &err else {
        panic!("expected unmarshal errors, got {err:?}");
    };
    assert_eq!(
        errors.errors()[0].detailed("f.yaml"),
        concat!(
            "f.yaml:2:12 expected bool, got \"1\"\n",
            "   2 | boolValue: 1\n",
            "     |            ^............................ expected bool, got \"1\"\n",
        )
    );
}

#[test]
fn long_lines_extend_the_marker() {
    let value = "y".repeat(40);
    let err = unmarshal_err(UnmarshalOptions::new(), &format!("boolValue: {value}\n"));
    let Error::Unmarshal(errors) = &err else {
        panic!("expected unmarshal errors, got {err:?}");
    };
    let message = format!("expected bool, got {value:?}");
    let expected = format!(
        "f.yaml:1:12 {message}\n   1 | boolValue: {value}\n     | {}^{} {message}\n",
        " ".repeat(11),
        ".".repeat(39),
    );
    assert_eq!(errors.errors()[0].detailed("f.yaml"), expected);
}

#[test]
fn syntax_errors_name_the_position() {
    let err = unmarshal_err(UnmarshalOptions::new(), "a: [1, 2\n");
    let Error::Syntax { message, .. } = &err else {
        panic!("expected a syntax error, got {err:?}");
    };
    assert!(message.span.start <= "a: [1, 2\n".len());
    assert_eq!(
        err.code().map(|c| c.to_string()).as_deref(),
        Some("protoyaml::syntax")
    );
}

// ============================================================================
// miette reports
// ============================================================================

#[test]
fn each_error_is_a_related_diagnostic() {
    let err = unmarshal_err(
        UnmarshalOptions::new(),
        "int32Valu: 1\nnumbers: 7\n",
    );
    let related: Vec<_> = err.related().unwrap().collect();
    assert_eq!(related.len(), 2);
    assert_eq!(
        related[0].code().unwrap().to_string(),
        "protoyaml::unknown_field"
    );
    assert_eq!(
        related[1].code().unwrap().to_string(),
        "protoyaml::kind_mismatch"
    );

    let rendered = render_error(&err);
    assert!(rendered.contains("did you mean 'int32_value'?"), "{rendered}");
    assert!(rendered.contains("numbers: 7"), "{rendered}");
}

#[test]
fn node_error_renders_its_own_snippet() {
    let err = unmarshal_err(UnmarshalOptions::new(), "timeout: 5 parsecs\n");
    let Error::Unmarshal(errors) = &err else {
        panic!("expected unmarshal errors, got {err:?}");
    };
    let node_error = &errors.errors()[0];
    assert_eq!(node_error.span.start, 9);
    let rendered = render_error(node_error);
    assert!(rendered.contains("protoyaml::invalid_duration"), "{rendered}");
    assert!(rendered.contains("timeout: 5 parsecs"), "{rendered}");
}
