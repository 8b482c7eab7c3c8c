//! Error types for YAML decoding and encoding.

use alloc::sync::Arc;
use core::fmt::{self, Display};

use crate::literal::LiteralError;
use crate::node::{Node, NodeKind};
use crate::span::{Span, Spanned};
use crate::validate::Violation;

/// Find the best matching name from a list of candidates.
/// Returns Some(suggestion) if a match with similarity >= 0.6 is found.
pub(crate) fn find_similar_name(unknown: &str, candidates: &[String]) -> Option<String> {
    let mut best_match: Option<(&str, f64)> = None;

    for candidate in candidates {
        let similarity = strsim::jaro_winkler(unknown, candidate);
        if similarity >= 0.6 && best_match.is_none_or(|(_, best_sim)| similarity > best_sim) {
            best_match = Some((candidate, similarity));
        }
    }

    best_match.map(|(name, _)| name.to_string())
}

// ============================================================================
// Decode error kinds
// ============================================================================

/// The cause of a single decode error.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeErrorKind {
    /// The node has the wrong shape.
    KindMismatch {
        /// The kind the schema asks for
        expected: NodeKind,
        /// The kind found in the document
        got: NodeKind,
    },
    /// An explicit tag contradicts the target type.
    TagMismatch {
        /// The tag the target type implies
        expected: &'static str,
        /// The tag on the node
        got: String,
    },
    /// A message was given something other than a mapping.
    ExpectedFields {
        /// Full name of the message
        message: String,
        /// The kind found in the document
        got: NodeKind,
    },
    /// A bool field holds something other than `true` or `false`.
    InvalidBool {
        /// The scalar text
        got: String,
    },
    /// Integer text could not be read.
    InvalidInteger(LiteralError),
    /// Integer above the target width.
    IntegerTooLarge {
        /// Largest accepted value
        max: u64,
    },
    /// Integer below the target width.
    IntegerTooSmall {
        /// Smallest accepted value
        min: i64,
    },
    /// Float text could not be read.
    InvalidFloat(LiteralError),
    /// Bytes text is not standard base64.
    InvalidBase64(String),
    /// Enum text names no value and is not a number.
    UnknownEnumValue {
        /// The scalar text
        value: String,
        /// Some of the valid names
        expected: Vec<String>,
    },
    /// Mapping key names no field of the message.
    UnknownField {
        /// The key text
        field: String,
        /// Some of the valid field names
        expected: Vec<String>,
        /// Closest field name, if any is close enough
        suggestion: Option<String>,
    },
    /// An `Any` type URL could not be resolved.
    UnknownType {
        /// The type URL
        url: String,
        /// Why resolution failed
        reason: String,
    },
    /// An `Any` mapping has no `@type` key.
    MissingType,
    /// Duration text could not be read.
    InvalidDuration(String),
    /// Timestamp text could not be read.
    InvalidTimestamp(String),
    /// A dynamic value has the wrong shape for the field it describes.
    UnexpectedValue {
        /// What the field accepts
        expected: &'static str,
        /// Full name of the field
        field: String,
        /// What the document holds
        got: &'static str,
    },
    /// A dynamic number does not fit the field it describes.
    InvalidValue {
        /// What the field accepts
        expected: &'static str,
        /// Full name of the field
        field: String,
        /// Why the number does not fit
        reason: String,
    },
    /// A dynamic value for a bytes field is not base64.
    InvalidBase64Value {
        /// Full name of the field
        field: String,
        /// The decoder error
        reason: String,
    },
    /// A dynamic value was given a node that cannot hold one.
    UnimplementedValueKind(NodeKind),
    /// A required field was not set.
    RequiredNotSet {
        /// Full name of the field
        field: String,
    },
    /// Message nesting went past the configured limit.
    DepthExceeded {
        /// The configured limit
        limit: usize,
    },
    /// A validator rejected a field.
    Violation(Violation),
    /// A validator failed without pointing at a field.
    Validation(String),
    /// An error raised by a caller-registered unmarshaler.
    Custom(String),
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::KindMismatch { expected, got } => {
                write!(f, "expected {expected}, got {got}")
            }
            DecodeErrorKind::TagMismatch { expected, got } => {
                write!(f, "expected tag {expected}, got {got}")
            }
            DecodeErrorKind::ExpectedFields { message, got } => {
                write!(f, "expected fields for {message}, got {got}")
            }
            DecodeErrorKind::InvalidBool { got } => write!(f, "expected bool, got {got:?}"),
            DecodeErrorKind::InvalidInteger(e) => write!(f, "invalid integer: {e}"),
            DecodeErrorKind::IntegerTooLarge { max } => write!(f, "integer is too large: > {max}"),
            DecodeErrorKind::IntegerTooSmall { min } => write!(f, "integer is too small: < {min}"),
            DecodeErrorKind::InvalidFloat(e) => write!(f, "invalid float: {e}"),
            DecodeErrorKind::InvalidBase64(e) => write!(f, "invalid base64: {e}"),
            DecodeErrorKind::UnknownEnumValue { value, expected } => {
                write!(f, "unknown enum value {value:?}, expected one of ")?;
                write_name_list(f, expected)
            }
            DecodeErrorKind::UnknownField {
                field, expected, ..
            } => {
                write!(f, "unknown field {field:?}, expected one of ")?;
                write_name_list(f, expected)
            }
            DecodeErrorKind::UnknownType { url, reason } => {
                write!(f, "unknown type {url:?}: {reason}")
            }
            DecodeErrorKind::MissingType => write!(f, "missing \"@type\""),
            DecodeErrorKind::InvalidDuration(e) => write!(f, "invalid duration: {e}"),
            DecodeErrorKind::InvalidTimestamp(e) => write!(f, "invalid timestamp: {e}"),
            DecodeErrorKind::UnexpectedValue {
                expected,
                field,
                got,
            } => write!(f, "expected {expected} for {field}, got {got}"),
            DecodeErrorKind::InvalidValue {
                expected,
                field,
                reason,
            } => write!(f, "expected {expected} for {field}, but: {reason}"),
            DecodeErrorKind::InvalidBase64Value { field, reason } => {
                write!(f, "expected base64 for {field}, but {reason}")
            }
            DecodeErrorKind::UnimplementedValueKind(kind) => {
                write!(f, "unimplemented value kind: {kind}")
            }
            DecodeErrorKind::RequiredNotSet { field } => {
                write!(f, "required field {field} not set")
            }
            DecodeErrorKind::DepthExceeded { limit } => {
                write!(f, "exceeded maximum nesting depth of {limit}")
            }
            DecodeErrorKind::Violation(v) => Display::fmt(v, f),
            DecodeErrorKind::Validation(msg) => f.write_str(msg),
            DecodeErrorKind::Custom(msg) => f.write_str(msg),
        }
    }
}

fn write_name_list(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    f.write_str("[")?;
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        f.write_str(name)?;
    }
    f.write_str("]")
}

impl DecodeErrorKind {
    /// Get an error code for this kind of error.
    pub fn code(&self) -> &'static str {
        match self {
            DecodeErrorKind::KindMismatch { .. } => "protoyaml::kind_mismatch",
            DecodeErrorKind::TagMismatch { .. } => "protoyaml::tag_mismatch",
            DecodeErrorKind::ExpectedFields { .. } => "protoyaml::expected_fields",
            DecodeErrorKind::InvalidBool { .. } => "protoyaml::invalid_bool",
            DecodeErrorKind::InvalidInteger(_) => "protoyaml::invalid_integer",
            DecodeErrorKind::IntegerTooLarge { .. } | DecodeErrorKind::IntegerTooSmall { .. } => {
                "protoyaml::integer_out_of_range"
            }
            DecodeErrorKind::InvalidFloat(_) => "protoyaml::invalid_float",
            DecodeErrorKind::InvalidBase64(_) => "protoyaml::invalid_base64",
            DecodeErrorKind::UnknownEnumValue { .. } => "protoyaml::unknown_enum_value",
            DecodeErrorKind::UnknownField { .. } => "protoyaml::unknown_field",
            DecodeErrorKind::UnknownType { .. } => "protoyaml::unknown_type",
            DecodeErrorKind::MissingType => "protoyaml::missing_type",
            DecodeErrorKind::InvalidDuration(_) => "protoyaml::invalid_duration",
            DecodeErrorKind::InvalidTimestamp(_) => "protoyaml::invalid_timestamp",
            DecodeErrorKind::UnexpectedValue { .. } => "protoyaml::unexpected_value",
            DecodeErrorKind::InvalidValue { .. } => "protoyaml::invalid_value",
            DecodeErrorKind::InvalidBase64Value { .. } => "protoyaml::invalid_base64",
            DecodeErrorKind::UnimplementedValueKind(_) => "protoyaml::unimplemented_value_kind",
            DecodeErrorKind::RequiredNotSet { .. } => "protoyaml::required_not_set",
            DecodeErrorKind::DepthExceeded { .. } => "protoyaml::depth_exceeded",
            DecodeErrorKind::Violation(_) => "protoyaml::violation",
            DecodeErrorKind::Validation(_) => "protoyaml::validation",
            DecodeErrorKind::Custom(_) => "protoyaml::custom",
        }
    }

    /// Get a label describing where/what the error points to.
    pub fn label(&self) -> String {
        match self {
            DecodeErrorKind::KindMismatch { expected, .. } => format!("expected {expected}"),
            DecodeErrorKind::TagMismatch { expected, .. } => format!("expected tag {expected}"),
            DecodeErrorKind::ExpectedFields { message, .. } => format!("expected fields for {message}"),
            DecodeErrorKind::InvalidBool { .. } => "expected `true` or `false`".into(),
            DecodeErrorKind::InvalidInteger(_) => "invalid integer".into(),
            DecodeErrorKind::IntegerTooLarge { max } => format!("larger than {max}"),
            DecodeErrorKind::IntegerTooSmall { min } => format!("smaller than {min}"),
            DecodeErrorKind::InvalidFloat(_) => "invalid float".into(),
            DecodeErrorKind::InvalidBase64(_) | DecodeErrorKind::InvalidBase64Value { .. } => {
                "invalid base64".into()
            }
            DecodeErrorKind::UnknownEnumValue { value, .. } => format!("unknown enum value '{value}'"),
            DecodeErrorKind::UnknownField {
                field, suggestion, ..
            } => {
                if let Some(suggested) = suggestion {
                    format!("unknown field '{field}' - did you mean '{suggested}'?")
                } else {
                    format!("unknown field '{field}'")
                }
            }
            DecodeErrorKind::UnknownType { url, .. } => format!("unknown type '{url}'"),
            DecodeErrorKind::MissingType => "missing \"@type\"".into(),
            DecodeErrorKind::InvalidDuration(_) => "invalid duration".into(),
            DecodeErrorKind::InvalidTimestamp(_) => "invalid timestamp".into(),
            DecodeErrorKind::UnexpectedValue { expected, .. }
            | DecodeErrorKind::InvalidValue { expected, .. } => format!("expected {expected}"),
            DecodeErrorKind::UnimplementedValueKind(kind) => format!("unexpected {kind}"),
            DecodeErrorKind::RequiredNotSet { field } => format!("missing '{field}'"),
            DecodeErrorKind::DepthExceeded { .. } => "nested too deeply".into(),
            DecodeErrorKind::Violation(v) => v.message.clone(),
            DecodeErrorKind::Validation(_) => "validation failed".into(),
            DecodeErrorKind::Custom(msg) => msg.clone(),
        }
    }
}

// ============================================================================
// Located errors
// ============================================================================

/// A decode error anchored to the node that caused it.
#[derive(Debug, Clone)]
pub struct NodeError {
    /// The specific kind of error
    pub kind: DecodeErrorKind,
    /// 1-based line of the node, 0 when unknown
    pub line: usize,
    /// 1-based column of the node, 0 when unknown
    pub column: usize,
    /// Byte span of the node in the source
    pub span: Span,
    source_code: Arc<str>,
}

impl NodeError {
    pub(crate) fn new(kind: DecodeErrorKind, node: &Node, source_code: Arc<str>) -> Self {
        let len = node.value.chars().count().max(1);
        NodeError {
            kind,
            line: node.line,
            column: node.column,
            span: Span::from_line_column(&source_code, node.line, node.column, len),
            source_code,
        }
    }

    /// Renders the error with a path prefix and a source snippet.
    ///
    /// ```text
    /// config.yaml:3:8 invalid integer: parsing "x": invalid syntax
    ///    3 | count: x
    ///      |        ^................................. invalid integer: ...
    /// ```
    pub fn detailed(&self, path: &str) -> String {
        let message = self.kind.to_string();
        let mut result = format!("{path}:{}:{} {message}\n", self.line, self.column);
        let line = match self.line.checked_sub(1) {
            Some(idx) => self.source_code.split('\n').nth(idx),
            None => None,
        };
        if let Some(line) = line {
            let line_num = format!("{:4}", self.line);
            result.push_str(&format!("{line_num} | {line}\n"));
            let tail = line.len().max(40).saturating_sub(self.column).max(1);
            let marker = format!(
                "{}^{}",
                " ".repeat(self.column.saturating_sub(1)),
                ".".repeat(tail)
            );
            result.push_str(&format!(
                "{} | {marker} {message}\n",
                " ".repeat(line_num.len())
            ));
        }
        result
    }
}

impl Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for NodeError {}

impl miette::Diagnostic for NodeError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        if self.line == 0 {
            return None;
        }
        Some(Box::new(core::iter::once(miette::LabeledSpan::new(
            Some(self.kind.label()),
            self.span.start,
            self.span.len,
        ))))
    }
}

/// Every error collected while decoding one document.
#[derive(Debug, Clone)]
pub struct UnmarshalErrors {
    path: String,
    source_code: Arc<str>,
    errors: Vec<NodeError>,
}

impl UnmarshalErrors {
    pub(crate) fn new(path: String, source_code: Arc<str>, errors: Vec<NodeError>) -> Self {
        UnmarshalErrors {
            path,
            source_code,
            errors,
        }
    }

    /// The collected errors in the order they were found.
    pub fn errors(&self) -> &[NodeError] {
        &self.errors
    }

    /// The path label used as the prefix of each rendered error.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for UnmarshalErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for err in &self.errors {
            f.write_str(&err.detailed(&self.path))?;
        }
        Ok(())
    }
}

impl std::error::Error for UnmarshalErrors {}

impl miette::Diagnostic for UnmarshalErrors {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("protoyaml::unmarshal"))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code as &dyn miette::SourceCode)
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        Some(Box::new(
            self.errors.iter().map(|e| e as &dyn miette::Diagnostic),
        ))
    }
}

// ============================================================================
// Encode errors
// ============================================================================

/// Error produced while encoding a message as YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// A required field is not set and partial messages are not allowed.
    RequiredNotSet {
        /// Full name of the field
        field: String,
    },
    /// The type URL of an `Any` could not be resolved.
    UnknownType {
        /// The type URL
        url: String,
    },
    /// The payload of an `Any` or well-known type could not be decoded.
    InvalidPayload {
        /// Full name of the payload type
        message: String,
        /// Why decoding failed
        reason: String,
    },
    /// A well-known type holds a value with no text form.
    InvalidValue {
        /// Full name of the message
        message: String,
        /// Why the value has no text form
        reason: String,
    },
}

impl Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalError::RequiredNotSet { field } => write!(f, "required field {field} not set"),
            MarshalError::UnknownType { url } => write!(f, "unable to resolve {url:?}"),
            MarshalError::InvalidPayload { message, reason } => {
                write!(f, "invalid payload for {message}: {reason}")
            }
            MarshalError::InvalidValue { message, reason } => {
                write!(f, "invalid {message}: {reason}")
            }
        }
    }
}

impl std::error::Error for MarshalError {}

impl MarshalError {
    /// Get an error code for this kind of error.
    pub fn code(&self) -> &'static str {
        match self {
            MarshalError::RequiredNotSet { .. } => "protoyaml::required_not_set",
            MarshalError::UnknownType { .. } => "protoyaml::unknown_type",
            MarshalError::InvalidPayload { .. } => "protoyaml::invalid_payload",
            MarshalError::InvalidValue { .. } => "protoyaml::invalid_value",
        }
    }
}

// ============================================================================
// Top-level error
// ============================================================================

/// Error type for the crate's entry points.
#[derive(Debug)]
pub enum Error {
    /// The input is not well-formed YAML.
    Syntax {
        /// Scanner message and location
        message: Spanned<String>,
        /// The source input (for diagnostics)
        source_code: Option<String>,
    },
    /// The input holds more than one YAML document.
    MultipleDocuments,
    /// The input bytes are not UTF-8.
    InvalidUtf8(core::str::Utf8Error),
    /// The document does not match the message schema.
    Unmarshal(UnmarshalErrors),
    /// The message could not be encoded.
    Marshal(MarshalError),
    /// The decoded message could not be converted to the requested type.
    Transcode(prost::DecodeError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax { message, .. } => write!(f, "yaml: {}", message.node),
            Error::MultipleDocuments => write!(f, "expected exactly one node in document"),
            Error::InvalidUtf8(e) => write!(f, "invalid UTF-8 input: {e}"),
            Error::Unmarshal(e) => Display::fmt(e, f),
            Error::Marshal(e) => Display::fmt(e, f),
            Error::Transcode(e) => write!(f, "transcoding failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidUtf8(e) => Some(e),
            Error::Unmarshal(e) => Some(e),
            Error::Marshal(e) => Some(e),
            Error::Transcode(e) => Some(e),
            _ => None,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let code = match self {
            Error::Syntax { .. } => "protoyaml::syntax",
            Error::MultipleDocuments => "protoyaml::multiple_documents",
            Error::InvalidUtf8(_) => "protoyaml::invalid_utf8",
            Error::Unmarshal(_) => "protoyaml::unmarshal",
            Error::Marshal(e) => e.code(),
            Error::Transcode(_) => "protoyaml::transcode",
        };
        Some(Box::new(code))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Error::Syntax { source_code, .. } => source_code
                .as_ref()
                .map(|s| s as &dyn miette::SourceCode),
            Error::Unmarshal(e) => miette::Diagnostic::source_code(e),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        let Error::Syntax { message, .. } = self else {
            return None;
        };
        Some(Box::new(core::iter::once(miette::LabeledSpan::new(
            Some(message.node.clone()),
            message.span.start,
            message.span.len,
        ))))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        match self {
            Error::Unmarshal(e) => miette::Diagnostic::related(e),
            _ => None,
        }
    }
}

impl From<UnmarshalErrors> for Error {
    fn from(err: UnmarshalErrors) -> Self {
        Error::Unmarshal(err)
    }
}

impl From<MarshalError> for Error {
    fn from(err: MarshalError) -> Self {
        Error::Marshal(err)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Transcode(err)
    }
}

/// Result type for this crate's entry points
pub type Result<T> = core::result::Result<T, Error>;
