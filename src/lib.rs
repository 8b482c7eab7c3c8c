//! YAML encoding and decoding for Protobuf messages.
//!
//! Decoding is driven by message descriptors from [`prost_reflect`], so any
//! message type known to a descriptor pool can be read from YAML. Problems in
//! the document are collected rather than returned one at a time, and each
//! one points at the line and column it came from:
//!
//! ```text
//! config.yaml:3:10 invalid integer: parsing "abc": invalid syntax
//!    3 |   count: abc
//!      |          ^.............................. invalid integer: parsing "abc": invalid syntax
//! ```
//!
//! All errors also implement [`miette::Diagnostic`] for rich terminal
//! reports.
//!
//! The accepted document shape follows the canonical JSON mapping of
//! Protobuf: lowerCamelCase or original field names, enum names or numbers,
//! and the usual string forms of the well-known types.

#![warn(missing_docs)]

extern crate alloc;

mod deserialize;
mod duration;
mod emit;
mod error;
mod field;
mod literal;
mod locate;
mod node;
mod serialize;
mod span;
mod timestamp;
mod validate;
mod value;
mod wkt;

pub use deserialize::{
    CustomUnmarshaler, UnmarshalOptions, Unmarshaler, from_slice, from_str, from_str_dynamic,
};
pub use duration::{DurationError, format_duration, parse_duration};
pub use emit::YamlWrite;
pub use error::{DecodeErrorKind, Error, MarshalError, NodeError, Result, UnmarshalErrors};
pub use field::{Field, TypeResolver, find_field};
pub use literal::{LiteralError, parse_float, parse_signed, parse_unsigned};
pub use locate::node_closest_to_path;
pub use node::{Node, NodeKind, parse};
pub use serialize::{MarshalOptions, to_string, to_string_dynamic, to_writer};
pub use span::{Pos, Span, Spanned};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use validate::{ValidationError, Validator, Violation};
