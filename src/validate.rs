//! Hook for semantic validation of decoded messages.

use core::fmt;

use prost_reflect::DynamicMessage;

/// Checks a fully decoded message.
///
/// Implemented for any `Fn(&DynamicMessage) -> Result<(), ValidationError>`.
pub trait Validator: Send + Sync {
    /// Validates the message.
    fn validate(&self, message: &DynamicMessage) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&DynamicMessage) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, message: &DynamicMessage) -> Result<(), ValidationError> {
        self(message)
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path to the field, e.g. `foo[0].bar` or `labels["key"]`.
    pub field_path: String,
    /// The violation concerns a map key rather than its value.
    pub for_key: bool,
    /// Human-readable description.
    pub message: String,
    /// Identifier of the failed constraint.
    pub constraint_id: String,
}

impl Violation {
    /// Creates a violation on the value at `field_path`.
    pub fn new(
        field_path: impl Into<String>,
        message: impl Into<String>,
        constraint_id: impl Into<String>,
    ) -> Self {
        Violation {
            field_path: field_path.into(),
            for_key: false,
            message: message.into(),
            constraint_id: constraint_id.into(),
        }
    }

    /// Points the violation at the map key instead of the value.
    pub fn for_key(mut self) -> Self {
        self.for_key = true;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.field_path, self.message, self.constraint_id
        )
    }
}

/// Why validation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field-level violations. Each is reported at the closest document node.
    Violations(Vec<Violation>),
    /// Any other failure. Reported at the document root.
    Other(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Violations(violations) => {
                for (i, v) in violations.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            ValidationError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ValidationError {}
