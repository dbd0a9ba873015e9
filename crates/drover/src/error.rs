//! Error types for the Drover engine.

use std::fmt;

use crate::schema::SchemaError;

/// The main error type for wizard construction and configuration.
#[derive(Debug)]
pub enum WizardError {
    /// Schema authoring failed.
    Schema(SchemaError),
    /// The wizard was built outside a tokio runtime context.
    NoRuntime,
    /// The builder was given no schema.
    MissingSchema,
    /// The builder was given no submit gateway.
    MissingGateway,
    /// The builder was given no steps.
    NoSteps,
    /// The schema declares uniqueness rules but no probe was provided.
    MissingProbe,
    /// Options bindings were declared but no provider was given.
    MissingProvider,
    /// A step or binding references a field the schema does not declare.
    UnknownField {
        /// The offending field name.
        field: String,
    },
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "schema error: {err}"),
            Self::NoRuntime => {
                write!(f, "wizard must be built inside a tokio runtime context")
            }
            Self::MissingSchema => write!(f, "no schema was provided"),
            Self::MissingGateway => write!(f, "no submit gateway was provided"),
            Self::NoSteps => write!(f, "at least one step is required"),
            Self::MissingProbe => write!(
                f,
                "schema declares uniqueness rules but no uniqueness probe was provided"
            ),
            Self::MissingProvider => write!(
                f,
                "options bindings were declared but no options provider was provided"
            ),
            Self::UnknownField { field } => {
                write!(f, "field '{field}' is not declared by the schema")
            }
        }
    }
}

impl std::error::Error for WizardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for WizardError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

/// A specialized Result type for wizard operations.
pub type Result<T> = std::result::Result<T, WizardError>;
