//! # Framework Errors
//!
//! This module defines the failure types shared by every layer of the engine. Collaborator
//! faults are wrapped into one of these kinds and passed up unchanged to the transport
//! boundary, which alone decides how to serialise them (see [`crate::exception`]).

use serde::Serialize;

/// Faults raised by the storage collaborator.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StorageError {
    #[error("Store closed")]
    Closed,
    #[error("Store dropped response channel")]
    Dropped,
    #[error("Store rejected request: {0}")]
    Rejected(String),
}

/// One field-tagged validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Errors surfaced by dispatch and the CRUD operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Not found ({code})")]
    NotFound { code: String },

    #[error("Permission denied ({code})")]
    PermissionDenied { code: String },

    /// Carries every violation, not just the first.
    #[error("Validation failed with {} error(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("Persistence failed ({code})")]
    Persistence {
        code: String,
        #[source]
        source: Option<StorageError>,
    },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Any other exception code, registered or not.
    #[error("{code}")]
    Coded {
        code: String,
        message: Option<String>,
    },
}

impl FrameworkError {
    pub fn not_found(code: impl Into<String>) -> Self {
        FrameworkError::NotFound { code: code.into() }
    }

    pub fn persistence(code: impl Into<String>, source: Option<StorageError>) -> Self {
        FrameworkError::Persistence {
            code: code.into(),
            source,
        }
    }

    pub fn coded(code: impl Into<String>) -> Self {
        FrameworkError::Coded {
            code: code.into(),
            message: None,
        }
    }

    /// The exceptions this error raises, in the order they should be reported.
    pub fn raised(&self) -> Vec<Raised> {
        match self {
            FrameworkError::NotFound { code } | FrameworkError::PermissionDenied { code } => {
                vec![Raised::code(code)]
            }
            FrameworkError::ValidationFailed(errors) => errors
                .iter()
                .map(|error| Raised {
                    code: error.code.clone(),
                    message: error.message.clone(),
                    field: Some(error.field.clone()),
                })
                .collect(),
            FrameworkError::Persistence { code, .. } => vec![Raised::code(code)],
            FrameworkError::MethodNotAllowed => vec![Raised::code("METHOD_NOT_ALLOWED")],
            FrameworkError::Storage(_) => vec![Raised::code("STORAGE_ERROR")],
            FrameworkError::Coded { code, message } => vec![Raised {
                code: code.clone(),
                message: message.clone(),
                field: None,
            }],
        }
    }
}

/// An exception before it is cast against the code table.
#[derive(Debug, Clone, PartialEq)]
pub struct Raised {
    pub code: String,
    pub message: Option<String>,
    pub field: Option<String>,
}

impl Raised {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
            field: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_keeps_every_error() {
        let error = FrameworkError::ValidationFailed(vec![
            FieldError::new("username", "FIELD_REQUIRED"),
            FieldError::new("status", "INVALID_FIELD_VALUE").with_message("bad status"),
        ]);
        let raised = error.raised();
        assert_eq!(raised.len(), 2);
        assert_eq!(raised[0].field.as_deref(), Some("username"));
        assert_eq!(raised[1].message.as_deref(), Some("bad status"));
    }

    #[test]
    fn test_storage_error_converts() {
        let error: FrameworkError = StorageError::Closed.into();
        assert_eq!(error.raised(), vec![Raised::code("STORAGE_ERROR")]);
    }
}
