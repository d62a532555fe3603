//! # Exception Codes
//!
//! Every failure leaves the API as a list of coded exceptions. The [`CodeTable`] maps a code
//! to its HTTP-style status and default message; codes nobody registered are reported as
//! `UNKNOWN_EXCEPTION`, except inside a failed validation, where they keep their code and the
//! `VALIDATION_FAILED` status. The response status is taken from the first exception.

use crate::error::{FrameworkError, Raised};
use serde::Serialize;
use std::collections::HashMap;

pub const UNKNOWN_EXCEPTION: &str = "UNKNOWN_EXCEPTION";
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

const BUILT_IN: &[(&str, u16, &str)] = &[
    ("BAD_REQUEST", 400, "Bad request"),
    ("FAILED_TO_CREATE", 500, "Failed to create"),
    ("FAILED_TO_DELETE", 500, "Failed to delete"),
    ("FAILED_TO_UPDATE", 500, "Failed to update"),
    ("FIELD_REQUIRED", 400, "Field is required"),
    ("HOOK_FAILED", 500, "Hook failed"),
    ("HOOK_TIMEOUT", 500, "Hook timed out"),
    ("INVALID_FIELD_TYPE", 400, "Invalid field type"),
    ("INVALID_FIELD_VALUE", 400, "Invalid field value"),
    ("METHOD_NOT_ALLOWED", 405, "Method not allowed"),
    ("NOT_FOUND", 404, "Not found"),
    ("PERMISSION_DENIED", 403, "Permission denied"),
    ("PERSISTENCE_ERROR", 500, "Persistence error"),
    ("RESOURCE_NOT_FOUND", 404, "Resource not found"),
    ("STORAGE_ERROR", 500, "Storage error"),
    (VALIDATION_FAILED, 400, "Validation failed"),
    (UNKNOWN_EXCEPTION, 500, "Unknown exception"),
];

/// Status and default message of a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInfo {
    pub status: u16,
    pub message: String,
}

/// Registry of exception codes.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: HashMap<String, CodeInfo>,
}

impl Default for CodeTable {
    fn default() -> Self {
        let mut table = Self {
            codes: HashMap::new(),
        };
        for (code, status, message) in BUILT_IN {
            table.register(*code, *status, *message);
        }
        table
    }
}

impl CodeTable {
    /// Registers (or overrides) a code.
    pub fn register(&mut self, code: impl Into<String>, status: u16, message: impl Into<String>) {
        self.codes.insert(
            code.into(),
            CodeInfo {
                status,
                message: message.into(),
            },
        );
    }

    pub fn get(&self, code: &str) -> Option<&CodeInfo> {
        self.codes.get(code)
    }

    /// Resolves a raised exception against the table.
    ///
    /// An unknown code becomes `UNKNOWN_EXCEPTION`; an explicit message wins over the table's.
    pub fn cast(&self, raised: &Raised) -> Exception {
        let (code, info) = match self.codes.get(&raised.code) {
            Some(info) => (raised.code.clone(), info.clone()),
            None => (UNKNOWN_EXCEPTION.to_string(), self.unknown()),
        };
        Exception {
            code,
            message: raised.message.clone().unwrap_or(info.message),
            status: info.status,
            field: raised.field.clone().filter(|field| !field.is_empty()),
        }
    }

    fn unknown(&self) -> CodeInfo {
        self.codes.get(UNKNOWN_EXCEPTION).cloned().unwrap_or(CodeInfo {
            status: 500,
            message: "Unknown exception".to_string(),
        })
    }

    /// Field errors of a failed validation keep their code even when it is unregistered; such
    /// codes take the status and message of `VALIDATION_FAILED`.
    pub fn cast_field_error(&self, raised: &Raised) -> Exception {
        if self.codes.contains_key(&raised.code) {
            return self.cast(raised);
        }
        let info = self
            .codes
            .get(VALIDATION_FAILED)
            .cloned()
            .unwrap_or(CodeInfo {
                status: 400,
                message: "Validation failed".to_string(),
            });
        Exception {
            code: raised.code.clone(),
            message: raised.message.clone().unwrap_or(info.message),
            status: info.status,
            field: raised.field.clone().filter(|field| !field.is_empty()),
        }
    }

    /// Serialises a failure into its status and error body.
    pub fn error_body(&self, error: &FrameworkError) -> (u16, ErrorBody) {
        let raised = error.raised();
        let exceptions: Vec<Exception> = match error {
            FrameworkError::ValidationFailed(_) => {
                raised.iter().map(|r| self.cast_field_error(r)).collect()
            }
            _ => raised.iter().map(|r| self.cast(r)).collect(),
        };
        let status = exceptions.first().map(|e| e.status).unwrap_or(500);
        (status, ErrorBody { exceptions })
    }
}

/// A cast exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exception {
    pub code: String,
    pub message: String,
    #[serde(skip)]
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// `{"exceptions": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub exceptions: Vec<Exception>,
}
