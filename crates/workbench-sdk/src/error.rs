//! Error types for procedure routing and dispatch

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Boxed error carried as the source of a handler failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single field-level schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Offending field name (empty for the input value itself)
    pub field: String,
    /// What was wrong with it
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse category of a [`RouterError`], stable across transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicatePath,
    UnknownProcedure,
    Validation,
    OutputValidation,
    ProviderNotFound,
    UnsupportedProcedure,
    Handler,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicatePath => "duplicate_path",
            ErrorKind::UnknownProcedure => "unknown_procedure",
            ErrorKind::Validation => "validation",
            ErrorKind::OutputValidation => "output_validation",
            ErrorKind::ProviderNotFound => "provider_not_found",
            ErrorKind::UnsupportedProcedure => "unsupported_procedure",
            ErrorKind::Handler => "handler",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while registering or calling procedures
#[derive(Debug, Error)]
pub enum RouterError {
    /// A contract with the same path is already registered
    #[error("Procedure already registered: {0}")]
    DuplicatePath(String),

    /// No contract is registered under the path
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    /// Input did not match the contract's input schema
    #[error("Invalid input for '{path}': {}", join_issues(.issues))]
    Validation {
        path: String,
        issues: Vec<FieldIssue>,
    },

    /// Handler returned a value that does not match the output schema
    #[error("Handler for '{path}' returned invalid output: {}", join_issues(.issues))]
    OutputValidation {
        path: String,
        issues: Vec<FieldIssue>,
    },

    /// No provider instance satisfies the selection
    #[error("{}", provider_not_found_message(.provider_type, .name.as_deref()))]
    ProviderNotFound {
        provider_type: String,
        name: Option<String>,
    },

    /// The selected provider does not implement the procedure
    #[error("Provider '{provider}' does not support '{procedure}' (supported: {})", .supported.join(", "))]
    UnsupportedProcedure {
        provider: String,
        procedure: String,
        supported: Vec<String>,
    },

    /// The handler itself failed
    #[error("{message}")]
    Handler {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The call exceeded its deadline
    #[error("Procedure '{path}' timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },
}

fn provider_not_found_message(provider_type: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Provider '{}' of type '{}' not found", name, provider_type),
        None => format!("No provider of type '{}' is available", provider_type),
    }
}

impl RouterError {
    /// Create a handler error from a plain message
    pub fn handler(message: impl Into<String>) -> Self {
        RouterError::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error raised inside a handler
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RouterError::Handler {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a validation error with a single issue
    pub fn validation(path: impl Into<String>, issue: FieldIssue) -> Self {
        RouterError::Validation {
            path: path.into(),
            issues: vec![issue],
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::DuplicatePath(_) => ErrorKind::DuplicatePath,
            RouterError::UnknownProcedure(_) => ErrorKind::UnknownProcedure,
            RouterError::Validation { .. } => ErrorKind::Validation,
            RouterError::OutputValidation { .. } => ErrorKind::OutputValidation,
            RouterError::ProviderNotFound { .. } => ErrorKind::ProviderNotFound,
            RouterError::UnsupportedProcedure { .. } => ErrorKind::UnsupportedProcedure,
            RouterError::Handler { .. } => ErrorKind::Handler,
            RouterError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Field-level issues for validation failures, empty otherwise
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            RouterError::Validation { issues, .. } | RouterError::OutputValidation { issues, .. } => {
                issues
            }
            _ => &[],
        }
    }

    /// Render the error and its source chain, one cause per line
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::from_error(err)
    }
}
