//! Error types for response normalization.

use thiserror::Error;

/// Result type alias for normalization.
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Structurally unrecoverable model output. Every variant is terminal for
/// the current request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("No JSON object delimiters found in model output")]
    NoJsonObjectFound,

    #[error("Model output is not valid JSON and could not be repaired: {reason}")]
    UnrepairableJson { reason: String },

    #[error("Model returned a JSON array without an object in it")]
    ListWithoutObject,

    #[error("Model returned a JSON {found} where an object was expected")]
    TopLevelNotObject { found: String },

    #[error("Model JSON violates the response contract at '{field}': {reason}")]
    ContractViolation { field: String, reason: String },
}

impl NormalizeError {
    /// Stable name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoJsonObjectFound => "no_json_object",
            Self::UnrepairableJson { .. } => "unrepairable_json",
            Self::ListWithoutObject => "list_without_object",
            Self::TopLevelNotObject { .. } => "top_level_not_object",
            Self::ContractViolation { .. } => "contract_violation",
        }
    }

    pub(crate) fn violation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
