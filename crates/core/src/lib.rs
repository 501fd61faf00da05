//! Shared primitives for all Rust crates in the cloud auditor.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across auditor crates.
pub type AppResult<T> = Result<T, AppError>;

/// Maximum accepted length for caller-supplied job identifiers.
pub const JOB_ID_MAX_LENGTH: usize = 64;

const GENERATED_JOB_ID_PREFIX: &str = "audit_";
const GENERATED_JOB_ID_HEX_LENGTH: usize = 12;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Audit job identifier.
///
/// Server-generated identifiers look like `audit_3f9c0d12ab4e`. Caller-supplied
/// identifiers are accepted when they only use ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Creates a validated job identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation("job_id must not be empty".to_owned()));
        }

        if trimmed.len() > JOB_ID_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "job_id must be at most {JOB_ID_MAX_LENGTH} characters"
            )));
        }

        if !trimmed
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
        {
            return Err(AppError::Validation(format!(
                "job_id '{trimmed}' may only contain ASCII letters, digits, '_' and '-'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a fresh server-side job identifier.
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        let suffix = hex.get(..GENERATED_JOB_ID_HEX_LENGTH).unwrap_or(hex.as_str());
        Self(format!("{GENERATED_JOB_ID_PREFIX}{suffix}"))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for JobId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Work could not be handed to the queue transport.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Caller is not authenticated for the requested surface.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
