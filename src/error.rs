//! Error types for Lakeview.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for Lakeview operations.
#[derive(Error, Debug)]
pub enum LakeviewError {
    /// Input validation errors (empty execution ids, malformed parameters, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query construction errors (references to columns the schema does not declare, etc.)
    #[error("Build error: {0}")]
    Build(String),

    /// Query service errors (submission rejected, polling failed, gateway unreachable, etc.)
    #[error("Service error: {0}")]
    Service(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (closed channels, unexpected states, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LakeviewError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a build error with the given message.
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// Creates a service error with the given message.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Build(_) => "Build Error",
            Self::Service(_) => "Service Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using LakeviewError.
pub type Result<T> = std::result::Result<T, LakeviewError>;
