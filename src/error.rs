//! Error types for cdp-console operations.
//!
//! Defines error types for the major subsystems:
//! - Session and slot coordination
//! - Agent invocation
//! - LLM API interactions
//! - Export to the filesystem

use thiserror::Error;

use crate::session::SlotKind;

/// Errors raised by session and coordinator operations.
///
/// Agent failures never appear here: they are converted into the slot's
/// displayable result at the job boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Project is not initialized: submit a project name and requirements first")]
    NotInitialized,

    #[error("Unknown analysis slot '{0}'")]
    UnknownSlot(String),

    #[error("No result available for slot '{0}'")]
    NoResult(SlotKind),

    #[error("Slot '{0}' has no queued job to run")]
    NotPending(SlotKind),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors that can occur when invoking the external agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    InvocationFailed(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("{0}")]
    Llm(#[from] LlmError),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while writing exports and analyses to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid project name '{0}': must not contain path separators")]
    InvalidProjectName(String),

    #[error("Invalid export file name '{0}': must not contain path separators")]
    InvalidFileName(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
