//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures when parsing identifiers and index entries.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A timestamp string could not be parsed as seconds since the epoch
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// A save file name that would not stay inside the save directory
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}
