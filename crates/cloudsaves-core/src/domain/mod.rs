//! Domain types
//!
//! This module contains the core domain types for CloudSaves:
//! - Newtypes for timestamps and provider identifiers
//! - Remote file descriptors produced by directory listings
//! - The error payload delivered by failed storage requests
//! - Domain-specific error types

pub mod error_response;
pub mod errors;
pub mod newtypes;
pub mod remote_file;

// Re-export commonly used types
pub use error_response::ErrorResponse;
pub use errors::DomainError;
pub use newtypes::*;
pub use remote_file::RemoteFile;
