//! Error types and result types for repository operations.
//!
//! This module provides error handling for the transformation pipeline and the
//! repository façade. Use [`RepoResult<T>`] as the return type for fallible
//! operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by the repository layer.
///
/// Identifier and filter errors come from the transformation pipeline;
/// the `*Failed` variants report non-acknowledged writes or count mismatches
/// from the backing store; `Backend` wraps anything the store itself reports.
#[derive(Error, Debug)]
pub enum RepoError {
    /// The identifier could not be encoded to (or decoded from) the
    /// configured native key shape.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    /// The identifier field of a filter used an operator other than
    /// direct equality, `$in`, or `$ne`. Richer identifier queries must go
    /// through the store handle directly.
    #[error("Unsupported identifier filter operator {0}; use the store handle directly")]
    UnsupportedIdFilter(String),
    /// The store inserted fewer documents than requested, or did not
    /// acknowledge the insert.
    #[error("Create failed in collection {collection}: expected {expected} inserted, got {inserted}")]
    CreateFailed {
        collection: String,
        expected: u64,
        inserted: u64,
    },
    /// The store did not acknowledge an update.
    #[error("Update failed in collection {0}: write not acknowledged")]
    UpdateFailed(String),
    /// The store did not acknowledge a delete.
    #[error("Delete failed in collection {0}: write not acknowledged")]
    DeleteFailed(String),
    /// The repository configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Serialization/deserialization error when converting between document
    /// formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying store.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

impl From<BsonError> for RepoError {
    fn from(err: BsonError) -> Self {
        RepoError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for RepoError {
    fn from(err: SerdeJsonError) -> Self {
        RepoError::Serialization(err.to_string())
    }
}
