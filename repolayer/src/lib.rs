//! Main repolayer crate providing a unified interface to the repository
//! access layer.
//!
//! This crate is the primary entry point for users of repolayer. It
//! re-exports the core types and provides convenient access to the storage
//! backends.
//!
//! # Features
//!
//! - **Stable application identifiers** - documents are addressed through an
//!   opaque string `id`, regardless of the store's native key type
//! - **Transparent audit metadata** - optional version counters and
//!   created/updated timestamps, injected and maintained by the layer
//! - **Soft deletes** - optional `deletedAt` marking with default exclusion
//!   from filter-driven operations
//! - **Plain filters and updates** - callers speak the familiar operator
//!   shapes; only the identifier field is rewritten in flight
//! - **Structured telemetry** - one record per operation to a configurable
//!   sink
//!
//! # Quick Start
//!
//! ```ignore
//! use repolayer::{Repo, RepoConfig, memory::MemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let config = RepoConfig::builder()
//!         .versioning(true)
//!         .timestamps(true)
//!         .build()?;
//!     let users = Repo::new(&store, "users", config)?;
//!
//!     // create: identifier assigned, version 1, createdAt stamped
//!     let alice = users.create(doc! { "name": "Alice", "status": "active" }).await?;
//!     let id = alice.get_str("id")?;
//!
//!     // update: version incremented, updatedAt refreshed
//!     let updated = users
//!         .update_one(doc! { "id": id }, doc! { "$set": { "status": "away" } })
//!         .await?;
//!
//!     // query: plain filters, decoded results
//!     let away = users.query(doc! { "status": "away" }).await?;
//!     assert_eq!(away.len(), 1);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Transactions
//!
//! The layer never starts, commits, or aborts a transaction itself. A
//! backend that supports transactions hands out opaque session tokens; a
//! repository configured with one threads it through every store call:
//!
//! ```ignore
//! use repolayer::{Repo, RepoConfig, mongodb::MongoStore};
//!
//! let token = store.begin_transaction().await?;
//! let config = RepoConfig::builder().session(token).build()?;
//! let accounts = Repo::new(&store, "accounts", config)?;
//! // ... calls on `accounts` join the transaction ...
//! store.commit_transaction(&token).await?;
//! ```
//!
//! # Advanced queries
//!
//! Identifier filters are limited to direct equality, `$in`, and `$ne` by
//! design. Anything richer bypasses the façade through
//! [`Repo::handle`](repolayer_core::repo::Repo::handle), which exposes the
//! raw store handle.
//!
//! # Backends
//!
//! - [`memory`] - in-memory storage for development and testing
//! - [`mongodb`] - persistent MongoDB backend (requires the `mongodb`
//!   feature)

pub mod prelude;

pub use repolayer_core::{config, error, filter, handle, id, provision, repo, telemetry, transform, update};

pub use repolayer_core::{
    config::{RepoConfig, SessionToken},
    error::{RepoError, RepoResult},
    repo::Repo,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory store handle implementation.
pub mod memory {
    pub use repolayer_memory::MemoryStore;
}

/// MongoDB store handle implementation.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use repolayer_mongodb::{MongoStore, MongoStoreBuilder};
}
