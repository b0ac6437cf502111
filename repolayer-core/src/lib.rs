//! A configurable access layer sitting atop a schemaless document store.
//!
//! This crate is the core of the repolayer project: the bidirectional
//! mapping between an application-facing document shape (stable string
//! identifier, plain filters, plain update operators) and a store's native
//! shape (driver-specific primary-key type, versioning and audit metadata
//! injected transparently, soft-delete semantics).
//!
//! - **Identifier codec** ([`id`]) - String identifiers to native keys and back
//! - **Document transformer** ([`transform`]) - Insert preparation and read-side decoding
//! - **Filter rewriter** ([`filter`]) - Application filters to store filters
//! - **Update rewriter** ([`update`]) - Version/timestamp operator injection
//! - **Repository façade** ([`repo`]) - The public operation surface
//! - **Store handle abstraction** ([`handle`]) - The one boundary to the backing store
//! - **Configuration** ([`config`]) - Immutable per-repository toggles
//! - **Operation telemetry** ([`telemetry`]) - Structured per-call records
//! - **Error handling** ([`error`]) - Error and result types
//! - **Provisioning** ([`provision`]) - Collection setup/teardown helper
//!
//! # Example
//!
//! ```ignore
//! use repolayer_core::{config::RepoConfig, repo::Repo};
//! use bson::doc;
//!
//! let config = RepoConfig::builder()
//!     .versioning(true)
//!     .timestamps(true)
//!     .build()?;
//! let users = Repo::new(&store, "users", config)?;
//!
//! let alice = users.create(doc! { "name": "Alice" }).await?;
//! let active = users.query(doc! { "status": "active" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as repolayer_core;

pub mod config;
pub mod error;
pub mod filter;
pub mod handle;
pub mod id;
pub mod provision;
pub mod repo;
pub mod telemetry;
pub mod transform;
pub mod update;
