//! In-memory store handle for repolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreHandle` trait. It evaluates the same Mongo-style filter and update
//! operator subset the repository layer emits, making it a drop-in backend
//! for development and tests.
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
//!     let users = Repo::new(&store, "users", RepoConfig::default())?;
//!
//!     let alice = users.create(doc! { "name": "Alice" }).await?;
//!     println!("created {}", alice.get_str("id")?);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as repolayer_memory;

pub mod evaluator;
pub mod store;

pub use store::MemoryStore;
