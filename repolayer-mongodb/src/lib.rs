//! MongoDB store handle for repolayer.
//!
//! This crate implements the `StoreHandle` trait on top of the official
//! MongoDB driver. Filters and updates pass through in the driver's native
//! shape; the adapter maps options and receipts, and leases driver sessions
//! behind opaque tokens so an external coordinator can group repository
//! calls into one transaction.
//!
//! To use this backend, enable the `mongodb` feature of the umbrella crate:
//!
//! ```toml
//! [dependencies]
//! repolayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use repolayer::{Repo, RepoConfig, mongodb::MongoStore};
//! use repolayer_core::handle::StoreHandleBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoStore::builder("mongodb://localhost:27017", "app")
//!         .build()
//!         .await?;
//!
//!     let token = store.begin_transaction().await?;
//!     let config = RepoConfig::builder().session(token).build()?;
//!     let users = Repo::new(&store, "users", config)?;
//!     // ... repository calls join the transaction ...
//!     store.commit_transaction(&token).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as repolayer_mongodb;

pub mod store;

pub use store::{MongoStore, MongoStoreBuilder};
