//! Convenient re-exports of commonly used types from repolayer.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use repolayer::prelude::*;
//! ```

pub use repolayer_core::{
    config::{RepoConfig, RepoConfigBuilder, SessionToken},
    error::{RepoError, RepoResult},
    handle::{
        DeleteReceipt, FindOptions, InsertReceipt, ReturnPolicy, Sort, SortDirection, StoreHandle,
        StoreHandleBuilder, UpdateManyReceipt, UpdateOneReceipt,
    },
    provision::CollectionSet,
    repo::{CountOptions, DeleteOptions, QueryOptions, Repo, UpdateManyOptions, UpdateOptions},
    telemetry::{Action, OperationLogger, OperationRecord},
};
