//! Store handle abstraction.
//!
//! The repository's only boundary is this trait: an async interface to a
//! named collection of BSON documents, speaking the store's native filter
//! and update shapes. Implementations exist for an in-memory store and for
//! MongoDB; anything that can answer these calls can sit behind the façade.
//!
//! Every method takes an optional [`SessionToken`] so an external
//! transaction coordinator can group several calls into one atomic unit.
//! The token is a capability passed explicitly per call, never ambient
//! state, so concurrent callers with different sessions cannot
//! cross-contaminate.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{config::SessionToken, error::RepoResult};

/// Snapshot choice for an atomic find-and-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPolicy {
    /// Return the document as it was before the update was applied.
    Before,
    /// Return the document with the update applied.
    After,
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Creates an ascending sort on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    /// Creates a descending sort on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Pagination and ordering options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

/// Outcome of an insert request.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertReceipt {
    /// Whether the store acknowledged the write.
    pub acknowledged: bool,
    /// How many documents the store reports as inserted.
    pub inserted_count: u64,
    /// Native keys of the inserted documents, in request order. Lets the
    /// caller recover store-assigned keys.
    pub inserted_ids: Vec<Bson>,
}

/// Outcome of an atomic find-and-update request.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOneReceipt {
    /// Whether the store acknowledged the write.
    pub acknowledged: bool,
    /// The matched document (pre- or post-update per [`ReturnPolicy`]),
    /// or `None` when nothing matched.
    pub value: Option<Document>,
}

/// Outcome of a bulk update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateManyReceipt {
    /// Whether the store acknowledged the write.
    pub acknowledged: bool,
    /// How many documents matched the filter.
    pub matched_count: u64,
    /// How many documents were modified.
    pub modified_count: u64,
}

/// Outcome of a bulk delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReceipt {
    /// Whether the store acknowledged the write.
    pub acknowledged: bool,
    /// How many documents were removed.
    pub deleted_count: u64,
}

/// Abstract interface to the backing document store.
///
/// Implementations must be thread-safe; the façade issues no internal
/// concurrency beyond what the caller's runtime provides, so every method
/// is a single independently awaitable round trip.
///
/// The collection-lifecycle methods (`create_collection`, `drop_collection`,
/// `list_collections`) serve provisioning at setup/teardown time and are
/// outside the transformation pipeline.
#[async_trait]
pub trait StoreHandle: Send + Sync + Debug {
    /// Inserts a single document.
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt>;

    /// Inserts a batch of documents in one bulk request.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt>;

    /// Counts documents matching a filter.
    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<u64>;

    /// Returns the first document matching a filter, or `None`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<Option<Document>>;

    /// Returns all documents matching a filter, honoring [`FindOptions`].
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&SessionToken>,
    ) -> RepoResult<Vec<Document>>;

    /// Atomically updates the first document matching a filter and returns
    /// the chosen snapshot. No concurrent writer can interleave between the
    /// update and the returned snapshot.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        return_policy: ReturnPolicy,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateOneReceipt>;

    /// Applies an update expression to every document matching a filter.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateManyReceipt>;

    /// Removes every document matching a filter.
    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<DeleteReceipt>;

    /// Creates a named collection.
    async fn create_collection(
        &self,
        name: &str,
        session: Option<&SessionToken>,
    ) -> RepoResult<()>;

    /// Drops a named collection and all its documents.
    async fn drop_collection(&self, name: &str) -> RepoResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> RepoResult<Vec<String>>;
}

/// Factory trait for constructing store handles, for backends whose setup
/// (connection, bootstrap) is itself async.
#[async_trait]
pub trait StoreHandleBuilder {
    type Handle: StoreHandle;

    async fn build(self) -> RepoResult<Self::Handle>;
}

#[async_trait]
impl<H> StoreHandle for &H
where
    H: StoreHandle,
{
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        (*self)
            .insert_one(collection, document, session)
            .await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        (*self)
            .insert_many(collection, documents, session)
            .await
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<u64> {
        (*self)
            .count(collection, filter, session)
            .await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<Option<Document>> {
        (*self)
            .find_one(collection, filter, session)
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&SessionToken>,
    ) -> RepoResult<Vec<Document>> {
        (*self)
            .find(collection, filter, options, session)
            .await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        return_policy: ReturnPolicy,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateOneReceipt> {
        (*self)
            .find_one_and_update(collection, filter, update, return_policy, session)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateManyReceipt> {
        (*self)
            .update_many(collection, filter, update, session)
            .await
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<DeleteReceipt> {
        (*self)
            .delete_many(collection, filter, session)
            .await
    }

    async fn create_collection(
        &self,
        name: &str,
        session: Option<&SessionToken>,
    ) -> RepoResult<()> {
        (*self)
            .create_collection(name, session)
            .await
    }

    async fn drop_collection(&self, name: &str) -> RepoResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> RepoResult<Vec<String>> {
        (*self).list_collections().await
    }
}
