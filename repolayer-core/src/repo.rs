//! Repository façade: the public operation surface.
//!
//! A [`Repo`] binds a store handle, a collection name, and an immutable
//! [`RepoConfig`], and sequences the transformation pipeline around every
//! store call: encode on the way in, store round trip, decode on the way
//! out, one telemetry record per call. The façade holds no state between
//! calls; all state lives in the backing store.

use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use chrono::Utc;
use std::time::Instant;
use tracing::debug;

use crate::{
    config::RepoConfig,
    error::{RepoError, RepoResult},
    filter::{exclude_deleted, prepare_filter},
    handle::{FindOptions, ReturnPolicy, Sort, StoreHandle},
    id::{NATIVE_KEY_FIELD, decode_document},
    telemetry::{Action, OperationRecord},
    transform::{prepare_insert, reverse_read},
    update::{prepare_soft_delete, prepare_update},
};

/// Per-call options for `count_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountOptions {
    /// Count soft-deleted documents too.
    pub include_deleted: bool,
}

/// Per-call options for `update_one_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Overrides the configured snapshot choice for this call.
    pub return_latest: Option<bool>,
    /// Match soft-deleted documents too.
    pub include_deleted: bool,
}

/// Per-call options for `update_many_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateManyOptions {
    /// Match soft-deleted documents too.
    pub include_deleted: bool,
}

/// Per-call options for `delete_many_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Physically remove matches even when soft delete is configured.
    pub hard_delete: bool,
    /// Do not count a soft delete as an accepted update of the version
    /// counter.
    pub skip_version_update: bool,
    /// Match soft-deleted documents too (purging, un-hiding).
    pub include_deleted: bool,
}

/// Per-call options for `query_with`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Maximum number of documents to return. Falls back to the configured
    /// default query limit.
    pub limit: Option<u64>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Return soft-deleted documents too.
    pub include_deleted: bool,
}

/// Repository over one named collection of a document store.
///
/// Cheap to construct; build one per collection. The store handle is
/// typically borrowed (`Repo::new(&store, ...)`) so several repositories
/// can share a backend.
///
/// # Example
///
/// ```ignore
/// use repolayer::{Repo, RepoConfig, memory::MemoryStore};
/// use bson::doc;
///
/// let store = MemoryStore::new();
/// let config = RepoConfig::builder().versioning(true).build()?;
/// let users = Repo::new(&store, "users", config)?;
///
/// let created = users.create(doc! { "name": "Alice" }).await?;
/// let found = users.get_by_id(created.get_str("id")?).await?;
/// ```
#[derive(Debug)]
pub struct Repo<H: StoreHandle> {
    handle: H,
    collection: String,
    config: RepoConfig,
}

impl<H: StoreHandle> Repo<H> {
    /// Creates a repository over a named collection.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Config`] for an empty collection name.
    pub fn new(handle: H, collection: impl Into<String>, config: RepoConfig) -> RepoResult<Self> {
        let collection = collection.into();
        if collection.is_empty() {
            return Err(RepoError::Config("collection name must not be empty".to_string()));
        }

        Ok(Self { handle, collection, config })
    }

    /// Returns the name of the backing collection.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Returns the repository configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Returns the underlying store handle, for queries the façade's
    /// narrow filter contract does not cover.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Creates a single document and returns its stored, application-shaped
    /// representation (identifier populated, metadata stamped).
    ///
    /// Managed fields in the payload are ignored; the repository owns them.
    ///
    /// # Errors
    ///
    /// [`RepoError::CreateFailed`] when the store reports an unacknowledged
    /// write or fewer than one inserted document.
    pub async fn create(&self, document: Document) -> RepoResult<Document> {
        let started = Instant::now();
        let started_at = Utc::now();

        let mut prepared = prepare_insert(&document, DateTime::now(), &self.config)?;
        let receipt = self
            .handle
            .insert_one(&self.collection, prepared.clone(), self.config.session.as_ref())
            .await?;
        let duration_ms = elapsed_ms(started);

        if !receipt.acknowledged || receipt.inserted_count != 1 {
            return Err(RepoError::CreateFailed {
                collection: self.collection.clone(),
                expected: 1,
                inserted: receipt.inserted_count,
            });
        }

        // a store-assigned key is only known from the receipt
        if !prepared.contains_key(NATIVE_KEY_FIELD) {
            if let Some(key) = receipt.inserted_ids.first() {
                prepared = with_native_key(prepared, key.clone());
            }
        }

        let result = decode_document(prepared, &self.config);
        self.emit(Action::Create, None, duration_ms, started_at);

        Ok(result)
    }

    /// Creates a batch of documents in one bulk request and returns how many
    /// were inserted.
    ///
    /// Partial failure is all-or-nothing from the caller's perspective; the
    /// store's own bulk-write atomicity model governs partial application.
    ///
    /// # Errors
    ///
    /// [`RepoError::CreateFailed`] when the inserted count differs from the
    /// requested count or the write is unacknowledged.
    pub async fn create_many(&self, documents: Vec<Document>) -> RepoResult<u64> {
        let started = Instant::now();
        let started_at = Utc::now();
        let now = DateTime::now();
        let expected = documents.len() as u64;

        let prepared = documents
            .iter()
            .map(|document| prepare_insert(document, now, &self.config))
            .collect::<RepoResult<Vec<Document>>>()?;

        let receipt = self
            .handle
            .insert_many(&self.collection, prepared, self.config.session.as_ref())
            .await?;
        let duration_ms = elapsed_ms(started);

        if !receipt.acknowledged || receipt.inserted_count != expected {
            return Err(RepoError::CreateFailed {
                collection: self.collection.clone(),
                expected,
                inserted: receipt.inserted_count,
            });
        }

        self.emit(Action::CreateMany, None, duration_ms, started_at);

        Ok(receipt.inserted_count)
    }

    /// Counts documents matching an application-level filter.
    pub async fn count(&self, filter: Document) -> RepoResult<u64> {
        self.count_with(filter, CountOptions::default()).await
    }

    /// Counts documents matching an application-level filter, with options.
    pub async fn count_with(&self, filter: Document, options: CountOptions) -> RepoResult<u64> {
        let started = Instant::now();
        let started_at = Utc::now();

        let prepared = self.scoped_filter(&filter, options.include_deleted)?;
        let count = self
            .handle
            .count(&self.collection, prepared, self.config.session.as_ref())
            .await?;
        let duration_ms = elapsed_ms(started);

        self.emit(Action::Count, Some(filter), duration_ms, started_at);

        Ok(count)
    }

    /// Atomically updates the first matching document and returns the pre-
    /// or post-update snapshot per configuration. Returns `None` when
    /// nothing matched.
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> RepoResult<Option<Document>> {
        self.update_one_with(filter, update, UpdateOptions::default())
            .await
    }

    /// Atomically updates the first matching document, with options.
    ///
    /// # Errors
    ///
    /// [`RepoError::UpdateFailed`] when the store does not acknowledge the
    /// operation.
    pub async fn update_one_with(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> RepoResult<Option<Document>> {
        let started = Instant::now();
        let started_at = Utc::now();

        let prepared_filter = self.scoped_filter(&filter, options.include_deleted)?;
        let prepared_update = prepare_update(&update, DateTime::now(), &self.config);
        let return_latest = options
            .return_latest
            .unwrap_or(self.config.return_latest_by_default);
        let policy = if return_latest { ReturnPolicy::After } else { ReturnPolicy::Before };

        let receipt = self
            .handle
            .find_one_and_update(
                &self.collection,
                prepared_filter,
                prepared_update,
                policy,
                self.config.session.as_ref(),
            )
            .await?;
        let duration_ms = elapsed_ms(started);

        if !receipt.acknowledged {
            return Err(RepoError::UpdateFailed(self.collection.clone()));
        }

        let result = reverse_read(receipt.value, &self.config);
        self.emit(Action::UpdateOne, Some(filter), duration_ms, started_at);

        Ok(result)
    }

    /// Applies an update expression to every matching document and returns
    /// how many were modified.
    pub async fn update_many(&self, filter: Document, update: Document) -> RepoResult<u64> {
        self.update_many_with(filter, update, UpdateManyOptions::default())
            .await
    }

    /// Applies an update expression to every matching document, with
    /// options.
    ///
    /// # Errors
    ///
    /// [`RepoError::UpdateFailed`] when the store does not acknowledge the
    /// operation.
    pub async fn update_many_with(
        &self,
        filter: Document,
        update: Document,
        options: UpdateManyOptions,
    ) -> RepoResult<u64> {
        let started = Instant::now();
        let started_at = Utc::now();

        let prepared_filter = self.scoped_filter(&filter, options.include_deleted)?;
        let prepared_update = prepare_update(&update, DateTime::now(), &self.config);

        let receipt = self
            .handle
            .update_many(
                &self.collection,
                prepared_filter,
                prepared_update,
                self.config.session.as_ref(),
            )
            .await?;
        let duration_ms = elapsed_ms(started);

        if !receipt.acknowledged {
            return Err(RepoError::UpdateFailed(self.collection.clone()));
        }

        self.emit(Action::UpdateMany, Some(filter), duration_ms, started_at);

        Ok(receipt.modified_count)
    }

    /// Deletes every matching document and returns how many were affected.
    ///
    /// With soft delete configured, matches are marked with a `deletedAt`
    /// timestamp instead of being removed.
    pub async fn delete_many(&self, filter: Document) -> RepoResult<u64> {
        self.delete_many_with(filter, DeleteOptions::default())
            .await
    }

    /// Deletes every matching document, with options.
    ///
    /// # Errors
    ///
    /// [`RepoError::DeleteFailed`] when the store does not acknowledge the
    /// operation.
    pub async fn delete_many_with(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> RepoResult<u64> {
        let started = Instant::now();
        let started_at = Utc::now();

        let prepared_filter = self.scoped_filter(&filter, options.include_deleted)?;
        let soft = self.config.soft_delete && !options.hard_delete;

        let affected = if soft {
            let update =
                prepare_soft_delete(DateTime::now(), options.skip_version_update, &self.config);
            let receipt = self
                .handle
                .update_many(
                    &self.collection,
                    prepared_filter,
                    update,
                    self.config.session.as_ref(),
                )
                .await?;

            if !receipt.acknowledged {
                return Err(RepoError::DeleteFailed(self.collection.clone()));
            }

            receipt.modified_count
        } else {
            let receipt = self
                .handle
                .delete_many(&self.collection, prepared_filter, self.config.session.as_ref())
                .await?;

            if !receipt.acknowledged {
                return Err(RepoError::DeleteFailed(self.collection.clone()));
            }

            receipt.deleted_count
        };
        let duration_ms = elapsed_ms(started);

        self.emit(Action::DeleteMany, Some(filter), duration_ms, started_at);

        Ok(affected)
    }

    /// Looks up a document by its application identifier. Returns `None`
    /// when absent. Point lookups see soft-deleted documents.
    ///
    /// # Errors
    ///
    /// [`RepoError::InvalidId`] when the identifier cannot be encoded to
    /// the configured key shape.
    pub async fn get_by_id(&self, id: &str) -> RepoResult<Option<Document>> {
        let started = Instant::now();
        let started_at = Utc::now();

        let key = if self.config.id_transformation {
            Bson::ObjectId(
                ObjectId::parse_str(id).map_err(|_| RepoError::InvalidId(id.to_string()))?,
            )
        } else {
            Bson::String(id.to_string())
        };

        let found = self
            .handle
            .find_one(
                &self.collection,
                doc! { NATIVE_KEY_FIELD: key },
                self.config.session.as_ref(),
            )
            .await?;
        let duration_ms = elapsed_ms(started);

        let result = reverse_read(found, &self.config);
        self.emit(Action::GetById, None, duration_ms, started_at);

        Ok(result)
    }

    /// Returns every document matching an application-level filter.
    pub async fn query(&self, filter: Document) -> RepoResult<Vec<Document>> {
        self.query_with(filter, QueryOptions::default()).await
    }

    /// Returns every document matching an application-level filter, with
    /// pagination and ordering options.
    pub async fn query_with(
        &self,
        filter: Document,
        options: QueryOptions,
    ) -> RepoResult<Vec<Document>> {
        let started = Instant::now();
        let started_at = Utc::now();

        let prepared = self.scoped_filter(&filter, options.include_deleted)?;
        let find_options = FindOptions {
            limit: options.limit.or(self.config.default_query_limit),
            skip: options.skip,
            sort: options.sort,
        };

        let found = self
            .handle
            .find(&self.collection, prepared, find_options, self.config.session.as_ref())
            .await?;
        let duration_ms = elapsed_ms(started);

        let results = found
            .into_iter()
            .map(|document| decode_document(document, &self.config))
            .collect();

        self.emit(Action::Query, Some(filter), duration_ms, started_at);

        Ok(results)
    }

    fn scoped_filter(&self, filter: &Document, include_deleted: bool) -> RepoResult<Document> {
        let prepared = prepare_filter(filter, &self.config)?;

        if self.config.soft_delete && !include_deleted {
            Ok(exclude_deleted(prepared))
        } else {
            Ok(prepared)
        }
    }

    fn emit(
        &self,
        action: Action,
        filter: Option<Document>,
        duration_ms: u64,
        started_at: chrono::DateTime<Utc>,
    ) {
        debug!(
            collection = %self.collection,
            action = action.as_str(),
            duration_ms,
            "repository operation completed",
        );

        if let Some(logger) = &self.config.logger {
            logger.log(&OperationRecord {
                collection: self.collection.clone(),
                action,
                filter,
                duration_ms,
                started_at,
            });
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn with_native_key(document: Document, key: Bson) -> Document {
    let mut keyed = Document::new();
    keyed.insert(NATIVE_KEY_FIELD, key);
    for (field, value) in document {
        keyed.insert(field, value);
    }

    keyed
}
