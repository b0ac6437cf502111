//! In-memory store handle implementation.
//!
//! Documents are kept as BSON documents in insertion order behind an
//! async-aware read-write lock, so a `find_one_and_update` is atomic with
//! respect to every other caller. Session tokens are accepted and ignored:
//! single-process mutations are already atomic, and there is no external
//! transaction to join.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;

use repolayer_core::{
    config::SessionToken,
    error::{RepoError, RepoResult},
    handle::{
        DeleteReceipt, FindOptions, InsertReceipt, ReturnPolicy, SortDirection, StoreHandle,
        UpdateManyReceipt, UpdateOneReceipt,
    },
};

use crate::evaluator::{apply_update, matches, order_values};

type CollectionRows = Vec<Document>;
type StoreMap = HashMap<String, CollectionRows>;

/// Thread-safe in-memory document store.
///
/// Cloneable; clones share the same underlying data. Queries scan the
/// collection linearly, which is fine for development and tests. Documents
/// inserted without a `_id` get a store-assigned [`ObjectId`], reported
/// back through the insert receipt, exactly like a real server would.
///
/// # Example
///
/// ```ignore
/// use repolayer_memory::MemoryStore;
/// use bson::doc;
///
/// let store = MemoryStore::new();
/// store.insert_one("users", doc! { "name": "Alice" }, None).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryStore {
    collections: Arc<RwLock<StoreMap>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(StoreMap::new())),
        }
    }
}

fn keyed(document: Document) -> (Bson, Document) {
    if let Some(key) = document.get("_id").cloned() {
        return (key, document);
    }

    // the server would assign a key; do the same and report it back
    let key = Bson::ObjectId(ObjectId::new());
    let mut assigned = Document::new();
    assigned.insert("_id", key.clone());
    for (field, value) in document {
        assigned.insert(field, value);
    }

    (key, assigned)
}

#[async_trait]
impl StoreHandle for MemoryStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        self.insert_many(collection, vec![document], session)
            .await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        _session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        let mut store = self.collections.write().await;
        let rows = store.entry(collection.to_string()).or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            let (key, document) = keyed(document);

            if rows
                .iter()
                .any(|row| row.get("_id") == Some(&key))
            {
                return Err(RepoError::Backend(format!(
                    "duplicate key {key} in collection {collection}"
                )));
            }

            inserted_ids.push(key);
            rows.push(document);
        }

        Ok(InsertReceipt {
            acknowledged: true,
            inserted_count: inserted_ids.len() as u64,
            inserted_ids,
        })
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&SessionToken>,
    ) -> RepoResult<u64> {
        let store = self.collections.read().await;
        let Some(rows) = store.get(collection) else {
            return Ok(0);
        };

        let mut count = 0;
        for row in rows {
            if matches(row, &filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&SessionToken>,
    ) -> RepoResult<Option<Document>> {
        let store = self.collections.read().await;
        let Some(rows) = store.get(collection) else {
            return Ok(None);
        };

        for row in rows {
            if matches(row, &filter)? {
                return Ok(Some(row.clone()));
            }
        }

        Ok(None)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        _session: Option<&SessionToken>,
    ) -> RepoResult<Vec<Document>> {
        let store = self.collections.read().await;
        let Some(rows) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut found = Vec::new();
        for row in rows {
            if matches(row, &filter)? {
                found.push(row.clone());
            }
        }

        if let Some(sort) = &options.sort {
            found.sort_by(|left, right| {
                let ordering = order_values(left.get(&sort.field), right.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(found
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(options.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        return_policy: ReturnPolicy,
        _session: Option<&SessionToken>,
    ) -> RepoResult<UpdateOneReceipt> {
        let mut store = self.collections.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(UpdateOneReceipt { acknowledged: true, value: None });
        };

        for row in rows.iter_mut() {
            if matches(row, &filter)? {
                let before = row.clone();
                apply_update(row, &update)?;

                let value = match return_policy {
                    ReturnPolicy::Before => before,
                    ReturnPolicy::After => row.clone(),
                };

                return Ok(UpdateOneReceipt { acknowledged: true, value: Some(value) });
            }
        }

        Ok(UpdateOneReceipt { acknowledged: true, value: None })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        _session: Option<&SessionToken>,
    ) -> RepoResult<UpdateManyReceipt> {
        let mut store = self.collections.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(UpdateManyReceipt {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
            });
        };

        let mut matched = 0;
        for row in rows.iter_mut() {
            if matches(row, &filter)? {
                matched += 1;
                apply_update(row, &update)?;
            }
        }

        Ok(UpdateManyReceipt {
            acknowledged: true,
            matched_count: matched,
            modified_count: matched,
        })
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        _session: Option<&SessionToken>,
    ) -> RepoResult<DeleteReceipt> {
        let mut store = self.collections.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(DeleteReceipt { acknowledged: true, deleted_count: 0 });
        };

        let keep = rows
            .iter()
            .map(|row| matches(row, &filter).map(|matched| !matched))
            .collect::<RepoResult<Vec<bool>>>()?;

        let deleted = keep.iter().filter(|keep| !**keep).count() as u64;
        let mut index = 0;
        rows.retain(|_| {
            let kept = keep[index];
            index += 1;
            kept
        });

        Ok(DeleteReceipt { acknowledged: true, deleted_count: deleted })
    }

    async fn create_collection(
        &self,
        name: &str,
        _session: Option<&SessionToken>,
    ) -> RepoResult<()> {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RepoResult<()> {
        let mut store = self.collections.write().await;

        if store.remove(name).is_none() {
            return Err(RepoError::Backend(format!("collection not found: {name}")));
        }

        Ok(())
    }

    async fn list_collections(&self) -> RepoResult<Vec<String>> {
        Ok(self
            .collections
            .read()
            .await
            .keys()
            .cloned()
            .collect())
    }
}
