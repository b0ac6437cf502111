use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mea::{mutex::Mutex, rwlock::RwLock};
use mongodb::{
    Client, ClientSession, Collection as MongoCollection,
    options::{ClientOptions, FindOptions as MongoFindOptions, ReturnDocument},
};
use tracing::debug;

use repolayer_core::{
    config::SessionToken,
    error::{RepoError, RepoResult},
    handle::{
        DeleteReceipt, FindOptions, InsertReceipt, ReturnPolicy, SortDirection, StoreHandle,
        StoreHandleBuilder, UpdateManyReceipt, UpdateOneReceipt,
    },
};

type SessionLease = Arc<Mutex<ClientSession>>;

/// MongoDB-backed store handle.
///
/// Filters and updates arrive already in the driver's native shape, so the
/// adapter only maps options, receipts, and sessions. Transactions are
/// leased: [`MongoStore::begin_transaction`] starts a driver session plus
/// transaction and hands back an opaque [`SessionToken`]; repository calls
/// carrying that token join the transaction, and the owning coordinator
/// finishes it with [`MongoStore::commit_transaction`] or
/// [`MongoStore::abort_transaction`].
pub struct MongoStore {
    client: Client,
    database: String,
    sessions: RwLock<HashMap<SessionToken, SessionLease>>,
}

impl MongoStore {
    /// Creates a store over an already-connected client.
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a builder that connects from a DSN.
    pub fn builder(dsn: &str, database: &str) -> MongoStoreBuilder {
        MongoStoreBuilder::new(dsn, database)
    }

    /// Starts a driver session and transaction, returning the token that
    /// repository calls thread through to join it.
    pub async fn begin_transaction(&self) -> RepoResult<SessionToken> {
        let mut session = self
            .client
            .start_session()
            .await
            .map_err(backend_err)?;
        session
            .start_transaction()
            .await
            .map_err(backend_err)?;

        let token = SessionToken::new();
        self.sessions
            .write()
            .await
            .insert(token, Arc::new(Mutex::new(session)));
        debug!(%token, "transaction started");

        Ok(token)
    }

    /// Commits the transaction behind a token and releases its session.
    pub async fn commit_transaction(&self, token: &SessionToken) -> RepoResult<()> {
        let lease = self.take_lease(token).await?;
        let mut session = lease.lock().await;
        session
            .commit_transaction()
            .await
            .map_err(backend_err)?;
        debug!(%token, "transaction committed");

        Ok(())
    }

    /// Aborts the transaction behind a token and releases its session.
    pub async fn abort_transaction(&self, token: &SessionToken) -> RepoResult<()> {
        let lease = self.take_lease(token).await?;
        let mut session = lease.lock().await;
        session
            .abort_transaction()
            .await
            .map_err(backend_err)?;
        debug!(%token, "transaction aborted");

        Ok(())
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn lease(&self, session: Option<&SessionToken>) -> RepoResult<Option<SessionLease>> {
        let Some(token) = session else {
            return Ok(None);
        };

        self.sessions
            .read()
            .await
            .get(token)
            .cloned()
            .map(Some)
            .ok_or_else(|| RepoError::Backend(format!("unknown session token {token}")))
    }

    async fn take_lease(&self, token: &SessionToken) -> RepoResult<SessionLease> {
        self.sessions
            .write()
            .await
            .remove(token)
            .ok_or_else(|| RepoError::Backend(format!("unknown session token {token}")))
    }
}

impl fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoStore")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

fn backend_err(err: mongodb::error::Error) -> RepoError {
    RepoError::Backend(err.to_string())
}

fn sort_document(options: &FindOptions) -> Option<Document> {
    options.sort.as_ref().map(|sort| {
        doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        }
    })
}

#[async_trait]
impl StoreHandle for MongoStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        let coll = self.get_collection(collection);

        let result = match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.insert_one(document)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?
            }
            None => coll.insert_one(document).await.map_err(backend_err)?,
        };

        Ok(InsertReceipt {
            acknowledged: true,
            inserted_count: 1,
            inserted_ids: vec![result.inserted_id],
        })
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&SessionToken>,
    ) -> RepoResult<InsertReceipt> {
        let coll = self.get_collection(collection);

        let result = match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.insert_many(documents)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?
            }
            None => coll.insert_many(documents).await.map_err(backend_err)?,
        };

        let mut indexed: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        let inserted_ids: Vec<Bson> = indexed.into_iter().map(|(_, id)| id).collect();

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
        session: Option<&SessionToken>,
    ) -> RepoResult<u64> {
        let coll = self.get_collection(collection);

        match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.count_documents(filter)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)
            }
            None => coll.count_documents(filter).await.map_err(backend_err),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<Option<Document>> {
        let coll = self.get_collection(collection);

        match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.find_one(filter)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)
            }
            None => coll.find_one(filter).await.map_err(backend_err),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&SessionToken>,
    ) -> RepoResult<Vec<Document>> {
        let coll = self.get_collection(collection);

        let mut find_options = MongoFindOptions::default();
        find_options.limit = options.limit.map(|limit| limit as i64);
        find_options.skip = options.skip;
        find_options.sort = sort_document(&options);

        match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                let mut cursor = coll
                    .find(filter)
                    .with_options(find_options)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?;

                let mut documents = Vec::new();
                while let Some(document) = cursor.next(&mut *session).await {
                    documents.push(document.map_err(backend_err)?);
                }

                Ok(documents)
            }
            None => coll
                .find(filter)
                .with_options(find_options)
                .await
                .map_err(backend_err)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_err),
        }
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        return_policy: ReturnPolicy,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateOneReceipt> {
        let coll = self.get_collection(collection);
        let return_document = match return_policy {
            ReturnPolicy::Before => ReturnDocument::Before,
            ReturnPolicy::After => ReturnDocument::After,
        };

        let value = match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.find_one_and_update(filter, update)
                    .return_document(return_document)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?
            }
            None => coll
                .find_one_and_update(filter, update)
                .return_document(return_document)
                .await
                .map_err(backend_err)?,
        };

        Ok(UpdateOneReceipt { acknowledged: true, value })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<UpdateManyReceipt> {
        let coll = self.get_collection(collection);

        let result = match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.update_many(filter, update)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?
            }
            None => coll
                .update_many(filter, update)
                .await
                .map_err(backend_err)?,
        };

        Ok(UpdateManyReceipt {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&SessionToken>,
    ) -> RepoResult<DeleteReceipt> {
        let coll = self.get_collection(collection);

        let result = match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                coll.delete_many(filter)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?
            }
            None => coll.delete_many(filter).await.map_err(backend_err)?,
        };

        Ok(DeleteReceipt {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn create_collection(
        &self,
        name: &str,
        session: Option<&SessionToken>,
    ) -> RepoResult<()> {
        let database = self.client.database(&self.database);

        match self.lease(session).await? {
            Some(lease) => {
                let mut session = lease.lock().await;
                database
                    .create_collection(name)
                    .session(&mut *session)
                    .await
                    .map_err(backend_err)?;
            }
            None => {
                database
                    .create_collection(name)
                    .await
                    .map_err(backend_err)?;
            }
        }

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RepoResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn list_collections(&self) -> RepoResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_err)
    }
}

/// Builder connecting a [`MongoStore`] from a DSN.
pub struct MongoStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreHandleBuilder for MongoStoreBuilder {
    type Handle = MongoStore;

    async fn build(self) -> RepoResult<Self::Handle> {
        Ok(MongoStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(backend_err)?,
            )
            .map_err(backend_err)?,
            self.database,
        ))
    }
}
