//! End-to-end repository tests against the in-memory store handle.

use std::sync::{Arc, Mutex};

use bson::{Bson, doc, oid::ObjectId};
use repolayer::memory::MemoryStore;
use repolayer::prelude::*;

#[derive(Default)]
struct RecordingLogger(Mutex<Vec<OperationRecord>>);

impl RecordingLogger {
    fn records(&self) -> Vec<OperationRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl OperationLogger for RecordingLogger {
    fn log(&self, record: &OperationRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

fn audited_config() -> RepoConfig {
    RepoConfig::builder()
        .versioning(true)
        .timestamps(true)
        .build()
        .unwrap()
}

fn repo(store: &MemoryStore, config: RepoConfig) -> Repo<&MemoryStore> {
    Repo::new(store, "users", config).unwrap()
}

async fn seed_statuses(users: &Repo<&MemoryStore>, statuses: &[&str]) -> Vec<String> {
    let mut ids = Vec::new();
    for (index, status) in statuses.iter().enumerate() {
        let created = users
            .create(doc! { "name": format!("user-{index}"), "status": *status })
            .await
            .unwrap();
        ids.push(created.get_str("id").unwrap().to_string());
    }

    ids
}

#[tokio::test]
async fn create_round_trips_application_fields() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());

    let created = users
        .create(doc! { "name": "Alice", "age": 30, "tags": ["a", "b"] })
        .await
        .unwrap();

    let id = created.get_str("id").unwrap();
    assert!(ObjectId::parse_str(id).is_ok());
    assert_eq!(created.get_str("name").unwrap(), "Alice");
    assert_eq!(created.get_i32("age").unwrap(), 30);
    assert!(!created.contains_key("_id"));
    // audit fields only appear when configured
    assert!(!created.contains_key("version"));
    assert!(!created.contains_key("createdAt"));
}

#[tokio::test]
async fn create_stamps_audit_metadata() {
    let store = MemoryStore::new();
    let users = repo(&store, audited_config());

    let created = users.create(doc! { "name": "Bob" }).await.unwrap();

    assert_eq!(created.get_i64("version").unwrap(), 1);
    assert!(created.get_datetime("createdAt").is_ok());
    assert!(!created.contains_key("updatedAt"));
}

#[tokio::test]
async fn caller_supplied_managed_fields_are_ignored() {
    let store = MemoryStore::new();
    let users = repo(&store, audited_config());

    let created = users
        .create(doc! { "name": "Carol", "version": 99_i64, "updatedAt": bson::DateTime::now() })
        .await
        .unwrap();

    assert_eq!(created.get_i64("version").unwrap(), 1);
    assert!(!created.contains_key("updatedAt"));
}

#[tokio::test]
async fn identifier_is_a_string_with_transformation_on() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());

    let created = users.create(doc! { "name": "Dave" }).await.unwrap();

    assert!(matches!(created.get("id"), Some(Bson::String(_))));
}

#[tokio::test]
async fn identifier_keeps_raw_key_type_with_transformation_off() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder()
        .id_transformation(false)
        .build()
        .unwrap();
    let users = repo(&store, config);

    let created = users.create(doc! { "name": "Eve" }).await.unwrap();

    // the store assigned a binary key and mapping exposed it verbatim
    assert!(matches!(created.get("id"), Some(Bson::ObjectId(_))));
}

#[tokio::test]
async fn native_key_stays_in_place_without_mapping() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder().id_mapping(false).build().unwrap();
    let users = repo(&store, config);

    let created = users.create(doc! { "name": "Frank" }).await.unwrap();

    assert!(created.get_str("_id").is_ok());
    assert!(!created.contains_key("id"));
}

#[tokio::test]
async fn version_counts_accepted_updates() {
    let store = MemoryStore::new();
    let users = repo(&store, audited_config());

    let created = users.create(doc! { "name": "Grace", "score": 0_i64 }).await.unwrap();
    let id = created.get_str("id").unwrap().to_string();

    users
        .update_one(doc! { "id": id.as_str() }, doc! { "$set": { "score": 1_i64 } })
        .await
        .unwrap();
    users
        .update_many(doc! { "name": "Grace" }, doc! { "$inc": { "score": 1_i64 } })
        .await
        .unwrap();

    let current = users.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(current.get_i64("version").unwrap(), 3);
    assert_eq!(current.get_i64("score").unwrap(), 2);
}

#[tokio::test]
async fn created_at_is_immutable_and_updated_at_progresses() {
    let store = MemoryStore::new();
    let users = repo(&store, audited_config());

    let created = users.create(doc! { "name": "Heidi" }).await.unwrap();
    let id = created.get_str("id").unwrap().to_string();
    let created_at = *created.get_datetime("createdAt").unwrap();

    let first = users
        .update_one(doc! { "id": id.as_str() }, doc! { "$set": { "mood": "fine" } })
        .await
        .unwrap()
        .unwrap();
    let first_touch = *first.get_datetime("updatedAt").unwrap();

    let second = users
        .update_one(doc! { "id": id.as_str() }, doc! { "$set": { "mood": "great" } })
        .await
        .unwrap()
        .unwrap();
    let second_touch = *second.get_datetime("updatedAt").unwrap();

    assert_eq!(*second.get_datetime("createdAt").unwrap(), created_at);
    assert!(first_touch <= second_touch);
    assert!(second_touch.to_chrono() <= chrono::Utc::now());
}

#[tokio::test]
async fn update_one_snapshot_policy_is_configurable() {
    let store = MemoryStore::new();

    // default: post-update snapshot
    let users = repo(&store, RepoConfig::default());
    let id = seed_statuses(&users, &["active"]).await.remove(0);
    let after = users
        .update_one(doc! { "id": id.as_str() }, doc! { "$set": { "status": "away" } })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.get_str("status").unwrap(), "away");

    // configured for pre-update snapshots
    let config = RepoConfig::builder()
        .return_latest_by_default(false)
        .build()
        .unwrap();
    let users = repo(&store, config);
    let before = users
        .update_one(doc! { "id": id.as_str() }, doc! { "$set": { "status": "offline" } })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.get_str("status").unwrap(), "away");

    // per-call override wins over configuration
    let latest = users
        .update_one_with(
            doc! { "id": id.as_str() },
            doc! { "$set": { "status": "back" } },
            UpdateOptions { return_latest: Some(true), ..Default::default() },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.get_str("status").unwrap(), "back");
}

#[tokio::test]
async fn update_one_returns_none_when_nothing_matches() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());

    let result = users
        .update_one(
            doc! { "id": ObjectId::new().to_hex() },
            doc! { "$set": { "status": "away" } },
        )
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn counting_matches_seeded_discriminants() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());
    seed_statuses(&users, &["active", "active", "away", "offline"]).await;

    assert_eq!(users.count(doc! { "status": "active" }).await.unwrap(), 2);
    assert_eq!(users.count(doc! { "status": "away" }).await.unwrap(), 1);
    assert_eq!(users.count(doc! {}).await.unwrap(), 4);
}

#[tokio::test]
async fn identifier_filters_support_in_and_ne() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());
    let ids = seed_statuses(&users, &["active", "active", "away"]).await;

    let subset = users
        .query(doc! { "id": { "$in": [ids[0].as_str(), ids[2].as_str()] } })
        .await
        .unwrap();
    assert_eq!(subset.len(), 2);

    let rest = users.query(doc! { "id": { "$ne": ids[0].as_str() } }).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|user| user.get_str("id").unwrap() != ids[0]));
}

#[tokio::test]
async fn richer_identifier_operators_are_rejected() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());

    let result = users
        .count(doc! { "id": { "$gt": ObjectId::new().to_hex() } })
        .await;

    assert!(matches!(result, Err(RepoError::UnsupportedIdFilter(op)) if op == "$gt"));
}

#[tokio::test]
async fn bulk_create_and_update_report_counts() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());

    let inserted = users
        .create_many(vec![
            doc! { "name": "a", "score": 1_i64 },
            doc! { "name": "b", "score": 1_i64 },
        ])
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let modified = users
        .update_many(doc! {}, doc! { "$inc": { "score": 1_i64 } })
        .await
        .unwrap();
    assert_eq!(modified, 2);

    for user in users.query(doc! {}).await.unwrap() {
        assert_eq!(user.get_i64("score").unwrap(), 2);
    }
}

#[tokio::test]
async fn caller_update_operators_survive_augmentation() {
    let store = MemoryStore::new();
    let users = repo(&store, audited_config());
    let id = seed_statuses(&users, &["active"]).await.remove(0);

    let updated = users
        .update_one(doc! { "id": id.as_str() }, doc! { "$inc": { "logins": 5_i64 } })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.get_i64("logins").unwrap(), 5);
    assert_eq!(updated.get_i64("version").unwrap(), 2);
}

#[tokio::test]
async fn get_by_id_finds_and_misses() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());
    let id = seed_statuses(&users, &["active"]).await.remove(0);

    let found = users.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(found.get_str("id").unwrap(), id);

    let missing = users.get_by_id(&ObjectId::new().to_hex()).await.unwrap();
    assert!(missing.is_none());

    let invalid = users.get_by_id("not-a-key").await;
    assert!(matches!(invalid, Err(RepoError::InvalidId(_))));
}

#[tokio::test]
async fn hard_delete_removes_documents() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());
    seed_statuses(&users, &["active", "away"]).await;

    let deleted = users.delete_many(doc! { "status": "away" }).await.unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(users.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn soft_delete_marks_and_hides_documents() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder()
        .versioning(true)
        .timestamps(true)
        .soft_delete(true)
        .build()
        .unwrap();
    let users = repo(&store, config);
    let ids = seed_statuses(&users, &["active", "away"]).await;

    let deleted = users.delete_many(doc! { "status": "away" }).await.unwrap();
    assert_eq!(deleted, 1);

    // hidden from filter-driven operations by default
    assert_eq!(users.count(doc! {}).await.unwrap(), 1);
    assert!(users.query(doc! { "status": "away" }).await.unwrap().is_empty());

    // still there when asked for, with the marker and a counted update
    let everything = users
        .query_with(doc! {}, QueryOptions { include_deleted: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);

    let tombstone = users.get_by_id(&ids[1]).await.unwrap().unwrap();
    assert!(tombstone.get_datetime("deletedAt").is_ok());
    assert_eq!(tombstone.get_i64("version").unwrap(), 2);

    // a soft delete does not touch survivors
    let survivor = users.get_by_id(&ids[0]).await.unwrap().unwrap();
    assert_eq!(survivor.get_i64("version").unwrap(), 1);
}

#[tokio::test]
async fn soft_delete_version_update_can_be_skipped() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder()
        .versioning(true)
        .soft_delete(true)
        .build()
        .unwrap();
    let users = repo(&store, config);
    let id = seed_statuses(&users, &["active"]).await.remove(0);

    users
        .delete_many_with(
            doc! { "id": id.as_str() },
            DeleteOptions { skip_version_update: true, ..Default::default() },
        )
        .await
        .unwrap();

    let tombstone = users.get_by_id(&id).await.unwrap().unwrap();
    assert!(tombstone.get_datetime("deletedAt").is_ok());
    assert_eq!(tombstone.get_i64("version").unwrap(), 1);
}

#[tokio::test]
async fn forced_hard_delete_purges_soft_deleted_documents() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder().soft_delete(true).build().unwrap();
    let users = repo(&store, config);
    seed_statuses(&users, &["active", "away"]).await;

    users.delete_many(doc! { "status": "away" }).await.unwrap();

    let purged = users
        .delete_many_with(
            doc! {},
            DeleteOptions { hard_delete: true, include_deleted: true, ..Default::default() },
        )
        .await
        .unwrap();

    assert_eq!(purged, 2);
    assert_eq!(
        users
            .count_with(doc! {}, CountOptions { include_deleted: true })
            .await
            .unwrap(),
        0,
    );
}

#[tokio::test]
async fn query_honors_limits_skip_and_sort() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder().default_query_limit(2).build().unwrap();
    let users = repo(&store, config);
    for score in [3_i64, 1, 2] {
        users.create(doc! { "name": "u", "score": score }).await.unwrap();
    }

    // configured default limit applies when the call sets none
    assert_eq!(users.query(doc! {}).await.unwrap().len(), 2);

    let all = users
        .query_with(doc! {}, QueryOptions { limit: Some(10), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let ordered = users
        .query_with(
            doc! {},
            QueryOptions {
                sort: Some(Sort::desc("score")),
                skip: Some(1),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let scores: Vec<i64> = ordered
        .iter()
        .map(|user| user.get_i64("score").unwrap())
        .collect();
    assert_eq!(scores, vec![2, 1]);
}

#[tokio::test]
async fn logger_receives_one_record_per_operation() {
    let store = MemoryStore::new();
    let logger = Arc::new(RecordingLogger::default());
    let config = RepoConfig::builder()
        .logger(logger.clone())
        .build()
        .unwrap();
    let users = repo(&store, config);

    users.create(doc! { "name": "Ivan" }).await.unwrap();
    users.count(doc! { "name": "Ivan" }).await.unwrap();

    let records = logger.records();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].action, Action::Create);
    assert_eq!(records[0].collection, "users");
    assert!(records[0].filter.is_none());

    assert_eq!(records[1].action, Action::Count);
    // the record carries the caller's filter, not the rewritten one
    assert_eq!(records[1].filter, Some(doc! { "name": "Ivan" }));

    let json = serde_json::to_value(&records[1]).unwrap();
    assert_eq!(json["action"], "count");
    assert_eq!(json["collection"], "users");
}

#[tokio::test]
async fn failed_operations_do_not_log() {
    let store = MemoryStore::new();
    let logger = Arc::new(RecordingLogger::default());
    let config = RepoConfig::builder()
        .logger(logger.clone())
        .build()
        .unwrap();
    let users = repo(&store, config);

    let result = users.count(doc! { "id": { "$exists": true } }).await;
    assert!(result.is_err());
    assert!(logger.records().is_empty());
}

#[tokio::test]
async fn session_tokens_thread_through_without_effect_on_memory() {
    let store = MemoryStore::new();
    let config = RepoConfig::builder()
        .session(SessionToken::new())
        .build()
        .unwrap();
    let users = repo(&store, config);

    let created = users.create(doc! { "name": "Judy" }).await.unwrap();
    assert!(users.get_by_id(created.get_str("id").unwrap()).await.unwrap().is_some());
}

#[tokio::test]
async fn collection_sets_provision_and_tear_down() {
    let store = MemoryStore::new();
    let set = CollectionSet::new(["users", "orders"]);

    set.provision(&store, None).await.unwrap();
    let mut names = store.list_collections().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["orders".to_string(), "users".to_string()]);

    set.teardown(&store).await.unwrap();
    assert!(store.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_identifiers_surface_as_backend_errors() {
    let store = MemoryStore::new();
    let users = repo(&store, RepoConfig::default());
    let id = seed_statuses(&users, &["active"]).await.remove(0);

    let result = users.create(doc! { "id": id.as_str(), "name": "clone" }).await;

    assert!(matches!(result, Err(RepoError::Backend(_))));
}
