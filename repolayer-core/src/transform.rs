//! Document transformer: the insert-side and read-side halves of the
//! transformation pipeline.
//!
//! On the way in, caller payloads are stripped of every managed field,
//! given their native key, and stamped with versioning/timestamp metadata.
//! On the way out, stored documents are decoded back to the application
//! shape. Both halves operate on copies.

use bson::{Bson, DateTime, Document, oid::ObjectId};

use crate::{
    config::RepoConfig,
    error::RepoResult,
    id::{APP_KEY_FIELD, NATIVE_KEY_FIELD, decode_document, encode_id},
};

/// Version counter field, maintained when versioning is enabled.
pub const VERSION_FIELD: &str = "version";

/// Creation timestamp field, set once when timestamps are enabled.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Last-update timestamp field, absent until the first update.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Soft-delete marker field.
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// Fields owned by the repository. They are never caller-settable at
/// creation; the insert path strips them from payloads wholesale so the
/// list cannot drift between operations.
pub const MANAGED_FIELDS: [&str; 6] = [
    NATIVE_KEY_FIELD,
    APP_KEY_FIELD,
    VERSION_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    DELETED_AT_FIELD,
];

/// Produces the stored representation of a document destined for creation.
///
/// Managed fields in the payload are discarded. The native key comes from
/// the caller-supplied identifier when present (encoded per configuration);
/// when absent and transformation is on, a fresh [`ObjectId`] is generated;
/// when absent and transformation is off, the key field is omitted and the
/// store assigns one. `version: 1` and `createdAt` are appended per
/// configuration.
///
/// # Errors
///
/// Returns [`RepoError::InvalidId`](crate::error::RepoError::InvalidId)
/// when a supplied identifier cannot be encoded.
pub fn prepare_insert(
    document: &Document,
    now: DateTime,
    config: &RepoConfig,
) -> RepoResult<Document> {
    let supplied = if config.id_mapping {
        document.get(APP_KEY_FIELD)
    } else {
        document.get(NATIVE_KEY_FIELD)
    };

    let native_key = match supplied {
        Some(value) => Some(encode_id(value, config)?),
        None if config.id_transformation => Some(Bson::ObjectId(ObjectId::new())),
        None => None,
    };

    let mut prepared = Document::new();
    if let Some(key) = native_key {
        prepared.insert(NATIVE_KEY_FIELD, key);
    }

    for (field, value) in document.iter() {
        if MANAGED_FIELDS.contains(&field.as_str()) {
            continue;
        }

        prepared.insert(field.clone(), value.clone());
    }

    if config.versioning {
        prepared.insert(VERSION_FIELD, Bson::Int64(1));
    }
    if config.timestamps {
        prepared.insert(CREATED_AT_FIELD, Bson::DateTime(now));
    }

    Ok(prepared)
}

/// Reverses the stored representation after a read.
///
/// Absent input yields absent output; missing documents are never an error
/// at this layer.
pub fn reverse_read(document: Option<Document>, config: &RepoConfig) -> Option<Document> {
    document.map(|doc| decode_document(doc, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;
    use bson::doc;

    #[test]
    fn strips_managed_fields_and_stamps_metadata() {
        let config = RepoConfig {
            versioning: true,
            timestamps: true,
            ..RepoConfig::default()
        };
        let now = DateTime::now();
        let payload = doc! {
            "id": ObjectId::new().to_hex(),
            "version": 41,
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
            "deletedAt": DateTime::now(),
            "name": "Alice",
        };

        let prepared = prepare_insert(&payload, now, &config).unwrap();

        assert!(prepared.get("_id").and_then(Bson::as_object_id).is_some());
        assert_eq!(prepared.get_i64("version").unwrap(), 1);
        assert_eq!(prepared.get_datetime("createdAt").unwrap(), &now);
        assert_eq!(prepared.get_str("name").unwrap(), "Alice");
        assert!(!prepared.contains_key("id"));
        assert!(!prepared.contains_key("updatedAt"));
        assert!(!prepared.contains_key("deletedAt"));
    }

    #[test]
    fn generates_a_key_when_none_is_supplied() {
        let prepared =
            prepare_insert(&doc! { "name": "Bob" }, DateTime::now(), &RepoConfig::default())
                .unwrap();

        assert!(prepared.get("_id").and_then(Bson::as_object_id).is_some());
    }

    #[test]
    fn keeps_supplied_key_stable() {
        let oid = ObjectId::new();
        let prepared = prepare_insert(
            &doc! { "id": oid.to_hex(), "name": "Carol" },
            DateTime::now(),
            &RepoConfig::default(),
        )
        .unwrap();

        assert_eq!(prepared.get("_id").and_then(Bson::as_object_id), Some(oid));
    }

    #[test]
    fn omits_key_without_transformation() {
        let config = RepoConfig {
            id_transformation: false,
            ..RepoConfig::default()
        };
        let prepared =
            prepare_insert(&doc! { "name": "Dave" }, DateTime::now(), &config).unwrap();

        assert!(!prepared.contains_key("_id"));
    }

    #[test]
    fn rejects_unencodable_supplied_keys() {
        let result = prepare_insert(
            &doc! { "id": 42, "name": "Eve" },
            DateTime::now(),
            &RepoConfig::default(),
        );

        assert!(matches!(result, Err(RepoError::InvalidId(_))));
    }

    #[test]
    fn round_trips_application_fields() {
        let payload = doc! { "name": "Frank", "age": 44, "tags": ["a", "b"] };
        let config = RepoConfig::default();

        let stored = prepare_insert(&payload, DateTime::now(), &config).unwrap();
        let read_back = reverse_read(Some(stored), &config).unwrap();

        assert!(read_back.get_str("id").is_ok());
        for (field, value) in payload.iter() {
            assert_eq!(read_back.get(field), Some(value));
        }
    }

    #[test]
    fn absent_reads_stay_absent() {
        assert!(reverse_read(None, &RepoConfig::default()).is_none());
    }
}
