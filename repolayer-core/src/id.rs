//! Identifier codec: conversion between the application identifier
//! representation and the store's native primary-key representation.
//!
//! The application always addresses documents through an opaque string
//! `id`. Depending on configuration, the store sees either the same string
//! under `_id`, or a binary [`ObjectId`] whose canonical form is the 24-hex
//! string. Both directions operate on copies; the caller's values are never
//! mutated.

use bson::{Bson, Document, oid::ObjectId};

use crate::{
    config::RepoConfig,
    error::{RepoError, RepoResult},
};

/// Field name of the store's native primary key.
pub const NATIVE_KEY_FIELD: &str = "_id";

/// Field name of the application-facing identifier.
pub const APP_KEY_FIELD: &str = "id";

/// Encodes an identifier value into the store's native key representation.
///
/// With identifier transformation enabled, a 24-hex string becomes an
/// [`ObjectId`] and an [`ObjectId`] passes through unchanged; any other
/// shape fails. With transformation disabled, the value passes through
/// verbatim.
///
/// # Errors
///
/// Returns [`RepoError::InvalidId`] when transformation is enabled and the
/// value is neither an [`ObjectId`] nor a parseable hex string.
pub fn encode_id(value: &Bson, config: &RepoConfig) -> RepoResult<Bson> {
    if !config.id_transformation {
        return Ok(value.clone());
    }

    match value {
        Bson::ObjectId(_) => Ok(value.clone()),
        Bson::String(raw) => ObjectId::parse_str(raw)
            .map(Bson::ObjectId)
            .map_err(|_| RepoError::InvalidId(raw.clone())),
        other => Err(RepoError::InvalidId(other.to_string())),
    }
}

/// Lenient identifier encoding for values nested inside filter operators.
///
/// Only strings with the exact canonical length are treated as encoded
/// keys; everything else passes through unchanged, which makes the filter
/// rewrite idempotent.
///
/// # Errors
///
/// Returns [`RepoError::InvalidId`] for a canonical-length string that is
/// not valid hex.
pub fn encode_filter_value(value: &Bson) -> RepoResult<Bson> {
    match value {
        Bson::String(raw) if raw.len() == 24 => ObjectId::parse_str(raw)
            .map(Bson::ObjectId)
            .map_err(|_| RepoError::InvalidId(raw.clone())),
        other => Ok(other.clone()),
    }
}

/// Decodes a stored document back into its application-facing shape.
///
/// With transformation enabled, an [`ObjectId`]-valued native key is
/// replaced by its canonical hex string. With mapping enabled, the native
/// key relocates to a leading [`APP_KEY_FIELD`]; with mapping disabled the
/// native key stays in place verbatim and no `id` field is introduced.
pub fn decode_document(mut document: Document, config: &RepoConfig) -> Document {
    if config.id_transformation {
        if let Some(object_id) = document.get(NATIVE_KEY_FIELD).and_then(Bson::as_object_id) {
            document.insert(NATIVE_KEY_FIELD, object_id.to_hex());
        }
    }

    if config.id_mapping {
        if let Some(key) = document.remove(NATIVE_KEY_FIELD) {
            let mut mapped = Document::new();
            mapped.insert(APP_KEY_FIELD, key);
            for (field, value) in document {
                mapped.insert(field, value);
            }

            return mapped;
        }
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn transforming() -> RepoConfig {
        RepoConfig::default()
    }

    fn passthrough() -> RepoConfig {
        RepoConfig {
            id_transformation: false,
            ..RepoConfig::default()
        }
    }

    #[test]
    fn encode_parses_canonical_strings() {
        let oid = ObjectId::new();
        let encoded = encode_id(&Bson::String(oid.to_hex()), &transforming()).unwrap();

        assert_eq!(encoded, Bson::ObjectId(oid));
    }

    #[test]
    fn encode_passes_object_ids_through() {
        let oid = Bson::ObjectId(ObjectId::new());

        assert_eq!(encode_id(&oid, &transforming()).unwrap(), oid);
    }

    #[test]
    fn encode_rejects_other_shapes() {
        assert!(matches!(
            encode_id(&Bson::String("short".to_string()), &transforming()),
            Err(RepoError::InvalidId(_))
        ));
        assert!(matches!(
            encode_id(&Bson::Int32(7), &transforming()),
            Err(RepoError::InvalidId(_))
        ));
    }

    #[test]
    fn encode_is_verbatim_without_transformation() {
        let value = Bson::String("user-7".to_string());

        assert_eq!(encode_id(&value, &passthrough()).unwrap(), value);
    }

    #[test]
    fn filter_values_shorter_than_canonical_pass_through() {
        let value = Bson::String("user-7".to_string());

        assert_eq!(encode_filter_value(&value).unwrap(), value);
    }

    #[test]
    fn decode_maps_and_stringifies() {
        let oid = ObjectId::new();
        let decoded = decode_document(
            doc! { "_id": oid, "name": "Alice" },
            &transforming(),
        );

        assert_eq!(decoded.get_str("id").unwrap(), oid.to_hex());
        assert!(!decoded.contains_key("_id"));
        // the identifier leads the document
        assert_eq!(decoded.iter().next().unwrap().0, "id");
    }

    #[test]
    fn decode_without_mapping_keeps_native_key() {
        let config = RepoConfig {
            id_mapping: false,
            ..RepoConfig::default()
        };
        let oid = ObjectId::new();
        let decoded = decode_document(doc! { "_id": oid, "name": "Bob" }, &config);

        assert_eq!(decoded.get_str("_id").unwrap(), oid.to_hex());
        assert!(!decoded.contains_key("id"));
    }

    #[test]
    fn decode_without_transformation_keeps_raw_key_type() {
        let config = RepoConfig {
            id_transformation: false,
            ..RepoConfig::default()
        };
        let oid = ObjectId::new();
        let decoded = decode_document(doc! { "_id": oid }, &config);

        assert_eq!(decoded.get("id").and_then(Bson::as_object_id), Some(oid));
    }
}
