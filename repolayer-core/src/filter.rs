//! Filter rewriter: application-level filters to store-level filters.
//!
//! Only the identifier field is rewritten; every other field passes
//! through untouched. The rewrite is idempotent and never mutates the
//! caller's filter.

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::{
    config::RepoConfig,
    error::{RepoError, RepoResult},
    id::{APP_KEY_FIELD, NATIVE_KEY_FIELD, encode_filter_value},
    transform::DELETED_AT_FIELD,
};

/// Rewrites an application-level filter into the store-level shape.
///
/// With identifier mapping enabled, an `id` key relocates to the native key
/// field. With identifier transformation enabled, the native key's value is
/// then encoded: a bare string strictly, `$in` elements and `$ne` operands
/// leniently. Any other operator on the identifier is rejected; filters
/// needing richer identifier logic must bypass the façade and address the
/// store handle directly.
///
/// # Errors
///
/// [`RepoError::InvalidId`] for an unparseable bare identifier,
/// [`RepoError::UnsupportedIdFilter`] for operators other than `$in`/`$ne`.
pub fn prepare_filter(filter: &Document, config: &RepoConfig) -> RepoResult<Document> {
    let mut prepared = Document::new();

    for (field, value) in filter.iter() {
        if config.id_mapping && field == APP_KEY_FIELD {
            prepared.insert(NATIVE_KEY_FIELD, value.clone());
        } else {
            prepared.insert(field.clone(), value.clone());
        }
    }

    if config.id_transformation {
        if let Some(value) = prepared.get(NATIVE_KEY_FIELD).cloned() {
            prepared.insert(NATIVE_KEY_FIELD, rewrite_key_condition(&value)?);
        }
    }

    Ok(prepared)
}

/// Merges the soft-delete exclusion into a store-level filter.
///
/// Documents carrying a `deletedAt` marker are invisible to filter-driven
/// operations unless the filter already constrains that field (which
/// includes a caller explicitly asking for deleted documents).
pub fn exclude_deleted(mut filter: Document) -> Document {
    if !filter.contains_key(DELETED_AT_FIELD) {
        filter.insert(DELETED_AT_FIELD, doc! { "$exists": false });
    }

    filter
}

fn rewrite_key_condition(value: &Bson) -> RepoResult<Bson> {
    match value {
        Bson::String(raw) => ObjectId::parse_str(raw)
            .map(Bson::ObjectId)
            .map_err(|_| RepoError::InvalidId(raw.clone())),
        Bson::Document(operators) => {
            let mut rewritten = Document::new();
            for (operator, operand) in operators.iter() {
                match (operator.as_str(), operand) {
                    ("$in", Bson::Array(items)) => {
                        let encoded = items
                            .iter()
                            .map(encode_filter_value)
                            .collect::<RepoResult<Vec<Bson>>>()?;
                        rewritten.insert("$in", encoded);
                    }
                    ("$ne", operand) => {
                        rewritten.insert("$ne", encode_filter_value(operand)?);
                    }
                    (other, _) => {
                        return Err(RepoError::UnsupportedIdFilter(other.to_string()));
                    }
                }
            }

            Ok(Bson::Document(rewritten))
        }
        // already-encoded keys and exotic raw keys pass through
        other => Ok(other.clone()),
    }
}
