//! Update rewriter: augments update expressions with version-increment and
//! timestamp-set operators.
//!
//! Merges are additive: caller-supplied fields under `$inc`/`$set` are
//! preserved, only the repository-owned sub-keys are overwritten.

use bson::{Bson, DateTime, Document};

use crate::{
    config::RepoConfig,
    transform::{DELETED_AT_FIELD, UPDATED_AT_FIELD, VERSION_FIELD},
};

/// Augments an application-level update expression per configuration.
///
/// With versioning enabled, `$inc.version = 1` is merged in; with
/// timestamps enabled, `$set.updatedAt = now`. Operators and fields the
/// repository does not own pass through untouched. The caller's expression
/// is never mutated.
pub fn prepare_update(update: &Document, now: DateTime, config: &RepoConfig) -> Document {
    let mut prepared = update.clone();

    if config.versioning {
        merge_operator(&mut prepared, "$inc", VERSION_FIELD, Bson::Int64(1));
    }
    if config.timestamps {
        merge_operator(&mut prepared, "$set", UPDATED_AT_FIELD, Bson::DateTime(now));
    }

    prepared
}

/// Builds the update expression applied by a soft delete.
///
/// Sets the `deletedAt` marker and, when versioning is enabled and not
/// skipped, counts the deletion as an accepted update.
pub fn prepare_soft_delete(
    now: DateTime,
    skip_version_update: bool,
    config: &RepoConfig,
) -> Document {
    let mut update = Document::new();
    merge_operator(&mut update, "$set", DELETED_AT_FIELD, Bson::DateTime(now));

    if config.versioning && !skip_version_update {
        merge_operator(&mut update, "$inc", VERSION_FIELD, Bson::Int64(1));
    }
    if config.timestamps {
        merge_operator(&mut update, "$set", UPDATED_AT_FIELD, Bson::DateTime(now));
    }

    update
}

fn merge_operator(update: &mut Document, operator: &str, field: &str, value: Bson) {
    let mut section = update
        .get_document(operator)
        .ok()
        .cloned()
        .unwrap_or_default();
    section.insert(field, value);
    update.insert(operator, section);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn merges_without_clobbering_caller_operators() {
        let config = RepoConfig {
            versioning: true,
            timestamps: true,
            ..RepoConfig::default()
        };
        let now = DateTime::now();
        let update = doc! {
            "$set": { "name": "Alice" },
            "$inc": { "logins": 2 },
            "$unset": { "nickname": "" },
        };

        let prepared = prepare_update(&update, now, &config);

        let set = prepared.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "Alice");
        assert_eq!(set.get_datetime("updatedAt").unwrap(), &now);

        let inc = prepared.get_document("$inc").unwrap();
        assert_eq!(inc.get_i32("logins").unwrap(), 2);
        assert_eq!(inc.get_i64("version").unwrap(), 1);

        assert!(prepared.contains_key("$unset"));
        // caller's expression is untouched
        assert!(!update.get_document("$set").unwrap().contains_key("updatedAt"));
    }

    #[test]
    fn owned_sub_keys_win_over_caller_values() {
        let config = RepoConfig {
            versioning: true,
            ..RepoConfig::default()
        };
        let update = doc! { "$inc": { "version": 99 } };

        let prepared = prepare_update(&update, DateTime::now(), &config);

        assert_eq!(
            prepared.get_document("$inc").unwrap().get_i64("version").unwrap(),
            1,
        );
    }

    #[test]
    fn disabled_toggles_leave_updates_verbatim() {
        let update = doc! { "$set": { "name": "Bob" } };

        let prepared = prepare_update(&update, DateTime::now(), &RepoConfig::default());

        assert_eq!(prepared, update);
    }

    #[test]
    fn soft_delete_counts_as_an_update() {
        let config = RepoConfig {
            versioning: true,
            soft_delete: true,
            ..RepoConfig::default()
        };
        let now = DateTime::now();

        let update = prepare_soft_delete(now, false, &config);
        assert_eq!(update.get_document("$set").unwrap().get_datetime("deletedAt").unwrap(), &now);
        assert_eq!(update.get_document("$inc").unwrap().get_i64("version").unwrap(), 1);

        let skipped = prepare_soft_delete(now, true, &config);
        assert!(!skipped.contains_key("$inc"));
    }
}
