//! Filter evaluation and update application for the in-memory store.
//!
//! Implements the Mongo-style operator subset the repository layer emits:
//! literal equality, `$eq`, `$ne`, `$in`, `$nin`, the range operators,
//! `$exists`, and the update operators `$set`, `$unset`, `$inc`. Numeric
//! comparisons widen across integer and double representations; a missing
//! field compares equal to null, as the wire protocol does.

use std::cmp::Ordering;

use bson::{Bson, Document};

use repolayer_core::error::{RepoError, RepoResult};

/// Tests a document against a store-level filter.
///
/// Every filter field must match; an empty filter matches everything.
pub(crate) fn matches(document: &Document, filter: &Document) -> RepoResult<bool> {
    for (field, condition) in filter.iter() {
        if !field_matches(document.get(field), condition)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Applies a store-level update expression to a document in place.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> RepoResult<()> {
    for (operator, section) in update.iter() {
        let section = section.as_document().ok_or_else(|| {
            RepoError::Backend(format!("update operator {operator} requires a document operand"))
        })?;

        match operator.as_str() {
            "$set" => {
                for (field, value) in section.iter() {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for (field, _) in section.iter() {
                    document.remove(field);
                }
            }
            "$inc" => {
                for (field, delta) in section.iter() {
                    let incremented = increment(document.get(field), delta)?;
                    document.insert(field.clone(), incremented);
                }
            }
            other => {
                return Err(RepoError::Backend(format!("unsupported update operator {other}")));
            }
        }
    }

    Ok(())
}

/// Orders two field values for sorting. Unset and incomparable values sort
/// as equal.
pub(crate) fn order_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => compare_values(left, right).unwrap_or(Ordering::Equal),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn field_matches(actual: Option<&Bson>, condition: &Bson) -> RepoResult<bool> {
    if let Bson::Document(operators) = condition {
        let is_operator_doc = operators
            .keys()
            .next()
            .is_some_and(|key| key.starts_with('$'));

        if is_operator_doc {
            for (operator, operand) in operators.iter() {
                if !operator_matches(actual, operator, operand)? {
                    return Ok(false);
                }
            }

            return Ok(true);
        }
    }

    Ok(values_equal(actual.unwrap_or(&Bson::Null), condition))
}

fn operator_matches(actual: Option<&Bson>, operator: &str, operand: &Bson) -> RepoResult<bool> {
    let present = actual.unwrap_or(&Bson::Null);

    match operator {
        "$eq" => Ok(values_equal(present, operand)),
        "$ne" => Ok(!values_equal(present, operand)),
        "$in" => {
            let candidates = operand.as_array().ok_or_else(|| {
                RepoError::Backend("$in requires an array operand".to_string())
            })?;

            Ok(candidates.iter().any(|candidate| values_equal(present, candidate)))
        }
        "$nin" => {
            let candidates = operand.as_array().ok_or_else(|| {
                RepoError::Backend("$nin requires an array operand".to_string())
            })?;

            Ok(!candidates.iter().any(|candidate| values_equal(present, candidate)))
        }
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let ordering = match actual {
                Some(value) => compare_values(value, operand),
                None => None,
            };

            Ok(match ordering {
                Some(ordering) => match operator {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            })
        }
        "$exists" => {
            let expected = operand.as_bool().ok_or_else(|| {
                RepoError::Backend("$exists requires a boolean operand".to_string())
            })?;

            Ok(actual.is_some() == expected)
        }
        other => Err(RepoError::Backend(format!("unsupported filter operator {other}"))),
    }
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (numeric(left), numeric(right)) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (numeric(left), numeric(right)) {
        return left.partial_cmp(&right);
    }

    match (left, right) {
        (Bson::String(left), Bson::String(right)) => Some(left.cmp(right)),
        (Bson::DateTime(left), Bson::DateTime(right)) => Some(left.cmp(right)),
        (Bson::Boolean(left), Bson::Boolean(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(*value as f64),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn increment(current: Option<&Bson>, delta: &Bson) -> RepoResult<Bson> {
    match (current, delta) {
        (None, delta) => Ok(delta.clone()),
        (Some(Bson::Int32(current)), Bson::Int32(delta)) => Ok(Bson::Int32(current + delta)),
        (Some(Bson::Int32(current)), Bson::Int64(delta)) => {
            Ok(Bson::Int64(i64::from(*current) + delta))
        }
        (Some(Bson::Int64(current)), Bson::Int32(delta)) => {
            Ok(Bson::Int64(current + i64::from(*delta)))
        }
        (Some(Bson::Int64(current)), Bson::Int64(delta)) => Ok(Bson::Int64(current + delta)),
        (Some(current), delta) => match (numeric(current), numeric(delta)) {
            (Some(current), Some(delta)) => Ok(Bson::Double(current + delta)),
            _ => Err(RepoError::Backend("$inc requires numeric values".to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{DateTime, doc, oid::ObjectId};

    #[test]
    fn literal_and_operator_equality_agree() {
        let document = doc! { "name": "Alice", "age": 30_i64 };

        assert!(matches(&document, &doc! { "name": "Alice" }).unwrap());
        assert!(matches(&document, &doc! { "age": { "$eq": 30 } }).unwrap());
        assert!(!matches(&document, &doc! { "name": "Bob" }).unwrap());
    }

    #[test]
    fn missing_fields_equal_null() {
        let document = doc! { "name": "Alice" };

        assert!(matches(&document, &doc! { "nickname": Bson::Null }).unwrap());
        assert!(matches(&document, &doc! { "nickname": { "$ne": "Al" } }).unwrap());
    }

    #[test]
    fn in_and_nin_respect_object_ids() {
        let first = ObjectId::new();
        let second = ObjectId::new();
        let document = doc! { "_id": first };

        assert!(matches(&document, &doc! { "_id": { "$in": [first, second] } }).unwrap());
        assert!(matches(&document, &doc! { "_id": { "$nin": [second] } }).unwrap());
        assert!(!matches(&document, &doc! { "_id": { "$ne": first } }).unwrap());
    }

    #[test]
    fn range_operators_widen_numerics() {
        let document = doc! { "score": 10_i64 };

        assert!(matches(&document, &doc! { "score": { "$gt": 9.5 } }).unwrap());
        assert!(matches(&document, &doc! { "score": { "$lte": 10 } }).unwrap());
        assert!(!matches(&document, &doc! { "score": { "$lt": 10 } }).unwrap());
    }

    #[test]
    fn exists_checks_presence() {
        let document = doc! { "deletedAt": DateTime::now() };

        assert!(matches(&document, &doc! { "deletedAt": { "$exists": true } }).unwrap());
        assert!(!matches(&document, &doc! { "deletedAt": { "$exists": false } }).unwrap());
        assert!(matches(&doc! {}, &doc! { "deletedAt": { "$exists": false } }).unwrap());
    }

    #[test]
    fn unknown_operators_are_rejected() {
        assert!(matches(&doc! {}, &doc! { "a": { "$regex": "x" } }).is_err());
    }

    #[test]
    fn updates_apply_in_order() {
        let mut document = doc! { "name": "Alice", "version": 1_i64, "nickname": "Al" };

        apply_update(
            &mut document,
            &doc! {
                "$set": { "name": "Alicia" },
                "$inc": { "version": 1_i64 },
                "$unset": { "nickname": "" },
            },
        )
        .unwrap();

        assert_eq!(document.get_str("name").unwrap(), "Alicia");
        assert_eq!(document.get_i64("version").unwrap(), 2);
        assert!(!document.contains_key("nickname"));
    }

    #[test]
    fn increments_preserve_integer_width() {
        let mut document = doc! { "a": 1_i32, "b": 1_i64, "c": 1.5 };

        apply_update(&mut document, &doc! { "$inc": { "a": 1, "b": 1, "c": 1 } }).unwrap();

        assert_eq!(document.get("a"), Some(&Bson::Int32(2)));
        assert_eq!(document.get("b"), Some(&Bson::Int64(2)));
        assert_eq!(document.get("c"), Some(&Bson::Double(2.5)));
    }

    #[test]
    fn incrementing_an_absent_field_seeds_it() {
        let mut document = doc! {};

        apply_update(&mut document, &doc! { "$inc": { "count": 5_i64 } }).unwrap();

        assert_eq!(document.get_i64("count").unwrap(), 5);
    }
}
