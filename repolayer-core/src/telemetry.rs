//! Structured operation telemetry.
//!
//! Every repository operation emits exactly one [`OperationRecord`] to the
//! configured [`OperationLogger`], timed from call start to store response.
//! The sink has no return value and no effect on control flow; failed
//! operations surface their error before any record is emitted.

use bson::Document;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The repository operation a telemetry record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    CreateMany,
    Count,
    UpdateOne,
    UpdateMany,
    DeleteMany,
    GetById,
    Query,
}

impl Action {
    /// Stable, lowercase name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::CreateMany => "create_many",
            Action::Count => "count",
            Action::UpdateOne => "update_one",
            Action::UpdateMany => "update_many",
            Action::DeleteMany => "delete_many",
            Action::GetById => "get_by_id",
            Action::Query => "query",
        }
    }
}

/// One telemetry record per repository operation.
///
/// `filter` carries the caller's application-level filter (before any
/// rewriting), for the operations that take one.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    /// Name of the collection the operation ran against.
    pub collection: String,
    /// Which operation ran.
    pub action: Action,
    /// The caller-supplied filter, where the operation has one.
    pub filter: Option<Document>,
    /// Wall-clock time from call start to store response, in milliseconds.
    pub duration_ms: u64,
    /// When the operation started.
    pub started_at: DateTime<Utc>,
}

/// Sink receiving one [`OperationRecord`] per repository operation.
///
/// Implemented for any `Fn(&OperationRecord)` closure, so a simple callback
/// is enough:
///
/// ```ignore
/// let config = RepoConfig::builder()
///     .logger(Arc::new(|record: &OperationRecord| {
///         println!("{} on {} took {}ms", record.action.as_str(), record.collection, record.duration_ms);
///     }))
///     .build()?;
/// ```
pub trait OperationLogger: Send + Sync {
    /// Receives a completed operation's record.
    fn log(&self, record: &OperationRecord);
}

impl<F> OperationLogger for F
where
    F: Fn(&OperationRecord) + Send + Sync,
{
    fn log(&self, record: &OperationRecord) {
        self(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn records_serialize_to_json() {
        let record = OperationRecord {
            collection: "users".to_string(),
            action: Action::UpdateMany,
            filter: Some(doc! { "status": "active" }),
            duration_ms: 12,
            started_at: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["collection"], "users");
        assert_eq!(value["action"], "update_many");
        assert_eq!(value["filter"]["status"], "active");
        assert_eq!(value["duration_ms"], 12);
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(Action::Create.as_str(), "create");
        assert_eq!(Action::GetById.as_str(), "get_by_id");
    }
}
