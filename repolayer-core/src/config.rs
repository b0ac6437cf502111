//! Repository configuration and session tokens.
//!
//! A [`RepoConfig`] is built once per repository instance and is immutable
//! afterwards. The builder validates the combination of toggles at
//! construction time, so the per-operation code never has to re-check them.
//!
//! # Example
//!
//! ```ignore
//! use repolayer::config::RepoConfig;
//!
//! let config = RepoConfig::builder()
//!     .versioning(true)
//!     .timestamps(true)
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use uuid::Uuid;

use crate::{
    error::{RepoError, RepoResult},
    telemetry::OperationLogger,
};

/// An opaque token identifying a session owned by an external transaction
/// coordinator.
///
/// The repository never interprets the token; it only threads it through
/// every store call so a backend can look up the session it stands for.
/// Tokens are cheap to copy and safe to share between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Creates a fresh, unique session token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable per-repository configuration.
///
/// Defaults match the most common deployment: identifier mapping and
/// transformation on, post-update snapshots returned, versioning, timestamps
/// and soft delete off.
#[derive(Clone)]
pub struct RepoConfig {
    /// Expose the native `_id` key as the application-facing `id` field.
    pub id_mapping: bool,
    /// Encode/decode the native key between its canonical 24-hex string form
    /// and the store's binary key type.
    pub id_transformation: bool,
    /// `update_one` returns the post-update snapshot when true, the
    /// pre-update snapshot when false. Overridable per call.
    pub return_latest_by_default: bool,
    /// Maintain an integer `version` field: 1 on creation, +1 per accepted
    /// update.
    pub versioning: bool,
    /// Maintain `createdAt` (set once) and `updatedAt` (set per update)
    /// fields.
    pub timestamps: bool,
    /// Mark deleted documents with a `deletedAt` timestamp instead of
    /// removing them, and exclude them from filter-driven operations by
    /// default.
    pub soft_delete: bool,
    /// Limit applied to `query` when the call does not set one.
    pub default_query_limit: Option<u64>,
    /// Session token threaded through every store call, for transactional
    /// grouping by an external coordinator.
    pub session: Option<SessionToken>,
    /// Sink receiving one telemetry record per repository operation.
    pub logger: Option<Arc<dyn OperationLogger>>,
}

impl RepoConfig {
    /// Creates a new builder for fluent construction.
    pub fn builder() -> RepoConfigBuilder {
        RepoConfigBuilder::new()
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            id_mapping: true,
            id_transformation: true,
            return_latest_by_default: true,
            versioning: false,
            timestamps: false,
            soft_delete: false,
            default_query_limit: None,
            session: None,
            logger: None,
        }
    }
}

impl fmt::Debug for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoConfig")
            .field("id_mapping", &self.id_mapping)
            .field("id_transformation", &self.id_transformation)
            .field("return_latest_by_default", &self.return_latest_by_default)
            .field("versioning", &self.versioning)
            .field("timestamps", &self.timestamps)
            .field("soft_delete", &self.soft_delete)
            .field("default_query_limit", &self.default_query_limit)
            .field("session", &self.session)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Builder for [`RepoConfig`] with validation at `build` time.
#[derive(Default)]
pub struct RepoConfigBuilder {
    config: RepoConfig,
}

impl RepoConfigBuilder {
    /// Creates a builder seeded with the defaults.
    pub fn new() -> Self {
        Self { config: RepoConfig::default() }
    }

    /// Toggles relocation of the native key into the `id` field.
    pub fn id_mapping(mut self, enabled: bool) -> Self {
        self.config.id_mapping = enabled;
        self
    }

    /// Toggles encoding of the native key as the store's binary key type.
    pub fn id_transformation(mut self, enabled: bool) -> Self {
        self.config.id_transformation = enabled;
        self
    }

    /// Chooses whether `update_one` returns the post-update snapshot.
    pub fn return_latest_by_default(mut self, enabled: bool) -> Self {
        self.config.return_latest_by_default = enabled;
        self
    }

    /// Toggles the per-document version counter.
    pub fn versioning(mut self, enabled: bool) -> Self {
        self.config.versioning = enabled;
        self
    }

    /// Toggles `createdAt`/`updatedAt` maintenance.
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.config.timestamps = enabled;
        self
    }

    /// Toggles soft-delete semantics for `delete_many`.
    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.config.soft_delete = enabled;
        self
    }

    /// Sets the limit applied to `query` calls that do not set their own.
    pub fn default_query_limit(mut self, limit: u64) -> Self {
        self.config.default_query_limit = Some(limit);
        self
    }

    /// Sets the session token threaded through every store call.
    pub fn session(mut self, token: SessionToken) -> Self {
        self.config.session = Some(token);
        self
    }

    /// Sets the telemetry sink fired once per operation.
    pub fn logger(mut self, logger: Arc<dyn OperationLogger>) -> Self {
        self.config.logger = Some(logger);
        self
    }

    /// Validates the combination of options and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Config`] for combinations that cannot work, such
    /// as a default query limit of zero.
    pub fn build(self) -> RepoResult<RepoConfig> {
        if self.config.default_query_limit == Some(0) {
            return Err(RepoError::Config(
                "default query limit must be greater than zero".to_string(),
            ));
        }

        Ok(self.config)
    }
}
