//! Collection provisioning at setup/teardown time.
//!
//! Entirely outside the transformation pipeline: a [`CollectionSet`] just
//! issues create/drop calls for a fixed set of named collections, threading
//! an optional session through creation so provisioning can participate in
//! an external transaction.

use tracing::debug;

use crate::{config::SessionToken, error::RepoResult, handle::StoreHandle};

/// A fixed set of collection names to provision together.
#[derive(Debug, Clone, Default)]
pub struct CollectionSet {
    names: Vec<String>,
}

impl CollectionSet {
    /// Creates a set from any iterable of collection names.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The collection names in this set.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Creates every collection in the set.
    pub async fn provision<H: StoreHandle>(
        &self,
        handle: &H,
        session: Option<&SessionToken>,
    ) -> RepoResult<()> {
        for name in &self.names {
            debug!(collection = %name, "provisioning collection");
            handle.create_collection(name, session).await?;
        }

        Ok(())
    }

    /// Drops every collection in the set.
    pub async fn teardown<H: StoreHandle>(&self, handle: &H) -> RepoResult<()> {
        for name in &self.names {
            debug!(collection = %name, "dropping collection");
            handle.drop_collection(name).await?;
        }

        Ok(())
    }
}
