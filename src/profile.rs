//! User profile lookups for personalization
//!
//! The personalized job-search mode reads the user's stored career field
//! and auto-submits a query for it. The backing document store is an
//! external collaborator behind the [`ProfileStore`] seam; a static map
//! implementation is bundled for configuration-driven and test use.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Read access to stored user profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The user's stored career field, if any
    async fn career_field(&self, user_id: &str) -> Result<Option<String>>;
}

/// In-memory profile store backed by a static map
#[derive(Debug, Clone, Default)]
pub struct StaticProfileStore {
    fields: HashMap<String, String>,
}

impl StaticProfileStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a user-id to career-field map
    pub fn from_map(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// Add one profile entry, builder style
    ///
    /// # Examples
    ///
    /// ```
    /// use parlance::profile::StaticProfileStore;
    ///
    /// let store = StaticProfileStore::new().with_field("u1", "welding");
    /// ```
    pub fn with_field(mut self, user_id: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields.insert(user_id.into(), field.into());
        self
    }
}

#[async_trait]
impl ProfileStore for StaticProfileStore {
    async fn career_field(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.fields.get(user_id).cloned())
    }
}
