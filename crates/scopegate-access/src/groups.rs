//! Group expansion: which groups does a user belong to.

use std::sync::Arc;

use scopegate_core::{GroupId, UserId};
use scopegate_store::Store;

use crate::error::Result;

/// Resolves a user to the groups they belong to.
///
/// Membership is read fresh on every call; nothing is cached.
pub struct GroupExpansion<S> {
    store: Arc<S>,
}

impl<S> Clone for GroupExpansion<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> GroupExpansion<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Groups the user belongs to, ordered by id.
    pub async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        Ok(self.store.groups_for_user(user_id).await?)
    }
}
