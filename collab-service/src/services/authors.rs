//! Local user to pad-service author mapping.

use super::locks::KeyedLocks;
use super::remote::CollabRemote;
use super::store::AuthorStore;
use super::BrokerError;
use crate::models::AuthorIdentity;
use std::sync::Arc;

pub struct AuthorIdentityCache {
    store: Arc<dyn AuthorStore>,
    remote: Arc<dyn CollabRemote>,
    locks: KeyedLocks,
}

impl AuthorIdentityCache {
    pub fn new(store: Arc<dyn AuthorStore>, remote: Arc<dyn CollabRemote>) -> Self {
        Self {
            store,
            remote,
            locks: KeyedLocks::new(),
        }
    }

    /// Remote author id for `user_id`, creating the author on first use.
    ///
    /// If another process wins the insert, its author is returned and the one
    /// created here is left unused on the pad service.
    pub async fn get_or_create_author(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<String, BrokerError> {
        if let Some(existing) = self.store.find_author(user_id).await? {
            return Ok(existing.remote_author_id);
        }

        let _guard = self.locks.lock(user_id).await;
        if let Some(existing) = self.store.find_author(user_id).await? {
            return Ok(existing.remote_author_id);
        }

        let remote_author_id = self.remote.create_author(display_name).await?;
        let stored = self
            .store
            .insert_author_if_absent(AuthorIdentity::new(user_id, remote_author_id.as_str()))
            .await?;

        if stored.remote_author_id != remote_author_id {
            tracing::warn!(
                user_id,
                orphaned_author_id = %remote_author_id,
                "Author created concurrently elsewhere, keeping stored identity"
            );
        } else {
            tracing::info!(user_id, author_id = %remote_author_id, "Registered pad author");
        }

        Ok(stored.remote_author_id)
    }

    /// Local user behind a remote author id.
    pub async fn user_for_author(&self, remote_author_id: &str) -> Result<String, BrokerError> {
        self.store
            .find_author_by_remote_id(remote_author_id)
            .await?
            .map(|author| author.user_id)
            .ok_or_else(|| BrokerError::NotFound(format!("author {}", remote_author_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::mock::MockRemote;
    use crate::services::remote::{RenewalCheck, CREATE_AUTHOR};
    use crate::services::store::MemoryStore;

    fn cache() -> (AuthorIdentityCache, Arc<MockRemote>, Arc<MemoryStore>) {
        let remote = Arc::new(MockRemote::new(RenewalCheck {
            threshold_secs: 10_800,
            require_group_match: true,
        }));
        let store = Arc::new(MemoryStore::new());
        (
            AuthorIdentityCache::new(store.clone(), remote.clone()),
            remote,
            store,
        )
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (cache, remote, store) = cache();

        let first = cache.get_or_create_author("u1", "Ada").await.unwrap();
        let second = cache.get_or_create_author("u1", "Ada").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.calls(CREATE_AUTHOR), 1);
        assert_eq!(store.author_count(), 1);
        assert_eq!(cache.user_for_author(&first).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_remote_failure_persists_nothing() {
        let (cache, remote, store) = cache();
        remote.fail_on(CREATE_AUTHOR);

        let err = cache.get_or_create_author("u1", "Ada").await.unwrap_err();

        assert!(matches!(err, BrokerError::RemoteService { operation: "createAuthor", .. }));
        assert_eq!(store.author_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_author_is_not_found() {
        let (cache, _, _) = cache();
        assert!(matches!(
            cache.user_for_author("a.404").await,
            Err(BrokerError::NotFound(_))
        ));
    }
}
