//! Cache invalidation for report listings and the admin dashboard
//!
//! Listing entries are scoped per requester, so invalidating a user means deleting the
//! whole (status x type) key product for that user. Failures are logged and swallowed;
//! TTL expiry bounds whatever is left behind.

use crate::domain::ListingQuery;
use crate::metrics::INVALIDATION_FAILURES;
use civic_cache::{CacheKey, KeyValueCache};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<dyn KeyValueCache>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Every listing key that can exist for `user_id`
    pub fn listing_keys_for(user_id: Uuid) -> Vec<String> {
        ListingQuery::all_for(user_id)
            .map(|query| query.cache_key())
            .collect()
    }

    /// Drop all cached listings requested by `user_id`
    pub async fn invalidate(&self, user_id: Uuid) {
        let keys = Self::listing_keys_for(user_id);

        match self.cache.del_many(&keys).await {
            Ok(()) => {
                debug!(%user_id, keys = keys.len(), "Listing cache INVALIDATE");
            }
            Err(e) => {
                warn!(%user_id, error = %e, "Listing cache invalidation failed; entries expire by TTL");
                INVALIDATION_FAILURES.with_label_values(&["listing"]).inc();
            }
        }
    }

    /// Invalidate several users, skipping duplicates
    pub async fn invalidate_users(&self, user_ids: &[Uuid]) {
        let mut seen = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if !seen.contains(user_id) {
                seen.push(*user_id);
                self.invalidate(*user_id).await;
            }
        }
    }

    /// Drop the cached admin dashboard
    pub async fn invalidate_dashboard(&self) {
        let key = CacheKey::admin_dashboard();

        match self.cache.del(&key).await {
            Ok(()) => debug!(key = %key, "Dashboard cache INVALIDATE"),
            Err(e) => {
                warn!(key = %key, error = %e, "Dashboard cache invalidation failed; entry expires by TTL");
                INVALIDATION_FAILURES.with_label_values(&["dashboard"]).inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_cache::{CacheError, CacheResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DownCache {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl KeyValueCache for DownCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl_secs: u64) -> CacheResult<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn del(&self, _key: &str) -> CacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn test_invalidation_failures_are_swallowed() {
        let cache = Arc::new(DownCache {
            calls: AtomicUsize::new(0),
        });
        let coordinator = InvalidationCoordinator::new(cache.clone());
        let user = Uuid::new_v4();

        tokio_test::block_on(async {
            coordinator.invalidate_users(&[user, user]).await;
            coordinator.invalidate_dashboard().await;
        });

        // default del_many stops at the first failing key; the duplicate user is skipped
        assert_eq!(cache.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listing_keys_are_user_scoped() {
        let user = Uuid::new_v4();
        let keys = InvalidationCoordinator::listing_keys_for(user);

        assert_eq!(keys.len(), 35);
        let suffix = format!(":user:{}", user);
        assert!(keys.iter().all(|k| k.starts_with("reports:") && k.ends_with(&suffix)));
        assert!(keys.contains(&format!("reports:all:all:user:{}", user)));
        assert!(keys.contains(&format!("reports:In Progress:all:user:{}", user)));
    }
}
