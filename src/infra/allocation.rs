//! Single-assignment allocation of reward links
//!
//! Hands out a finite pool of links to identities with exactly-once
//! semantics: repeat claims by the same identity return the original
//! link, and a pool entry is consumed by at most one identity ever.

use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::{Assignment, Identity};
use crate::infra::{Result, RewardStore, ServiceError};

/// Exactly-once mapping of `identity -> reward link` over a durable
/// store.
pub struct AllocationEngine<S> {
    store: S,
    /// Serializes the whole idempotency-check / pool-read / commit
    /// sequence. The emptiness check and the entry selection read
    /// engine-wide state, so the critical section spans assignments for
    /// *any* identity, and the lock is held through the durable commit.
    assign_lock: Mutex<()>,
}

impl<S: RewardStore> AllocationEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            assign_lock: Mutex::new(()),
        }
    }

    /// Assign a reward link to `identity`, exactly once.
    ///
    /// - An existing assignment is returned unchanged; the pool is not
    ///   touched.
    /// - An empty pool fails with `PoolExhausted`.
    /// - Otherwise the earliest-inserted pool entry is consumed and the
    ///   assignment committed atomically with the pool delete.
    ///
    /// Storage faults surface as `Storage`, never as exhaustion.
    pub async fn assign(&self, identity: &Identity) -> Result<Assignment> {
        let _guard = self.assign_lock.lock().await;

        if let Some(existing) = self.store.get_assignment(identity).await? {
            tracing::debug!(%identity, "repeat claim, returning existing assignment");
            return Ok(existing);
        }

        let entry = self
            .store
            .next_pool_entry()
            .await?
            .ok_or(ServiceError::PoolExhausted)?;

        let assignment = Assignment {
            identity: identity.clone(),
            link: entry.link.clone(),
            assigned_at: Utc::now(),
        };

        self.store.commit_assignment(&assignment, &entry).await?;

        tracing::info!(%identity, entry_key = %entry.key, "reward assigned");
        Ok(assignment)
    }

    /// Look up an assignment without consuming pool inventory.
    pub async fn get_assignment(&self, identity: &Identity) -> Result<Option<Assignment>> {
        self.store.get_assignment(identity).await
    }

    /// Unassigned entries remaining in the pool.
    pub async fn remaining(&self) -> Result<u64> {
        self.store.pool_size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolEntry;
    use crate::infra::memory::InMemoryRewardStore;
    use crate::infra::MockRewardStore;
    use std::sync::Arc;

    fn identity(name: &str) -> Identity {
        Identity::from(name)
    }

    async fn engine_with_pool(links: &[&str]) -> AllocationEngine<InMemoryRewardStore> {
        let store = InMemoryRewardStore::new();
        let entries: Vec<PoolEntry> = links.iter().map(|link| PoolEntry::from_link(*link)).collect();
        store.add_pool_entries(&entries).await.unwrap();
        AllocationEngine::new(store)
    }

    #[tokio::test]
    async fn assign_consumes_earliest_entry() {
        let engine = engine_with_pool(&["link-1", "link-2"]).await;

        let assignment = engine.assign(&identity("alice")).await.unwrap();
        assert_eq!(assignment.link, "link-1");
        assert_eq!(engine.remaining().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeat_claim_is_idempotent() {
        let engine = engine_with_pool(&["link-1", "link-2"]).await;

        let first = engine.assign(&identity("alice")).await.unwrap();
        let second = engine.assign(&identity("alice")).await.unwrap();

        assert_eq!(first.link, second.link);
        assert_eq!(first.assigned_at, second.assigned_at);
        assert_eq!(engine.remaining().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_pool_is_exhausted_not_a_fault() {
        let engine = engine_with_pool(&[]).await;

        let err = engine.assign(&identity("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PoolExhausted));
    }

    #[tokio::test]
    async fn distinct_identities_get_distinct_entries() {
        let engine = engine_with_pool(&["link-1", "link-2"]).await;

        let a = engine.assign(&identity("alice")).await.unwrap();
        let b = engine.assign(&identity("bob")).await.unwrap();
        assert_ne!(a.link, b.link);
        assert_eq!(engine.remaining().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pool_of_one_under_contention_assigns_once() {
        let engine = Arc::new(engine_with_pool(&["only-link"]).await);

        let tasks: Vec<_> = ["alice", "bob"]
            .iter()
            .map(|name| {
                let engine = engine.clone();
                let who = identity(name);
                tokio::spawn(async move { engine.assign(&who).await })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let outcomes: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        let exhausted = outcomes
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::PoolExhausted)))
            .count();
        assert_eq!((winners, exhausted), (1, 1));
        assert_eq!(engine.remaining().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn n_plus_one_claims_exhaust_exactly_n() {
        let engine = Arc::new(engine_with_pool(&["l1", "l2", "l3"]).await);

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.assign(&Identity::from(format!("id-{i}"))).await })
            })
            .collect();

        let outcomes: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let links: std::collections::HashSet<_> = outcomes
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|a| a.link.clone())
            .collect();
        assert_eq!(links.len(), 3, "winners must consume distinct entries");
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(ServiceError::PoolExhausted)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn storage_fault_is_not_reported_as_exhaustion() {
        let mut store = MockRewardStore::new();
        store
            .expect_get_assignment()
            .returning(|_| Ok(None));
        store
            .expect_next_pool_entry()
            .returning(|| Err(ServiceError::Storage("connection lost".into())));

        let engine = AllocationEngine::new(store);
        let err = engine.assign(&identity("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
