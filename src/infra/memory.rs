//! In-memory reward store (for development and tests)
//!
//! Holds the same consistency contract as the SQLite backend: entries
//! are consumed in insertion order, and the assignment insert plus the
//! pool removal happen under one write lock.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Assignment, Identity, PoolEntry};
use crate::infra::{Result, RewardStore, ServiceError};

#[derive(Default)]
struct MemoryState {
    pool: VecDeque<PoolEntry>,
    assignments: HashMap<Identity, Assignment>,
}

/// In-memory `RewardStore` implementation.
///
/// Not durable; production deployments use the SQLite backend.
#[derive(Default)]
pub struct InMemoryRewardStore {
    state: RwLock<MemoryState>,
}

impl InMemoryRewardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardStore for InMemoryRewardStore {
    async fn get_assignment(&self, identity: &Identity) -> Result<Option<Assignment>> {
        let state = self.state.read().await;
        Ok(state.assignments.get(identity).cloned())
    }

    async fn next_pool_entry(&self) -> Result<Option<PoolEntry>> {
        let state = self.state.read().await;
        Ok(state.pool.front().cloned())
    }

    async fn pool_size(&self) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.pool.len() as u64)
    }

    async fn commit_assignment(&self, assignment: &Assignment, entry: &PoolEntry) -> Result<()> {
        let mut state = self.state.write().await;

        let position = state
            .pool
            .iter()
            .position(|e| e.key == entry.key)
            .ok_or_else(|| {
                ServiceError::Storage(format!("pool entry {} already consumed", entry.key))
            })?;

        if state.assignments.contains_key(&assignment.identity) {
            return Err(ServiceError::Storage(format!(
                "assignment for {} already exists",
                assignment.identity
            )));
        }

        let _ = state.pool.remove(position);
        state
            .assignments
            .insert(assignment.identity.clone(), assignment.clone());
        Ok(())
    }

    async fn add_pool_entries(&self, entries: &[PoolEntry]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for entry in entries {
            let duplicate = state.pool.iter().any(|e| e.key == entry.key)
                || state.assignments.values().any(|a| {
                    PoolEntry::from_link(a.link.clone()).key == entry.key
                });
            if !duplicate {
                state.pool.push_back(entry.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<Assignment> = state.assignments.values().cloned().collect();
        assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assignment(identity: &str, link: &str) -> Assignment {
        Assignment {
            identity: Identity::from(identity),
            link: link.to_string(),
            assigned_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = InMemoryRewardStore::new();
        let entries = vec![PoolEntry::from_link("a"), PoolEntry::from_link("b")];

        assert_eq!(store.add_pool_entries(&entries).await.unwrap(), 2);
        assert_eq!(store.add_pool_entries(&entries).await.unwrap(), 0);
        assert_eq!(store.pool_size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn commit_refuses_consumed_entry() {
        let store = InMemoryRewardStore::new();
        let entry = PoolEntry::from_link("a");
        store.add_pool_entries(&[entry.clone()]).await.unwrap();

        store
            .commit_assignment(&assignment("alice", "a"), &entry)
            .await
            .unwrap();

        let err = store
            .commit_assignment(&assignment("bob", "a"), &entry)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(store.pool_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_enumerate_in_insertion_order() {
        let store = InMemoryRewardStore::new();
        store
            .add_pool_entries(&[PoolEntry::from_link("first"), PoolEntry::from_link("second")])
            .await
            .unwrap();

        let next = store.next_pool_entry().await.unwrap().unwrap();
        assert_eq!(next.link, "first");
    }
}
