//! Trait definitions for the durable reward store

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{Assignment, Identity, PoolEntry};

use super::Result;

/// Durable, transactional storage for the reward pool and assignments.
///
/// Invariants the backend must hold:
/// - `next_pool_entry` enumerates in a consistent order (earliest
///   inserted first) so selection is deterministic.
/// - `commit_assignment` applies the assignment insert and the pool
///   delete atomically: both commit together or neither does.
///
/// Callers serialize `get_assignment → next_pool_entry →
/// commit_assignment` behind a single lock; the backend additionally
/// refuses a commit whose pool entry has already been consumed, which is
/// what makes the sequence safe across processes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RewardStore: Send + Sync {
    /// Look up an existing assignment for an identity.
    async fn get_assignment(&self, identity: &Identity) -> Result<Option<Assignment>>;

    /// The next pool entry in enumeration order, or `None` when the pool
    /// is empty.
    async fn next_pool_entry(&self) -> Result<Option<PoolEntry>>;

    /// Number of unassigned entries remaining.
    async fn pool_size(&self) -> Result<u64>;

    /// Atomically record `assignment` and remove `entry` from the pool.
    async fn commit_assignment(&self, assignment: &Assignment, entry: &PoolEntry) -> Result<()>;

    /// Add entries to the pool, skipping keys already present.
    ///
    /// Returns the number of entries actually inserted.
    async fn add_pool_entries(&self, entries: &[PoolEntry]) -> Result<u64>;

    /// All assignments, oldest first.
    async fn list_assignments(&self) -> Result<Vec<Assignment>>;
}
