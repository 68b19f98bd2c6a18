//! The tuple-store client contract.
//!
//! The engine never owns tuple durability; it issues operations against a
//! [`TupleStore`]. The bundled [`InMemoryTupleStore`] is strongly
//! consistent. A remote implementation may be distributed, but must serve
//! reads no staler than [`MAX_STALENESS_SECS`] — the engine's
//! read-your-writes guarantee on a single instance depends on it.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::error::{PolicyError, PolicyResult};
use crate::tuple::{ObjectRef, RelationName, RelationshipTuple, UserRef};

/// Maximum tolerated read staleness, in seconds, for a distributed
/// [`TupleStore`] implementation. The in-memory store is strongly
/// consistent; remote backends must be verified against this bound.
pub const MAX_STALENESS_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// TupleFilter
// ---------------------------------------------------------------------------

/// Filter for tuple reads. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    pub user: Option<UserRef>,
    pub relation: Option<RelationName>,
    pub object: Option<ObjectRef>,
    pub object_type: Option<String>,
}

impl TupleFilter {
    pub fn by_relation_and_object(relation: RelationName, object: ObjectRef) -> Self {
        Self {
            relation: Some(relation),
            object: Some(object),
            ..Self::default()
        }
    }

    pub fn by_object_type(object_type: impl Into<String>) -> Self {
        Self {
            object_type: Some(object_type.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, tuple: &RelationshipTuple) -> bool {
        if let Some(user) = &self.user {
            if &tuple.user != user {
                return false;
            }
        }
        if let Some(relation) = &self.relation {
            if &tuple.relation != relation {
                return false;
            }
        }
        if let Some(object) = &self.object {
            if &tuple.object != object {
                return false;
            }
        }
        if let Some(object_type) = &self.object_type {
            if &tuple.object.object_type != object_type {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// TupleStore trait
// ---------------------------------------------------------------------------

/// Client contract for the policy backend.
///
/// `apply` is the single mutation entry point and is atomic: either every
/// write and delete lands, or none do. Reads may suspend the calling task
/// but must never block the thread.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Read all tuples matching the filter.
    async fn read(&self, filter: &TupleFilter) -> PolicyResult<Vec<RelationshipTuple>>;

    /// Atomically apply a batch of writes and deletes.
    ///
    /// Writing an already-present tuple is idempotent. Deleting an absent
    /// tuple is a no-op. A tuple appearing in both sets is a semantic
    /// conflict and fails the whole batch.
    async fn apply(
        &self,
        writes: &[RelationshipTuple],
        deletes: &[RelationshipTuple],
    ) -> PolicyResult<()>;
}

// ---------------------------------------------------------------------------
// InMemoryTupleStore
// ---------------------------------------------------------------------------

/// Volatile, strongly consistent tuple store.
#[derive(Default)]
pub struct InMemoryTupleStore {
    tuples: RwLock<BTreeSet<RelationshipTuple>>,
}

impl InMemoryTupleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tuples.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TupleStore for InMemoryTupleStore {
    async fn read(&self, filter: &TupleFilter) -> PolicyResult<Vec<RelationshipTuple>> {
        let tuples = self
            .tuples
            .read()
            .map_err(|_| PolicyError::Backend("tuple store lock poisoned".into()))?;
        Ok(tuples.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn apply(
        &self,
        writes: &[RelationshipTuple],
        deletes: &[RelationshipTuple],
    ) -> PolicyResult<()> {
        for write in writes {
            if deletes.contains(write) {
                return Err(PolicyError::Conflict(format!(
                    "tuple {write} appears in both the write and delete set"
                )));
            }
        }

        let mut tuples = self
            .tuples
            .write()
            .map_err(|_| PolicyError::Backend("tuple store lock poisoned".into()))?;
        for write in writes {
            tuples.insert(write.clone());
        }
        for delete in deletes {
            tuples.remove(delete);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UnavailableTupleStore — test double for backend outage
// ---------------------------------------------------------------------------

/// A store whose every operation fails, standing in for an unreachable
/// backend in tests. `check` against it must produce a deny, never an allow.
#[derive(Default)]
pub struct UnavailableTupleStore;

#[async_trait]
impl TupleStore for UnavailableTupleStore {
    async fn read(&self, _filter: &TupleFilter) -> PolicyResult<Vec<RelationshipTuple>> {
        Err(PolicyError::Backend("backend unreachable".into()))
    }

    async fn apply(
        &self,
        _writes: &[RelationshipTuple],
        _deletes: &[RelationshipTuple],
    ) -> PolicyResult<()> {
        Err(PolicyError::Backend("backend unreachable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(user: &str, relation: &str, object: &str) -> RelationshipTuple {
        RelationshipTuple::parse(user, relation, object).unwrap()
    }

    #[tokio::test]
    async fn test_apply_then_read() {
        let store = InMemoryTupleStore::new();
        let t = tuple("user:alice", "executor", "tool:chat");
        store.apply(&[t.clone()], &[]).await.unwrap();

        let read = store
            .read(&TupleFilter::by_relation_and_object(
                t.relation.clone(),
                t.object.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(read, vec![t]);
    }

    #[tokio::test]
    async fn test_duplicate_write_is_idempotent() {
        let store = InMemoryTupleStore::new();
        let t = tuple("user:alice", "executor", "tool:chat");
        store.apply(&[t.clone()], &[]).await.unwrap();
        store.apply(&[t.clone()], &[]).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryTupleStore::new();
        let t = tuple("user:alice", "executor", "tool:chat");
        store.apply(&[], &[t.clone()]).await.unwrap();
        store.apply(&[t.clone()], &[]).await.unwrap();
        store.apply(&[], &[t.clone()]).await.unwrap();
        store.apply(&[], &[t]).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_write_delete_overlap_conflicts() {
        let store = InMemoryTupleStore::new();
        let t = tuple("user:alice", "executor", "tool:chat");
        let result = store.apply(&[t.clone()], &[t]).await;
        assert!(matches!(result, Err(PolicyError::Conflict(_))));
        assert!(store.is_empty(), "conflicting batch must not partially apply");
    }

    #[tokio::test]
    async fn test_filter_by_object_type() {
        let store = InMemoryTupleStore::new();
        store
            .apply(
                &[
                    tuple("user:alice", "executor", "tool:chat"),
                    tuple("user:alice", "member", "org:acme"),
                ],
                &[],
            )
            .await
            .unwrap();

        let tools = store
            .read(&TupleFilter::by_object_type("tool"))
            .await
            .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].object.object_type, "tool");
    }

    #[tokio::test]
    async fn test_filter_by_user() {
        let store = InMemoryTupleStore::new();
        store
            .apply(
                &[
                    tuple("user:alice", "executor", "tool:chat"),
                    tuple("user:bob", "executor", "tool:chat"),
                ],
                &[],
            )
            .await
            .unwrap();

        let filter = TupleFilter {
            user: Some(UserRef::subject("user:alice")),
            ..TupleFilter::default()
        };
        let read = store.read(&filter).await.unwrap();
        assert_eq!(read.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = UnavailableTupleStore;
        assert!(store.read(&TupleFilter::default()).await.is_err());
        assert!(store.apply(&[], &[]).await.is_err());
    }
}
