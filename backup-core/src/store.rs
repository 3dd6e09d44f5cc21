//! In-memory backup record store.

use crate::model::{Backup, BackupId, BackupPatch};
use crate::utils::errors::{CoreError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoreInner {
    /// Newest first.
    records: VecDeque<Backup>,
    next_id: u64,
}

impl StoreInner {
    fn position(&self, id: BackupId) -> Option<usize> {
        self.records.iter().position(|b| b.id == id)
    }

    fn push_front(&mut self, backup: Backup) {
        self.next_id = self.next_id.max(backup.id.0 + 1);
        self.records.push_front(backup);
    }
}

/// Ordered collection of backup records shared between the orchestrator and
/// readers. Each call holds the lock for its whole read-modify-write.
#[derive(Clone)]
pub struct BackupStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl BackupStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                records: VecDeque::new(),
                next_id: 1,
            })),
        }
    }

    /// Build a store from records given newest first.
    pub fn with_records(records: impl IntoIterator<Item = Backup>) -> Result<Self> {
        let mut inner = StoreInner {
            records: VecDeque::new(),
            next_id: 1,
        };
        for backup in records {
            if inner.position(backup.id).is_some() {
                return Err(CoreError::Conflict(format!("duplicate backup id {}", backup.id)));
            }
            inner.next_id = inner.next_id.max(backup.id.0 + 1);
            inner.records.push_back(backup);
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Snapshot of all records, newest first.
    pub async fn list(&self) -> Vec<Backup> {
        let inner = self.inner.read().await;
        inner.records.iter().cloned().collect()
    }

    pub async fn get(&self, id: BackupId) -> Option<Backup> {
        let inner = self.inner.read().await;
        inner.records.iter().find(|b| b.id == id).cloned()
    }

    pub async fn contains(&self, id: BackupId) -> bool {
        self.get(id).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Prepend `backup`, rejecting a duplicate id.
    pub async fn insert(&self, backup: Backup) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.position(backup.id).is_some() {
            return Err(CoreError::Conflict(format!("backup {} already exists", backup.id)));
        }
        inner.push_front(backup);
        Ok(())
    }

    /// Allocate the next id, build the record from it, apply `then` and
    /// prepend the result, all under one write lock.
    ///
    /// Returns the record as built and as stored. Readers never see the
    /// as-built state. If `then` is rejected nothing is inserted.
    pub async fn insert_new<F>(&self, build: F, then: &BackupPatch) -> Result<(Backup, Backup)>
    where
        F: FnOnce(BackupId) -> Backup,
    {
        let mut inner = self.inner.write().await;
        let id = BackupId(inner.next_id);
        let mut built = build(id);
        built.id = id;
        let mut stored = built.clone();
        stored.apply(then)?;
        inner.push_front(stored.clone());
        Ok((built, stored))
    }

    /// Apply `patch` to the record with `id` and return the updated record.
    pub async fn update(&self, id: BackupId, patch: &BackupPatch) -> Result<Backup> {
        let mut inner = self.inner.write().await;
        let index = inner.position(id).ok_or(CoreError::NotFound(id))?;
        let record = &mut inner.records[index];
        record.apply(patch)?;
        Ok(record.clone())
    }

    pub async fn remove(&self, id: BackupId) -> Result<Backup> {
        let mut inner = self.inner.write().await;
        let index = inner.position(id).ok_or(CoreError::NotFound(id))?;
        inner.records.remove(index).ok_or(CoreError::NotFound(id))
    }
}

#[cfg(test)]
impl BackupStore {
    /// Hold a read lock until the returned value is dropped.
    pub(crate) async fn hold_read(&self) -> impl Send {
        self.inner.clone().read_owned().await
    }
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BackupDetails, BackupStatus, BackupType};
    use chrono::Utc;

    fn record(id: u64) -> Backup {
        Backup::pending(BackupId(id), format!("backup-{id}"), BackupType::Full, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_prepends() {
        let store = BackupStore::new();
        store.insert(record(1)).await.unwrap();
        store.insert(record(2)).await.unwrap();

        let ids: Vec<_> = store.list().await.iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let store = BackupStore::new();
        store.insert(record(1)).await.unwrap();
        let err = store.insert(record(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_new_never_reuses_ids() {
        let store = BackupStore::with_records(vec![record(3), record(1)]).unwrap();
        let start = BackupPatch::status(BackupStatus::InProgress);
        let (_, a) = store.insert_new(|id| record(id.0), &start).await.unwrap();
        assert_eq!(a.id, BackupId(4));

        store.remove(a.id).await.unwrap();
        let (_, b) = store.insert_new(|id| record(id.0), &start).await.unwrap();
        assert_eq!(b.id, BackupId(5));
        assert_eq!(store.list().await[0].id, BackupId(5));
    }

    #[tokio::test]
    async fn test_insert_new_stores_patched_record() {
        let store = BackupStore::new();
        let (built, stored) = store
            .insert_new(|id| record(id.0), &BackupPatch::status(BackupStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(built.status, BackupStatus::Pending);
        assert_eq!(stored.status, BackupStatus::InProgress);
        assert_eq!(store.get(BackupId(1)).await.unwrap(), stored);

        let err = store
            .insert_new(|id| record(id.0), &BackupPatch::status(BackupStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_and_remove_missing() {
        let store = BackupStore::new();
        let err = store
            .update(BackupId(9), &BackupPatch::status(BackupStatus::InProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(BackupId(9))));

        let err = store.remove(BackupId(9)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record() {
        let store = BackupStore::new();
        store.insert(record(1)).await.unwrap();
        store
            .update(BackupId(1), &BackupPatch::status(BackupStatus::InProgress))
            .await
            .unwrap();
        store
            .update(
                BackupId(1),
                &BackupPatch::metrics(500, BackupDetails::new(10, 5, 0.2)),
            )
            .await
            .unwrap();

        let err = store
            .update(BackupId(1), &BackupPatch::metrics(400, BackupDetails::new(10, 5, 0.2)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NonMonotonic(_)));
        assert_eq!(store.get(BackupId(1)).await.unwrap().size_bytes, 500);
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_different_ids() {
        let store = BackupStore::new();
        for id in 1..=8 {
            store.insert(record(id)).await.unwrap();
        }

        let mut handles = Vec::new();
        for id in 1..=8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(BackupId(id), &BackupPatch::status(BackupStatus::InProgress))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(store
            .list()
            .await
            .iter()
            .all(|b| b.status == BackupStatus::InProgress));
    }

    #[test]
    fn test_with_records_rejects_duplicates() {
        assert!(BackupStore::with_records(vec![record(1), record(1)]).is_err());
    }
}
