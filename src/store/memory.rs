//! In-memory transfer-root store
//!
//! Backs scenario tests and ad-hoc dry runs. Not durable — production
//! deployments use [`super::PgStore`], since the challenge deadline is real
//! wall-clock time and state loss risks missing it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{not_found, StoreError, TransferRoot, TransferRootStore, TransferRootUpdate};

#[derive(Default)]
struct Inner {
    /// Insertion order of root hashes
    order: Vec<[u8; 32]>,
    records: HashMap<[u8; 32], TransferRoot>,
}

/// Transfer-root store held entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRootStore for MemoryStore {
    async fn insert_if_absent(&self, root: TransferRoot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.records.contains_key(&root.root_hash) {
            inner.order.push(root.root_hash);
            inner.records.insert(root.root_hash, root);
        }
        Ok(())
    }

    async fn get_challengeable_transfer_roots(&self) -> Result<Vec<TransferRoot>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|hash| inner.records.get(hash))
            .filter(|r| {
                r.bonded_at.is_some() && !r.challenged && !r.challenge_expired && !r.confirmed
            })
            .cloned()
            .collect())
    }

    async fn get_by_root_hash(&self, root_hash: [u8; 32]) -> Result<TransferRoot, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .records
            .get(&root_hash)
            .cloned()
            .ok_or_else(|| not_found(&root_hash))
    }

    async fn update(
        &self,
        root_hash: [u8; 32],
        update: TransferRootUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .get_mut(&root_hash)
            .ok_or_else(|| not_found(&root_hash))?;

        if let Some(bonded_at) = update.bonded_at {
            record.bonded_at = Some(bonded_at);
        }
        if let Some(bond_total_amount) = update.bond_total_amount {
            record.bond_total_amount = Some(bond_total_amount);
        }
        record.committed |= update.committed;
        record.challenged |= update.challenged;
        record.challenge_expired |= update.challenge_expired;
        record.confirmed |= update.confirmed;
        record.settled |= update.settled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> TransferRoot {
        TransferRoot {
            bonded_at: Some(1_700_000_000),
            bond_total_amount: Some(100),
            ..TransferRoot::committed([byte; 32], 100, 10)
        }
    }

    #[tokio::test]
    async fn test_challengeable_in_insertion_order() {
        let store = MemoryStore::new();
        store.insert_if_absent(root(3)).await.unwrap();
        store.insert_if_absent(root(1)).await.unwrap();
        store.insert_if_absent(root(2)).await.unwrap();

        let roots = store.get_challengeable_transfer_roots().await.unwrap();
        let hashes: Vec<u8> = roots.iter().map(|r| r.root_hash[0]).collect();
        assert_eq!(hashes, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_challengeable_excludes_resolved_roots() {
        let store = MemoryStore::new();
        store.insert_if_absent(root(1)).await.unwrap();
        store.insert_if_absent(root(2)).await.unwrap();
        store.insert_if_absent(root(3)).await.unwrap();
        // Unbonded roots are never candidates
        store
            .insert_if_absent(TransferRoot::committed([4; 32], 100, 10))
            .await
            .unwrap();

        store
            .update([1; 32], TransferRootUpdate::challenged())
            .await
            .unwrap();
        store
            .update([2; 32], TransferRootUpdate::challenge_expired())
            .await
            .unwrap();

        let roots = store.get_challengeable_transfer_roots().await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].root_hash, [3; 32]);
    }

    #[tokio::test]
    async fn test_flags_are_monotonic() {
        let store = MemoryStore::new();
        store.insert_if_absent(root(1)).await.unwrap();
        store
            .update([1; 32], TransferRootUpdate::challenged())
            .await
            .unwrap();
        // A later update without the flag must not clear it
        store
            .update(
                [1; 32],
                TransferRootUpdate {
                    bonded_at: Some(1_700_000_100),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_by_root_hash([1; 32]).await.unwrap();
        assert!(record.challenged);
        assert_eq!(record.bonded_at, Some(1_700_000_100));
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let store = MemoryStore::new();
        store.insert_if_absent(root(1)).await.unwrap();
        store
            .update([1; 32], TransferRootUpdate::challenged())
            .await
            .unwrap();
        store.insert_if_absent(root(1)).await.unwrap();

        let record = store.get_by_root_hash([1; 32]).await.unwrap();
        assert!(record.challenged, "re-insert must not reset the record");
    }

    #[tokio::test]
    async fn test_missing_root_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_by_root_hash([9; 32]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
