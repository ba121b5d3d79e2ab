//! Persistent store for transfer-root records
//!
//! The store is the only shared mutable state between watchers in one
//! process. Records are keyed by root hash, mutated exclusively through
//! [`TransferRootStore::update`] (atomic per record), and never deleted —
//! resolved roots remain as an audit trail.
//!
//! Phase flags are monotonic: once observed true they never reset, because
//! each flag records that an on-chain fact was seen at least once.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::hash::bytes32_to_hex;

/// Errors from transfer-root persistence
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record for the given root hash — a data-integrity bug in callers
    /// that expect one
    #[error("transfer root {0} not found")]
    NotFound(String),
    /// Persistence failure; must be surfaced loudly, since a dropped state
    /// transition risks re-deciding inconsistently next cycle
    #[error("store write failed: {0}")]
    Write(String),
}

/// A transfer root as observed by this watcher
///
/// Created when a commit event is first seen on the source chain; mutated
/// only by watcher poll cycles as new on-chain facts are learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRoot {
    /// Content identifier of the batch, assigned at commit time
    pub root_hash: [u8; 32],
    /// Aggregate value covered by the root, immutable once committed
    pub total_amount: u128,
    /// Chain where the root will be confirmed
    pub destination_chain_id: u64,
    /// Unix seconds the bond was posted on the destination chain
    pub bonded_at: Option<u64>,
    /// Amount bonded; recomputes the transfer root id for on-chain lookups
    pub bond_total_amount: Option<u128>,
    pub committed: bool,
    pub challenged: bool,
    pub challenge_expired: bool,
    pub confirmed: bool,
    pub settled: bool,
}

impl TransferRoot {
    /// New record for a freshly observed commit
    pub fn committed(root_hash: [u8; 32], total_amount: u128, destination_chain_id: u64) -> Self {
        Self {
            root_hash,
            total_amount,
            destination_chain_id,
            bonded_at: None,
            bond_total_amount: None,
            committed: true,
            challenged: false,
            challenge_expired: false,
            confirmed: false,
            settled: false,
        }
    }
}

/// Partial update merged into a stored record
///
/// Boolean fields only move flags to true; flags already true are never
/// cleared by an update.
#[derive(Debug, Clone, Default)]
pub struct TransferRootUpdate {
    pub bonded_at: Option<u64>,
    pub bond_total_amount: Option<u128>,
    pub committed: bool,
    pub challenged: bool,
    pub challenge_expired: bool,
    pub confirmed: bool,
    pub settled: bool,
}

impl TransferRootUpdate {
    pub fn challenged() -> Self {
        Self {
            challenged: true,
            ..Default::default()
        }
    }

    pub fn challenge_expired() -> Self {
        Self {
            challenge_expired: true,
            ..Default::default()
        }
    }
}

/// Durable key-value store of transfer roots, keyed by root hash
#[async_trait]
pub trait TransferRootStore: Send + Sync {
    /// Insert a record unless one already exists for its root hash
    async fn insert_if_absent(&self, root: TransferRoot) -> Result<(), StoreError>;

    /// Roots that are bonded, not yet challenged, not yet expired, and not
    /// yet confirmed, in insertion order
    async fn get_challengeable_transfer_roots(&self) -> Result<Vec<TransferRoot>, StoreError>;

    /// Look up a record by root hash
    async fn get_by_root_hash(&self, root_hash: [u8; 32]) -> Result<TransferRoot, StoreError>;

    /// Merge fields into the stored record, atomically per record
    async fn update(
        &self,
        root_hash: [u8; 32],
        update: TransferRootUpdate,
    ) -> Result<(), StoreError>;
}

pub(crate) fn not_found(root_hash: &[u8; 32]) -> StoreError {
    StoreError::NotFound(bytes32_to_hex(root_hash))
}
