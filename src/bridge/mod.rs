//! Bridge capability interface
//!
//! One bridge per (chain, token) pair, exposing the contract reads the
//! watchers reconcile against. The L1 instance additionally answers
//! root-confirmation queries, so that capability lives on a separate trait
//! and a watcher that needs it must be handed an [`L1Bridge`] at
//! construction time.
//!
//! Reads are not retried here: a failed read surfaces as
//! [`BridgeError::ChainRead`] and the caller's next poll retries naturally.

use async_trait::async_trait;
use thiserror::Error;

pub mod evm;

pub use evm::EvmBridge;

/// Errors from bridge contract access
#[derive(Debug, Error)]
pub enum BridgeError {
    /// RPC/node failure reading contract state; retried on the next poll
    #[error("chain read failed: {0}")]
    ChainRead(String),
    /// Challenge transaction failed to broadcast or reverted
    #[error("challenge submission failed: {0}")]
    Submission(String),
}

/// On-chain bond record for a transfer root id
///
/// `challenge_start_time > 0` is the authoritative signal that some party
/// (possibly another operator) already challenged; local flags are only a
/// cache of this fact.
#[derive(Debug, Clone, Default)]
pub struct Bond {
    /// Address of the party that posted the bond
    pub bonder: String,
    /// Unix seconds when a challenge was opened, 0 if never challenged
    pub challenge_start_time: u64,
}

/// Per-chain bridge contract capability
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Read the bond posted for a transfer root id
    async fn get_transfer_bond(&self, transfer_root_id: [u8; 32]) -> Result<Bond, BridgeError>;

    /// Read the challenge period contract constant, in seconds
    ///
    /// The constant is fixed for the contract's lifetime; implementations may
    /// cache it for the process lifetime.
    async fn get_challenge_period(&self) -> Result<u64, BridgeError>;

    /// Submit a challenge for a transfer root id
    ///
    /// A duplicate on-chain challenge reverts, so callers guard with the
    /// store's `challenged` flag and re-read the bond before calling.
    /// Returns the transaction hash.
    async fn challenge_transfer_root_bond(
        &self,
        transfer_root_id: [u8; 32],
    ) -> Result<String, BridgeError>;

    /// Render a base-unit amount as a human-readable decimal string
    fn format_units(&self, amount: u128) -> String;
}

/// Root-chain bridge capability
#[async_trait]
pub trait L1Bridge: Bridge {
    /// Unix seconds at which the root was confirmed on the root chain, or
    /// `None` if not yet confirmed (absence is not an error)
    async fn get_transfer_root_committed_at(
        &self,
        destination_chain_id: u64,
        transfer_root_id: [u8; 32],
    ) -> Result<Option<u64>, BridgeError>;
}
