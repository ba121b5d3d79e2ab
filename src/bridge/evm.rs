//! EVM-backed bridge capability
//!
//! Reads bond and confirmation state from the L1 bridge contract and signs
//! challenge transactions.
//!
//! # Transaction Building
//!
//! Uses Alloy's `ProviderBuilder::with_recommended_fillers()` to automatically
//! populate transaction fields (nonce, gas_limit, max_fee_per_gas,
//! max_priority_fee_per_gas). Without this, transactions will fail with
//! missing property errors.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, FixedBytes};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::hash::bytes32_to_hex;

use super::{Bond, Bridge, BridgeError, L1Bridge};

sol! {
    /// L1 bridge contract interface for the challenge protocol
    #[sol(rpc)]
    contract L1BridgeContract {
        /// Unix seconds the root was confirmed at on the root chain, 0 if not yet
        function transferRootCommittedAt(uint256 destinationChainId, bytes32 transferRootId) external view returns (uint256);

        /// Bond record for a transfer root id
        function transferBonds(bytes32 transferRootId) external view returns (
            address bonder,
            uint256 bondedAt,
            uint256 totalAmount,
            uint256 challengeStartTime,
            address challenger,
            bool challengeResolved
        );

        /// Challenge period in seconds (contract constant)
        function challengePeriod() external view returns (uint256);

        /// Open a challenge against the bond for a transfer root id
        function challengeTransferRootBond(bytes32 transferRootId) external;
    }
}

/// Bridge capability backed by an EVM L1 bridge contract
pub struct EvmBridge {
    rpc_url: String,
    bridge_address: Address,
    /// Absent in read-only deployments; challenge submission then fails
    signer: Option<PrivateKeySigner>,
    token_symbol: String,
    token_decimals: u32,
    /// Contract constant, fetched once per process
    challenge_period: OnceCell<u64>,
}

impl EvmBridge {
    /// Create a new EVM bridge capability
    ///
    /// `private_key` may be omitted for read-only (dry) deployments.
    pub fn new(
        rpc_url: &str,
        bridge_address: &str,
        private_key: Option<&str>,
        token_symbol: &str,
        token_decimals: u32,
    ) -> Result<Self> {
        let bridge_address =
            Address::from_str(bridge_address).wrap_err("Invalid bridge address")?;

        let signer = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key.parse().wrap_err("Invalid private key")?;
                info!(
                    challenger_address = %signer.address(),
                    bridge = %bridge_address,
                    "EVM bridge initialized with signing key"
                );
                Some(signer)
            }
            None => {
                info!(bridge = %bridge_address, "EVM bridge initialized read-only");
                None
            }
        };

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            bridge_address,
            signer,
            token_symbol: token_symbol.to_string(),
            token_decimals,
            challenge_period: OnceCell::new(),
        })
    }

    fn rpc_url(&self) -> Result<reqwest::Url, BridgeError> {
        self.rpc_url
            .parse()
            .map_err(|e| BridgeError::ChainRead(format!("invalid RPC URL: {}", e)))
    }

    /// Token symbol this bridge instance is scoped to
    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }
}

#[async_trait]
impl Bridge for EvmBridge {
    async fn get_transfer_bond(&self, transfer_root_id: [u8; 32]) -> Result<Bond, BridgeError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
        let contract = L1BridgeContract::new(self.bridge_address, &provider);

        let bond = contract
            .transferBonds(FixedBytes::from(transfer_root_id))
            .call()
            .await
            .map_err(|e| BridgeError::ChainRead(format!("transferBonds: {}", e)))?;

        let challenge_start_time = bond.challengeStartTime.try_into().map_err(|_| {
            BridgeError::ChainRead("challengeStartTime exceeds u64".to_string())
        })?;

        Ok(Bond {
            bonder: format!("{}", bond.bonder),
            challenge_start_time,
        })
    }

    async fn get_challenge_period(&self) -> Result<u64, BridgeError> {
        let period = self
            .challenge_period
            .get_or_try_init(|| async {
                let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
                let contract = L1BridgeContract::new(self.bridge_address, &provider);
                let period = contract
                    .challengePeriod()
                    .call()
                    .await
                    .map_err(|e| BridgeError::ChainRead(format!("challengePeriod: {}", e)))?;
                period
                    ._0
                    .try_into()
                    .map_err(|_| BridgeError::ChainRead("challengePeriod exceeds u64".to_string()))
            })
            .await?;
        Ok(*period)
    }

    async fn challenge_transfer_root_bond(
        &self,
        transfer_root_id: [u8; 32],
    ) -> Result<String, BridgeError> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| BridgeError::Submission("no signing key configured".to_string()))?;

        let wallet = EthereumWallet::from(signer);
        let url = self
            .rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| BridgeError::Submission(format!("invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url);

        let contract = L1BridgeContract::new(self.bridge_address, &provider);

        debug!(
            transfer_root_id = %bytes32_to_hex(&transfer_root_id),
            "Submitting challengeTransferRootBond"
        );

        let call = contract.challengeTransferRootBond(FixedBytes::from(transfer_root_id));

        let pending_tx = call
            .send()
            .await
            .map_err(|e| BridgeError::Submission(format!("failed to send challenge tx: {}", e)))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "Challenge transaction sent");

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| BridgeError::Submission(format!("failed to get receipt: {}", e)))?;

        if !receipt.status() {
            return Err(BridgeError::Submission(
                "challenge transaction reverted".to_string(),
            ));
        }

        info!(
            tx_hash = %tx_hash,
            transfer_root_id = %bytes32_to_hex(&transfer_root_id),
            "Transfer root bond challenged on L1"
        );

        Ok(format!("0x{:x}", tx_hash))
    }

    fn format_units(&self, amount: u128) -> String {
        let divisor = 10u128.pow(self.token_decimals);
        let whole = amount / divisor;
        let frac = amount % divisor;
        if frac == 0 {
            format!("{} {}", whole, self.token_symbol)
        } else {
            let frac_str = format!("{:0width$}", frac, width = self.token_decimals as usize);
            format!("{}.{} {}", whole, frac_str.trim_end_matches('0'), self.token_symbol)
        }
    }
}

#[async_trait]
impl L1Bridge for EvmBridge {
    async fn get_transfer_root_committed_at(
        &self,
        destination_chain_id: u64,
        transfer_root_id: [u8; 32],
    ) -> Result<Option<u64>, BridgeError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url()?);
        let contract = L1BridgeContract::new(self.bridge_address, &provider);

        let committed_at = contract
            .transferRootCommittedAt(
                alloy::primitives::U256::from(destination_chain_id),
                FixedBytes::from(transfer_root_id),
            )
            .call()
            .await
            .map_err(|e| BridgeError::ChainRead(format!("transferRootCommittedAt: {}", e)))?;

        let committed_at: u64 = committed_at
            ._0
            .try_into()
            .map_err(|_| BridgeError::ChainRead("committedAt exceeds u64".to_string()))?;

        // The contract returns 0 for "never confirmed"
        Ok((committed_at > 0).then_some(committed_at))
    }
}
