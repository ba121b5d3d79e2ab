//! Watcher configuration

use eyre::{eyre, Result};
use std::env;

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique watcher instance ID for multi-operator deployments
    pub watcher_id: String,

    /// L1 (root chain) RPC URL
    pub l1_rpc_url: String,
    /// L1 native chain ID (e.g. 1 for mainnet, 31337 for Anvil)
    pub l1_chain_id: u64,
    /// Short chain name used in logs and notifications
    pub l1_chain_slug: String,
    /// L1 bridge contract address
    pub l1_bridge_address: String,
    /// Private key for challenge transactions; optional in dry mode
    pub l1_private_key: Option<String>,

    /// Token this watcher instance is scoped to
    pub token_symbol: String,
    /// Token decimals for human-readable amounts
    pub token_decimals: u32,

    /// Postgres connection string for the transfer-root store
    pub database_url: String,

    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Start with chain mutations disabled (observe-only)
    pub dry_mode: bool,

    /// Webhook URL for operator notifications
    pub notifier_webhook_url: Option<String>,

    /// Health server port
    pub health_port: u16,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        // Generate default watcher ID from hostname or pid
        let default_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("sentinel-{}", std::process::id()));

        let dry_mode = env::var("DRY_MODE")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let l1_private_key = env::var("L1_PRIVATE_KEY").ok();
        if l1_private_key.is_none() && !dry_mode {
            return Err(eyre!("L1_PRIVATE_KEY required unless DRY_MODE is set"));
        }

        Ok(Self {
            watcher_id: env::var("WATCHER_ID").unwrap_or(default_id),

            l1_rpc_url: env::var("L1_RPC_URL").map_err(|_| eyre!("L1_RPC_URL required"))?,
            l1_chain_id: env::var("L1_CHAIN_ID")
                .map_err(|_| eyre!("L1_CHAIN_ID required"))?
                .parse()
                .map_err(|_| eyre!("Invalid L1_CHAIN_ID"))?,
            l1_chain_slug: env::var("L1_CHAIN_SLUG").unwrap_or_else(|_| "ethereum".to_string()),
            l1_bridge_address: env::var("L1_BRIDGE_ADDRESS")
                .map_err(|_| eyre!("L1_BRIDGE_ADDRESS required"))?,
            l1_private_key,

            token_symbol: env::var("TOKEN_SYMBOL")
                .map_err(|_| eyre!("TOKEN_SYMBOL required"))?,
            token_decimals: env::var("TOKEN_DECIMALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(18),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| eyre!("DATABASE_URL required"))?,

            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),

            dry_mode,

            notifier_webhook_url: env::var("NOTIFIER_WEBHOOK_URL").ok(),

            // Default avoids conflict with common local node ports
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9099),
        })
    }
}
