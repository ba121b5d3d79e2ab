//! Bridge Sentinel - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod bridge;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod hash;
pub mod metrics;
pub mod notifier;
pub mod server;
pub mod store;
pub mod watcher;
