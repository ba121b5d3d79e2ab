//! Generic polling engine for chain watchers
//!
//! A watcher is a named, token- and chain-scoped task that runs a
//! fixed-interval poll loop over a [`PollHandler`]. Concrete watcher kinds
//! (challenge, bond, settle, commit) implement [`PollHandler`] and are
//! composed into a [`Watcher`] rather than inheriting from it.
//!
//! The loop is the top-level fault boundary: a cycle that errors is logged
//! and retried on the next tick. Cycles run inline in the loop, so a slow
//! cycle delays the next tick instead of overlapping with it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::server::SharedStats;

/// Whether chain-mutating actions are allowed right now
///
/// Dry and pause both skip mutations; read-only reconciliation and store
/// updates still occur in either. Pause is the operator kill-switch and can
/// flip at runtime, dry mode is fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Active,
    DryRun,
    Paused,
}

impl ExecutionMode {
    pub fn allows_chain_mutation(&self) -> bool {
        matches!(self, ExecutionMode::Active)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Active => write!(f, "active"),
            ExecutionMode::DryRun => write!(f, "dry-run"),
            ExecutionMode::Paused => write!(f, "paused"),
        }
    }
}

/// Operator controls for a watcher
///
/// Decision procedures read the effective mode exactly once per decision
/// point, so every mutating branch has one unambiguous gate.
pub struct ControlFlags {
    dry_mode: bool,
    paused: AtomicBool,
}

impl ControlFlags {
    pub fn new(dry_mode: bool) -> Self {
        Self {
            dry_mode,
            paused: AtomicBool::new(false),
        }
    }

    /// Effective execution mode; pause takes precedence over dry mode
    pub fn mode(&self) -> ExecutionMode {
        if self.paused.load(Ordering::Relaxed) {
            ExecutionMode::Paused
        } else if self.dry_mode {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Active
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Flip the pause flag, returning the new state
    pub fn toggle_paused(&self) -> bool {
        // fetch_xor(true) atomically flips and returns the previous value
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }
}

/// One poll cycle of a concrete watcher kind
#[async_trait]
pub trait PollHandler: Send + Sync {
    async fn poll(&self) -> Result<()>;
}

/// A token- and chain-scoped polling task
pub struct Watcher {
    label: String,
    chain_slug: String,
    chain_id: u64,
    token_symbol: String,
    is_l1: bool,
    poll_interval: Duration,
    handler: Arc<dyn PollHandler>,
    stats: SharedStats,
}

impl Watcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: &str,
        chain_slug: &str,
        chain_id: u64,
        token_symbol: &str,
        is_l1: bool,
        poll_interval: Duration,
        handler: Arc<dyn PollHandler>,
        stats: SharedStats,
    ) -> Self {
        Self {
            label: label.to_string(),
            chain_slug: chain_slug.to_string(),
            chain_id,
            token_symbol: token_symbol.to_string(),
            is_l1,
            poll_interval,
            handler,
            stats,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn chain_slug(&self) -> &str {
        &self.chain_slug
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }

    pub fn is_l1(&self) -> bool {
        self.is_l1
    }

    /// Main run loop; exits only on shutdown
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!(
            watcher = %self.label,
            chain = %self.chain_slug,
            token = %self.token_symbol,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watcher starting..."
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(watcher = %self.label, "Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    debug!(watcher = %self.label, "Poll cycle starting");
                    match self.handler.poll().await {
                        Ok(()) => {
                            let mut stats = self.stats.write().await;
                            stats.cycles_completed += 1;
                            stats.last_poll_unix = chrono::Utc::now().timestamp().max(0) as u64;
                        }
                        Err(e) => {
                            // Single-cycle failures are transient; the next
                            // tick retries
                            error!(watcher = %self.label, error = %e, "Poll cycle failed");
                            let mut stats = self.stats.write().await;
                            stats.cycle_errors += 1;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Lookup table from chain id to the sibling watcher for the same bridge
/// and token on that chain
///
/// Populated once at startup, after all watchers for a bridge have been
/// constructed. Entries are weak references: the registry is for lookup and
/// dispatch, it does not control any watcher's lifecycle.
#[derive(Default)]
pub struct SiblingRegistry {
    inner: RwLock<HashMap<u64, Weak<Watcher>>>,
}

impl SiblingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, watcher: &Arc<Watcher>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(watcher.chain_id(), Arc::downgrade(watcher));
    }

    pub fn get(&self, chain_id: u64) -> Option<Arc<Watcher>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(&chain_id).and_then(Weak::upgrade)
    }

    /// Chain slug for a registered sibling, or a numeric fallback
    pub fn chain_slug(&self, chain_id: u64) -> String {
        match self.get(chain_id) {
            Some(watcher) => watcher.chain_slug().to_string(),
            None => format!("chain-{}", chain_id),
        }
    }
}

/// Runs a set of watchers concurrently until shutdown or first failure
pub struct WatcherSet {
    watchers: Vec<Arc<Watcher>>,
}

impl WatcherSet {
    pub fn new(watchers: Vec<Arc<Watcher>>) -> Self {
        Self { watchers }
    }

    /// Run all watchers; returns when any watcher fails or shutdown is
    /// signalled
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        let mut join_set = tokio::task::JoinSet::new();
        let mut senders = Vec::new();

        for watcher in self.watchers {
            let (tx, rx) = mpsc::channel::<()>(1);
            senders.push(tx);
            join_set.spawn(async move { watcher.run(rx).await });
        }

        tokio::select! {
            _ = shutdown.recv() => {
                info!("Shutdown signal received, stopping watchers");
                for tx in &senders {
                    let _ = tx.send(()).await;
                }
                while join_set.join_next().await.is_some() {}
                Ok(())
            }
            maybe_done = join_set.join_next() => {
                match maybe_done {
                    Some(Ok(Ok(()))) => {
                        error!("A watcher exited unexpectedly without error");
                        Err(eyre::eyre!("watcher exited unexpectedly"))
                    }
                    Some(Ok(Err(e))) => {
                        error!("A watcher stopped with error: {:?}", e);
                        Err(e)
                    }
                    Some(Err(e)) => {
                        error!("A watcher task panicked: {:?}", e);
                        Err(eyre::eyre!("watcher task panicked: {}", e))
                    }
                    None => {
                        error!("All watcher tasks exited unexpectedly");
                        Err(eyre::eyre!("all watcher tasks exited unexpectedly"))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_precedence() {
        let controls = ControlFlags::new(true);
        assert_eq!(controls.mode(), ExecutionMode::DryRun);
        controls.set_paused(true);
        assert_eq!(controls.mode(), ExecutionMode::Paused);
        controls.set_paused(false);
        assert_eq!(controls.mode(), ExecutionMode::DryRun);
    }

    #[test]
    fn test_active_mode_allows_mutation() {
        let controls = ControlFlags::new(false);
        assert_eq!(controls.mode(), ExecutionMode::Active);
        assert!(controls.mode().allows_chain_mutation());
        assert!(!ExecutionMode::DryRun.allows_chain_mutation());
        assert!(!ExecutionMode::Paused.allows_chain_mutation());
    }

    #[test]
    fn test_toggle_paused() {
        let controls = ControlFlags::new(false);
        assert!(controls.toggle_paused());
        assert_eq!(controls.mode(), ExecutionMode::Paused);
        assert!(!controls.toggle_paused());
        assert_eq!(controls.mode(), ExecutionMode::Active);
    }
}
