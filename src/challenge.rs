//! Challenge watcher
//!
//! Scans the store for challengeable transfer roots and reconciles each one
//! against live L1 state. A root leaves the candidate set in exactly one of
//! three ways per cycle, checked in strict precedence order:
//!
//! 1. already confirmed on the root chain — the bond is moot, mark expired;
//! 2. already challenged by some party — cache the fact, mark challenged;
//! 3. challenge window lapsed — mark expired.
//!
//! Only a root that is bonded, unconfirmed, unchallenged, and still inside
//! the window is actionable. The on-chain bond is re-read immediately before
//! acting (step 2), so a concurrent operator's challenge is observed rather
//! than duplicated; the chain itself rejects duplicate challenges as a final
//! backstop.
//!
//! The decision is always made with respect to the root chain, so the
//! handler requires an [`L1Bridge`] at construction and is only attached to
//! the L1 watcher.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::{debug, error, info, warn};

use crate::bridge::L1Bridge;
use crate::clock::Clock;
use crate::hash::{bytes32_to_hex, transfer_root_id};
use crate::metrics::SharedMetrics;
use crate::notifier::Notifier;
use crate::store::{TransferRoot, TransferRootStore, TransferRootUpdate};
use crate::watcher::{ControlFlags, PollHandler, SiblingRegistry};

/// Poll handler implementing the fraud-challenge decision procedure
pub struct ChallengeWatcher {
    label: String,
    bridge: Arc<dyn L1Bridge>,
    store: Arc<dyn TransferRootStore>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    controls: Arc<ControlFlags>,
    siblings: Arc<SiblingRegistry>,
    metrics: SharedMetrics,
}

impl ChallengeWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: &str,
        bridge: Arc<dyn L1Bridge>,
        store: Arc<dyn TransferRootStore>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        controls: Arc<ControlFlags>,
        siblings: Arc<SiblingRegistry>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            label: label.to_string(),
            bridge,
            store,
            notifier,
            clock,
            controls,
            siblings,
            metrics,
        }
    }

    /// Reconcile one candidate against live L1 state
    ///
    /// Any bridge or store failure aborts only this candidate; the caller
    /// logs it and the next poll retries.
    async fn check_challengeable_transfer_root(&self, candidate: &TransferRoot) -> Result<()> {
        let root_hash = candidate.root_hash;
        let bond_total_amount = candidate.bond_total_amount.ok_or_else(|| {
            eyre!(
                "challengeable root {} has no bond amount",
                bytes32_to_hex(&root_hash)
            )
        })?;

        // The on-chain lookup key is derived from the *bonded* amount: a
        // fraudulent bond over a different amount lives under a different id
        // than the committed root
        let root_id = transfer_root_id(&root_hash, bond_total_amount);

        debug!(
            root = %bytes32_to_hex(&root_hash),
            bond_amount = %self.bridge.format_units(bond_total_amount),
            transfer_root_id = %bytes32_to_hex(&root_id),
            "Checking challengeable transfer root"
        );

        let record = self.store.get_by_root_hash(root_hash).await?;

        // Confirmation check: a root finalized on the root chain makes its
        // bond moot, whatever was bonded
        let committed_at = self
            .bridge
            .get_transfer_root_committed_at(record.destination_chain_id, root_id)
            .await?;
        if let Some(committed_at) = committed_at {
            info!(
                root = %bytes32_to_hex(&root_hash),
                committed_at,
                "Root already confirmed on L1"
            );
            self.metrics.roots_confirmed_total.inc();
            self.store
                .update(root_hash, TransferRootUpdate::challenge_expired())
                .await?;
            return Ok(());
        }

        // Already-challenged check: the on-chain bond is authoritative, the
        // local flag is only a cache of it
        let bond = self.bridge.get_transfer_bond(root_id).await?;
        if bond.challenge_start_time > 0 {
            info!(
                root = %bytes32_to_hex(&root_hash),
                bonder = %bond.bonder,
                challenge_start_time = bond.challenge_start_time,
                "Challenge already started"
            );
            self.store
                .update(root_hash, TransferRootUpdate::challenged())
                .await?;
            return Ok(());
        }

        // Deadline check
        let challenge_period = self.bridge.get_challenge_period().await?;
        let bonded_at = record.bonded_at.ok_or_else(|| {
            eyre!(
                "challengeable root {} has no bond timestamp",
                bytes32_to_hex(&root_hash)
            )
        })?;
        let deadline_ms = bonded_at * 1000 + challenge_period * 1000;
        if self.clock.now_ms() >= deadline_ms {
            info!(
                root = %bytes32_to_hex(&root_hash),
                bonded_at,
                challenge_period,
                "Challenge period over"
            );
            self.metrics.roots_challenge_expired_total.inc();
            self.store
                .update(root_hash, TransferRootUpdate::challenge_expired())
                .await?;
            return Ok(());
        }

        // Actionable window: bonded, unconfirmed, unchallenged, in time.
        // The execution mode is read once so the whole decision sees a
        // single consistent gate.
        let mode = self.controls.mode();
        if !mode.allows_chain_mutation() {
            warn!(
                root = %bytes32_to_hex(&root_hash),
                mode = %mode,
                "Skipping challengeTransferRootBond"
            );
            self.metrics.challenges_gated_total.inc();
            // The decision is still recorded so the root is not re-decided
            // every cycle; only the on-chain submission is withheld
            self.store
                .update(root_hash, TransferRootUpdate::challenged())
                .await?;
            return Ok(());
        }

        self.metrics.roots_challenged_total.inc();
        match self.bridge.challenge_transfer_root_bond(root_id).await {
            Ok(tx_hash) => {
                info!(
                    root = %bytes32_to_hex(&root_hash),
                    tx_hash = %tx_hash,
                    "Challenge submitted"
                );
                self.metrics.challenge_submissions_total.inc();
            }
            Err(e) => {
                // The store flag below still gets set: it records the
                // decision, not the submission. Operators reconcile via
                // on-chain inspection when alerted.
                error!(
                    root = %bytes32_to_hex(&root_hash),
                    error = %e,
                    "Challenge submission failed"
                );
                self.metrics.challenge_submission_failures_total.inc();
                self.notifier.warn(&format!(
                    "Challenge submission failed for root {}: {}",
                    bytes32_to_hex(&root_hash),
                    e
                ));
            }
        }

        let destination = self.siblings.chain_slug(record.destination_chain_id);
        self.notifier.warn(&format!(
            "TransferRoot should be challenged! Root hash: {}. Total amt: {}. Destination: {}.",
            bytes32_to_hex(&root_hash),
            self.bridge.format_units(bond_total_amount),
            destination
        ));
        self.store
            .update(root_hash, TransferRootUpdate::challenged())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl PollHandler for ChallengeWatcher {
    async fn poll(&self) -> Result<()> {
        let candidates = self.store.get_challengeable_transfer_roots().await?;
        if !candidates.is_empty() {
            debug!(
                watcher = %self.label,
                count = candidates.len(),
                "Checking challengeable root db items"
            );
        }

        for candidate in &candidates {
            self.metrics.candidates_scanned_total.inc();
            if let Err(e) = self.check_challengeable_transfer_root(candidate).await {
                // Contained per candidate: the rest of the cycle proceeds
                // and this root is retried next poll
                error!(
                    watcher = %self.label,
                    root = %bytes32_to_hex(&candidate.root_hash),
                    error = %e,
                    "Failed to check challengeable transfer root"
                );
                self.metrics.candidate_errors_total.inc();
            }
        }

        Ok(())
    }
}
