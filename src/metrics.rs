//! Prometheus metrics for the challenge watcher

use std::sync::Arc;

use prometheus::{IntCounter, IntGauge, Registry};

pub type SharedMetrics = Arc<Metrics>;

/// Prometheus metrics
///
/// The registry is per-instance rather than global so tests can build
/// isolated watchers without double-registration panics.
pub struct Metrics {
    /// Challengeable candidates examined across all poll cycles
    pub candidates_scanned_total: IntCounter,
    /// Roots found already confirmed on the root chain
    pub roots_confirmed_total: IntCounter,
    /// Roots whose challenge window lapsed unchallenged
    pub roots_challenge_expired_total: IntCounter,
    /// Roots this watcher decided to challenge
    pub roots_challenged_total: IntCounter,
    /// Challenge transactions successfully submitted
    pub challenge_submissions_total: IntCounter,
    /// Challenge transactions that failed to broadcast or reverted
    pub challenge_submission_failures_total: IntCounter,
    /// Challenge decisions skipped by the dry/pause gate
    pub challenges_gated_total: IntCounter,
    /// Candidates abandoned this cycle due to a read or store error
    pub candidate_errors_total: IntCounter,
    /// Unix timestamp of the last completed poll cycle
    pub last_successful_poll: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let candidates_scanned_total = IntCounter::new(
            "sentinel_candidates_scanned_total",
            "Challengeable candidates examined across all poll cycles",
        )
        .expect("constant metric name is valid");

        let roots_confirmed_total = IntCounter::new(
            "sentinel_roots_confirmed_total",
            "Roots found already confirmed on the root chain",
        )
        .expect("constant metric name is valid");

        let roots_challenge_expired_total = IntCounter::new(
            "sentinel_roots_challenge_expired_total",
            "Roots whose challenge window lapsed unchallenged",
        )
        .expect("constant metric name is valid");

        let roots_challenged_total = IntCounter::new(
            "sentinel_roots_challenged_total",
            "Roots this watcher decided to challenge",
        )
        .expect("constant metric name is valid");

        let challenge_submissions_total = IntCounter::new(
            "sentinel_challenge_submissions_total",
            "Challenge transactions successfully submitted",
        )
        .expect("constant metric name is valid");

        let challenge_submission_failures_total = IntCounter::new(
            "sentinel_challenge_submission_failures_total",
            "Challenge transactions that failed to broadcast or reverted",
        )
        .expect("constant metric name is valid");

        let challenges_gated_total = IntCounter::new(
            "sentinel_challenges_gated_total",
            "Challenge decisions skipped by the dry/pause gate",
        )
        .expect("constant metric name is valid");

        let candidate_errors_total = IntCounter::new(
            "sentinel_candidate_errors_total",
            "Candidates abandoned mid-cycle due to a read or store error",
        )
        .expect("constant metric name is valid");

        let last_successful_poll = IntGauge::new(
            "sentinel_last_successful_poll_timestamp",
            "Unix timestamp of the last completed poll cycle",
        )
        .expect("constant metric name is valid");

        // Registration is called exactly once per instance, with unique
        // constant names
        registry
            .register(Box::new(candidates_scanned_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(roots_confirmed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(roots_challenge_expired_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(roots_challenged_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(challenge_submissions_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(challenge_submission_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(challenges_gated_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(candidate_errors_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_successful_poll.clone()))
            .expect("metric registration must not be called twice");

        Self {
            candidates_scanned_total,
            roots_confirmed_total,
            roots_challenge_expired_total,
            roots_challenged_total,
            challenge_submissions_total,
            challenge_submission_failures_total,
            challenges_gated_total,
            candidate_errors_total,
            last_successful_poll,
            registry,
        }
    }
}
