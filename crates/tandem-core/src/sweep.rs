//! Staleness sweeper - per-kind TTL pruning
//!
//! Runs unconditionally, exactly once per turn, before signals are
//! evaluated, so a user returning after a long absence never resumes a
//! context that has gone stale. Stale state is pruned silently; it is never
//! surfaced to the user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::TtlConfig;
use crate::state::{CloseOutcome, OrchestratorState};

/// What the sweep removed, for observability
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: usize,
    pub intents_expired: usize,
    pub topics_expired: usize,
    pub paused_slot_expired: bool,
}

impl SweepReport {
    pub fn removed_anything(&self) -> bool {
        self.sessions_expired > 0
            || self.intents_expired > 0
            || self.topics_expired > 0
            || self.paused_slot_expired
    }
}

/// Apply every TTL window to the state in place
pub fn sweep(state: &mut OrchestratorState, ttl: &TtlConfig, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    let expired = state.stack.retain_fresh(now, |kind| ttl.session_ttl(kind));
    report.sessions_expired = expired.len();
    for session in &expired {
        info!(kind = %session.kind, outcome = ?CloseOutcome::Stale,
            idle_mins = (now - session.last_active_at).num_minutes(),
            "Session expired by TTL sweep");
    }

    report.intents_expired = state.queue.sweep(now, ttl.queued_intent_ttl());
    report.topics_expired = state.deferred.sweep(now, ttl.deferred_topic_ttl());

    if let Some(paused) = &state.paused {
        if now - paused.paused_at > ttl.paused_slot_ttl() {
            info!(kind = %paused.kind, "Paused slot expired by TTL sweep");
            state.paused = None;
            report.paused_slot_expired = true;
        }
    }

    if report.removed_anything() {
        state.updated_at = now;
    }
    report
}
