//! Persisted orchestration state
//!
//! One JSON document per user/scope holds the session stack, the intent
//! queue, the deferred-topic registry, and at most one paused machine state.
//! The orchestration core owns read-modify-write access to it every turn;
//! unknown fields round-trip unchanged so additive schema changes stay
//! forward compatible.

pub mod deferred;
pub mod paused;
pub mod queue;
pub mod session;
pub mod stack;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::signals::SafetyTier;

pub use deferred::{DeferOutcome, DeferredTopic, DeferredTopicRegistry, TopicSummary};
pub use paused::PausedMachineState;
pub use queue::{IntentQueue, QueuedIntent};
pub use session::{ReminderDraft, Session, SessionId, SessionKind, SessionMeta, SessionStatus};
pub use stack::{CloseOutcome, SessionStack, StackChange};

/// The per-user, per-scope persisted state blob
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorState {
    pub stack: SessionStack,
    pub queue: IntentQueue,
    pub deferred: DeferredTopicRegistry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<PausedMachineState>,
    /// When the last safety escalation fired, for the anti-repetition rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_safety_fire: Option<DateTime<Utc>>,
    /// Recency stamp used for optimistic merge at the end of a turn
    pub updated_at: DateTime<Utc>,
    /// Fields written by layers this version does not understand;
    /// round-tripped unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Upsert a session onto the stack and bump the recency stamp
    pub fn upsert_session(&mut self, session: Session, now: DateTime<Utc>) -> StackChange {
        let change = self.stack.upsert(session);
        self.bump(now);
        change
    }

    /// Close the session of the given kind; "unchanged" when absent
    pub fn close_session(
        &mut self,
        kind: SessionKind,
        outcome: CloseOutcome,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        let closed = self.stack.close(kind, outcome);
        if closed.is_some() {
            self.bump(now);
        }
        closed
    }

    /// Evict the session of the given kind into the single paused slot
    ///
    /// The previous slot, if any, must already have been resolved; a
    /// leftover slot is dropped with a warning rather than stacked.
    pub fn pause_session(
        &mut self,
        kind: SessionKind,
        reason: SafetyTier,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(session) = self.stack.get_of_kind(kind).cloned() else {
            return false;
        };
        if let Some(old) = self.paused.take() {
            warn!(
                kind = %old.kind,
                "Paused slot was still occupied; discarding previous snapshot"
            );
        }
        let snapshot = PausedMachineState::capture(&session, reason, now);
        self.stack.close(kind, CloseOutcome::Evicted);
        self.paused = Some(snapshot);
        self.bump(now);
        true
    }

    /// Reconstruct the paused session onto the stack and clear the slot
    pub fn resume_paused(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let paused = self.paused.take()?;
        let session = paused.reconstruct(now);
        debug!(kind = %session.kind, "Resumed paused session");
        self.stack.upsert(session.clone());
        self.bump(now);
        Some(session)
    }

    /// Drop the paused slot without resuming (user declined)
    pub fn discard_paused(&mut self, now: DateTime<Utc>) -> Option<PausedMachineState> {
        let paused = self.paused.take();
        if paused.is_some() {
            self.bump(now);
        }
        paused
    }

    /// Note that a safety escalation fired, for the cooldown rule
    pub fn record_safety_fire(&mut self, now: DateTime<Utc>) {
        self.last_safety_fire = Some(now);
        self.bump(now);
    }

    /// Whether the same safety escalation would fire again inside the
    /// cooldown window
    pub fn safety_in_cooldown(&self, now: DateTime<Utc>, cooldown: chrono::Duration) -> bool {
        self.last_safety_fire
            .is_some_and(|fired| now - fired < cooldown)
    }

    /// Keep whichever sub-structures are newer between this in-memory state
    /// and the freshest stored value, by recency stamp
    ///
    /// A slow handler's in-memory snapshot must not silently roll back a
    /// newer persisted state; losing a rare race costs one redundant nudge,
    /// never corruption.
    pub fn merge_newer(self, stored: OrchestratorState) -> OrchestratorState {
        if stored.updated_at > self.updated_at {
            debug!(
                ours = %self.updated_at,
                theirs = %stored.updated_at,
                "Stored state is newer; keeping it"
            );
            stored
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_round_trip() {
        let json = r#"{
            "stack": [],
            "queue": [],
            "deferred": {"topics": []},
            "updated_at": "2026-01-01T00:00:00Z",
            "future_feature": {"enabled": true}
        }"#;
        let state: OrchestratorState = serde_json::from_str(json).unwrap();
        assert!(state.extra.contains_key("future_feature"));
        let out = serde_json::to_value(&state).unwrap();
        assert_eq!(out["future_feature"]["enabled"], true);
    }

    #[test]
    fn test_mutations_bump_updated_at() {
        let mut state = OrchestratorState::new();
        let t1 = Utc::now();
        state.upsert_session(Session::new(SessionKind::TopicTalk, t1), t1);
        assert_eq!(state.updated_at, t1);

        let t2 = t1 + chrono::Duration::seconds(5);
        state.close_session(SessionKind::TopicTalk, CloseOutcome::Completed, t2);
        assert_eq!(state.updated_at, t2);
    }

    #[test]
    fn test_close_absent_does_not_bump() {
        let mut state = OrchestratorState::new();
        let stamp = state.updated_at;
        let later = Utc::now() + chrono::Duration::seconds(30);
        assert!(state
            .close_session(SessionKind::DeepDive, CloseOutcome::Abandoned, later)
            .is_none());
        assert_eq!(state.updated_at, stamp);
    }

    #[test]
    fn test_pause_then_resume_restores_kind() {
        let mut state = OrchestratorState::new();
        let now = Utc::now();
        state.upsert_session(
            Session::new(SessionKind::DeepDive, now).with_topic("burnout"),
            now,
        );
        assert!(state.pause_session(SessionKind::DeepDive, SafetyTier::Crisis, now));
        assert!(state.stack.is_empty());
        assert!(state.paused.is_some());

        let resumed = state.resume_paused(now).unwrap();
        assert_eq!(resumed.kind, SessionKind::DeepDive);
        assert_eq!(resumed.topic.as_deref(), Some("burnout"));
        assert!(state.paused.is_none());
        assert_eq!(state.stack.len(), 1);
    }

    #[test]
    fn test_pause_missing_kind_is_noop() {
        let mut state = OrchestratorState::new();
        assert!(!state.pause_session(SessionKind::TopicTalk, SafetyTier::Concern, Utc::now()));
        assert!(state.paused.is_none());
    }

    #[test]
    fn test_merge_newer_prefers_fresher_store() {
        let now = Utc::now();
        let mut ours = OrchestratorState::new();
        ours.updated_at = now;
        let mut theirs = OrchestratorState::new();
        theirs.updated_at = now + chrono::Duration::seconds(10);
        theirs.upsert_session(
            Session::new(SessionKind::ReminderFlow, now),
            now + chrono::Duration::seconds(10),
        );

        let merged = ours.merge_newer(theirs);
        assert_eq!(merged.stack.len(), 1);
    }

    #[test]
    fn test_merge_newer_keeps_ours_when_fresher() {
        let now = Utc::now();
        let mut ours = OrchestratorState::new();
        ours.upsert_session(Session::new(SessionKind::JournalFlow, now), now);
        let mut theirs = OrchestratorState::new();
        theirs.updated_at = now - chrono::Duration::seconds(10);

        let merged = ours.merge_newer(theirs);
        assert_eq!(merged.stack.len(), 1);
    }

    #[test]
    fn test_safety_cooldown() {
        let mut state = OrchestratorState::new();
        let now = Utc::now();
        assert!(!state.safety_in_cooldown(now, chrono::Duration::minutes(10)));
        state.record_safety_fire(now);
        assert!(state.safety_in_cooldown(
            now + chrono::Duration::minutes(5),
            chrono::Duration::minutes(10)
        ));
        assert!(!state.safety_in_cooldown(
            now + chrono::Duration::minutes(15),
            chrono::Duration::minutes(10)
        ));
    }
}
