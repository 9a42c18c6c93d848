//! Pause/resume store - single-slot snapshot for safety interrupts
//!
//! When a safety interrupt evicts in-progress work, the evicted session's
//! full state is captured here so it can be reconstructed once the
//! intervention resolves. At most one paused state exists at a time;
//! stacked interrupts are not supported by design.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::session::{Session, SessionId, SessionKind, SessionMeta};
use crate::signals::SafetyTier;

/// Snapshot of a session evicted by a safety interrupt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedMachineState {
    pub kind: SessionKind,
    pub session_id: SessionId,
    /// Best-effort human label for the interrupted work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Opaque state snapshot; absent snapshots still resume (seeded from
    /// the label, default phase)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<serde_json::Value>,
    /// Recorded phase at pause time
    #[serde(default)]
    pub phase: String,
    pub paused_at: DateTime<Utc>,
    /// Which safety tier caused the eviction
    pub reason: SafetyTier,
    /// Short context string usable when offering to pick the work back up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_context: Option<String>,
}

impl PausedMachineState {
    /// Capture a session into a paused snapshot
    pub fn capture(session: &Session, reason: SafetyTier, now: DateTime<Utc>) -> Self {
        Self {
            kind: session.kind,
            session_id: session.id.clone(),
            label: session.topic.clone(),
            snapshot: Some(session.meta.snapshot()),
            phase: session.phase.clone(),
            paused_at: now,
            reason,
            resume_context: session.resume_brief.clone(),
        }
    }

    /// Reconstruct a session of the recorded kind
    ///
    /// Correctness of the conversation takes priority over exactness of
    /// restored state: an out-of-enum phase (corruption or schema drift)
    /// falls back to the kind's default phase, and a wholly absent snapshot
    /// still yields a usable session seeded from the recorded label.
    pub fn reconstruct(&self, now: DateTime<Utc>) -> Session {
        let meta = match &self.snapshot {
            Some(snapshot) => SessionMeta::restore(self.kind, snapshot),
            None => {
                info!(kind = %self.kind, "Paused slot has no snapshot, seeding from label");
                SessionMeta::default_for(self.kind)
            }
        };

        let phase = if self.kind.valid_phases().contains(&self.phase.as_str()) {
            self.phase.clone()
        } else {
            warn!(
                kind = %self.kind,
                recorded = %self.phase,
                fallback = self.kind.default_phase(),
                "Recorded phase is not valid for kind, falling back to default"
            );
            self.kind.default_phase().to_string()
        };

        let mut session = Session::new(self.kind, now)
            .with_phase(phase)
            .with_meta(meta);
        session.id = self.session_id.clone();
        session.topic = self.label.clone();
        session.resume_brief = self.resume_context.clone();
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::ReminderDraft;

    fn sample_session() -> Session {
        Session::new(SessionKind::ReminderFlow, Utc::now())
            .with_topic("dentist appointment")
            .with_resume_brief("We were setting up your dentist reminder.")
            .with_phase("confirming")
            .with_meta(SessionMeta::Reminder {
                draft: ReminderDraft {
                    what: Some("dentist".to_string()),
                    when: Some("friday 10am".to_string()),
                    confirmed: false,
                },
            })
    }

    #[test]
    fn test_capture_and_reconstruct_round_trip() {
        let session = sample_session();
        let paused = PausedMachineState::capture(&session, SafetyTier::Crisis, Utc::now());
        let restored = paused.reconstruct(Utc::now());

        assert_eq!(restored.kind, session.kind);
        assert_eq!(restored.id, session.id);
        assert_eq!(restored.topic, session.topic);
        assert_eq!(restored.phase, "confirming");
        assert_eq!(restored.meta, session.meta);
        assert!(SessionKind::ReminderFlow
            .valid_phases()
            .contains(&restored.phase.as_str()));
    }

    #[test]
    fn test_corrupted_phase_falls_back_to_default() {
        let session = sample_session();
        let mut paused = PausedMachineState::capture(&session, SafetyTier::Concern, Utc::now());
        paused.phase = "phase_that_never_existed".to_string();
        let restored = paused.reconstruct(Utc::now());
        assert_eq!(restored.phase, SessionKind::ReminderFlow.default_phase());
    }

    #[test]
    fn test_absent_snapshot_still_resumes() {
        let session = sample_session();
        let mut paused = PausedMachineState::capture(&session, SafetyTier::Crisis, Utc::now());
        paused.snapshot = None;
        let restored = paused.reconstruct(Utc::now());
        assert_eq!(restored.topic.as_deref(), Some("dentist appointment"));
        assert_eq!(
            restored.meta,
            SessionMeta::default_for(SessionKind::ReminderFlow)
        );
    }

    #[test]
    fn test_round_trip_phase_valid_for_every_kind() {
        for kind in SessionKind::ALL {
            let session = Session::new(kind, Utc::now()).with_topic("label");
            let paused = PausedMachineState::capture(&session, SafetyTier::Crisis, Utc::now());
            let restored = paused.reconstruct(Utc::now());
            assert!(kind.valid_phases().contains(&restored.phase.as_str()));
            assert_eq!(restored.topic.as_deref(), Some("label"));
        }
    }
}
