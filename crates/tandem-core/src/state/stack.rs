//! Session stack - ordered holder of in-progress work
//!
//! The top of the stack is the single active owner of the turn. Upserting a
//! session of an existing kind replaces it (never duplicates) and moves it to
//! the top. All operations are no-ops when the target is absent; they report
//! `Unchanged` instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::{Session, SessionKind, SessionStatus};

/// Whether a stack operation actually mutated anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    Changed,
    Unchanged,
}

/// Why a session left the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutcome {
    /// The work finished
    Completed,
    /// The user walked away from it
    Abandoned,
    /// The TTL sweep removed it
    Stale,
    /// A safety interrupt evicted it into the paused slot
    Evicted,
}

/// Ordered list of sessions; the last element is the top
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SessionStack {
    sessions: Vec<Session>,
}

impl SessionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// The top of the stack, i.e. the single active owner of the turn
    pub fn active(&self) -> Option<&Session> {
        self.sessions.last()
    }

    pub fn active_mut(&mut self) -> Option<&mut Session> {
        self.sessions.last_mut()
    }

    /// The session of the given kind, but only if it is also the top —
    /// only the top session owns the turn
    pub fn active_of_kind(&self, kind: SessionKind) -> Option<&Session> {
        self.active().filter(|s| s.kind == kind)
    }

    /// A session of the given kind anywhere in the stack
    pub fn get_of_kind(&self, kind: SessionKind) -> Option<&Session> {
        self.sessions.iter().find(|s| s.kind == kind)
    }

    pub fn get_of_kind_mut(&mut self, kind: SessionKind) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.kind == kind)
    }

    /// Iterate bottom-to-top
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Replace any existing session of the same kind and push the new
    /// version to the top
    ///
    /// The replaced session's `started_at` is preserved, as are its topic
    /// and resume brief when the incoming session does not supply them, so
    /// a repeated upsert with identical fields changes nothing observable
    /// besides `last_active_at`.
    pub fn upsert(&mut self, mut session: Session) -> StackChange {
        if let Some(pos) = self.sessions.iter().position(|s| s.kind == session.kind) {
            let old = self.sessions.remove(pos);
            session.started_at = old.started_at;
            session.turns = session.turns.max(old.turns);
            if session.topic.is_none() {
                session.topic = old.topic;
            }
            if session.resume_brief.is_none() {
                session.resume_brief = old.resume_brief;
            }
            debug!(kind = %session.kind, "Replacing session of existing kind");
        }
        self.sessions.push(session);
        StackChange::Changed
    }

    /// Remove the session of the given kind; no-op if absent
    pub fn close(&mut self, kind: SessionKind, outcome: CloseOutcome) -> Option<Session> {
        let pos = self.sessions.iter().position(|s| s.kind == kind)?;
        let session = self.sessions.remove(pos);
        debug!(kind = %kind, ?outcome, turns = session.turns, "Closed session");
        Some(session)
    }

    /// Remove sessions whose `last_active_at` is older than the cutoff
    /// computed by the caller per kind; returns the removed sessions
    pub fn retain_fresh<F>(&mut self, now: DateTime<Utc>, ttl_for: F) -> Vec<Session>
    where
        F: Fn(SessionKind) -> chrono::Duration,
    {
        let mut removed = Vec::new();
        self.sessions.retain(|s| {
            let fresh = now - s.last_active_at <= ttl_for(s.kind);
            if !fresh {
                removed.push(s.clone());
            }
            fresh
        });
        removed
    }

    /// Whether the start of routing sees at most one active owner
    ///
    /// Holds by construction; exposed for tests and debug assertions.
    pub fn single_owner_invariant(&self) -> bool {
        self.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
            <= self.sessions.len()
            && self
                .active()
                .map(|s| s.status == SessionStatus::Active)
                .unwrap_or(true)
    }
}
