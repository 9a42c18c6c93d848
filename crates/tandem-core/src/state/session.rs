//! Session types - one unit of in-progress conversational work
//!
//! A session has a fixed kind, a phase drawn from that kind's phase table,
//! and a kind-specific meta payload. The pause/resume store works against
//! the payload's snapshot capability rather than the concrete type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::handlers::TargetHandler;
use crate::signals::{SafetyTier, TopicDepth};

/// Unique identifier for a session
pub type SessionId = String;

/// The fixed enumeration of work kinds
///
/// At most one session per kind exists in the stack at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Tool-driven reminder/scheduling flow
    ReminderFlow,
    /// Tool-driven journaling flow
    JournalFlow,
    /// Topical discussion
    TopicTalk,
    /// Deep exploratory dialogue
    DeepDive,
    /// High-tier safety intervention
    SafetyCrisis,
    /// Lower-tier safety check-in
    SafetyConcern,
    /// Profile-confirmation prompt
    ProfileConfirm,
}

impl SessionKind {
    pub const ALL: [SessionKind; 7] = [
        SessionKind::ReminderFlow,
        SessionKind::JournalFlow,
        SessionKind::TopicTalk,
        SessionKind::DeepDive,
        SessionKind::SafetyCrisis,
        SessionKind::SafetyConcern,
        SessionKind::ProfileConfirm,
    ];

    /// Valid phases for this kind, first entry is the initial phase
    pub fn valid_phases(self) -> &'static [&'static str] {
        match self {
            SessionKind::ReminderFlow => &["collecting", "confirming", "executing"],
            SessionKind::JournalFlow => &["prompting", "capturing", "confirming", "wrapup"],
            SessionKind::TopicTalk => &["opening", "engaged", "winding_down"],
            SessionKind::DeepDive => &["surface", "exploring", "reflection"],
            SessionKind::SafetyCrisis => &["triage", "grounding", "closing"],
            SessionKind::SafetyConcern => &["checking", "supporting", "closing"],
            SessionKind::ProfileConfirm => &["awaiting_answer"],
        }
    }

    /// The kind's initial/default phase
    pub fn default_phase(self) -> &'static str {
        self.valid_phases()[0]
    }

    /// The phase in which this kind is waiting on exactly one yes/no/unclear
    /// answer, if it has one. An active session in this phase is a hard
    /// routing guard.
    pub fn confirmation_phase(self) -> Option<&'static str> {
        match self {
            SessionKind::ReminderFlow | SessionKind::JournalFlow => Some("confirming"),
            SessionKind::ProfileConfirm => Some("awaiting_answer"),
            _ => None,
        }
    }

    /// The phase whose arrival means the kind's own state machine reports
    /// "resolved"
    pub fn resolved_phase(self) -> &'static str {
        let phases = self.valid_phases();
        phases[phases.len() - 1]
    }

    /// Whether this is one of the two safety kinds
    pub fn is_safety(self) -> bool {
        matches!(self, SessionKind::SafetyCrisis | SessionKind::SafetyConcern)
    }

    /// Priority used by dual-intent negotiation and deferred release.
    /// Higher wins.
    pub fn priority_tier(self) -> u8 {
        match self {
            SessionKind::SafetyCrisis => 5,
            SessionKind::SafetyConcern => 4,
            SessionKind::ReminderFlow | SessionKind::JournalFlow => 3,
            SessionKind::DeepDive | SessionKind::ProfileConfirm => 2,
            SessionKind::TopicTalk => 1,
        }
    }

    /// The handler that owns sessions of this kind
    pub fn owner(self) -> TargetHandler {
        match self {
            SessionKind::ReminderFlow => TargetHandler::ReminderFlow,
            SessionKind::JournalFlow => TargetHandler::JournalFlow,
            SessionKind::TopicTalk => TargetHandler::TopicTalk,
            SessionKind::DeepDive => TargetHandler::DeepDive,
            SessionKind::SafetyCrisis | SessionKind::SafetyConcern => TargetHandler::Safety,
            SessionKind::ProfileConfirm => TargetHandler::ProfileConfirm,
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionKind::ReminderFlow => "reminder_flow",
            SessionKind::JournalFlow => "journal_flow",
            SessionKind::TopicTalk => "topic_talk",
            SessionKind::DeepDive => "deep_dive",
            SessionKind::SafetyCrisis => "safety_crisis",
            SessionKind::SafetyConcern => "safety_concern",
            SessionKind::ProfileConfirm => "profile_confirm",
        };
        write!(f, "{}", s)
    }
}

/// Session status within the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
}

/// Draft data collected by the reminder flow
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ReminderDraft {
    pub what: Option<String>,
    pub when: Option<String>,
    pub confirmed: bool,
}

/// Kind-specific session payload
///
/// Tagged union keyed by kind; the pause/resume store only relies on
/// [`SessionMeta::snapshot`] and [`SessionMeta::restore`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionMeta {
    #[default]
    None,
    Reminder {
        draft: ReminderDraft,
    },
    Journal {
        prompt: Option<String>,
        entry_lines: Vec<String>,
    },
    Topic {
        depth: TopicDepth,
        plan_focus: bool,
    },
    DeepDive {
        threads: Vec<String>,
    },
    Safety {
        tier: SafetyTier,
        acknowledged: bool,
    },
    ProfileConfirm {
        field: String,
        proposed: String,
    },
}

impl SessionMeta {
    /// Empty payload appropriate for the kind
    pub fn default_for(kind: SessionKind) -> Self {
        match kind {
            SessionKind::ReminderFlow => SessionMeta::Reminder {
                draft: ReminderDraft::default(),
            },
            SessionKind::JournalFlow => SessionMeta::Journal {
                prompt: None,
                entry_lines: Vec::new(),
            },
            SessionKind::TopicTalk => SessionMeta::Topic {
                depth: TopicDepth::Light,
                plan_focus: false,
            },
            SessionKind::DeepDive => SessionMeta::DeepDive {
                threads: Vec::new(),
            },
            SessionKind::SafetyCrisis => SessionMeta::Safety {
                tier: SafetyTier::Crisis,
                acknowledged: false,
            },
            SessionKind::SafetyConcern => SessionMeta::Safety {
                tier: SafetyTier::Concern,
                acknowledged: false,
            },
            SessionKind::ProfileConfirm => SessionMeta::ProfileConfirm {
                field: String::new(),
                proposed: String::new(),
            },
        }
    }

    /// Opaque snapshot for the pause/resume store
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a payload from a snapshot, degrading to the kind's empty
    /// payload on corruption or schema drift
    pub fn restore(kind: SessionKind, snapshot: &serde_json::Value) -> Self {
        match serde_json::from_value(snapshot.clone()) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(kind = %kind, "Discarding unreadable meta snapshot: {}", e);
                Self::default_for(kind)
            }
        }
    }
}

/// One unit of in-progress conversational work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    /// The handler that owns this session's turns
    pub owner: TargetHandler,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Free-form phase, valid values depend on kind
    pub phase: String,
    /// Turns this session has owned
    pub turns: u32,
    /// Kind-specific candidate/draft data
    #[serde(default)]
    pub meta: SessionMeta,
    /// Human-readable topic label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// One-line brief usable verbatim when reopening the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_brief: Option<String>,
}

impl Session {
    /// Create a fresh session of the given kind in its default phase
    pub fn new(kind: SessionKind, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            owner: kind.owner(),
            status: SessionStatus::Active,
            started_at: now,
            last_active_at: now,
            phase: kind.default_phase().to_string(),
            turns: 0,
            meta: SessionMeta::default_for(kind),
            topic: None,
            resume_brief: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_resume_brief(mut self, brief: impl Into<String>) -> Self {
        self.resume_brief = Some(brief.into());
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    pub fn with_meta(mut self, meta: SessionMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Record that this session owned a turn
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active_at = now;
        self.turns += 1;
    }

    /// Move to a new phase if it belongs to this kind's phase table;
    /// unknown phases are ignored
    pub fn set_phase(&mut self, phase: &str) {
        if self.kind.valid_phases().contains(&phase) {
            self.phase = phase.to_string();
        } else {
            warn!(kind = %self.kind, phase, "Ignoring transition to unknown phase");
        }
    }

    /// Whether the kind's own state machine reports this session resolved
    pub fn is_resolved(&self) -> bool {
        self.phase == self.kind.resolved_phase()
    }

    /// Whether this session is currently waiting on a yes/no/unclear answer
    pub fn awaiting_confirmation(&self) -> bool {
        self.kind
            .confirmation_phase()
            .is_some_and(|p| p == self.phase)
    }
}
