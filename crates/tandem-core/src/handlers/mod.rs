//! Handlers - per-kind owners of a turn
//!
//! The router resolves each turn to exactly one [`TargetHandler`]; the
//! matching [`Handler`] implementation then mutates the orchestration state
//! (claim/advance/close sessions, defer topics, engage the pause store) and
//! returns a [`TurnDirective`] for the external language generator. Handlers
//! never produce user-facing text themselves.

mod flow;
mod neutral;
mod profile;
mod safety;
mod talk;

use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::routing::RoutingDecision;
use crate::signals::{SafetyTier, SignalBundle};
use crate::state::session::SessionKind;
use crate::state::OrchestratorState;
use chrono::{DateTime, Utc};

pub use flow::FlowHandler;
pub use neutral::NeutralHandler;
pub use profile::ProfileConfirmHandler;
pub use safety::SafetyHandler;
pub use talk::TalkHandler;

/// Identifier of the handler that owns a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetHandler {
    Safety,
    ReminderFlow,
    JournalFlow,
    TopicTalk,
    DeepDive,
    ProfileConfirm,
    /// Dual-intent negotiation: ask the user to disambiguate
    Disambiguate,
    /// Default conversational handler
    Neutral,
}

impl TargetHandler {
    /// The session kind this handler opens, for handlers that own one
    pub fn session_kind(self) -> Option<SessionKind> {
        match self {
            TargetHandler::ReminderFlow => Some(SessionKind::ReminderFlow),
            TargetHandler::JournalFlow => Some(SessionKind::JournalFlow),
            TargetHandler::TopicTalk => Some(SessionKind::TopicTalk),
            TargetHandler::DeepDive => Some(SessionKind::DeepDive),
            TargetHandler::ProfileConfirm => Some(SessionKind::ProfileConfirm),
            TargetHandler::Safety | TargetHandler::Disambiguate | TargetHandler::Neutral => None,
        }
    }
}

impl std::fmt::Display for TargetHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetHandler::Safety => "safety",
            TargetHandler::ReminderFlow => "reminder_flow",
            TargetHandler::JournalFlow => "journal_flow",
            TargetHandler::TopicTalk => "topic_talk",
            TargetHandler::DeepDive => "deep_dive",
            TargetHandler::ProfileConfirm => "profile_confirm",
            TargetHandler::Disambiguate => "disambiguate",
            TargetHandler::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

/// One option offered during dual-intent disambiguation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisambigOption {
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Structured instruction for the external language generator
///
/// The core decides WHAT the reply should accomplish; the generator decides
/// the words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDirective {
    /// Open or continue a safety intervention
    SafetyIntervene {
        tier: SafetyTier,
        phase: String,
    },
    /// Continue the session that owns the turn
    ContinueSession {
        kind: SessionKind,
        phase: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
    /// Start a new flow session
    OpenFlow {
        kind: SessionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Ask the user which of two competing intents to pursue
    AskDisambiguation { options: Vec<DisambigOption> },
    /// Ask whether to pick interrupted work back up
    OfferResume {
        kind: SessionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brief: Option<String>,
    },
    /// Proactively resurface a deferred topic
    RaiseDeferred {
        kind: SessionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        summary: String,
    },
    /// Confirm a proposed profile fact
    ProfilePrompt {
        field: String,
        proposed: String,
    },
    /// Plain conversational reply, nothing structured pending
    SmallTalk,
}

/// Everything a handler may read during its turn
pub struct TurnContext<'a> {
    /// The coalesced user input for this turn
    pub message: &'a str,
    pub signals: &'a SignalBundle,
    pub decision: &'a RoutingDecision,
    pub config: &'a OrchestratorConfig,
    pub now: DateTime<Utc>,
}

/// A handler owns the turns routed to it
pub trait Handler: Send + Sync {
    /// Which target this handler serves
    fn target(&self) -> TargetHandler;

    /// Execute the turn, mutating state and returning the reply directive
    fn handle(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState)
        -> Result<TurnDirective>;
}

/// Dispatch a resolved target to its handler implementation
pub fn handler_for(target: TargetHandler) -> Box<dyn Handler> {
    match target {
        TargetHandler::Safety => Box::new(SafetyHandler),
        TargetHandler::ReminderFlow => Box::new(FlowHandler::reminder()),
        TargetHandler::JournalFlow => Box::new(FlowHandler::journal()),
        TargetHandler::TopicTalk => Box::new(TalkHandler::topic()),
        TargetHandler::DeepDive => Box::new(TalkHandler::deep_dive()),
        TargetHandler::ProfileConfirm => Box::new(ProfileConfirmHandler),
        // Disambiguation is stateless beyond deferral, which the router's
        // actions already applied; the neutral handler words the question
        TargetHandler::Disambiguate | TargetHandler::Neutral => Box::new(NeutralHandler),
    }
}
