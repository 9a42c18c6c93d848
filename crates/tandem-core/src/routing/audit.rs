//! Routing audit record
//!
//! Every routing decision emits one of these. The field names are part of
//! the external contract: downstream observability and testing depend on
//! them being stable, so the record is built from whitelisted fields only
//! and stays depth- and size-bounded.

use serde::{Deserialize, Serialize};

use crate::handlers::TargetHandler;
use crate::state::session::SessionKind;

/// Why the router picked the target it picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// A safety signal above threshold escalated
    SafetyEscalation,
    /// An unresolved safety session kept the turn
    SafetyActive,
    /// A structured confirmation is awaiting its answer
    ConfirmationPending,
    /// Exactly one mother intent fired
    SingleIntent,
    /// Two or more competing intents; negotiation path
    DualIntent,
    /// The active session retained ownership
    ActiveSessionRetained,
    /// Nothing claimed the turn
    NeutralDefault,
}

/// A signal that was present but filtered out by its threshold (or a rule)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilteredSignal {
    pub name: String,
    pub confidence: f32,
    pub threshold: f32,
}

/// Kind and phase of the active session, for before/after comparison
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveSessionInfo {
    pub kind: SessionKind,
    pub phase: String,
}

/// The per-turn routing audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingAudit {
    /// The resolved target handler
    pub target: TargetHandler,
    /// The winning reason code
    pub reason: ReasonCode,
    /// Signals that were honored this turn, by name
    pub honored: Vec<String>,
    /// Signals that were present but filtered out
    pub filtered: Vec<FilteredSignal>,
    /// Active session before routing, if any
    pub active_before: Option<ActiveSessionInfo>,
    /// Active session after the handler ran; filled in by the orchestrator
    pub active_after: Option<ActiveSessionInfo>,
}

impl RoutingAudit {
    pub fn new(target: TargetHandler, reason: ReasonCode) -> Self {
        Self {
            target,
            reason,
            honored: Vec::new(),
            filtered: Vec::new(),
            active_before: None,
            active_after: None,
        }
    }

    pub fn honor(&mut self, name: impl Into<String>) {
        self.honored.push(name.into());
    }

    pub fn filter(&mut self, name: impl Into<String>, confidence: f32, threshold: f32) {
        self.filtered.push(FilteredSignal {
            name: name.into(),
            confidence,
            threshold,
        });
    }
}
