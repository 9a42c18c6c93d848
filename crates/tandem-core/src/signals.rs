//! Signal bundle - the per-turn input contract
//!
//! An external classifier produces one [`SignalBundle`] per turn. Every field
//! is untrusted: confidence values are gated against the configured
//! thresholds before the router acts on anything, and every field carries a
//! serde default so a bundle missing expected fields deserializes as
//! "no signal" rather than failing the turn.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::state::session::SessionKind;

/// The two safety tiers an escalation can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTier {
    /// Acute crisis requiring immediate intervention
    Crisis,
    /// Elevated concern worth a supportive check-in
    #[default]
    Concern,
}

impl SafetyTier {
    /// The session kind that owns an escalation of this tier
    pub fn session_kind(self) -> SessionKind {
        match self {
            SafetyTier::Crisis => SessionKind::SafetyCrisis,
            SafetyTier::Concern => SessionKind::SafetyConcern,
        }
    }
}

/// Safety assessment for the incoming message
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SafetySignal {
    pub tier: SafetyTier,
    pub confidence: f32,
    /// Whether the classifier judged the risk immediate
    pub immediate: bool,
}

/// Primary-intent classification
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IntentSignal {
    pub intent: IntentKind,
    pub confidence: f32,
}

/// Coarse primary intents the classifier distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    #[default]
    Chat,
    Reminder,
    Journal,
    Topic,
    DeepDive,
    ProfileConfirm,
}

/// Interrupt classification (explicit stop, boredom, topic switch, digression)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InterruptSignal {
    pub kind: InterruptKind,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    #[default]
    Digression,
    TopicSwitch,
    Bored,
    Stop,
}

/// Topic-depth classification
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TopicDepthSignal {
    pub depth: TopicDepth,
    pub confidence: f32,
    /// Whether the user wants a concrete plan rather than open talk
    pub plan_focus: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopicDepth {
    #[default]
    None,
    Light,
    Serious,
    NeedsSupport,
}

/// User answer to a pending structured confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    #[default]
    None,
    Yes,
    No,
    Unclear,
}

/// One kind-specific intent block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlowSignal {
    pub detected: bool,
    pub confidence: f32,
    /// Free-text target of the flow, e.g. a reminder subject or topic label
    pub target: Option<String>,
    /// Additional free-text hint from the classifier
    pub hint: Option<String>,
    /// Tri-state answer when a confirmation was pending
    pub confirmation: Confirmation,
}

impl FlowSignal {
    /// Whether this block clears its confidence threshold
    pub fn fires(&self, threshold: f32) -> bool {
        self.detected && self.confidence >= threshold
    }
}

/// Per-flow-kind signal blocks
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlowSignals {
    pub reminder: FlowSignal,
    pub journal: FlowSignal,
    pub topic: FlowSignal,
    pub deep_dive: FlowSignal,
    pub profile_confirm: FlowSignal,
    /// Pseudo-flow: the user's reaction to a resume offer for paused work.
    /// Only its confirmation tri-state is consulted; it never claims a turn.
    pub resume: FlowSignal,
}

/// The full per-turn signal bundle
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SignalBundle {
    pub safety: Option<SafetySignal>,
    pub primary_intent: Option<IntentSignal>,
    pub interrupt: Option<InterruptSignal>,
    pub topic_depth: Option<TopicDepthSignal>,
    pub flows: FlowSignals,
}

/// A flow signal that cleared its threshold, tagged with the session kind
/// that would own it
#[derive(Debug, Clone)]
pub struct MotherCandidate {
    pub kind: SessionKind,
    pub confidence: f32,
    pub target: Option<String>,
}

impl SignalBundle {
    /// Safety signal, if present and above threshold
    pub fn safety_above(&self, thresholds: &ThresholdConfig) -> Option<&SafetySignal> {
        self.safety
            .as_ref()
            .filter(|s| s.confidence >= thresholds.safety)
    }

    /// Interrupt signal, if present and above threshold
    pub fn interrupt_above(&self, thresholds: &ThresholdConfig) -> Option<&InterruptSignal> {
        self.interrupt
            .as_ref()
            .filter(|s| s.confidence >= thresholds.interrupt)
    }

    /// All flow signals that cleared their threshold, strongest tier first
    ///
    /// These are the "mother" candidates: if exactly one fires it owns the
    /// turn; two or more trigger the dual-intent negotiation path.
    pub fn mother_candidates(&self, thresholds: &ThresholdConfig) -> Vec<MotherCandidate> {
        let t = thresholds.flow_intent;
        let blocks: [(SessionKind, &FlowSignal); 5] = [
            (SessionKind::ReminderFlow, &self.flows.reminder),
            (SessionKind::JournalFlow, &self.flows.journal),
            (SessionKind::TopicTalk, &self.flows.topic),
            (SessionKind::DeepDive, &self.flows.deep_dive),
            (SessionKind::ProfileConfirm, &self.flows.profile_confirm),
        ];
        let mut out: Vec<MotherCandidate> = blocks
            .into_iter()
            .filter(|(_, sig)| sig.fires(t))
            .map(|(kind, sig)| MotherCandidate {
                kind,
                confidence: sig.confidence,
                target: sig.target.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            b.kind
                .priority_tier()
                .cmp(&a.kind.priority_tier())
                .then(b.confidence.total_cmp(&a.confidence))
        });
        out
    }

    /// The confirmation answer carried by the block for the given kind
    pub fn confirmation_for(&self, kind: SessionKind) -> Confirmation {
        match kind {
            SessionKind::ReminderFlow => self.flows.reminder.confirmation,
            SessionKind::JournalFlow => self.flows.journal.confirmation,
            SessionKind::TopicTalk => self.flows.topic.confirmation,
            SessionKind::DeepDive => self.flows.deep_dive.confirmation,
            SessionKind::ProfileConfirm => self.flows.profile_confirm.confirmation,
            SessionKind::SafetyCrisis | SessionKind::SafetyConcern => Confirmation::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_deserialize_as_no_signal() {
        let bundle: SignalBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.safety.is_none());
        assert!(!bundle.flows.reminder.detected);
    }

    #[test]
    fn test_partial_bundle_parses() {
        let json = r#"{"safety": {"tier": "crisis", "confidence": 0.9}}"#;
        let bundle: SignalBundle = serde_json::from_str(json).unwrap();
        let safety = bundle.safety.unwrap();
        assert_eq!(safety.tier, SafetyTier::Crisis);
        assert!(!safety.immediate);
    }

    #[test]
    fn test_safety_gated_by_threshold() {
        let thresholds = ThresholdConfig::default();
        let bundle = SignalBundle {
            safety: Some(SafetySignal {
                tier: SafetyTier::Concern,
                confidence: 0.5,
                immediate: false,
            }),
            ..Default::default()
        };
        assert!(bundle.safety_above(&thresholds).is_none());
    }

    #[test]
    fn test_mother_candidates_sorted_by_tier_then_confidence() {
        let thresholds = ThresholdConfig::default();
        let mut bundle = SignalBundle::default();
        bundle.flows.topic = FlowSignal {
            detected: true,
            confidence: 0.95,
            ..Default::default()
        };
        bundle.flows.reminder = FlowSignal {
            detected: true,
            confidence: 0.8,
            ..Default::default()
        };
        let candidates = bundle.mother_candidates(&thresholds);
        assert_eq!(candidates.len(), 2);
        // Reminder flows outrank open topic talk
        assert_eq!(candidates[0].kind, SessionKind::ReminderFlow);
    }

    #[test]
    fn test_below_threshold_flow_filtered() {
        let thresholds = ThresholdConfig::default();
        let mut bundle = SignalBundle::default();
        bundle.flows.journal = FlowSignal {
            detected: true,
            confidence: 0.5,
            ..Default::default()
        };
        assert!(bundle.mother_candidates(&thresholds).is_empty());
    }
}
