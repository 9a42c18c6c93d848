//! Routing policy - the precedence ladder
//!
//! Precedence, highest first:
//! 1. An unresolved safety signal above threshold, or an existing safety
//!    session that has not reached its resolved phase. An anti-repetition
//!    cooldown keeps the same escalation from firing twice in a short window.
//! 2. A structured confirmation awaiting its yes/no/unclear answer is a hard
//!    guard: its owner keeps the turn regardless of new signals.
//! 3. Exactly one mother intent claims the turn; two or more run the
//!    dual-intent negotiation path instead of silently picking one.
//! 4. An active non-safety session retains ownership; content judged
//!    irrelevant to it queues the new intent rather than evicting.
//! 5. The neutral conversational handler.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::audit::{ActiveSessionInfo, ReasonCode, RoutingAudit};
use crate::config::OrchestratorConfig;
use crate::handlers::TargetHandler;
use crate::signals::{IntentKind, InterruptKind, MotherCandidate, SafetyTier, SignalBundle};
use crate::state::OrchestratorState;

/// A weak new intent to queue while the active session keeps the turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRequest {
    pub handler: TargetHandler,
    pub reason: String,
    pub excerpt: String,
}

/// The resolved routing for one turn
///
/// `route` never mutates state; deferred/queued side effects are carried
/// here and applied by the orchestrator before the handler runs.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub target: TargetHandler,
    pub reason: ReasonCode,
    /// The winning mother intent, when one claimed the turn
    pub claimed: Option<MotherCandidate>,
    /// Competing intents to present during disambiguation
    pub contenders: Vec<MotherCandidate>,
    /// Lower-priority intents to defer into the topic registry
    pub defer: Vec<MotherCandidate>,
    /// Weak new intent to queue while the active session retains the turn
    pub queue_intent: Option<QueueRequest>,
    /// Safety tier that escalated this turn, if any
    pub escalation: Option<SafetyTier>,
    pub audit: RoutingAudit,
}

impl RoutingDecision {
    fn new(target: TargetHandler, reason: ReasonCode) -> Self {
        Self {
            target,
            reason,
            claimed: None,
            contenders: Vec::new(),
            defer: Vec::new(),
            queue_intent: None,
            escalation: None,
            audit: RoutingAudit::new(target, reason),
        }
    }
}

fn intent_owner(intent: IntentKind) -> TargetHandler {
    match intent {
        IntentKind::Chat => TargetHandler::Neutral,
        IntentKind::Reminder => TargetHandler::ReminderFlow,
        IntentKind::Journal => TargetHandler::JournalFlow,
        IntentKind::Topic => TargetHandler::TopicTalk,
        IntentKind::DeepDive => TargetHandler::DeepDive,
        IntentKind::ProfileConfirm => TargetHandler::ProfileConfirm,
    }
}

/// Record every present signal as honored or filtered, so the audit shows
/// what the router actually saw
fn take_signal_census(signals: &SignalBundle, config: &OrchestratorConfig, audit: &mut RoutingAudit) {
    let t = &config.thresholds;
    if let Some(s) = &signals.safety {
        if s.confidence < t.safety {
            audit.filter("safety", s.confidence, t.safety);
        } else if !audit.filtered.iter().any(|f| f.name == "safety:cooldown") {
            // A cooldown-suppressed escalation was already recorded as
            // filtered; it must not also appear honored.
            audit.honor("safety");
        }
    }
    if let Some(s) = &signals.primary_intent {
        if s.confidence >= t.primary_intent {
            audit.honor("primary_intent");
        } else {
            audit.filter("primary_intent", s.confidence, t.primary_intent);
        }
    }
    if let Some(s) = &signals.interrupt {
        if s.confidence >= t.interrupt {
            audit.honor("interrupt");
        } else {
            audit.filter("interrupt", s.confidence, t.interrupt);
        }
    }
    if let Some(s) = &signals.topic_depth {
        if s.confidence >= t.topic_depth {
            audit.honor("topic_depth");
        } else {
            audit.filter("topic_depth", s.confidence, t.topic_depth);
        }
    }
    let flow_blocks = [
        ("flow:reminder", &signals.flows.reminder),
        ("flow:journal", &signals.flows.journal),
        ("flow:topic", &signals.flows.topic),
        ("flow:deep_dive", &signals.flows.deep_dive),
        ("flow:profile_confirm", &signals.flows.profile_confirm),
        ("flow:resume", &signals.flows.resume),
    ];
    for (name, block) in flow_blocks {
        if block.detected {
            if block.confidence >= t.flow_intent {
                audit.honor(name);
            } else {
                audit.filter(name, block.confidence, t.flow_intent);
            }
        }
    }
}

/// Resolve this turn's signals and state to a single target handler
pub fn route(
    signals: &SignalBundle,
    state: &OrchestratorState,
    config: &OrchestratorConfig,
    now: DateTime<Utc>,
) -> RoutingDecision {
    let active_before = state.stack.active().map(|s| ActiveSessionInfo {
        kind: s.kind,
        phase: s.phase.clone(),
    });

    let mut decision = resolve(signals, state, config, now);
    take_signal_census(signals, config, &mut decision.audit);
    decision.audit.target = decision.target;
    decision.audit.reason = decision.reason;
    decision.audit.active_before = active_before;
    debug!(target = %decision.target, reason = ?decision.reason, "Routed turn");
    decision
}

fn resolve(
    signals: &SignalBundle,
    state: &OrchestratorState,
    config: &OrchestratorConfig,
    now: DateTime<Utc>,
) -> RoutingDecision {
    let thresholds = &config.thresholds;
    let active = state.stack.active();

    // (1) Safety always wins. An existing safety session of either tier
    // keeps the turn until its own state machine reports resolved.
    let safety_session_open = active
        .filter(|s| s.kind.is_safety() && !s.is_resolved())
        .is_some();

    if let Some(sig) = signals.safety_above(thresholds) {
        if safety_session_open {
            return RoutingDecision::new(TargetHandler::Safety, ReasonCode::SafetyActive);
        }
        if state.safety_in_cooldown(now, thresholds.safety_cooldown()) && !sig.immediate {
            // Anti-repetition: the same escalation does not fire twice in a
            // short window. Immediate risk overrides the cooldown.
            let mut decision = lower_precedence(signals, state, config);
            decision
                .audit
                .filter("safety:cooldown", sig.confidence, thresholds.safety);
            return decision;
        }
        let mut decision = RoutingDecision::new(TargetHandler::Safety, ReasonCode::SafetyEscalation);
        decision.escalation = Some(sig.tier);
        return decision;
    }
    if safety_session_open {
        return RoutingDecision::new(TargetHandler::Safety, ReasonCode::SafetyActive);
    }

    lower_precedence(signals, state, config)
}

/// Precedence levels below safety
fn lower_precedence(
    signals: &SignalBundle,
    state: &OrchestratorState,
    config: &OrchestratorConfig,
) -> RoutingDecision {
    let thresholds = &config.thresholds;
    let active = state.stack.active();

    // (2) A pending structured confirmation is a hard guard.
    if let Some(session) = active.filter(|s| s.awaiting_confirmation() && !s.kind.is_safety()) {
        return RoutingDecision::new(session.owner, ReasonCode::ConfirmationPending);
    }

    // (3) Mother intent selection.
    let mut candidates = signals.mother_candidates(thresholds);
    match candidates.len() {
        0 => {}
        1 => {
            let winner = candidates.remove(0);
            let mut decision =
                RoutingDecision::new(winner.kind.owner(), ReasonCode::SingleIntent);
            decision.claimed = Some(winner);
            return decision;
        }
        _ => {
            // Dual-intent negotiation: equal tiers ask the user, unequal
            // tiers claim the higher and defer the rest.
            if candidates[0].kind.priority_tier() == candidates[1].kind.priority_tier() {
                let mut decision =
                    RoutingDecision::new(TargetHandler::Disambiguate, ReasonCode::DualIntent);
                decision.contenders = candidates;
                return decision;
            }
            let winner = candidates.remove(0);
            let mut decision = RoutingDecision::new(winner.kind.owner(), ReasonCode::DualIntent);
            decision.claimed = Some(winner);
            decision.defer = candidates;
            return decision;
        }
    }

    // (4) An active non-safety session retains ownership. Content judged
    // irrelevant to it queues the weaker intent instead of evicting.
    if let Some(session) = active {
        let mut decision =
            RoutingDecision::new(session.owner, ReasonCode::ActiveSessionRetained);
        let switching = signals
            .interrupt_above(thresholds)
            .map(|i| {
                matches!(
                    i.kind,
                    InterruptKind::TopicSwitch | InterruptKind::Digression | InterruptKind::Bored
                )
            })
            .unwrap_or(false);
        if switching {
            if let Some(intent) = signals
                .primary_intent
                .as_ref()
                .filter(|i| i.confidence >= thresholds.primary_intent)
                .filter(|i| intent_owner(i.intent) != session.owner)
            {
                decision.queue_intent = Some(QueueRequest {
                    handler: intent_owner(intent.intent),
                    reason: format!("switch:{:?}", intent.intent).to_lowercase(),
                    excerpt: String::new(),
                });
            }
        }
        return decision;
    }

    // (5) Default.
    RoutingDecision::new(TargetHandler::Neutral, ReasonCode::NeutralDefault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{FlowSignal, IntentSignal, InterruptSignal, SafetySignal};
    use crate::state::session::{Session, SessionKind};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::default()
    }

    fn safety_signal(confidence: f32) -> SafetySignal {
        SafetySignal {
            tier: SafetyTier::Crisis,
            confidence,
            immediate: false,
        }
    }

    fn fired_flow(confidence: f32) -> FlowSignal {
        FlowSignal {
            detected: true,
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_safety_beats_any_competing_signal() {
        let mut signals = SignalBundle::default();
        signals.safety = Some(safety_signal(0.8));
        signals.flows.reminder = fired_flow(0.9);

        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::Safety);
        assert_eq!(decision.reason, ReasonCode::SafetyEscalation);
        assert_eq!(decision.escalation, Some(SafetyTier::Crisis));
    }

    #[test]
    fn test_safety_below_threshold_is_filtered() {
        let mut signals = SignalBundle::default();
        signals.safety = Some(safety_signal(0.4));

        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::Neutral);
        assert!(decision
            .audit
            .filtered
            .iter()
            .any(|f| f.name == "safety"));
    }

    #[test]
    fn test_open_safety_session_keeps_turn() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(Session::new(SessionKind::SafetyConcern, now), now);

        let mut signals = SignalBundle::default();
        signals.flows.topic = fired_flow(0.95);

        let decision = route(&signals, &state, &config(), now);
        assert_eq!(decision.target, TargetHandler::Safety);
        assert_eq!(decision.reason, ReasonCode::SafetyActive);
    }

    #[test]
    fn test_resolved_safety_session_releases_turn() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(
            Session::new(SessionKind::SafetyConcern, now).with_phase("closing"),
            now,
        );

        let signals = SignalBundle::default();
        let decision = route(&signals, &state, &config(), now);
        assert_ne!(decision.reason, ReasonCode::SafetyActive);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_escalation() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.record_safety_fire(now - chrono::Duration::minutes(2));

        let mut signals = SignalBundle::default();
        signals.safety = Some(safety_signal(0.85));

        let decision = route(&signals, &state, &config(), now);
        assert_ne!(decision.reason, ReasonCode::SafetyEscalation);
        assert!(decision
            .audit
            .filtered
            .iter()
            .any(|f| f.name == "safety:cooldown"));
    }

    #[test]
    fn test_cooldown_suppressed_signal_is_not_honored() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.record_safety_fire(now - chrono::Duration::minutes(2));

        let mut signals = SignalBundle::default();
        signals.safety = Some(safety_signal(0.85));

        let decision = route(&signals, &state, &config(), now);
        // One census entry per signal: suppressed means filtered, not both.
        assert!(!decision.audit.honored.iter().any(|h| h == "safety"));
        assert!(decision
            .audit
            .filtered
            .iter()
            .any(|f| f.name == "safety:cooldown"));
    }

    #[test]
    fn test_immediate_risk_overrides_cooldown() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.record_safety_fire(now - chrono::Duration::minutes(2));

        let mut signals = SignalBundle::default();
        signals.safety = Some(SafetySignal {
            tier: SafetyTier::Crisis,
            confidence: 0.9,
            immediate: true,
        });

        let decision = route(&signals, &state, &config(), now);
        assert_eq!(decision.reason, ReasonCode::SafetyEscalation);
    }

    #[test]
    fn test_confirmation_guard_holds_against_new_intents() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(
            Session::new(SessionKind::ReminderFlow, now).with_phase("confirming"),
            now,
        );

        let mut signals = SignalBundle::default();
        signals.flows.deep_dive = fired_flow(0.95);

        let decision = route(&signals, &state, &config(), now);
        assert_eq!(decision.target, TargetHandler::ReminderFlow);
        assert_eq!(decision.reason, ReasonCode::ConfirmationPending);
    }

    #[test]
    fn test_single_mother_intent_claims_turn() {
        let mut signals = SignalBundle::default();
        signals.flows.journal = fired_flow(0.8);

        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::JournalFlow);
        assert_eq!(decision.reason, ReasonCode::SingleIntent);
        assert!(decision.claimed.is_some());
    }

    #[test]
    fn test_equal_tier_dual_intent_disambiguates() {
        let mut signals = SignalBundle::default();
        signals.flows.reminder = fired_flow(0.8);
        signals.flows.journal = fired_flow(0.85);

        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::Disambiguate);
        assert_eq!(decision.reason, ReasonCode::DualIntent);
        assert_eq!(decision.contenders.len(), 2);
    }

    #[test]
    fn test_unequal_tier_dual_intent_defers_loser() {
        let mut signals = SignalBundle::default();
        signals.flows.reminder = fired_flow(0.8);
        signals.flows.topic = fired_flow(0.9);

        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::ReminderFlow);
        assert_eq!(decision.reason, ReasonCode::DualIntent);
        assert_eq!(decision.defer.len(), 1);
        assert_eq!(decision.defer[0].kind, SessionKind::TopicTalk);
    }

    #[test]
    fn test_active_session_retains_by_default() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(Session::new(SessionKind::DeepDive, now), now);

        let signals = SignalBundle::default();
        let decision = route(&signals, &state, &config(), now);
        assert_eq!(decision.target, TargetHandler::DeepDive);
        assert_eq!(decision.reason, ReasonCode::ActiveSessionRetained);
        assert!(decision.queue_intent.is_none());
    }

    #[test]
    fn test_irrelevant_content_queues_instead_of_evicting() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(Session::new(SessionKind::DeepDive, now), now);

        let mut signals = SignalBundle::default();
        signals.interrupt = Some(InterruptSignal {
            kind: InterruptKind::TopicSwitch,
            confidence: 0.7,
        });
        signals.primary_intent = Some(IntentSignal {
            intent: IntentKind::Reminder,
            confidence: 0.7,
        });

        let decision = route(&signals, &state, &config(), now);
        // The session keeps the turn; the new intent is queued, not routed.
        assert_eq!(decision.target, TargetHandler::DeepDive);
        let queued = decision.queue_intent.unwrap();
        assert_eq!(queued.handler, TargetHandler::ReminderFlow);
    }

    #[test]
    fn test_empty_bundle_routes_neutral() {
        let signals = SignalBundle::default();
        let state = OrchestratorState::new();
        let decision = route(&signals, &state, &config(), Utc::now());
        assert_eq!(decision.target, TargetHandler::Neutral);
        assert_eq!(decision.reason, ReasonCode::NeutralDefault);
        assert!(decision.audit.honored.is_empty());
    }

    #[test]
    fn test_audit_reflects_active_before() {
        let now = Utc::now();
        let mut state = OrchestratorState::new();
        state.upsert_session(
            Session::new(SessionKind::TopicTalk, now).with_phase("engaged"),
            now,
        );

        let signals = SignalBundle::default();
        let decision = route(&signals, &state, &config(), now);
        let before = decision.audit.active_before.unwrap();
        assert_eq!(before.kind, SessionKind::TopicTalk);
        assert_eq!(before.phase, "engaged");
    }
}
