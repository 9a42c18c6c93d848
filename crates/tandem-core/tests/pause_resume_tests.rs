//! Pause/resume journey tests
//!
//! End-to-end: in-progress work is evicted into the paused slot by a safety
//! escalation, the safety session runs to resolution, the neutral handler
//! offers the work back, and the user's answer decides whether the original
//! session (same id, same phase, same draft) comes back.

use chrono::Utc;
use tandem_core::{
    handler_for, route, Confirmation, FlowSignal, OrchestratorConfig, OrchestratorState,
    SafetySignal, SafetyTier, Session, SessionKind, SessionMeta, SignalBundle, TurnContext,
    TurnDirective,
};

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
}

/// Route and run one turn against in-memory state
fn turn(
    message: &str,
    signals: &SignalBundle,
    state: &mut OrchestratorState,
    config: &OrchestratorConfig,
) -> TurnDirective {
    let now = Utc::now();
    let decision = route(signals, state, config, now);
    let ctx = TurnContext {
        message,
        signals,
        decision: &decision,
        config,
        now,
    };
    handler_for(decision.target).handle(&ctx, state).unwrap()
}

fn crisis_signals() -> SignalBundle {
    let mut signals = SignalBundle::default();
    signals.safety = Some(SafetySignal {
        tier: SafetyTier::Crisis,
        confidence: 0.9,
        immediate: false,
    });
    signals
}

/// Get a reminder flow mid-confirmation into the state
fn start_reminder(state: &mut OrchestratorState, config: &OrchestratorConfig) {
    let mut open = SignalBundle::default();
    open.flows.reminder = FlowSignal {
        detected: true,
        confidence: 0.9,
        target: Some("call the pharmacy".to_string()),
        hint: Some("tomorrow morning".to_string()),
        confirmation: Confirmation::None,
    };
    turn("remind me to call the pharmacy tomorrow", &open, state, config);
    turn("tomorrow morning works", &open, state, config);
    assert!(state
        .stack
        .get_of_kind(SessionKind::ReminderFlow)
        .unwrap()
        .awaiting_confirmation());
}

mod interruption {
    use super::*;

    #[test]
    fn test_crisis_evicts_work_into_paused_slot() {
        let config = config();
        let mut state = OrchestratorState::new();
        start_reminder(&mut state, &config);
        let original_id = state
            .stack
            .get_of_kind(SessionKind::ReminderFlow)
            .unwrap()
            .id
            .clone();

        let directive = turn("...", &crisis_signals(), &mut state, &config);
        assert!(matches!(directive, TurnDirective::SafetyIntervene { .. }));

        let paused = state.paused.as_ref().unwrap();
        assert_eq!(paused.kind, SessionKind::ReminderFlow);
        assert_eq!(paused.session_id, original_id);
        assert_eq!(paused.phase, "confirming");
        assert!(state.stack.get_of_kind(SessionKind::ReminderFlow).is_none());
        assert_eq!(
            state.stack.active().unwrap().kind,
            SessionKind::SafetyCrisis
        );
    }

    #[test]
    fn test_safety_owns_turns_until_resolved() {
        let config = config();
        let mut state = OrchestratorState::new();
        start_reminder(&mut state, &config);
        turn("...", &crisis_signals(), &mut state, &config);

        // Even a confident new flow intent cannot take the turn back.
        let mut competing = SignalBundle::default();
        competing.flows.topic = FlowSignal {
            detected: true,
            confidence: 0.95,
            target: Some("the weather".to_string()),
            ..Default::default()
        };
        let directive = turn("anyway, nice weather", &competing, &mut state, &config);
        assert!(matches!(directive, TurnDirective::SafetyIntervene { .. }));
    }
}

mod recovery {
    use super::*;

    /// Run the safety session to resolution, then return the state
    fn resolve_safety(state: &mut OrchestratorState, config: &OrchestratorConfig) {
        turn("...", &crisis_signals(), state, config);
        let calm = SignalBundle::default();
        // One turn to the middle phase, one to close.
        turn("thank you", &calm, state, config);
        turn("I feel a bit better", &calm, state, config);
        assert!(state.stack.is_empty());
    }

    #[test]
    fn test_resume_offer_after_safety_resolves() {
        let config = config();
        let mut state = OrchestratorState::new();
        start_reminder(&mut state, &config);
        resolve_safety(&mut state, &config);

        let directive = turn("ok", &SignalBundle::default(), &mut state, &config);
        assert_eq!(
            directive,
            TurnDirective::OfferResume {
                kind: SessionKind::ReminderFlow,
                brief: Some("We were in the middle of \"call the pharmacy\".".to_string()),
            }
        );
    }

    #[test]
    fn test_accepting_restores_identical_session() {
        let config = config();
        let mut state = OrchestratorState::new();
        start_reminder(&mut state, &config);
        let original_id = state
            .stack
            .get_of_kind(SessionKind::ReminderFlow)
            .unwrap()
            .id
            .clone();
        resolve_safety(&mut state, &config);

        let mut yes = SignalBundle::default();
        yes.flows.resume.confirmation = Confirmation::Yes;
        let directive = turn("yes please", &yes, &mut state, &config);

        let restored = state.stack.get_of_kind(SessionKind::ReminderFlow).unwrap();
        assert_eq!(restored.id, original_id);
        assert_eq!(restored.phase, "confirming");
        match &restored.meta {
            SessionMeta::Reminder { draft } => {
                assert_eq!(draft.what.as_deref(), Some("call the pharmacy"));
                assert_eq!(draft.when.as_deref(), Some("tomorrow morning"));
            }
            other => panic!("wrong meta: {:?}", other),
        }
        assert!(matches!(directive, TurnDirective::ContinueSession { .. }));
        assert!(state.paused.is_none());
    }

    #[test]
    fn test_declining_clears_slot_and_quiets_resurfacing() {
        let config = config();
        let mut state = OrchestratorState::new();
        start_reminder(&mut state, &config);
        resolve_safety(&mut state, &config);
        state.deferred.defer(
            SessionKind::TopicTalk,
            Some("gardening".to_string()),
            "",
            Utc::now(),
            &config.bounds,
        );

        let mut no = SignalBundle::default();
        no.flows.resume.confirmation = Confirmation::No;
        let directive = turn("no, leave it", &no, &mut state, &config);

        assert_eq!(directive, TurnDirective::SmallTalk);
        assert!(state.paused.is_none());
        assert!(state.deferred.is_paused(Utc::now()));
        // The deferred topic survives, it is just not raised for a while.
        assert_eq!(state.deferred.len(), 1);
    }
}

mod degradation {
    use super::*;

    #[test]
    fn test_corrupted_snapshot_resumes_with_default_state() {
        let config = config();
        let mut state = OrchestratorState::new();
        let now = Utc::now();
        state.upsert_session(
            Session::new(SessionKind::JournalFlow, now).with_topic("today"),
            now,
        );
        state.pause_session(SessionKind::JournalFlow, SafetyTier::Concern, now);

        // Corrupt the snapshot in place, as schema drift would.
        let paused = state.paused.as_mut().unwrap();
        paused.snapshot = Some(serde_json::json!({"kind": "not_a_real_variant"}));
        paused.phase = "phase_from_the_future".to_string();

        let mut yes = SignalBundle::default();
        yes.flows.resume.confirmation = Confirmation::Yes;
        let directive = turn("sure", &yes, &mut state, &config);

        let restored = state.stack.get_of_kind(SessionKind::JournalFlow).unwrap();
        assert_eq!(restored.phase, SessionKind::JournalFlow.default_phase());
        assert_eq!(
            restored.meta,
            SessionMeta::default_for(SessionKind::JournalFlow)
        );
        assert_eq!(restored.topic.as_deref(), Some("today"));
        assert!(matches!(directive, TurnDirective::ContinueSession { .. }));
    }

    #[test]
    fn test_missing_snapshot_still_resumes() {
        let config = config();
        let mut state = OrchestratorState::new();
        let now = Utc::now();
        state.upsert_session(
            Session::new(SessionKind::TopicTalk, now).with_topic("the move"),
            now,
        );
        state.pause_session(SessionKind::TopicTalk, SafetyTier::Crisis, now);
        state.paused.as_mut().unwrap().snapshot = None;

        let mut yes = SignalBundle::default();
        yes.flows.resume.confirmation = Confirmation::Yes;
        turn("yes", &yes, &mut state, &config);

        let restored = state.stack.get_of_kind(SessionKind::TopicTalk).unwrap();
        assert_eq!(restored.topic.as_deref(), Some("the move"));
    }
}
