//! Profile-confirmation handler
//!
//! A one-question session: propose a profile fact, wait for yes/no. The
//! single phase doubles as the confirmation guard, so the router keeps
//! ownership here until the user answers or the TTL sweep gives up.

use tracing::info;

use super::{Handler, TargetHandler, TurnContext, TurnDirective};
use crate::error::Result;
use crate::signals::Confirmation;
use crate::state::session::{Session, SessionKind, SessionMeta};
use crate::state::{CloseOutcome, OrchestratorState};

pub struct ProfileConfirmHandler;

impl ProfileConfirmHandler {
    fn open(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let claimed = ctx.decision.claimed.as_ref();
        let field = claimed
            .and_then(|c| c.target.clone())
            .unwrap_or_default();
        let proposed = ctx
            .signals
            .flows
            .profile_confirm
            .hint
            .clone()
            .unwrap_or_default();

        let mut session = Session::new(SessionKind::ProfileConfirm, ctx.now).with_meta(
            SessionMeta::ProfileConfirm {
                field: field.clone(),
                proposed: proposed.clone(),
            },
        );
        session.touch(ctx.now);
        state.upsert_session(session, ctx.now);
        info!(%field, "Opened profile confirmation");

        TurnDirective::ProfilePrompt { field, proposed }
    }

    fn resolve(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let answer = ctx.signals.confirmation_for(SessionKind::ProfileConfirm);
        match answer {
            Confirmation::Yes => {
                state.close_session(SessionKind::ProfileConfirm, CloseOutcome::Completed, ctx.now);
                info!("Profile fact confirmed");
                TurnDirective::SmallTalk
            }
            Confirmation::No => {
                state.close_session(SessionKind::ProfileConfirm, CloseOutcome::Abandoned, ctx.now);
                info!("Profile fact rejected");
                TurnDirective::SmallTalk
            }
            Confirmation::Unclear | Confirmation::None => {
                let (field, proposed) = match state
                    .stack
                    .get_of_kind_mut(SessionKind::ProfileConfirm)
                {
                    Some(session) => {
                        session.touch(ctx.now);
                        match &session.meta {
                            SessionMeta::ProfileConfirm { field, proposed } => {
                                (field.clone(), proposed.clone())
                            }
                            _ => (String::new(), String::new()),
                        }
                    }
                    None => (String::new(), String::new()),
                };
                state.updated_at = ctx.now;
                TurnDirective::ProfilePrompt { field, proposed }
            }
        }
    }
}

impl Handler for ProfileConfirmHandler {
    fn target(&self) -> TargetHandler {
        TargetHandler::ProfileConfirm
    }

    fn handle(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Result<TurnDirective> {
        let directive = if state.stack.get_of_kind(SessionKind::ProfileConfirm).is_none() {
            self.open(ctx, state)
        } else {
            self.resolve(ctx, state)
        };
        Ok(directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::routing::route;
    use crate::signals::{FlowSignal, SignalBundle};
    use chrono::Utc;

    fn run_turn(signals: &SignalBundle, state: &mut OrchestratorState) -> TurnDirective {
        let config = OrchestratorConfig::default();
        let now = Utc::now();
        let decision = route(signals, state, &config, now);
        let ctx = TurnContext {
            message: "",
            signals,
            decision: &decision,
            config: &config,
            now,
        };
        ProfileConfirmHandler.handle(&ctx, state).unwrap()
    }

    fn proposal_bundle() -> SignalBundle {
        let mut bundle = SignalBundle::default();
        bundle.flows.profile_confirm = FlowSignal {
            detected: true,
            confidence: 0.9,
            target: Some("wake_time".to_string()),
            hint: Some("around 7am".to_string()),
            confirmation: Confirmation::None,
        };
        bundle
    }

    #[test]
    fn test_open_prompts_with_field_and_value() {
        let mut state = OrchestratorState::new();
        let directive = run_turn(&proposal_bundle(), &mut state);
        assert_eq!(
            directive,
            TurnDirective::ProfilePrompt {
                field: "wake_time".to_string(),
                proposed: "around 7am".to_string(),
            }
        );
        let session = state
            .stack
            .get_of_kind(SessionKind::ProfileConfirm)
            .unwrap();
        assert!(session.awaiting_confirmation());
    }

    #[test]
    fn test_yes_closes_session() {
        let mut state = OrchestratorState::new();
        run_turn(&proposal_bundle(), &mut state);

        let mut yes = SignalBundle::default();
        yes.flows.profile_confirm.confirmation = Confirmation::Yes;
        let directive = run_turn(&yes, &mut state);
        assert!(state.stack.is_empty());
        assert_eq!(directive, TurnDirective::SmallTalk);
    }

    #[test]
    fn test_unclear_reprompts_same_fact() {
        let mut state = OrchestratorState::new();
        run_turn(&proposal_bundle(), &mut state);

        let mut unclear = SignalBundle::default();
        unclear.flows.profile_confirm.confirmation = Confirmation::Unclear;
        let directive = run_turn(&unclear, &mut state);
        assert_eq!(
            directive,
            TurnDirective::ProfilePrompt {
                field: "wake_time".to_string(),
                proposed: "around 7am".to_string(),
            }
        );
        assert!(!state.stack.is_empty());
    }
}
