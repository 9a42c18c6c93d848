//! Neutral handler - the conversational default
//!
//! Owns every turn nothing structured claims, plus two pieces of structured
//! work of its own: wording the dual-intent disambiguation question, and the
//! resume/resurface ladder. When a paused slot exists it is offered back
//! before anything else; once the slot is clear, the highest-priority
//! deferred topic may be proactively resurfaced. Declining a resume pauses
//! resurfacing for a window so the user is not nagged.

use tracing::{debug, info};

use super::{DisambigOption, Handler, TargetHandler, TurnContext, TurnDirective};
use crate::error::Result;
use crate::routing::ReasonCode;
use crate::signals::Confirmation;
use crate::state::session::Session;
use crate::state::OrchestratorState;

pub struct NeutralHandler;

impl NeutralHandler {
    /// Word the dual-intent question from the router's contender list
    fn disambiguate(&self, ctx: &TurnContext<'_>) -> TurnDirective {
        let options = ctx
            .decision
            .contenders
            .iter()
            .map(|c| DisambigOption {
                kind: c.kind,
                target: c.target.clone(),
            })
            .collect();
        TurnDirective::AskDisambiguation { options }
    }

    /// Offer paused work back, or act on the user's answer to a prior offer
    fn resume_ladder(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Option<TurnDirective> {
        let paused = state.paused.as_ref()?;
        let kind = paused.kind;
        let brief = paused.resume_context.clone();

        match ctx.signals.flows.resume.confirmation {
            Confirmation::Yes => {
                let session = state.resume_paused(ctx.now)?;
                info!(kind = %session.kind, "User accepted resume offer");
                Some(TurnDirective::ContinueSession {
                    kind: session.kind,
                    phase: session.phase,
                    topic: session.topic,
                })
            }
            Confirmation::No => {
                state.discard_paused(ctx.now);
                state
                    .deferred
                    .pause_all(ctx.config.debounce.decline_pause(), ctx.now);
                info!(kind = %kind, "User declined resume offer, pausing resurfacing");
                Some(TurnDirective::SmallTalk)
            }
            Confirmation::None | Confirmation::Unclear => {
                debug!(kind = %kind, "Offering paused work back");
                Some(TurnDirective::OfferResume { kind, brief })
            }
        }
    }

    /// Proactively resurface the highest-priority deferred topic when the
    /// conversation is otherwise idle
    fn resurface(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Option<TurnDirective> {
        if !state.stack.is_empty() {
            return None;
        }
        let id = state.deferred.next_to_resurface(ctx.now)?.id.clone();
        let topic = state.deferred.remove(&id)?;
        state.updated_at = ctx.now;

        let summary = topic
            .summaries
            .last()
            .map(|s| s.text.clone())
            .unwrap_or_default();
        let mut session = Session::new(topic.kind, ctx.now);
        if let Some(ref t) = topic.target {
            session = session.with_topic(t.clone());
        }
        session.touch(ctx.now);
        state.upsert_session(session, ctx.now);
        info!(kind = %topic.kind, ?topic.target, "Resurfacing deferred topic");

        Some(TurnDirective::RaiseDeferred {
            kind: topic.kind,
            target: topic.target,
            summary,
        })
    }

    /// Hand an idle turn to the oldest queued mode switch
    ///
    /// The deferred registry ranks by priority and gets first refusal; the
    /// raw queue releases strictly oldest-first once the registry is quiet.
    fn release_queued(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Option<TurnDirective> {
        if !state.stack.is_empty() || state.deferred.is_paused(ctx.now) {
            return None;
        }
        let intent = state.queue.dequeue()?;
        state.updated_at = ctx.now;
        // A queued switch to a non-session handler has nothing to raise.
        let kind = intent.handler.session_kind()?;
        info!(handler = %intent.handler, reason = %intent.reason, "Releasing queued intent");

        Some(TurnDirective::RaiseDeferred {
            kind,
            target: None,
            summary: intent.excerpt,
        })
    }
}

impl Handler for NeutralHandler {
    fn target(&self) -> TargetHandler {
        TargetHandler::Neutral
    }

    fn handle(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Result<TurnDirective> {
        if ctx.decision.reason == ReasonCode::DualIntent
            && !ctx.decision.contenders.is_empty()
        {
            return Ok(self.disambiguate(ctx));
        }
        if let Some(directive) = self.resume_ladder(ctx, state) {
            return Ok(directive);
        }
        if let Some(directive) = self.resurface(ctx, state) {
            return Ok(directive);
        }
        if let Some(directive) = self.release_queued(ctx, state) {
            return Ok(directive);
        }
        Ok(TurnDirective::SmallTalk)
    }
}
