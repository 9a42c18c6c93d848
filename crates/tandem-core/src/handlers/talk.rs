//! Talk handler - topic discussions and deep dives
//!
//! Both kinds are open-ended conversation rather than tool flows: the phase
//! ladder moves forward one step per turn, holds in the engaged phase, and
//! winds down on an explicit stop or boredom interrupt. Closing a talk
//! session chains to the oldest deferred topic of the same kind, if any.

use tracing::{debug, info};

use super::{Handler, TargetHandler, TurnContext, TurnDirective};
use crate::error::Result;
use crate::signals::InterruptKind;
use crate::state::session::{Session, SessionKind, SessionMeta};
use crate::state::{CloseOutcome, OrchestratorState};

pub struct TalkHandler {
    kind: SessionKind,
}

impl TalkHandler {
    pub fn topic() -> Self {
        Self {
            kind: SessionKind::TopicTalk,
        }
    }

    pub fn deep_dive() -> Self {
        Self {
            kind: SessionKind::DeepDive,
        }
    }

    fn open(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let target = ctx
            .decision
            .claimed
            .as_ref()
            .and_then(|c| c.target.clone());

        let meta = match self.kind {
            SessionKind::TopicTalk => {
                let depth = ctx
                    .signals
                    .topic_depth
                    .as_ref()
                    .filter(|s| s.confidence >= ctx.config.thresholds.topic_depth);
                SessionMeta::Topic {
                    depth: depth.map(|s| s.depth).unwrap_or_default(),
                    plan_focus: depth.map(|s| s.plan_focus).unwrap_or(false),
                }
            }
            _ => SessionMeta::DeepDive {
                threads: target.iter().cloned().collect(),
            },
        };

        let mut session = Session::new(self.kind, ctx.now).with_meta(meta);
        if let Some(ref t) = target {
            session = session
                .with_topic(t.clone())
                .with_resume_brief(format!("We were talking about {}.", t));
        }
        session.touch(ctx.now);
        let phase = session.phase.clone();
        let topic = session.topic.clone();
        state.upsert_session(session, ctx.now);
        info!(kind = %self.kind, ?topic, "Opened talk session");

        TurnDirective::ContinueSession {
            kind: self.kind,
            phase,
            topic,
        }
    }

    /// Close the session and chain to the oldest deferred topic of the same
    /// kind, if one is waiting
    fn wind_down(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        if let Some(session) = state.stack.get_of_kind_mut(self.kind) {
            session.set_phase(self.kind.resolved_phase());
            session.touch(ctx.now);
        }
        state.close_session(self.kind, CloseOutcome::Completed, ctx.now);
        info!(kind = %self.kind, "Talk session wound down");

        let next = state
            .deferred
            .find_next_of_kind(self.kind)
            .map(|t| t.id.clone());
        if let Some(id) = next {
            if let Some(topic) = state.deferred.remove(&id) {
                state.updated_at = ctx.now;
                let summary = topic
                    .summaries
                    .last()
                    .map(|s| s.text.clone())
                    .unwrap_or_default();
                debug!(kind = %self.kind, ?topic.target, "Chaining to deferred topic");
                return TurnDirective::RaiseDeferred {
                    kind: topic.kind,
                    target: topic.target,
                    summary,
                };
            }
        }
        TurnDirective::SmallTalk
    }

    fn advance(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let stop = ctx
            .signals
            .interrupt_above(&ctx.config.thresholds)
            .is_some_and(|i| matches!(i.kind, InterruptKind::Stop | InterruptKind::Bored));
        if stop {
            return self.wind_down(ctx, state);
        }

        let Some(session) = state.stack.get_of_kind_mut(self.kind) else {
            return self.open(ctx, state);
        };

        // Move off the opening phase, then hold in the engaged phase.
        let phases = self.kind.valid_phases();
        if session.phase == phases[0] {
            session.set_phase(phases[1]);
        }

        match &mut session.meta {
            SessionMeta::Topic { depth, plan_focus } => {
                if let Some(sig) = ctx
                    .signals
                    .topic_depth
                    .as_ref()
                    .filter(|s| s.confidence >= ctx.config.thresholds.topic_depth)
                {
                    // Depth only deepens within one session.
                    if sig.depth > *depth {
                        *depth = sig.depth;
                    }
                    *plan_focus = *plan_focus || sig.plan_focus;
                }
            }
            SessionMeta::DeepDive { threads } => {
                if let Some(t) = ctx
                    .decision
                    .claimed
                    .as_ref()
                    .and_then(|c| c.target.as_ref())
                {
                    if !threads.iter().any(|existing| existing == t) {
                        threads.push(t.clone());
                    }
                }
            }
            _ => {}
        }

        session.touch(ctx.now);
        let phase = session.phase.clone();
        let topic = session.topic.clone();
        state.updated_at = ctx.now;

        TurnDirective::ContinueSession {
            kind: self.kind,
            phase,
            topic,
        }
    }
}

impl Handler for TalkHandler {
    fn target(&self) -> TargetHandler {
        self.kind.owner()
    }

    fn handle(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Result<TurnDirective> {
        let directive = if state.stack.get_of_kind(self.kind).is_none() {
            self.open(ctx, state)
        } else {
            self.advance(ctx, state)
        };
        Ok(directive)
    }
}
