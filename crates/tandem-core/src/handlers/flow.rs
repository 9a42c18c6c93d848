//! Flow handler - tool-driven reminder and journal flows
//!
//! Both flows share one handler parameterized by kind: collect draft data,
//! move to a confirming phase, and resolve on the user's yes/no answer.
//! An unclear answer re-asks; the TTL sweep abandons flows nobody finishes.

use tracing::{debug, info};

use super::{Handler, TargetHandler, TurnContext, TurnDirective};
use crate::error::Result;
use crate::signals::Confirmation;
use crate::state::session::{ReminderDraft, Session, SessionKind, SessionMeta};
use crate::state::{CloseOutcome, OrchestratorState};

pub struct FlowHandler {
    kind: SessionKind,
}

impl FlowHandler {
    pub fn reminder() -> Self {
        Self {
            kind: SessionKind::ReminderFlow,
        }
    }

    pub fn journal() -> Self {
        Self {
            kind: SessionKind::JournalFlow,
        }
    }

    /// Start a fresh flow session seeded from the winning intent
    fn open(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let target = ctx
            .decision
            .claimed
            .as_ref()
            .and_then(|c| c.target.clone());

        let meta = match self.kind {
            SessionKind::ReminderFlow => SessionMeta::Reminder {
                draft: ReminderDraft {
                    what: target.clone(),
                    when: None,
                    confirmed: false,
                },
            },
            _ => SessionMeta::Journal {
                prompt: target.clone(),
                entry_lines: Vec::new(),
            },
        };

        let mut session = Session::new(self.kind, ctx.now).with_meta(meta);
        if let Some(ref t) = target {
            session = session
                .with_topic(t.clone())
                .with_resume_brief(format!("We were in the middle of \"{}\".", t));
        }
        session.touch(ctx.now);
        state.upsert_session(session, ctx.now);
        info!(kind = %self.kind, ?target, "Opened flow session");

        TurnDirective::OpenFlow {
            kind: self.kind,
            target,
        }
    }

    /// Resolve a pending confirmation from the tri-state answer
    fn resolve_confirmation(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> TurnDirective {
        let answer = ctx.signals.confirmation_for(self.kind);
        match answer {
            Confirmation::Yes => {
                let resolved = self.kind.resolved_phase().to_string();
                if let Some(session) = state.stack.get_of_kind_mut(self.kind) {
                    session.set_phase(&resolved);
                    session.touch(ctx.now);
                    if let SessionMeta::Reminder { draft } = &mut session.meta {
                        draft.confirmed = true;
                    }
                }
                let topic = state
                    .stack
                    .get_of_kind(self.kind)
                    .and_then(|s| s.topic.clone());
                state.close_session(self.kind, CloseOutcome::Completed, ctx.now);
                info!(kind = %self.kind, "Flow confirmed and completed");
                TurnDirective::ContinueSession {
                    kind: self.kind,
                    phase: resolved,
                    topic,
                }
            }
            Confirmation::No => {
                state.close_session(self.kind, CloseOutcome::Abandoned, ctx.now);
                info!(kind = %self.kind, "Flow declined, closing");
                TurnDirective::SmallTalk
            }
            Confirmation::Unclear | Confirmation::None => {
                // Stay in the confirming phase and ask again.
                if let Some(session) = state.stack.get_of_kind_mut(self.kind) {
                    session.touch(ctx.now);
                }
                state.updated_at = ctx.now;
                self.continue_directive(state)
            }
        }
    }

    /// Advance the collecting phases of an open flow
    fn advance(&self, ctx: &TurnContext<'_>, state: &mut OrchestratorState) -> TurnDirective {
        let Some(session) = state.stack.get_of_kind_mut(self.kind) else {
            return self.open(ctx, state);
        };

        // Fold new classifier hints into the draft.
        let block = match self.kind {
            SessionKind::ReminderFlow => &ctx.signals.flows.reminder,
            _ => &ctx.signals.flows.journal,
        };
        match &mut session.meta {
            SessionMeta::Reminder { draft } => {
                if draft.what.is_none() {
                    draft.what = block.target.clone();
                }
                if draft.when.is_none() {
                    draft.when = block.hint.clone();
                }
                let complete = draft.what.is_some() && draft.when.is_some();
                if complete && session.phase == "collecting" {
                    session.set_phase("confirming");
                    debug!("Reminder draft complete, moving to confirmation");
                }
            }
            SessionMeta::Journal { entry_lines, .. } => {
                if !ctx.message.is_empty() {
                    entry_lines.push(ctx.message.to_string());
                }
                match session.phase.as_str() {
                    "prompting" => session.set_phase("capturing"),
                    "capturing" if entry_lines.len() >= 3 => session.set_phase("confirming"),
                    _ => {}
                }
            }
            _ => {}
        }
        session.touch(ctx.now);
        state.updated_at = ctx.now;
        self.continue_directive(state)
    }

    fn continue_directive(&self, state: &OrchestratorState) -> TurnDirective {
        match state.stack.get_of_kind(self.kind) {
            Some(session) => TurnDirective::ContinueSession {
                kind: self.kind,
                phase: session.phase.clone(),
                topic: session.topic.clone(),
            },
            None => TurnDirective::SmallTalk,
        }
    }
}

impl Handler for FlowHandler {
    fn target(&self) -> TargetHandler {
        self.kind.owner()
    }

    fn handle(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Result<TurnDirective> {
        let existing = state.stack.get_of_kind(self.kind);
        let directive = match existing {
            None => self.open(ctx, state),
            Some(session) if session.awaiting_confirmation() => {
                self.resolve_confirmation(ctx, state)
            }
            Some(_) => self.advance(ctx, state),
        };
        Ok(directive)
    }
}
