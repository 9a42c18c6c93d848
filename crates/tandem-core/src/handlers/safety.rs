//! Safety handler - crisis and concern interventions
//!
//! A safety escalation evicts whatever work is in progress into the paused
//! slot and opens a safety session of the matching tier. The session then
//! owns every turn until its phase machine reaches its closing phase; the
//! interrupted work is offered back by the neutral handler afterwards.

use tracing::{info, warn};

use super::{Handler, TargetHandler, TurnContext, TurnDirective};
use crate::error::Result;
use crate::routing::ReasonCode;
use crate::signals::{InterruptKind, SafetyTier};
use crate::state::session::{Session, SessionMeta};
use crate::state::{CloseOutcome, OrchestratorState};

pub struct SafetyHandler;

impl SafetyHandler {
    /// Open a fresh safety session, evicting active non-safety work first
    fn escalate(
        &self,
        tier: SafetyTier,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> TurnDirective {
        // Evict in-progress work into the single paused slot so it can be
        // offered back once the intervention resolves.
        if let Some(active) = state.stack.active().filter(|s| !s.kind.is_safety()) {
            let kind = active.kind;
            info!(evicted = %kind, tier = ?tier, "Safety interrupt pausing active session");
            state.pause_session(kind, tier, ctx.now);
        }

        let kind = tier.session_kind();
        let mut session = Session::new(kind, ctx.now).with_meta(SessionMeta::Safety {
            tier,
            acknowledged: false,
        });
        session.touch(ctx.now);
        let phase = session.phase.clone();
        state.upsert_session(session, ctx.now);
        state.record_safety_fire(ctx.now);

        TurnDirective::SafetyIntervene { tier, phase }
    }

    /// Advance an open safety session one step
    fn continue_session(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> TurnDirective {
        let Some(active) = state.stack.active_mut().filter(|s| s.kind.is_safety()) else {
            // Router said a safety session owns the turn but none is on top;
            // treat as a fresh concern rather than failing the turn.
            warn!("Safety turn without an open safety session; opening a concern check-in");
            return self.escalate(SafetyTier::Concern, ctx, state);
        };

        let tier = match active.meta {
            SessionMeta::Safety { tier, .. } => tier,
            _ => SafetyTier::Concern,
        };

        // A renewed crisis-tier signal upgrades an open concern session.
        if let Some(sig) = ctx.signals.safety_above(&ctx.config.thresholds) {
            if sig.tier == SafetyTier::Crisis && tier == SafetyTier::Concern {
                info!("Upgrading safety concern session to crisis tier");
                state.close_session(tier.session_kind(), CloseOutcome::Abandoned, ctx.now);
                return self.escalate(SafetyTier::Crisis, ctx, state);
            }
        }

        // Phase machine: first phase -> middle phase every turn; the middle
        // phase holds while risk signals persist and closes once they stop.
        let kind = active.kind;
        let phases = kind.valid_phases();
        let risk_persisting = ctx.signals.safety_above(&ctx.config.thresholds).is_some();
        let explicit_stop = ctx
            .signals
            .interrupt_above(&ctx.config.thresholds)
            .is_some_and(|i| i.kind == InterruptKind::Stop);

        let next = if active.phase == phases[0] {
            phases[1]
        } else if explicit_stop || !risk_persisting {
            kind.resolved_phase()
        } else {
            phases[1]
        };
        active.set_phase(next);
        active.touch(ctx.now);
        let phase = active.phase.clone();
        state.updated_at = ctx.now;

        if phase == kind.resolved_phase() {
            info!(kind = %kind, "Safety session resolved");
            state.close_session(kind, CloseOutcome::Completed, ctx.now);
        }

        TurnDirective::SafetyIntervene { tier, phase }
    }
}

impl Handler for SafetyHandler {
    fn target(&self) -> TargetHandler {
        TargetHandler::Safety
    }

    fn handle(
        &self,
        ctx: &TurnContext<'_>,
        state: &mut OrchestratorState,
    ) -> Result<TurnDirective> {
        let directive = match (ctx.decision.reason, ctx.decision.escalation) {
            (ReasonCode::SafetyEscalation, Some(tier)) => self.escalate(tier, ctx, state),
            _ => self.continue_session(ctx, state),
        };
        Ok(directive)
    }
}
