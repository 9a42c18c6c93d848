//! Orchestrator - the per-turn pipeline
//!
//! One call per user message: gate (debounce/coalesce), load, sweep, route,
//! apply the router's deferred side effects, run the owning handler, then
//! save behind a recency merge. The orchestrator owns the only
//! read-modify-write cycle against the store; handlers only ever see the
//! in-memory state for their turn.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::OrchestratorConfig;
use crate::debounce::TurnGate;
use crate::error::Result;
use crate::handlers::{handler_for, TargetHandler, TurnContext, TurnDirective};
use crate::routing::{route, ActiveSessionInfo, RoutingAudit};
use crate::signals::SignalBundle;
use crate::state::OrchestratorState;
use crate::store::StateStore;
use crate::sweep::{sweep, SweepReport};

/// Longest excerpt of the user message kept in queue/registry entries
const EXCERPT_LEN: usize = 120;

fn excerpt(message: &str) -> String {
    let trimmed = message.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// One incoming user message
#[derive(Debug, Clone)]
pub struct TurnInput {
    /// Persistence scope, e.g. a user id
    pub scope: String,
    pub message: String,
    /// Classifier output for this message
    pub signals: SignalBundle,
}

/// The outcome of one settled turn
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub target: TargetHandler,
    pub directive: TurnDirective,
    pub audit: RoutingAudit,
    pub sweep: SweepReport,
}

/// The turn pipeline, generic over persistence and time
pub struct Orchestrator<S, C = SystemClock> {
    store: S,
    clock: C,
    config: OrchestratorConfig,
    gate: TurnGate,
}

impl<S: StateStore> Orchestrator<S> {
    pub fn new(store: S, config: OrchestratorConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: StateStore, C: Clock> Orchestrator<S, C> {
    pub fn with_clock(store: S, config: OrchestratorConfig, clock: C) -> Self {
        let gate = TurnGate::new(&config.debounce);
        Self {
            store,
            clock,
            config,
            gate,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Direct access to the backing store, for inspection tooling
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one full turn for an incoming message
    ///
    /// Returns [`crate::Error::Superseded`] when a newer message for the
    /// same scope arrived during the debounce window; a superseded turn
    /// reads and writes nothing.
    pub async fn turn(&self, input: TurnInput) -> Result<TurnOutput> {
        let ticket = self
            .gate
            .submit(&input.scope, &input.message, self.clock.now());
        let message = self.gate.settle(&input.scope, ticket).await?;
        let now = self.clock.now();

        let mut state = self.store.load(&input.scope).await?.unwrap_or_default();
        let sweep_report = sweep(&mut state, &self.config.ttl, now);
        if sweep_report.removed_anything() {
            debug!(scope = %input.scope, ?sweep_report, "Sweep pruned stale state");
        }

        let decision = route(&input.signals, &state, &self.config, now);
        self.apply_decision(&decision, &message, &mut state, now);

        let ctx = TurnContext {
            message: &message,
            signals: &input.signals,
            decision: &decision,
            config: &self.config,
            now,
        };
        let directive = handler_for(decision.target).handle(&ctx, &mut state)?;

        let mut audit = decision.audit.clone();
        audit.active_after = state.stack.active().map(|s| ActiveSessionInfo {
            kind: s.kind,
            phase: s.phase.clone(),
        });
        info!(
            scope = %input.scope,
            target = %audit.target,
            reason = ?audit.reason,
            honored = audit.honored.len(),
            filtered = audit.filtered.len(),
            "Turn routed"
        );

        self.persist(&input.scope, state).await?;
        Ok(TurnOutput {
            target: decision.target,
            directive,
            audit,
            sweep: sweep_report,
        })
    }

    /// Apply the side effects the pure router asked for
    fn apply_decision(
        &self,
        decision: &crate::routing::RoutingDecision,
        message: &str,
        state: &mut OrchestratorState,
        now: DateTime<Utc>,
    ) {
        for candidate in &decision.defer {
            state.deferred.defer(
                candidate.kind,
                candidate.target.clone(),
                excerpt(message),
                now,
                &self.config.bounds,
            );
            state.updated_at = now;
        }
        if let Some(request) = &decision.queue_intent {
            state.queue.enqueue(
                request.handler,
                &request.reason,
                excerpt(message),
                now,
                self.config.bounds.intent_queue_cap,
            );
            state.updated_at = now;
        }
    }

    /// Save behind a recency merge so a slow turn cannot roll back a newer
    /// persisted state
    async fn persist(&self, scope: &str, state: OrchestratorState) -> Result<()> {
        let stored = self.store.load(scope).await?.unwrap_or_default();
        let merged = state.merge_newer(stored);
        self.store.save(scope, &merged).await
    }
}
