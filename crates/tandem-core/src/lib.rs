//! Tandem Core - conversation orchestration for a multi-turn companion agent
//!
//! This crate provides the state machinery between an external signal
//! classifier and an external language generator:
//! - Session stack with one session per kind and a single turn owner
//! - Bounded intent queue and deduplicating deferred-topic registry
//! - Single-slot pause/resume for safety interrupts
//! - Pure routing policy with a strict precedence ladder and audit record
//! - Per-kind TTL sweeper and a debounce/coalesce turn gate
//! - Async persistence with recency-merge saves

pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod routing;
pub mod signals;
pub mod state;
pub mod store;
pub mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BoundsConfig, DebounceConfig, OrchestratorConfig, ThresholdConfig, TtlConfig,
};
pub use debounce::TurnGate;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, TurnInput, TurnOutput};
pub use routing::{route, ReasonCode, RoutingAudit, RoutingDecision};
pub use signals::{
    Confirmation, FlowSignal, FlowSignals, IntentKind, IntentSignal, InterruptKind,
    InterruptSignal, SafetySignal, SafetyTier, SignalBundle, TopicDepth, TopicDepthSignal,
};
pub use state::{
    CloseOutcome, DeferOutcome, DeferredTopic, DeferredTopicRegistry, IntentQueue,
    OrchestratorState, PausedMachineState, QueuedIntent, Session, SessionKind, SessionMeta,
    SessionStack, SessionStatus,
};
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use sweep::{sweep, SweepReport};

// Handler surface
pub use handlers::{
    handler_for, DisambigOption, Handler, TargetHandler, TurnContext, TurnDirective,
};
