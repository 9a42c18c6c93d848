//! Routing - per-turn target resolution
//!
//! `route` is a pure function from the current state plus this turn's signal
//! bundle to exactly one target handler, with a strict precedence ladder and
//! a mandatory audit record.

mod audit;
mod policy;

pub use audit::{ActiveSessionInfo, FilteredSignal, ReasonCode, RoutingAudit};
pub use policy::{route, QueueRequest, RoutingDecision};
