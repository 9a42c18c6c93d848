//! Turn gate - debounce and coalesce at the turn boundary
//!
//! Users send bursts: three short messages in two seconds are one thought,
//! not three turns. Each submission takes a ticket and waits out the
//! debounce window; a newer submission in the same scope supersedes the
//! ticket, and the survivor claims every pending message in the burst as one
//! coalesced input. A superseded turn surfaces as [`Error::Superseded`] and
//! must not mutate state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::DebounceConfig;
use crate::error::{Error, Result};

struct PendingMessage {
    text: String,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct ScopeState {
    /// Newest ticket issued for this scope
    current: u64,
    pending: Vec<PendingMessage>,
}

/// Per-scope debounce gate
///
/// One instance is shared by every turn of an orchestrator; scopes are
/// independent (different users never supersede each other). A scope's
/// entry exists only while a burst is in flight; claiming the turn retires
/// it. Tickets come from one process-wide counter and are never reused, so
/// a late settle against a retired scope cannot collide with a fresh one.
pub struct TurnGate {
    window: StdDuration,
    coalesce: Duration,
    next_ticket: AtomicU64,
    scopes: Mutex<HashMap<String, ScopeState>>,
}

impl TurnGate {
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            window: config.window(),
            coalesce: config.coalesce_window(),
            next_ticket: AtomicU64::new(0),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Register a message for its scope and take a ticket
    ///
    /// A message arriving after the coalesce window starts a fresh burst;
    /// within the window it joins the pending one.
    pub fn submit(&self, scope: &str, text: impl Into<String>, now: DateTime<Utc>) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let mut scopes = self.scopes.lock();
        let state = scopes.entry(scope.to_string()).or_default();
        if state
            .pending
            .last()
            .is_some_and(|last| now - last.at > self.coalesce)
        {
            debug!(scope, stale = state.pending.len(), "Dropping stale pending burst");
            state.pending.clear();
        }
        state.pending.push(PendingMessage {
            text: text.into(),
            at: now,
        });
        state.current = ticket;
        ticket
    }

    /// Wait out the debounce window, then claim the turn
    ///
    /// Returns the coalesced input when this ticket is still the newest for
    /// its scope, or [`Error::Superseded`] when a later message arrived
    /// during the wait.
    pub async fn settle(&self, scope: &str, ticket: u64) -> Result<String> {
        tokio::time::sleep(self.window).await;
        self.claim(scope, ticket)
    }

    fn claim(&self, scope: &str, ticket: u64) -> Result<String> {
        let mut scopes = self.scopes.lock();
        let current = match scopes.get(scope) {
            Some(state) => state.current,
            None => return Err(Error::Superseded),
        };
        if current != ticket {
            debug!(scope, ticket, newest = current, "Turn superseded");
            return Err(Error::Superseded);
        }
        // Claiming retires the scope entry; idle scopes hold no memory.
        let joined = scopes
            .remove(scope)
            .map(|state| {
                state
                    .pending
                    .into_iter()
                    .map(|m| m.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Ok(joined)
    }
}
