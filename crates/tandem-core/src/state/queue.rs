//! Intent queue - deferred "switch to handler X later" markers
//!
//! A small bounded FIFO of non-urgent mode switches that lost priority this
//! turn. Entries dedup by reason string, the queue keeps only the most
//! recent entries, and the sweeper expires entries after a fixed window.
//!
//! Independent subsystems share the queue: `prune_managed` removes only the
//! entries whose reason belongs to the caller's managed family, leaving
//! externally-owned entries untouched.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handlers::TargetHandler;

/// A deferred request to hand a later turn to a specific handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedIntent {
    pub id: String,
    pub handler: TargetHandler,
    pub queued_at: DateTime<Utc>,
    /// Free-text reason; doubles as the dedup key
    pub reason: String,
    /// Short excerpt of the message that raised the intent
    #[serde(default)]
    pub excerpt: String,
}

/// Bounded FIFO of queued intents
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct IntentQueue {
    entries: Vec<QueuedIntent>,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedIntent> {
        self.entries.iter()
    }

    /// Append an intent unless one with the same reason already exists,
    /// then truncate to the most recent `cap` entries
    pub fn enqueue(
        &mut self,
        handler: TargetHandler,
        reason: impl Into<String>,
        excerpt: impl Into<String>,
        now: DateTime<Utc>,
        cap: usize,
    ) {
        let reason = reason.into();
        if self.entries.iter().any(|e| e.reason == reason) {
            debug!(%reason, "Intent already queued, skipping");
            return;
        }
        self.entries.push(QueuedIntent {
            id: uuid::Uuid::new_v4().to_string(),
            handler,
            queued_at: now,
            reason,
            excerpt: excerpt.into(),
        });
        if self.entries.len() > cap {
            let overflow = self.entries.len() - cap;
            self.entries.drain(..overflow);
        }
    }

    /// Pop the oldest entry
    pub fn dequeue(&mut self) -> Option<QueuedIntent> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Remove only entries whose reason belongs to the caller-declared
    /// managed family; externally-owned entries survive
    pub fn prune_managed(&mut self, managed_reasons: &[&str]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !managed_reasons.contains(&e.reason.as_str()));
        before - self.entries.len()
    }

    /// Drop entries older than the TTL; returns how many were removed
    pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| now - e.queued_at <= ttl);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 6;

    #[test]
    fn test_enqueue_dedups_by_reason() {
        let mut queue = IntentQueue::new();
        let now = Utc::now();
        queue.enqueue(TargetHandler::TopicTalk, "raised mid-flow", "a", now, CAP);
        queue.enqueue(TargetHandler::TopicTalk, "raised mid-flow", "b", now, CAP);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().excerpt, "a");
    }

    #[test]
    fn test_queue_bounded_to_cap() {
        let mut queue = IntentQueue::new();
        let now = Utc::now();
        for i in 0..10 {
            queue.enqueue(
                TargetHandler::Neutral,
                format!("reason-{}", i),
                "",
                now,
                CAP,
            );
        }
        assert_eq!(queue.len(), CAP);
        // Oldest entries were evicted
        assert_eq!(queue.iter().next().unwrap().reason, "reason-4");
    }

    #[test]
    fn test_prune_managed_leaves_foreign_entries() {
        let mut queue = IntentQueue::new();
        let now = Utc::now();
        queue.enqueue(TargetHandler::DeepDive, "deep_dive_followup", "", now, CAP);
        queue.enqueue(TargetHandler::Neutral, "external_subsystem", "", now, CAP);
        let removed = queue.prune_managed(&["deep_dive_followup"]);
        assert_eq!(removed, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().reason, "external_subsystem");
    }

    #[test]
    fn test_sweep_expires_old_entries() {
        let mut queue = IntentQueue::new();
        let now = Utc::now();
        queue.enqueue(
            TargetHandler::TopicTalk,
            "old",
            "",
            now - Duration::hours(3),
            CAP,
        );
        queue.enqueue(TargetHandler::TopicTalk, "new", "", now, CAP);
        let removed = queue.sweep(now, Duration::hours(2));
        assert_eq!(removed, 1);
        assert_eq!(queue.iter().next().unwrap().reason, "new");
    }
}
