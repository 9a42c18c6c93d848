//! Deferred topic registry - raised-but-postponed intents
//!
//! Richer than the intent queue: topics dedup by normalized-label similarity,
//! repeated mentions enrich the existing entry instead of duplicating it,
//! and release is priority-ordered. The registry is bounded per kind and
//! globally, oldest evicted first, and proactive resurfacing can be paused
//! for a window after the user declines.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BoundsConfig;
use crate::state::session::SessionKind;

/// One summary entry, recorded each time the topic was mentioned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub text: String,
    pub at: DateTime<Utc>,
}

/// A user-raised subject that could not be handled immediately
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredTopic {
    pub id: String,
    pub kind: SessionKind,
    /// Human-readable label; the dedup key after normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// One entry per mention, oldest first
    pub summaries: Vec<TopicSummary>,
    /// How many times the topic has been raised
    pub triggers: u32,
    /// Priority tier used for release ordering; higher first
    pub priority: u8,
    pub created_at: DateTime<Utc>,
}

/// What `defer` did with the incoming mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferOutcome {
    /// A new topic entry was created
    Created(String),
    /// An existing near-duplicate was enriched instead
    Enriched(String),
}

impl DeferOutcome {
    pub fn topic_id(&self) -> &str {
        match self {
            DeferOutcome::Created(id) | DeferOutcome::Enriched(id) => id,
        }
    }
}

/// Lowercase and collapse everything that is not alphanumeric, so slightly
/// different phrasings of the same subject compare equal
fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_was_space = true;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Two labels match when equal or when one contains the other
fn labels_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_label(a), normalize_label(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// The bounded, deduplicating registry of deferred topics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeferredTopicRegistry {
    topics: Vec<DeferredTopic>,
    /// Proactive resurfacing is suppressed until this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_until: Option<DateTime<Utc>>,
}

impl DeferredTopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredTopic> {
        self.topics.iter()
    }

    pub fn get(&self, topic_id: &str) -> Option<&DeferredTopic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// Record a raised-but-postponed intent
    ///
    /// A near-duplicate active topic of the same kind (normalized-label
    /// containment) absorbs the mention as an enrichment; otherwise a new
    /// bounded entry is created, evicting the oldest entry of the kind (and
    /// then globally) when over cap.
    pub fn defer(
        &mut self,
        kind: SessionKind,
        target: Option<String>,
        summary: impl Into<String>,
        now: DateTime<Utc>,
        bounds: &BoundsConfig,
    ) -> DeferOutcome {
        let summary = summary.into();

        if let Some(existing) = self.topics.iter_mut().find(|t| {
            t.kind == kind
                && match (&t.target, &target) {
                    (Some(a), Some(b)) => labels_match(a, b),
                    (None, None) => true,
                    _ => false,
                }
        }) {
            existing.summaries.push(TopicSummary {
                text: summary,
                at: now,
            });
            existing.triggers += 1;
            debug!(kind = %kind, id = %existing.id, triggers = existing.triggers,
                "Enriched existing deferred topic");
            return DeferOutcome::Enriched(existing.id.clone());
        }

        let topic = DeferredTopic {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            target,
            summaries: vec![TopicSummary {
                text: summary,
                at: now,
            }],
            triggers: 1,
            priority: kind.priority_tier(),
            created_at: now,
        };
        let id = topic.id.clone();
        self.topics.push(topic);
        self.enforce_bounds(kind, bounds);
        DeferOutcome::Created(id)
    }

    /// Append a summary to an existing topic without altering identity;
    /// no-op when the topic is gone
    pub fn enrich(&mut self, topic_id: &str, summary: impl Into<String>, now: DateTime<Utc>) {
        if let Some(topic) = self.topics.iter_mut().find(|t| t.id == topic_id) {
            topic.summaries.push(TopicSummary {
                text: summary.into(),
                at: now,
            });
            topic.triggers += 1;
        }
    }

    /// Remove a topic; no-op when absent
    pub fn remove(&mut self, topic_id: &str) -> Option<DeferredTopic> {
        let pos = self.topics.iter().position(|t| t.id == topic_id)?;
        Some(self.topics.remove(pos))
    }

    /// The oldest remaining topic of the kind, used to chain to the next
    /// same-kind topic once the current one closes
    pub fn find_next_of_kind(&self, kind: SessionKind) -> Option<&DeferredTopic> {
        self.topics
            .iter()
            .filter(|t| t.kind == kind)
            .min_by_key(|t| t.created_at)
    }

    /// Suppress proactive resurfacing of every topic for the window
    pub fn pause_all(&mut self, duration: Duration, now: DateTime<Utc>) {
        self.paused_until = Some(now + duration);
    }

    /// Whether proactive resurfacing is currently suppressed
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.is_some_and(|until| now < until)
    }

    /// The topic that should resurface next: highest priority tier, oldest
    /// first within a tier. None while the registry is paused.
    pub fn next_to_resurface(&self, now: DateTime<Utc>) -> Option<&DeferredTopic> {
        if self.is_paused(now) {
            return None;
        }
        self.topics
            .iter()
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.created_at.cmp(&a.created_at))
            })
    }

    /// Drop topics older than the TTL and clear an expired pause window;
    /// returns how many topics were removed
    pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        if self.paused_until.is_some_and(|until| until <= now) {
            self.paused_until = None;
        }
        let before = self.topics.len();
        self.topics.retain(|t| now - t.created_at <= ttl);
        before - self.topics.len()
    }

    fn enforce_bounds(&mut self, kind: SessionKind, bounds: &BoundsConfig) {
        // Per-kind cap: evict the oldest of this kind first
        let kind_cap = bounds.deferred_kind_cap(kind);
        while self.topics.iter().filter(|t| t.kind == kind).count() > kind_cap {
            if let Some(pos) = self
                .topics
                .iter()
                .enumerate()
                .filter(|(_, t)| t.kind == kind)
                .min_by_key(|(_, t)| t.created_at)
                .map(|(i, _)| i)
            {
                let evicted = self.topics.remove(pos);
                debug!(kind = %kind, id = %evicted.id, "Evicted oldest deferred topic (kind cap)");
            }
        }
        // Global cap: evict the oldest overall
        while self.topics.len() > bounds.deferred_global_cap {
            if let Some(pos) = self
                .topics
                .iter()
                .enumerate()
                .min_by_key(|(_, t)| t.created_at)
                .map(|(i, _)| i)
            {
                let evicted = self.topics.remove(pos);
                debug!(id = %evicted.id, "Evicted oldest deferred topic (global cap)");
            }
        }
    }
}
