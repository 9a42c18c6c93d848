//! Configuration for the orchestration core
//!
//! Every knob the core consults lives here: time-to-live windows, structure
//! bounds, signal confidence thresholds, and the debounce window. All fields
//! carry serde defaults so a partial TOML file parses, and unknown keys are
//! ignored (forward compatible by additive fields).

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::session::SessionKind;

/// Main orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Time-to-live windows
    pub ttl: TtlConfig,
    /// Bounds for queues and registries
    pub bounds: BoundsConfig,
    /// Confidence thresholds for signal gating
    pub thresholds: ThresholdConfig,
    /// Turn-boundary debounce settings
    pub debounce: DebounceConfig,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("serialize config: {}", e)))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Time-to-live windows, in minutes unless noted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Short-lived tool flows
    pub reminder_flow_mins: i64,
    pub journal_flow_mins: i64,
    /// Topic discussions
    pub topic_talk_mins: i64,
    /// Deep exploratory dialogues
    pub deep_dive_mins: i64,
    /// Safety flows
    pub safety_crisis_mins: i64,
    pub safety_concern_mins: i64,
    /// Profile confirmation prompts
    pub profile_confirm_mins: i64,
    /// Queued intents
    pub queued_intent_mins: i64,
    /// The paused-session slot
    pub paused_slot_mins: i64,
    /// Deferred topics (hours)
    pub deferred_topic_hours: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            reminder_flow_mins: 10,
            journal_flow_mins: 15,
            topic_talk_mins: 30,
            deep_dive_mins: 120,
            safety_crisis_mins: 30,
            safety_concern_mins: 20,
            profile_confirm_mins: 10,
            queued_intent_mins: 120,
            paused_slot_mins: 30,
            deferred_topic_hours: 72,
        }
    }
}

impl TtlConfig {
    /// TTL for a session of the given kind
    pub fn session_ttl(&self, kind: SessionKind) -> Duration {
        let mins = match kind {
            SessionKind::ReminderFlow => self.reminder_flow_mins,
            SessionKind::JournalFlow => self.journal_flow_mins,
            SessionKind::TopicTalk => self.topic_talk_mins,
            SessionKind::DeepDive => self.deep_dive_mins,
            SessionKind::SafetyCrisis => self.safety_crisis_mins,
            SessionKind::SafetyConcern => self.safety_concern_mins,
            SessionKind::ProfileConfirm => self.profile_confirm_mins,
        };
        Duration::minutes(mins)
    }

    pub fn queued_intent_ttl(&self) -> Duration {
        Duration::minutes(self.queued_intent_mins)
    }

    pub fn paused_slot_ttl(&self) -> Duration {
        Duration::minutes(self.paused_slot_mins)
    }

    pub fn deferred_topic_ttl(&self) -> Duration {
        Duration::hours(self.deferred_topic_hours)
    }
}

/// Bounds for the queue and the deferred-topic registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Most recent intents kept in the queue
    pub intent_queue_cap: usize,
    /// Global cap across all deferred topics
    pub deferred_global_cap: usize,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            intent_queue_cap: 6,
            deferred_global_cap: 8,
        }
    }
}

impl BoundsConfig {
    /// Per-kind cap for deferred topics
    pub fn deferred_kind_cap(&self, kind: SessionKind) -> usize {
        match kind {
            SessionKind::TopicTalk => 4,
            SessionKind::DeepDive | SessionKind::ReminderFlow | SessionKind::JournalFlow => 2,
            SessionKind::ProfileConfirm => 2,
            // Safety work is never deferred, but keep the table total
            SessionKind::SafetyCrisis | SessionKind::SafetyConcern => 1,
        }
    }
}

/// Confidence thresholds for gating untrusted classifier output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub safety: f32,
    pub primary_intent: f32,
    pub interrupt: f32,
    pub topic_depth: f32,
    pub flow_intent: f32,
    /// Minutes during which the same safety escalation will not fire twice
    pub safety_cooldown_mins: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            safety: 0.7,
            primary_intent: 0.65,
            interrupt: 0.6,
            topic_depth: 0.6,
            flow_intent: 0.75,
            safety_cooldown_mins: 10,
        }
    }
}

impl ThresholdConfig {
    pub fn safety_cooldown(&self) -> Duration {
        Duration::minutes(self.safety_cooldown_mins)
    }
}

/// Debounce/merge discipline at the turn boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// How long to wait before checking whether this message is still the
    /// most recent one
    pub window_ms: u64,
    /// Messages arriving within this trailing window are coalesced into one
    /// effective input
    pub coalesce_ms: u64,
    /// How long `pause_all` suppresses deferred-topic resurfacing after the
    /// user declines a resume (minutes)
    pub decline_pause_mins: i64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: 800,
            coalesce_ms: 2_000,
            decline_pause_mins: 30,
        }
    }
}

impl DebounceConfig {
    pub fn window(&self) -> StdDuration {
        StdDuration::from_millis(self.window_ms)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::milliseconds(self.coalesce_ms as i64)
    }

    pub fn decline_pause(&self) -> Duration {
        Duration::minutes(self.decline_pause_mins)
    }
}
