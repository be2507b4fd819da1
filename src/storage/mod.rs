//! Persistent state for the decision engine.
//!
//! The engine only needs key-based get/upsert/increment semantics: one
//! battery row per (profile, channel), one trait row per (profile, name),
//! one interest row per (profile, keyword), and an append-only conversation
//! log. No multi-row transactional guarantees are required.
//!
//! [`SqliteStateStore`] is the durable implementation;
//! [`MemoryStateStore`] backs tests and ephemeral deployments.

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Rate-limiter state for one (profile, channel) pair.
///
/// Created lazily on the first recorded message; survives restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialBatteryState {
    pub profile_id: String,
    pub channel_id: String,
    /// Messages sent in the current window. Monotonic within a window;
    /// reset to 1 when a window expires.
    pub message_count: u32,
    /// Start of the current rate window. `None` only for legacy rows.
    pub window_start: Option<DateTime<Utc>>,
    /// Instant of the most recent sent message.
    pub last_message_at: Option<DateTime<Utc>>,
}

/// An evolvable personality trait as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrait {
    pub name: String,
    /// Always within `[0, 1]`; reachable only through clamped updates.
    pub value: f64,
    pub change_reason: String,
    pub changed_at: DateTime<Utc>,
}

/// A weighted interest keyword as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestKeyword {
    pub keyword: String,
    pub category: Option<String>,
    /// Always within `[0.1, 2.0]`.
    pub weight: f64,
}

/// One logged exchange (user message + persona response) in a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub profile_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub user_message: String,
    pub bot_response: String,
    pub created_at: DateTime<Utc>,
}

/// Key-based persistence boundary.
///
/// Implementations must be safe to call from multiple channels' handler
/// tasks concurrently; per-row last-write-wins is acceptable.
pub trait StateStore: Send + Sync {
    // ---- Social battery ----

    /// Fetch battery state, `None` if the pair has never spoken.
    fn battery_state(
        &self,
        profile_id: &str,
        channel_id: &str,
    ) -> Result<Option<SocialBatteryState>, StoreError>;

    /// Insert or replace battery state for its (profile, channel) key.
    fn upsert_battery_state(&self, state: &SocialBatteryState) -> Result<(), StoreError>;

    /// Delete battery state for one channel.
    fn delete_battery_state(&self, profile_id: &str, channel_id: &str) -> Result<(), StoreError>;

    /// Delete battery state for every channel of a profile.
    fn delete_battery_states_for_profile(&self, profile_id: &str) -> Result<(), StoreError>;

    // ---- Personality traits ----

    /// Fetch one trait, `None` if it was never initialized.
    fn trait_row(&self, profile_id: &str, name: &str) -> Result<Option<StoredTrait>, StoreError>;

    /// All traits for a profile, ordered by name.
    fn traits(&self, profile_id: &str) -> Result<Vec<StoredTrait>, StoreError>;

    /// Insert or replace a trait row.
    fn upsert_trait(&self, profile_id: &str, row: &StoredTrait) -> Result<(), StoreError>;

    /// Remove every trait row for a profile.
    fn clear_traits(&self, profile_id: &str) -> Result<(), StoreError>;

    // ---- Interest keywords ----

    /// All interest keywords for a profile, ordered by keyword.
    fn interests(&self, profile_id: &str) -> Result<Vec<InterestKeyword>, StoreError>;

    /// Insert or replace an interest row keyed by (profile, keyword).
    fn upsert_interest(&self, profile_id: &str, row: &InterestKeyword) -> Result<(), StoreError>;

    /// Remove one interest keyword. Returns whether a row existed.
    fn remove_interest(&self, profile_id: &str, keyword: &str) -> Result<bool, StoreError>;

    /// Remove every interest row for a profile.
    fn clear_interests(&self, profile_id: &str) -> Result<(), StoreError>;

    // ---- Conversation log ----

    /// Append one exchange to the log.
    fn append_conversation(&self, row: &ConversationRow) -> Result<(), StoreError>;

    /// Most recent exchanges for a channel, oldest first, at most `limit`.
    fn recent_conversation(
        &self,
        profile_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRow>, StoreError>;
}
