//! Social battery: per (persona, channel) rate limiting.
//!
//! Two independent limits: a rolling window bounding how many messages the
//! persona may send per channel, and a short cooldown after each sent
//! message. State is persisted so limits survive restarts. `can_speak` is
//! read-only; only `record_message` mutates state.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::errors::EngineError;
use crate::profile::BatteryConfig;
use crate::storage::{SocialBatteryState, StateStore};

/// Why a `can_speak` check resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryReason {
    Ok,
    Cooldown,
    RateLimited,
}

/// Result of a `can_speak` check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryCheck {
    pub can_speak: bool,
    /// Messages already sent in the current window.
    pub current_count: u32,
    pub max_allowed: u32,
    pub reason: BatteryReason,
    /// Seconds until the block lifts, when blocked.
    pub window_reset_seconds: Option<i64>,
}

impl BatteryCheck {
    fn allowed(current_count: u32, max_allowed: u32) -> Self {
        Self {
            can_speak: true,
            current_count,
            max_allowed,
            reason: BatteryReason::Ok,
            window_reset_seconds: None,
        }
    }
}

/// Rate limiter over the persisted [`SocialBatteryState`] rows.
pub struct SocialBattery {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl SocialBattery {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check whether the persona may speak in the channel right now.
    ///
    /// Read-only and idempotent: repeated calls without an intervening
    /// [`record_message`](Self::record_message) return the same result.
    pub fn can_speak(
        &self,
        profile_id: &str,
        channel_id: &str,
        config: &BatteryConfig,
    ) -> Result<BatteryCheck, EngineError> {
        let now = self.clock.now();
        let state = match self.store.battery_state(profile_id, channel_id)? {
            Some(state) => state,
            // Never spoken here.
            None => return Ok(BatteryCheck::allowed(0, config.max_messages)),
        };

        if let Some(last) = state.last_message_at {
            let since_last = now - last;
            if since_last < Duration::seconds(config.cooldown_seconds) {
                let remaining = config.cooldown_seconds - since_last.num_seconds();
                log::debug!(
                    "battery: {}/{} in cooldown, {}s remaining",
                    profile_id,
                    channel_id,
                    remaining
                );
                return Ok(BatteryCheck {
                    can_speak: false,
                    current_count: state.message_count,
                    max_allowed: config.max_messages,
                    reason: BatteryReason::Cooldown,
                    window_reset_seconds: Some(remaining),
                });
            }
        }

        if let Some(window_start) = state.window_start {
            let in_window = now - window_start;
            if in_window >= Duration::minutes(config.window_minutes) {
                // Window expired; the persisted reset happens on record_message.
                return Ok(BatteryCheck::allowed(0, config.max_messages));
            }
            if state.message_count >= config.max_messages {
                let remaining = config.window_minutes * 60 - in_window.num_seconds();
                log::debug!(
                    "battery: {}/{} rate limited at {}/{}",
                    profile_id,
                    channel_id,
                    state.message_count,
                    config.max_messages
                );
                return Ok(BatteryCheck {
                    can_speak: false,
                    current_count: state.message_count,
                    max_allowed: config.max_messages,
                    reason: BatteryReason::RateLimited,
                    window_reset_seconds: Some(remaining.max(0)),
                });
            }
        }

        Ok(BatteryCheck::allowed(state.message_count, config.max_messages))
    }

    /// Record one sent message, creating or rolling the window as needed.
    pub fn record_message(
        &self,
        profile_id: &str,
        channel_id: &str,
        config: &BatteryConfig,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        let next = match self.store.battery_state(profile_id, channel_id)? {
            None => SocialBatteryState {
                profile_id: profile_id.to_string(),
                channel_id: channel_id.to_string(),
                message_count: 1,
                window_start: Some(now),
                last_message_at: Some(now),
            },
            Some(mut state) => {
                let window_expired = state
                    .window_start
                    .map(|start| now - start >= Duration::minutes(config.window_minutes))
                    .unwrap_or(true);
                if window_expired {
                    state.message_count = 1;
                    state.window_start = Some(now);
                } else {
                    state.message_count += 1;
                }
                state.last_message_at = Some(now);
                state
            }
        };
        log::debug!(
            "battery: {}/{} now at {} message(s) this window",
            profile_id,
            channel_id,
            next.message_count
        );
        self.store.upsert_battery_state(&next)?;
        Ok(())
    }

    /// Current persisted state, if any. Admin introspection.
    pub fn state(
        &self,
        profile_id: &str,
        channel_id: &str,
    ) -> Result<Option<SocialBatteryState>, EngineError> {
        Ok(self.store.battery_state(profile_id, channel_id)?)
    }

    /// Drop the battery state for one channel.
    pub fn reset_channel(&self, profile_id: &str, channel_id: &str) -> Result<(), EngineError> {
        log::info!("battery: resetting {}/{}", profile_id, channel_id);
        Ok(self.store.delete_battery_state(profile_id, channel_id)?)
    }

    /// Drop the battery state for every channel of a persona.
    pub fn reset_profile(&self, profile_id: &str) -> Result<(), EngineError> {
        log::info!("battery: resetting all channels for {}", profile_id);
        Ok(self.store.delete_battery_states_for_profile(profile_id)?)
    }
}
