//! Persona profile configuration.
//!
//! A profile is the static description of one persona: its identity, system
//! prompt, seed traits, interest keywords, pattern triggers, and social
//! battery limits. Profiles are loaded once from YAML at startup and are
//! immutable for the process lifetime; all evolving state (traits, weights,
//! battery counters) lives in the state store, seeded from the profile.

use serde::{Deserialize, Serialize};

use crate::conditions::TriggerCondition;
use crate::errors::EngineError;
use crate::message::BotIdentity;

// ============================================================================
// PersonaProfile
// ============================================================================

/// Static configuration for one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Stable identifier, used as the key for all persisted state.
    pub id: String,
    pub display_name: String,
    /// Identity the gateway renders outbound messages under.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Base system prompt handed to the completion backend.
    #[serde(default)]
    pub system_prompt: String,
    /// Seed traits, written to the store on first initialization only.
    #[serde(default)]
    pub traits: Vec<TraitSpec>,
    /// Interest keywords, `"category:keyword"` or a bare keyword.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Pattern triggers, evaluated in declaration order.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub social_battery: BatteryConfig,
    /// Ignore messages authored by other bots.
    #[serde(default = "default_true")]
    pub ignore_bots: bool,
}

impl PersonaProfile {
    /// Parse a profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse a profile from a YAML file on disk.
    pub fn from_yaml_file(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("profile file '{path}': {e}")))?;
        Self::from_yaml(&content)
            .map_err(|e| EngineError::Config(format!("profile file '{path}': {e}")))
    }

    pub fn identity(&self) -> BotIdentity {
        BotIdentity {
            bot_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

// ============================================================================
// TriggerSpec
// ============================================================================

/// One configured pattern trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub name: String,
    /// Condition tree that must match for the trigger to fire. Serialized
    /// as single-key maps (`contains_word: hello`) rather than YAML tags.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub conditions: TriggerCondition,
    /// Delegate response text to the completion backend.
    #[serde(default)]
    pub use_llm: bool,
    /// Independent probability that a matched trigger actually fires.
    /// `None` means always.
    #[serde(default)]
    pub response_chance: Option<f64>,
    /// Canned response pool, drawn from uniformly when `use_llm` is false.
    #[serde(default)]
    pub responses: Option<Vec<String>>,
}

/// Seed value for an evolvable trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitSpec {
    pub name: String,
    /// Starting value in `[0, 1]`; clamped on initialization.
    #[serde(default = "default_trait_value")]
    pub value: f64,
}

// ============================================================================
// BatteryConfig
// ============================================================================

/// Rate-limit configuration for one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Messages allowed per rolling window.
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Rolling window length, minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Minimum quiet time after each sent message, seconds.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: i64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            window_minutes: default_window_minutes(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_trait_value() -> f64 {
    0.5
}

fn default_max_messages() -> u32 {
    10
}

fn default_window_minutes() -> i64 {
    60
}

fn default_cooldown_seconds() -> i64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
id: cova
display_name: CovaBot
system_prompt: "You are Cova."
traits:
  - name: sarcasm_level
    value: 0.7
  - name: technical_bias
interests:
  - "tech:typescript"
  - "tech:react"
  - gaming
triggers:
  - name: greeting
    conditions:
      contains_word: hello
    responses:
      - "hey"
      - "hi there"
  - name: summon
    conditions:
      matches_pattern: '\bcova\b'
    use_llm: true
    response_chance: 0.8
social_battery:
  max_messages: 5
  window_minutes: 30
  cooldown_seconds: 10
"#
    }

    #[test]
    fn test_parse_full_profile() {
        let profile = PersonaProfile::from_yaml(sample_yaml()).unwrap();
        assert_eq!(profile.id, "cova");
        assert_eq!(profile.traits.len(), 2);
        assert_eq!(profile.traits[0].value, 0.7);
        assert_eq!(profile.traits[1].value, 0.5); // default
        assert_eq!(profile.interests.len(), 3);
        assert_eq!(profile.triggers.len(), 2);
        assert!(!profile.triggers[0].use_llm);
        assert_eq!(profile.triggers[1].response_chance, Some(0.8));
        assert_eq!(profile.social_battery.max_messages, 5);
        assert!(profile.ignore_bots);
    }

    #[test]
    fn test_minimal_profile_gets_defaults() {
        let profile = PersonaProfile::from_yaml("id: p\ndisplay_name: P\n").unwrap();
        assert!(profile.triggers.is_empty());
        assert!(profile.interests.is_empty());
        assert_eq!(profile.social_battery.max_messages, 10);
        assert_eq!(profile.social_battery.window_minutes, 60);
        assert_eq!(profile.social_battery.cooldown_seconds, 30);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        assert!(PersonaProfile::from_yaml("display_name: P\n").is_err());
    }

    #[test]
    fn test_identity_carries_display_name() {
        let profile = PersonaProfile::from_yaml(sample_yaml()).unwrap();
        let identity = profile.identity();
        assert_eq!(identity.bot_name, "CovaBot");
        assert!(identity.avatar_url.is_none());
    }
}
