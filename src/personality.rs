//! Evolvable personality traits.
//!
//! Traits are bounded values in `[0, 1]` seeded from the profile and nudged
//! over time by cheap heuristics on conversation content. Every write path
//! clamps; non-finite input is rejected before any mutation, so a stored
//! value can never leave its range.

use std::sync::Arc;

use crate::clock::Clock;
use crate::errors::EngineError;
use crate::profile::PersonaProfile;
use crate::storage::{StateStore, StoredTrait};

const TECHNICAL_KEYWORDS: &[&str] = &[
    "code", "bug", "api", "database", "deploy", "server", "function", "compile", "typescript",
    "javascript", "rust", "refactor", "framework",
];

const SARCASTIC_PHRASES: &[&str] = &[
    "oh great",
    "sure thing",
    "how original",
    "obviously",
    "shocking",
    "what a surprise",
];

const SINCERE_PHRASES: &[&str] = &[
    "thank you",
    "thanks",
    "i appreciate",
    "that helped",
    "great job",
    "well done",
];

/// Evolvable trait values for personas, backed by the state store.
pub struct PersonalityTraits {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl PersonalityTraits {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Seed traits from the profile if the persona has none persisted yet.
    pub fn initialize(&self, profile: &PersonaProfile) -> Result<(), EngineError> {
        if !self.store.traits(&profile.id)?.is_empty() {
            return Ok(());
        }
        for spec in &profile.traits {
            self.store.upsert_trait(
                &profile.id,
                &StoredTrait {
                    name: spec.name.clone(),
                    value: spec.value.clamp(0.0, 1.0),
                    change_reason: "initialized from profile".to_string(),
                    changed_at: self.clock.now(),
                },
            )?;
        }
        log::info!(
            "personality: seeded {} trait(s) for {}",
            profile.traits.len(),
            profile.id
        );
        Ok(())
    }

    /// Current value of one trait, if initialized.
    pub fn get(&self, profile_id: &str, name: &str) -> Result<Option<f64>, EngineError> {
        Ok(self.store.trait_row(profile_id, name)?.map(|row| row.value))
    }

    /// All traits for a persona, ordered by name.
    pub fn all(&self, profile_id: &str) -> Result<Vec<StoredTrait>, EngineError> {
        Ok(self.store.traits(profile_id)?)
    }

    /// Set a trait to an absolute value, clamped into `[0, 1]`.
    pub fn update_trait(
        &self,
        profile_id: &str,
        name: &str,
        value: f64,
        reason: &str,
    ) -> Result<f64, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::invalid_value(format!(
                "trait '{name}' value must be finite, got {value}"
            )));
        }
        let clamped = value.clamp(0.0, 1.0);
        self.store.upsert_trait(
            profile_id,
            &StoredTrait {
                name: name.to_string(),
                value: clamped,
                change_reason: reason.to_string(),
                changed_at: self.clock.now(),
            },
        )?;
        Ok(clamped)
    }

    /// Shift a trait by `delta`, clamped into `[0, 1]`.
    ///
    /// A trait that was never initialized starts from 0.5.
    pub fn nudge_trait(
        &self,
        profile_id: &str,
        name: &str,
        delta: f64,
        reason: &str,
    ) -> Result<f64, EngineError> {
        if !delta.is_finite() {
            return Err(EngineError::invalid_value(format!(
                "trait '{name}' delta must be finite, got {delta}"
            )));
        }
        let current = self.get(profile_id, name)?.unwrap_or(0.5);
        let next = (current + delta).clamp(0.0, 1.0);
        self.store.upsert_trait(
            profile_id,
            &StoredTrait {
                name: name.to_string(),
                value: next,
                change_reason: reason.to_string(),
                changed_at: self.clock.now(),
            },
        )?;
        log::debug!(
            "personality: '{}' {} -> {} for {} ({})",
            name,
            current,
            next,
            profile_id,
            reason
        );
        Ok(next)
    }

    /// Run the evolution heuristics over one message's text.
    ///
    /// Dense technical vocabulary nudges `technical_bias` up; sarcastic
    /// phrasing nudges `sarcasm_level` up; repeated sincerity nudges
    /// `sarcasm_level` back down.
    pub fn analyze_for_evolution(&self, profile_id: &str, text: &str) -> Result<(), EngineError> {
        let lower = text.to_lowercase();

        let technical_hits = TECHNICAL_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        if technical_hits >= 3 {
            self.nudge_trait(profile_id, "technical_bias", 0.01, "dense technical talk")?;
        }

        if SARCASTIC_PHRASES.iter().any(|p| lower.contains(p)) {
            self.nudge_trait(profile_id, "sarcasm_level", 0.01, "sarcastic phrasing")?;
        }

        let sincere_hits = SINCERE_PHRASES
            .iter()
            .filter(|p| lower.contains(*p))
            .count();
        if sincere_hits >= 2 {
            self.nudge_trait(profile_id, "sarcasm_level", -0.005, "sincere phrasing")?;
        }

        Ok(())
    }

    /// Render evolved-trait guidance for the completion prompt.
    ///
    /// Only traits far from neutral produce a line; a persona near 0.5 on
    /// everything yields an empty string.
    pub fn trait_modifiers_for_llm(&self, profile_id: &str) -> Result<String, EngineError> {
        let mut lines = Vec::new();
        for row in self.store.traits(profile_id)? {
            if row.value >= 0.7 {
                lines.push(format!(
                    "Your {} is high ({:.2}); let it show in your replies.",
                    row.name, row.value
                ));
            } else if row.value <= 0.3 {
                lines.push(format!(
                    "Your {} is low ({:.2}); keep it out of your replies.",
                    row.name, row.value
                ));
            }
        }
        Ok(lines.join("\n"))
    }

    /// Drop all persisted traits and reseed from the profile.
    pub fn reset(&self, profile: &PersonaProfile) -> Result<(), EngineError> {
        log::info!("personality: resetting traits for {}", profile.id);
        self.store.clear_traits(&profile.id)?;
        self.initialize(profile)
    }
}
