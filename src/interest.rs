//! Interest scoring: weighted keyword saliency for a persona.
//!
//! Each persona carries a set of weighted keywords. A message's interest
//! score is the weight of the keywords it matches, normalized so that a few
//! strong hits can saturate without requiring every keyword to appear.
//! Keywords and weights persist in the state store and are adjustable at
//! runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conditions::RegexCache;
use crate::errors::EngineError;
use crate::profile::PersonaProfile;
use crate::storage::{InterestKeyword, StateStore};

pub const MIN_WEIGHT: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 2.0;

/// Normalization cap: matched weight is divided by at most this much total
/// weight, so three average keywords saturate the score.
const TOTAL_WEIGHT_CAP: f64 = 3.0;

/// One keyword that matched the scored text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestMatch {
    pub keyword: String,
    pub category: Option<String>,
    pub weight: f64,
}

/// Score for one (persona, text) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestScore {
    /// Normalized saliency in `[0, 1]`.
    pub score: f64,
    pub matches: Vec<InterestMatch>,
}

/// Threshold comparison over an [`InterestScore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestCheck {
    pub interested: bool,
    pub score: f64,
    /// Highest-weighted matched keyword, if any matched.
    pub top_match: Option<String>,
}

/// Computes interest scores from the persisted keyword set.
pub struct InterestScorer {
    store: Arc<dyn StateStore>,
    patterns: RegexCache,
}

impl InterestScorer {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            patterns: RegexCache::new(),
        }
    }

    /// Seed the store from the profile's interest list if the persona has
    /// no persisted keywords yet. Entries are `"category:keyword"` or a
    /// bare keyword; seeded weight is 1.0.
    pub fn initialize_from_profile(&self, profile: &PersonaProfile) -> Result<(), EngineError> {
        if !self.store.interests(&profile.id)?.is_empty() {
            return Ok(());
        }
        for entry in &profile.interests {
            let (category, keyword) = match entry.split_once(':') {
                Some((category, keyword)) => (Some(category.trim()), keyword.trim()),
                None => (None, entry.trim()),
            };
            if keyword.is_empty() {
                log::warn!("interest: skipping empty keyword entry '{}'", entry);
                continue;
            }
            self.store.upsert_interest(
                &profile.id,
                &InterestKeyword {
                    keyword: keyword.to_lowercase(),
                    category: category.map(|c| c.to_lowercase()),
                    weight: 1.0,
                },
            )?;
        }
        log::info!(
            "interest: seeded {} keyword(s) for {}",
            profile.interests.len(),
            profile.id
        );
        Ok(())
    }

    /// Add or replace one keyword. Weight is clamped into range.
    pub fn add_interest(
        &self,
        profile_id: &str,
        keyword: &str,
        category: Option<&str>,
        weight: f64,
    ) -> Result<(), EngineError> {
        if !weight.is_finite() {
            return Err(EngineError::invalid_value(format!(
                "interest weight for '{keyword}' must be finite, got {weight}"
            )));
        }
        self.store.upsert_interest(
            profile_id,
            &InterestKeyword {
                keyword: keyword.to_lowercase(),
                category: category.map(|c| c.to_lowercase()),
                weight: weight.clamp(MIN_WEIGHT, MAX_WEIGHT),
            },
        )?;
        Ok(())
    }

    /// Remove one keyword. Returns whether it existed.
    pub fn remove_interest(&self, profile_id: &str, keyword: &str) -> Result<bool, EngineError> {
        Ok(self
            .store
            .remove_interest(profile_id, &keyword.to_lowercase())?)
    }

    /// All keywords for a persona, ordered by keyword.
    pub fn list(&self, profile_id: &str) -> Result<Vec<InterestKeyword>, EngineError> {
        Ok(self.store.interests(profile_id)?)
    }

    /// Score `text` against the persona's keyword set.
    pub fn calculate_interest_score(
        &self,
        profile_id: &str,
        text: &str,
    ) -> Result<InterestScore, EngineError> {
        let keywords = self.store.interests(profile_id)?;
        let mut matched_weight = 0.0;
        let mut total_weight = 0.0;
        let mut matches = Vec::new();

        for entry in &keywords {
            total_weight += entry.weight;
            let matched = self
                .patterns
                .word_boundary(&entry.keyword)
                .map(|re| re.is_match(text))
                .unwrap_or(false);
            if matched {
                matched_weight += entry.weight;
                matches.push(InterestMatch {
                    keyword: entry.keyword.clone(),
                    category: entry.category.clone(),
                    weight: entry.weight,
                });
            }
        }

        let score = if matches.is_empty() {
            0.0
        } else {
            (matched_weight / total_weight.min(TOTAL_WEIGHT_CAP)).min(1.0)
        };
        Ok(InterestScore { score, matches })
    }

    /// Threshold comparison on the score; reports the strongest match.
    pub fn is_interested(
        &self,
        profile_id: &str,
        text: &str,
        threshold: f64,
    ) -> Result<InterestCheck, EngineError> {
        let scored = self.calculate_interest_score(profile_id, text)?;
        let top_match = scored
            .matches
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|m| m.keyword.clone());
        Ok(InterestCheck {
            interested: scored.score >= threshold,
            score: scored.score,
            top_match,
        })
    }

    /// Shift one keyword's weight by `delta`, clamped into range.
    ///
    /// Non-finite deltas are rejected before any mutation.
    pub fn adjust_weight(
        &self,
        profile_id: &str,
        keyword: &str,
        delta: f64,
    ) -> Result<f64, EngineError> {
        if !delta.is_finite() {
            return Err(EngineError::invalid_value(format!(
                "weight delta for '{keyword}' must be finite, got {delta}"
            )));
        }
        let keyword = keyword.to_lowercase();
        let current = self
            .store
            .interests(profile_id)?
            .into_iter()
            .find(|entry| entry.keyword == keyword)
            .ok_or_else(|| EngineError::NotFound {
                kind: "interest keyword",
                name: keyword.clone(),
            })?;

        let next = (current.weight + delta).clamp(MIN_WEIGHT, MAX_WEIGHT);
        self.store.upsert_interest(
            profile_id,
            &InterestKeyword {
                weight: next,
                ..current
            },
        )?;
        log::debug!(
            "interest: '{}' weight {} -> {} for {}",
            keyword,
            current.weight,
            next,
            profile_id
        );
        Ok(next)
    }
}
