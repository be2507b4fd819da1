//! Trigger condition trees and their evaluator.
//!
//! Conditions are the leaf filter of the decision funnel: a small boolean
//! language over message content and authorship, declared in persona YAML
//! and evaluated per message. Evaluation is pure and synchronous apart from
//! regex compilation, which is cached, and `with_chance`, which draws from
//! the injected random source.
//!
//! A malformed pattern never aborts evaluation of sibling triggers: it is
//! logged once at compile time and the condition reads as a non-match from
//! then on.

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::message::ChatMessage;
use crate::random::RandomSource;

/// One node of a trigger condition tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    /// Matches every message.
    Always,
    /// Case-insensitive regex test against the full content.
    MatchesPattern(String),
    /// Case-insensitive word-boundary match of an escaped literal.
    ContainsWord(String),
    /// Case-insensitive substring test.
    ContainsPhrase(String),
    /// Exact author-id equality.
    FromUser(String),
    /// True with independent probability `p` per evaluation.
    WithChance(f64),
    /// Every sub-condition must match (short-circuits left-to-right).
    AllOf(Vec<TriggerCondition>),
    /// At least one sub-condition must match.
    AnyOf(Vec<TriggerCondition>),
    /// No sub-condition may match.
    NoneOf(Vec<TriggerCondition>),
}

/// Cache of compiled case-insensitive regexes, keyed by pattern text.
///
/// A failed compile is cached as `None` so the warning is logged once, not
/// per message.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: DashMap<String, Option<Arc<Regex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile (or fetch) `pattern` as a case-insensitive regex.
    pub fn case_insensitive(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(entry) = self.compiled.get(pattern) {
            return entry.clone();
        }
        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                log::warn!("malformed pattern '{}' treated as non-match: {}", pattern, e);
                None
            }
        };
        self.compiled.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Compile (or fetch) a word-boundary matcher for a literal keyword.
    pub fn word_boundary(&self, literal: &str) -> Option<Arc<Regex>> {
        self.case_insensitive(&format!(r"\b{}\b", regex::escape(literal)))
    }
}

/// Evaluates condition trees against messages.
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    cache: RegexCache,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when the condition tree matches the message.
    pub fn evaluate(
        &self,
        condition: &TriggerCondition,
        message: &ChatMessage,
        rng: &dyn RandomSource,
    ) -> bool {
        match condition {
            TriggerCondition::Always => true,

            TriggerCondition::MatchesPattern(pattern) => self
                .cache
                .case_insensitive(pattern)
                .map(|re| re.is_match(&message.content))
                .unwrap_or(false),

            TriggerCondition::ContainsWord(word) => self
                .cache
                .word_boundary(word)
                .map(|re| re.is_match(&message.content))
                .unwrap_or(false),

            TriggerCondition::ContainsPhrase(phrase) => message
                .content
                .to_lowercase()
                .contains(&phrase.to_lowercase()),

            TriggerCondition::FromUser(user_id) => message.author_id == *user_id,

            TriggerCondition::WithChance(p) => rng.roll() < *p,

            TriggerCondition::AllOf(subs) => subs
                .iter()
                .all(|sub| self.evaluate(sub, message, rng)),

            TriggerCondition::AnyOf(subs) => subs
                .iter()
                .any(|sub| self.evaluate(sub, message, rng)),

            TriggerCondition::NoneOf(subs) => !subs
                .iter()
                .any(|sub| self.evaluate(sub, message, rng)),
        }
    }
}
