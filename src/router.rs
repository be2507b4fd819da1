//! Priority-ordered strategy dispatch.
//!
//! Strategies are self-contained (predicate, response generator, priority)
//! units competing for each message. The router walks them in priority
//! order and stops at the first strategy that both matches and produces a
//! non-empty response. A strategy that matches but fails to generate does
//! not abort the sweep; the router logs and moves on.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};

use crate::errors::EngineError;
use crate::message::ChatMessage;

// ============================================================================
// ResponseStrategy
// ============================================================================

/// One competing response unit. Immutable after construction apart from any
/// private temporal state an implementation keeps.
pub trait ResponseStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Sort key: smaller values are consulted first. Ties keep
    /// registration order.
    fn priority(&self) -> u32;

    /// Cheap predicate; must not mutate strategy state.
    fn matches(&self, message: &ChatMessage) -> bool;

    /// Produce the response text and apply the strategy's state effects.
    /// An empty string means the strategy declined after all.
    fn respond(&self, message: &ChatMessage) -> Result<String, EngineError>;
}

/// Outcome of a routed message.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedResponse {
    pub strategy: String,
    pub content: String,
}

// ============================================================================
// StrategyRouter
// ============================================================================

/// Plain ordered list of strategies; never inspects concrete types.
pub struct StrategyRouter {
    strategies: Vec<Arc<dyn ResponseStrategy>>,
}

impl StrategyRouter {
    /// Build a router; strategies are stable-sorted by priority so that
    /// registration order breaks ties.
    pub fn new(mut strategies: Vec<Arc<dyn ResponseStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Dispatch one message. `None` when no strategy produced a response.
    pub fn route(&self, message: &ChatMessage) -> Option<RoutedResponse> {
        for strategy in &self.strategies {
            if !strategy.matches(message) {
                continue;
            }
            match strategy.respond(message) {
                Ok(content) if !content.trim().is_empty() => {
                    log::debug!("router: '{}' handled message {}", strategy.name(), message.id);
                    return Some(RoutedResponse {
                        strategy: strategy.name().to_string(),
                        content,
                    });
                }
                Ok(_) => {
                    log::debug!(
                        "router: '{}' matched but produced no text, continuing",
                        strategy.name()
                    );
                }
                Err(e) => {
                    log::warn!(
                        "router: '{}' failed to respond ({}), continuing",
                        strategy.name(),
                        e
                    );
                }
            }
        }
        None
    }
}

// ============================================================================
// ComplimentRequestStrategy
// ============================================================================

/// Handles "<bot> say something nice about <target>" requests.
///
/// The capture group of `request_pattern` names the compliment target.
/// A target matching `contempt_target` gets the contempt response instead
/// of a compliment.
pub struct ComplimentRequestStrategy {
    name: String,
    priority: u32,
    request_pattern: String,
    compliment_template: String,
    contempt_target: Option<String>,
    contempt_response: String,
    compiled: OnceCell<Option<Regex>>,
}

impl ComplimentRequestStrategy {
    pub fn new(
        name: &str,
        priority: u32,
        request_pattern: &str,
        compliment_template: &str,
        contempt_target: Option<&str>,
        contempt_response: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority,
            request_pattern: request_pattern.to_string(),
            compliment_template: compliment_template.to_string(),
            contempt_target: contempt_target.map(|t| t.to_lowercase()),
            contempt_response: contempt_response.to_string(),
            compiled: OnceCell::new(),
        }
    }

    /// The classic blue persona's nice-request behavior.
    pub fn classic_blue(priority: u32) -> Self {
        Self::new(
            "nice_request",
            priority,
            r"blue?bot,? say something nice about\s+(.+)",
            "{target}, I think you're pretty Blu! :wink:",
            Some("venn"),
            "No way, Venn can suck my blu cane. :unamused:",
        )
    }

    fn pattern(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| {
                match RegexBuilder::new(&self.request_pattern)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(re) => Some(re),
                    Err(e) => {
                        log::warn!(
                            "compliment strategy '{}': bad request pattern: {}",
                            self.name,
                            e
                        );
                        None
                    }
                }
            })
            .as_ref()
    }

    fn target_of(&self, content: &str) -> Option<String> {
        let captures = self.pattern()?.captures(content)?;
        let target = captures.get(1)?.as_str().trim().trim_end_matches('!');
        if target.is_empty() {
            None
        } else {
            Some(target.to_string())
        }
    }
}

impl ResponseStrategy for ComplimentRequestStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn matches(&self, message: &ChatMessage) -> bool {
        self.target_of(&message.content).is_some()
    }

    fn respond(&self, message: &ChatMessage) -> Result<String, EngineError> {
        let target = match self.target_of(&message.content) {
            Some(target) => target,
            None => return Ok(String::new()),
        };
        if let Some(contempt) = &self.contempt_target {
            if target.to_lowercase().contains(contempt.as_str()) {
                return Ok(self.contempt_response.clone());
            }
        }
        Ok(self.compliment_template.replace("{target}", &target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_support::message;
    use chrono::Utc;
    use parking_lot::Mutex;

    struct FixedStrategy {
        name: String,
        priority: u32,
        matches: bool,
        outcome: Mutex<Vec<Result<String, EngineError>>>,
        calls: Mutex<u32>,
    }

    impl FixedStrategy {
        fn new(name: &str, priority: u32, matches: bool, outcome: Result<String, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                matches,
                outcome: Mutex::new(vec![outcome]),
                calls: Mutex::new(0),
            })
        }
    }

    impl ResponseStrategy for FixedStrategy {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn matches(&self, _message: &ChatMessage) -> bool {
            self.matches
        }
        fn respond(&self, _message: &ChatMessage) -> Result<String, EngineError> {
            *self.calls.lock() += 1;
            self.outcome
                .lock()
                .pop()
                .unwrap_or(Ok("again".to_string()))
        }
    }

    #[test]
    fn test_lower_priority_number_wins() {
        let late = FixedStrategy::new("late", 5, true, Ok("late".into()));
        let early = FixedStrategy::new("early", 1, true, Ok("early".into()));
        let router = StrategyRouter::new(vec![late.clone(), early]);

        let routed = router.route(&message("hi", "u1", Utc::now())).unwrap();
        assert_eq!(routed.strategy, "early");
        assert_eq!(*late.calls.lock(), 0);
    }

    #[test]
    fn test_registration_order_breaks_priority_ties() {
        let first = FixedStrategy::new("first", 3, true, Ok("first".into()));
        let second = FixedStrategy::new("second", 3, true, Ok("second".into()));
        let router = StrategyRouter::new(vec![first, second]);

        let routed = router.route(&message("hi", "u1", Utc::now())).unwrap();
        assert_eq!(routed.strategy, "first");
    }

    #[test]
    fn test_generation_failure_falls_through() {
        let failing = FixedStrategy::new(
            "failing",
            1,
            true,
            Err(EngineError::invalid_value("boom")),
        );
        let empty = FixedStrategy::new("empty", 2, true, Ok("  ".into()));
        let fallback = FixedStrategy::new("fallback", 3, true, Ok("got it".into()));
        let router = StrategyRouter::new(vec![failing, empty, fallback]);

        let routed = router.route(&message("hi", "u1", Utc::now())).unwrap();
        assert_eq!(routed.strategy, "fallback");
        assert_eq!(routed.content, "got it");
    }

    #[test]
    fn test_no_match_means_no_response() {
        let silent = FixedStrategy::new("silent", 1, false, Ok("never".into()));
        let router = StrategyRouter::new(vec![silent.clone()]);

        assert!(router.route(&message("hi", "u1", Utc::now())).is_none());
        assert_eq!(*silent.calls.lock(), 0);
    }

    #[test]
    fn test_compliment_request_extracts_target() {
        let strategy = ComplimentRequestStrategy::classic_blue(1);
        let msg = message("bluebot say something nice about Alice", "u1", Utc::now());
        assert!(strategy.matches(&msg));
        let response = strategy.respond(&msg).unwrap();
        assert!(response.contains("Alice"));
    }

    #[test]
    fn test_compliment_request_blubot_variation() {
        let strategy = ComplimentRequestStrategy::classic_blue(1);
        let msg = message("blubot, say something nice about Bob", "u1", Utc::now());
        assert!(strategy.matches(&msg));
        assert!(strategy.respond(&msg).unwrap().contains("Bob"));
    }

    #[test]
    fn test_compliment_request_contempt_target() {
        let strategy = ComplimentRequestStrategy::classic_blue(1);
        let msg = message("bluebot say something nice about Venn", "u1", Utc::now());
        let response = strategy.respond(&msg).unwrap();
        assert!(!response.contains("pretty Blu"));
        assert!(response.contains("No way"));
    }

    #[test]
    fn test_compliment_request_ignores_unrelated_messages() {
        let strategy = ComplimentRequestStrategy::classic_blue(1);
        assert!(!strategy.matches(&message("blue is nice", "u1", Utc::now())));
    }
}
