//! Temporal reply strategy: greeting, confirmation window, escalation.
//!
//! The persona asks a light default question when its trigger word shows
//! up, accepts short confirmations for a few minutes afterwards, and
//! escalates to a hostile response when a designated adversary piles on
//! inside that window, at most once per long cooldown window.
//!
//! Only two timestamps persist between messages, held per channel:
//! the last greeting and the last escalation. `None` means "never".
//! Phase selection happens per message from those two instants; the
//! selected phase's own predicate still has to match before anything is
//! said or any timestamp moves.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::conditions::RegexCache;
use crate::errors::EngineError;
use crate::message::ChatMessage;
use crate::random::RandomSource;
use crate::router::ResponseStrategy;

/// Timestamps for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplyWindowState {
    /// When the greeting last fired; opens the confirmation window.
    pub last_prompt_at: Option<DateTime<Utc>>,
    /// When the escalation last fired; gates re-escalation.
    pub last_escalation_at: Option<DateTime<Utc>>,
}

/// Which sub-behavior handles the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Greeting,
    ConfirmFriend,
    ConfirmEnemy,
}

/// Static configuration for one temporal strategy instance.
#[derive(Debug, Clone)]
pub struct TemporalConfig {
    /// Fires the greeting (word-boundary style regex, case-insensitive).
    pub greeting_pattern: String,
    pub greeting_response: String,
    /// Recognizes short confirmation follow-ups inside the reply window.
    pub confirmation_pattern: String,
    /// Confirmations longer than this are treated as ordinary chatter.
    pub max_confirmation_len: usize,
    /// Responses drawn from uniformly when a confirmation lands.
    pub confirmation_responses: Vec<String>,
    /// Hostile content from the adversary inside the reply window.
    pub hostile_pattern: String,
    pub escalation_response: String,
    /// Author id whose hostility can escalate. `None` disables escalation.
    pub adversary_user_id: Option<String>,
    /// How long confirmations are accepted after a greeting.
    pub reply_window: Duration,
    /// Minimum gap between two escalations.
    pub escalation_window: Duration,
}

impl TemporalConfig {
    /// The classic blue persona: greets on color mentions, accepts
    /// acknowledgments for five minutes, escalates on the adversary's
    /// hostility at most once a day.
    pub fn classic_blue(adversary_user_id: Option<&str>) -> Self {
        Self {
            greeting_pattern: r"\b(blu|blue|bloo|azul|blau|blew)\b".to_string(),
            greeting_response: "Did somebody say Blu?".to_string(),
            confirmation_pattern:
                r"\b(yes|no|yep|yeah|nah|sure|i did|you got it|sure did)\b".to_string(),
            max_confirmation_len: 40,
            confirmation_responses: vec![
                "Somebody definitely said blu.".to_string(),
                "Lol, see? You can't help yourselves.".to_string(),
                "Oh, I knew it!".to_string(),
            ],
            hostile_pattern: r"\b(fuck(ing)?|hate|die|kill|worst|mom|shit|murder|bots?)\b"
                .to_string(),
            escalation_response:
                "What did you just say about me? I will not stand for this slander, you little blu gremlin."
                    .to_string(),
            adversary_user_id: adversary_user_id.map(str::to_string),
            reply_window: Duration::minutes(5),
            escalation_window: Duration::hours(24),
        }
    }
}

/// A [`ResponseStrategy`] built around the reply/escalation windows.
///
/// State is keyed by channel id so channels never interfere.
pub struct TemporalReplyStrategy {
    name: String,
    priority: u32,
    config: TemporalConfig,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    patterns: RegexCache,
    channels: DashMap<String, ReplyWindowState>,
}

impl TemporalReplyStrategy {
    pub fn new(
        name: &str,
        priority: u32,
        config: TemporalConfig,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority,
            config,
            clock,
            rng,
            patterns: RegexCache::new(),
            channels: DashMap::new(),
        }
    }

    /// Snapshot of one channel's window state. Admin introspection.
    pub fn channel_state(&self, channel_id: &str) -> ReplyWindowState {
        self.channels
            .get(channel_id)
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    fn select_phase(&self, message: &ChatMessage, now: DateTime<Utc>) -> Phase {
        let state = self.channel_state(&message.channel_id);
        let within_reply_window = state
            .last_prompt_at
            .map(|at| now - at < self.config.reply_window)
            .unwrap_or(false);
        if !within_reply_window {
            return Phase::Greeting;
        }

        let is_adversary = self
            .config
            .adversary_user_id
            .as_deref()
            .map(|id| id == message.author_id)
            .unwrap_or(false);
        let cooldown_over = state
            .last_escalation_at
            .map(|at| now - at >= self.config.escalation_window)
            .unwrap_or(true);
        if is_adversary && cooldown_over {
            Phase::ConfirmEnemy
        } else {
            Phase::ConfirmFriend
        }
    }

    fn pattern_matches(&self, pattern: &str, content: &str) -> bool {
        self.patterns
            .case_insensitive(pattern)
            .map(|re| re.is_match(content))
            .unwrap_or(false)
    }

    fn phase_matches(&self, phase: Phase, message: &ChatMessage) -> bool {
        match phase {
            Phase::Greeting => {
                self.pattern_matches(&self.config.greeting_pattern, &message.content)
            }
            Phase::ConfirmFriend => {
                let short = message.content.len() <= self.config.max_confirmation_len;
                (short
                    && self.pattern_matches(&self.config.confirmation_pattern, &message.content))
                    || message.is_reply_to_bot
            }
            Phase::ConfirmEnemy => {
                self.pattern_matches(&self.config.hostile_pattern, &message.content)
            }
        }
    }
}

impl ResponseStrategy for TemporalReplyStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn matches(&self, message: &ChatMessage) -> bool {
        let phase = self.select_phase(message, self.clock.now());
        self.phase_matches(phase, message)
    }

    fn respond(&self, message: &ChatMessage) -> Result<String, EngineError> {
        let now = self.clock.now();
        let phase = self.select_phase(message, now);
        if !self.phase_matches(phase, message) {
            // Selected phase declined; timestamps stay put.
            return Ok(String::new());
        }

        let mut state = self.channels.entry(message.channel_id.clone()).or_default();
        match phase {
            Phase::Greeting => {
                state.last_prompt_at = Some(now);
                Ok(self.config.greeting_response.clone())
            }
            Phase::ConfirmFriend => {
                // Close the window so a third confirmation falls back to
                // the greeting phase.
                state.last_prompt_at = None;
                let pool = &self.config.confirmation_responses;
                if pool.is_empty() {
                    return Ok(String::new());
                }
                Ok(pool[self.rng.pick_index(pool.len())].clone())
            }
            Phase::ConfirmEnemy => {
                log::warn!(
                    "temporal '{}': escalating against {} in {}",
                    self.name,
                    message.author_id,
                    message.channel_id
                );
                state.last_prompt_at = None;
                state.last_escalation_at = Some(now);
                Ok(self.config.escalation_response.clone())
            }
        }
    }
}
