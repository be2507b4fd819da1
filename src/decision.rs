//! The response decision funnel.
//!
//! One message goes in, one decision record comes out. Stages run in a
//! fixed order and the first stage that reaches a verdict wins: basic
//! filters, direct mention, configured pattern triggers, interest scoring
//! with a small random chime, and finally the social battery gate over the
//! interest/chime path. Collaborator failures never propagate out of the
//! funnel; they degrade the decision to ignored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::battery::SocialBattery;
use crate::conditions::ConditionEvaluator;
use crate::interest::InterestScorer;
use crate::message::ChatMessage;
use crate::profile::PersonaProfile;
use crate::random::RandomSource;

pub const DEFAULT_INTEREST_THRESHOLD: f64 = 0.3;
pub const DEFAULT_CHIME_CHANCE: f64 = 0.02;

/// Why the pipeline decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Ignored,
    DirectMention,
    PatternTrigger,
    InterestMatch,
    RandomChime,
}

/// Everything the pipeline needs for one message.
pub struct DecisionContext<'a> {
    pub profile: &'a PersonaProfile,
    pub message: &'a ChatMessage,
    /// The gateway user id this persona posts under; used for self- and
    /// mention-detection.
    pub bot_user_id: &'a str,
}

/// The decision record downstream stages consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDecision {
    pub should_respond: bool,
    pub reason: DecisionReason,
    /// Response text comes from the completion backend.
    pub use_llm: bool,
    /// Canned response, present when a non-LLM trigger matched.
    pub pattern_response: Option<String>,
    pub trigger_name: Option<String>,
    pub interest_score: Option<f64>,
}

impl ResponseDecision {
    fn ignored() -> Self {
        Self {
            should_respond: false,
            reason: DecisionReason::Ignored,
            use_llm: false,
            pattern_response: None,
            trigger_name: None,
            interest_score: None,
        }
    }
}

/// Ordered decision funnel over one persona's configuration and state.
pub struct DecisionPipeline {
    evaluator: ConditionEvaluator,
    interest: Arc<InterestScorer>,
    battery: Arc<SocialBattery>,
    rng: Arc<dyn RandomSource>,
    interest_threshold: f64,
    chime_chance: f64,
}

impl DecisionPipeline {
    pub fn new(
        interest: Arc<InterestScorer>,
        battery: Arc<SocialBattery>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(),
            interest,
            battery,
            rng,
            interest_threshold: DEFAULT_INTEREST_THRESHOLD,
            chime_chance: DEFAULT_CHIME_CHANCE,
        }
    }

    pub fn with_thresholds(mut self, interest_threshold: f64, chime_chance: f64) -> Self {
        self.interest_threshold = interest_threshold;
        self.chime_chance = chime_chance;
        self
    }

    /// Run the funnel for one message.
    pub fn should_respond(&self, ctx: &DecisionContext<'_>) -> ResponseDecision {
        let message = ctx.message;
        let profile = ctx.profile;

        // Stage 1: basic filters.
        if message.author_id == ctx.bot_user_id {
            return ResponseDecision::ignored();
        }
        if message.author_is_bot && profile.ignore_bots {
            return ResponseDecision::ignored();
        }
        if message.content.trim().is_empty() {
            return ResponseDecision::ignored();
        }

        // Stage 2: direct mention.
        if self.is_direct_mention(ctx) {
            return ResponseDecision {
                should_respond: true,
                reason: DecisionReason::DirectMention,
                use_llm: true,
                pattern_response: None,
                trigger_name: None,
                interest_score: None,
            };
        }

        // Stage 3: configured triggers, declaration order.
        for trigger in &profile.triggers {
            if !self
                .evaluator
                .evaluate(&trigger.conditions, message, self.rng.as_ref())
            {
                continue;
            }
            if let Some(chance) = trigger.response_chance {
                if chance < 1.0 && self.rng.roll() >= chance {
                    log::debug!(
                        "decision: trigger '{}' matched but lost its {}% roll",
                        trigger.name,
                        chance * 100.0
                    );
                    continue;
                }
            }
            let pattern_response = if trigger.use_llm {
                None
            } else {
                self.pick_canned(trigger.responses.as_deref())
            };
            return ResponseDecision {
                should_respond: true,
                reason: DecisionReason::PatternTrigger,
                use_llm: trigger.use_llm,
                pattern_response,
                trigger_name: Some(trigger.name.clone()),
                interest_score: None,
            };
        }

        // Stage 4: interest, then the chime roll.
        let check = match self
            .interest
            .is_interested(&profile.id, &message.content, self.interest_threshold)
        {
            Ok(check) => check,
            Err(e) => {
                log::error!("decision: interest check failed for {}: {}", profile.id, e);
                return ResponseDecision::ignored();
            }
        };

        let reason = if check.interested {
            DecisionReason::InterestMatch
        } else if self.rng.roll() < self.chime_chance {
            DecisionReason::RandomChime
        } else {
            return ResponseDecision {
                interest_score: Some(check.score),
                ..ResponseDecision::ignored()
            };
        };

        // Stage 5: the battery gates the interest/chime wish to respond.
        let allowed = match self
            .battery
            .can_speak(&profile.id, &message.channel_id, &profile.social_battery)
        {
            Ok(check) => check.can_speak,
            Err(e) => {
                log::error!("decision: battery check failed for {}: {}", profile.id, e);
                false
            }
        };
        if !allowed {
            log::debug!(
                "decision: battery overturned {:?} for {} in {}",
                reason,
                profile.id,
                message.channel_id
            );
            return ResponseDecision {
                interest_score: Some(check.score),
                ..ResponseDecision::ignored()
            };
        }

        ResponseDecision {
            should_respond: true,
            reason,
            use_llm: true,
            pattern_response: None,
            trigger_name: None,
            interest_score: Some(check.score),
        }
    }

    fn is_direct_mention(&self, ctx: &DecisionContext<'_>) -> bool {
        let message = ctx.message;
        // `<@!id>` is the nickname-mention form some gateways emit.
        message.mentions_user(ctx.bot_user_id)
            || message.content.contains(&format!("<@{}>", ctx.bot_user_id))
            || message.content.contains(&format!("<@!{}>", ctx.bot_user_id))
    }

    fn pick_canned(&self, responses: Option<&[String]>) -> Option<String> {
        let pool = responses?;
        if pool.is_empty() {
            return None;
        }
        Some(pool[self.rng.pick_index(pool.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::message::test_support::message;
    use crate::random::ScriptedRandom;
    use crate::storage::MemoryStateStore;
    use chrono::{TimeZone, Utc};

    const BOT_ID: &str = "bot-user";

    struct Fixture {
        pipeline: DecisionPipeline,
        battery: Arc<SocialBattery>,
        clock: Arc<ManualClock>,
        profile: PersonaProfile,
    }

    fn fixture(rolls: &[f64]) -> Fixture {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let store = Arc::new(MemoryStateStore::new());
        let interest = Arc::new(InterestScorer::new(store.clone()));
        let battery = Arc::new(SocialBattery::new(store, clock.clone()));
        let rng = Arc::new(ScriptedRandom::new(rolls.to_vec(), 0.99));

        let profile = PersonaProfile::from_yaml(
            r#"
id: cova
display_name: CovaBot
interests:
  - typescript
  - react
triggers:
  - name: greeting
    conditions:
      contains_word: hello
    responses:
      - "hey"
  - name: summon
    conditions:
      contains_word: cova
    use_llm: true
social_battery:
  max_messages: 5
  window_minutes: 60
  cooldown_seconds: 30
"#,
        )
        .unwrap();
        interest.initialize_from_profile(&profile).unwrap();

        Fixture {
            pipeline: DecisionPipeline::new(interest, battery.clone(), rng),
            battery,
            clock,
            profile,
        }
    }

    fn decide(fixture: &Fixture, msg: &ChatMessage) -> ResponseDecision {
        fixture.pipeline.should_respond(&DecisionContext {
            profile: &fixture.profile,
            message: msg,
            bot_user_id: BOT_ID,
        })
    }

    #[test]
    fn test_ignores_self_and_bots_and_empty() {
        let f = fixture(&[]);

        let own = message("hello", BOT_ID, f.clock.now());
        assert!(!decide(&f, &own).should_respond);

        let mut from_bot = message("hello", "other-bot", f.clock.now());
        from_bot.author_is_bot = true;
        assert!(!decide(&f, &from_bot).should_respond);

        let blank = message("   ", "u1", f.clock.now());
        assert!(!decide(&f, &blank).should_respond);
    }

    #[test]
    fn test_direct_mention_beats_triggers() {
        let f = fixture(&[]);
        let mut msg = message("hello everyone", "u1", f.clock.now());
        msg.mentions = vec![BOT_ID.to_string()];

        let decision = decide(&f, &msg);
        assert!(decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::DirectMention);
        assert!(decision.use_llm);
    }

    #[test]
    fn test_mention_tag_in_content_counts() {
        let f = fixture(&[]);
        let msg = message("what does <@bot-user> think?", "u1", f.clock.now());
        assert_eq!(decide(&f, &msg).reason, DecisionReason::DirectMention);

        // Nickname-mention form.
        let msg = message("what does <@!bot-user> think?", "u1", f.clock.now());
        assert_eq!(decide(&f, &msg).reason, DecisionReason::DirectMention);
    }

    #[test]
    fn test_pattern_trigger_with_canned_response() {
        let f = fixture(&[]);
        let msg = message("hello there", "u1", f.clock.now());

        let decision = decide(&f, &msg);
        assert!(decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::PatternTrigger);
        assert_eq!(decision.trigger_name.as_deref(), Some("greeting"));
        assert!(!decision.use_llm);
        assert_eq!(decision.pattern_response.as_deref(), Some("hey"));
    }

    #[test]
    fn test_llm_trigger_has_no_canned_response() {
        let f = fixture(&[]);
        let msg = message("cova, thoughts?", "u1", f.clock.now());

        let decision = decide(&f, &msg);
        assert_eq!(decision.reason, DecisionReason::PatternTrigger);
        assert!(decision.use_llm);
        assert!(decision.pattern_response.is_none());
    }

    #[test]
    fn test_interest_match_when_no_trigger_fires() {
        let f = fixture(&[]);
        let msg = message("been writing typescript and react all day", "u1", f.clock.now());

        let decision = decide(&f, &msg);
        assert!(decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::InterestMatch);
        assert!(decision.use_llm);
        assert!(decision.interest_score.unwrap() >= DEFAULT_INTEREST_THRESHOLD);
    }

    #[test]
    fn test_uninteresting_message_is_ignored_without_chime() {
        // First scripted roll is the failed chime.
        let f = fixture(&[0.5]);
        let msg = message("nothing relevant here", "u1", f.clock.now());

        let decision = decide(&f, &msg);
        assert!(!decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::Ignored);
        assert_eq!(decision.interest_score, Some(0.0));
    }

    #[test]
    fn test_chime_fires_on_a_lucky_roll() {
        let f = fixture(&[0.01]);
        let msg = message("nothing relevant here", "u1", f.clock.now());

        let decision = decide(&f, &msg);
        assert!(decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::RandomChime);
        assert!(decision.use_llm);
    }

    #[test]
    fn test_battery_overturns_interest_match() {
        let f = fixture(&[]);
        for _ in 0..5 {
            f.battery
                .record_message("cova", "chan-1", &f.profile.social_battery)
                .unwrap();
            f.clock.advance(chrono::Duration::seconds(60));
        }

        let msg = message("typescript and react again", "u1", f.clock.now());
        let decision = decide(&f, &msg);
        assert!(!decision.should_respond);
        assert_eq!(decision.reason, DecisionReason::Ignored);
        // Score is still reported for observability.
        assert!(decision.interest_score.unwrap() > 0.0);
    }

    #[test]
    fn test_battery_does_not_gate_pattern_triggers() {
        let f = fixture(&[]);
        for _ in 0..5 {
            f.battery
                .record_message("cova", "chan-1", &f.profile.social_battery)
                .unwrap();
            f.clock.advance(chrono::Duration::seconds(60));
        }

        let msg = message("hello there", "u1", f.clock.now());
        assert!(decide(&f, &msg).should_respond);
    }

    #[test]
    fn test_response_chance_failure_moves_to_next_trigger() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let store = Arc::new(MemoryStateStore::new());
        let interest = Arc::new(InterestScorer::new(store.clone()));
        let battery = Arc::new(SocialBattery::new(store, clock));
        // One roll: 0.9 fails the 50% chance; later rolls fall back high.
        let rng = Arc::new(ScriptedRandom::new(vec![0.9], 0.99));

        let profile = PersonaProfile::from_yaml(
            r#"
id: p
display_name: P
triggers:
  - name: flaky
    conditions:
      contains_word: ping
    response_chance: 0.5
    responses: ["flaky pong"]
  - name: reliable
    conditions:
      contains_word: ping
    responses: ["reliable pong"]
"#,
        )
        .unwrap();

        let pipeline = DecisionPipeline::new(interest, battery, rng);
        let msg = message("ping", "u1", Utc::now());
        let decision = pipeline.should_respond(&DecisionContext {
            profile: &profile,
            message: &msg,
            bot_user_id: BOT_ID,
        });
        assert_eq!(decision.trigger_name.as_deref(), Some("reliable"));
        assert_eq!(decision.pattern_response.as_deref(), Some("reliable pong"));
    }
}
