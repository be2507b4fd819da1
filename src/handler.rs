//! Per-persona message orchestration.
//!
//! The handler ties the pieces together for one persona: router strategies
//! first, then the decision funnel, then response generation (canned or
//! completion backend), the outbound send, and the side effects a sent
//! message leaves behind (conversation log, battery increment, trait
//! evolution). Messages for one channel must be fed in arrival order; the
//! temporal and battery state are order-sensitive.

use std::sync::Arc;

use crate::battery::SocialBattery;
use crate::decision::{DecisionContext, DecisionPipeline, ResponseDecision};
use crate::errors::EngineError;
use crate::gateway::ChatGateway;
use crate::interest::InterestScorer;
use crate::llm::{CompletionBackend, CompletionRequest, ConversationTurn};
use crate::message::ChatMessage;
use crate::personality::PersonalityTraits;
use crate::profile::PersonaProfile;
use crate::router::StrategyRouter;
use crate::storage::{ConversationRow, StateStore};

const HISTORY_LIMIT: usize = 10;

/// What the handler did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandledOutcome {
    /// Nothing was sent.
    Silent,
    /// A router strategy produced the response.
    Routed { strategy: String, content: String },
    /// The decision funnel produced the response.
    Decided {
        decision: ResponseDecision,
        content: String,
    },
}

/// Drives one persona end to end.
pub struct MessageHandler {
    profile: PersonaProfile,
    bot_user_id: String,
    router: Option<StrategyRouter>,
    pipeline: DecisionPipeline,
    battery: Arc<SocialBattery>,
    traits: Arc<PersonalityTraits>,
    interest: Arc<InterestScorer>,
    store: Arc<dyn StateStore>,
    gateway: Arc<dyn ChatGateway>,
    backend: Arc<dyn CompletionBackend>,
}

impl MessageHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile: PersonaProfile,
        bot_user_id: &str,
        router: Option<StrategyRouter>,
        pipeline: DecisionPipeline,
        battery: Arc<SocialBattery>,
        traits: Arc<PersonalityTraits>,
        interest: Arc<InterestScorer>,
        store: Arc<dyn StateStore>,
        gateway: Arc<dyn ChatGateway>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            profile,
            bot_user_id: bot_user_id.to_string(),
            router,
            pipeline,
            battery,
            traits,
            interest,
            store,
            gateway,
            backend,
        }
    }

    pub fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    /// Seed persisted interests and traits from the profile. Idempotent.
    pub fn initialize(&self) -> Result<(), EngineError> {
        self.interest.initialize_from_profile(&self.profile)?;
        self.traits.initialize(&self.profile)
    }

    /// Process one inbound message.
    pub async fn handle(&self, message: &ChatMessage) -> Result<HandledOutcome, EngineError> {
        // Router strategies outrank the funnel; the classic persona's
        // request and temporal strategies live here.
        if message.author_id != self.bot_user_id {
            if let Some(router) = &self.router {
                if !(message.author_is_bot && self.profile.ignore_bots) {
                    if let Some(routed) = router.route(message) {
                        self.send_and_record(message, &routed.content).await;
                        return Ok(HandledOutcome::Routed {
                            strategy: routed.strategy,
                            content: routed.content,
                        });
                    }
                }
            }
        }

        let decision = self.pipeline.should_respond(&DecisionContext {
            profile: &self.profile,
            message,
            bot_user_id: &self.bot_user_id,
        });
        if !decision.should_respond {
            return Ok(HandledOutcome::Silent);
        }

        let content = match &decision.pattern_response {
            Some(canned) => canned.clone(),
            None => match self.generate(message).await {
                Some(content) => content,
                None => return Ok(HandledOutcome::Silent),
            },
        };

        self.send_and_record(message, &content).await;
        Ok(HandledOutcome::Decided { decision, content })
    }

    /// Ask the completion backend for a reply. Any failure or an explicit
    /// ignore makes the turn a no-op.
    async fn generate(&self, message: &ChatMessage) -> Option<String> {
        let history = match self.store.recent_conversation(
            &self.profile.id,
            &message.channel_id,
            HISTORY_LIMIT,
        ) {
            Ok(rows) => rows
                .into_iter()
                .map(|row| ConversationTurn {
                    author_name: row.author_name,
                    user_message: row.user_message,
                    bot_response: row.bot_response,
                })
                .collect(),
            Err(e) => {
                log::warn!("handler: history unavailable for {}: {}", self.profile.id, e);
                Vec::new()
            }
        };

        let trait_modifiers = self
            .traits
            .trait_modifiers_for_llm(&self.profile.id)
            .unwrap_or_else(|e| {
                log::warn!("handler: trait modifiers unavailable: {}", e);
                String::new()
            });

        let request = CompletionRequest {
            system_prompt: self.profile.system_prompt.clone(),
            history,
            user_facts: String::new(),
            trait_modifiers,
            author_name: message.author_id.clone(),
            user_message: message.content.clone(),
        };

        match self.backend.generate(&request).await {
            Ok(reply) if reply.should_ignore => {
                log::debug!("handler: backend chose to stay quiet");
                None
            }
            Ok(reply) if reply.content.trim().is_empty() => None,
            Ok(reply) => Some(reply.content),
            Err(e) => {
                log::warn!("handler: completion backend failed, staying quiet: {}", e);
                None
            }
        }
    }

    /// Send under the persona identity and apply post-send side effects.
    /// A failed send skips the side effects; the turn never sent anything.
    async fn send_and_record(&self, message: &ChatMessage, content: &str) {
        let identity = self.profile.identity();
        if let Err(e) = self
            .gateway
            .send_as_identity(&message.channel_id, &identity, content)
            .await
        {
            log::error!(
                "handler: send failed for {} in {}: {}",
                self.profile.id,
                message.channel_id,
                e
            );
            return;
        }

        if let Err(e) = self.store.append_conversation(&ConversationRow {
            profile_id: self.profile.id.clone(),
            channel_id: message.channel_id.clone(),
            author_id: message.author_id.clone(),
            author_name: message.author_id.clone(),
            user_message: message.content.clone(),
            bot_response: content.to_string(),
            created_at: message.created_at,
        }) {
            log::warn!("handler: conversation log write failed: {}", e);
        }

        if let Err(e) = self.battery.record_message(
            &self.profile.id,
            &message.channel_id,
            &self.profile.social_battery,
        ) {
            log::warn!("handler: battery record failed: {}", e);
        }

        if let Err(e) = self
            .traits
            .analyze_for_evolution(&self.profile.id, &message.content)
        {
            log::warn!("handler: trait evolution failed: {}", e);
        }
    }
}
