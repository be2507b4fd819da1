//! # Persona Engine
//!
//! A stateful decision engine for automated chat personas: given an inbound
//! message, decide whether the persona responds, which competing strategy
//! handles it, and what temporal and relationship state carries forward.
//!
//! The engine is transport-agnostic. Message delivery, outbound rendering,
//! and free-form text generation are collaborator traits ([`ChatGateway`],
//! [`CompletionBackend`]); the crate owns the decision funnel, the
//! priority-ordered strategy router, the temporal reply/escalation state
//! machine, weighted interest scoring, the social battery rate limiter, and
//! trait evolution, all persisted through a key-based [`StateStore`].

pub mod battery;
pub mod clock;
pub mod conditions;
pub mod decision;
pub mod errors;
pub mod gateway;
pub mod handler;
pub mod interest;
pub mod llm;
pub mod message;
pub mod personality;
pub mod profile;
pub mod random;
pub mod router;
pub mod storage;
pub mod temporal;

pub use battery::{BatteryCheck, BatteryReason, SocialBattery};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conditions::{ConditionEvaluator, TriggerCondition};
pub use decision::{DecisionContext, DecisionPipeline, DecisionReason, ResponseDecision};
pub use errors::{EngineError, StoreError};
pub use gateway::ChatGateway;
pub use handler::{HandledOutcome, MessageHandler};
pub use interest::{InterestCheck, InterestScore, InterestScorer};
pub use llm::{CompletionBackend, CompletionReply, CompletionRequest};
pub use message::{BotIdentity, ChatMessage};
pub use personality::PersonalityTraits;
pub use profile::{BatteryConfig, PersonaProfile, TraitSpec, TriggerSpec};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use router::{ComplimentRequestStrategy, ResponseStrategy, RoutedResponse, StrategyRouter};
pub use storage::{MemoryStateStore, SqliteStateStore, StateStore};
pub use temporal::{ReplyWindowState, TemporalConfig, TemporalReplyStrategy};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
