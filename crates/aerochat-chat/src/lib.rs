//! Conversational engine for aerochat.
//!
//! Classifies each utterance, answers telemetry questions with synthetic
//! readings, and streams open questions through a local generation service
//! while keeping a bounded conversation history.

pub mod context;
pub mod error;
pub mod generation;
pub mod intent;
pub mod orchestrator;
pub mod state_machine;
pub mod stream;
pub mod telemetry;
pub mod translation;

pub use context::ConversationContext;
pub use error::ChatError;
pub use generation::{FragmentStream, GenerationRequest, GenerationService, OllamaClient};
pub use intent::{
    IntentClassifier, IntentPredictor, KeywordClassifier, LinearIntentModel, Route, RoutingTable,
};
pub use orchestrator::{Command, TurnOrchestrator, TurnOutcome, MAX_MESSAGE_LENGTH};
pub use state_machine::{validate_transition, TurnState};
pub use stream::{
    AggregatedResponse, CollectingSink, EarlyStopPolicy, NullSink, StreamAggregator, TokenSink,
};
pub use telemetry::{FixedSource, RandomSource, TelemetryResponder, ValueSource};
pub use translation::{
    GenerationTranslator, LanguageDetector, StopwordDetector, TranslationFilter, Translator,
};
