//! Turn orchestrator: central coordinator wiring classifier, telemetry,
//! conversation context and the generation service.
//!
//! One utterance is processed at a time. The orchestrator owns the
//! conversation context exclusively and drives the turn state machine for
//! every line of input.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use aerochat_core::clock::{elapsed_between, Clock, SystemClock};
use aerochat_core::config::{AeroConfig, LocaleConfig};
use aerochat_core::types::{IntentLabel, SessionInfo, TelemetryKind, TurnMetrics};
use tracing::{debug, info, warn};

use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::generation::{GenerationRequest, GenerationService};
use crate::intent::{IntentClassifier, Route};
use crate::state_machine::{validate_transition, TurnState};
use crate::stream::{EarlyStopPolicy, StreamAggregator, TokenSink};
use crate::telemetry::{RandomSource, TelemetryResponder};
use crate::translation::{GenerationTranslator, StopwordDetector, TranslationFilter};

/// Maximum utterance length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

// =============================================================================
// Commands and outcomes
// =============================================================================

/// One line of user input, classified before any processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Utterance(String),
    /// `/lang <code>`; `None` when the code was omitted.
    SwitchLanguage(Option<String>),
    Stop,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if line == "/stop" {
            return Command::Stop;
        }
        if line == "/lang" {
            return Command::SwitchLanguage(None);
        }
        if let Some(rest) = line.strip_prefix("/lang ") {
            let code = rest.trim();
            return Command::SwitchLanguage((!code.is_empty()).then(|| code.to_string()));
        }
        Command::Utterance(line.to_string())
    }
}

/// Result of handling one line.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// A synthetic sensor reading.
    Telemetry {
        label: IntentLabel,
        text: String,
        metrics: TurnMetrics,
    },
    /// A generated answer. The fragments were already delivered to the sink
    /// in the pivot language; when `translated` is set, `text` is the answer
    /// in the user's language and should be shown as well.
    Answer {
        text: String,
        translated: bool,
        metrics: TurnMetrics,
    },
    LanguageChanged {
        locale: String,
    },
    /// `/lang` without a code; the caller should ask for one and call
    /// `switch_language`.
    LocaleRequired {
        available: Vec<String>,
    },
    Stopped,
    Ignored,
}

// =============================================================================
// TurnOrchestrator
// =============================================================================

/// Central coordinator for one conversation session.
pub struct TurnOrchestrator {
    service: Arc<dyn GenerationService>,
    model: String,
    classifier: IntentClassifier,
    telemetry: TelemetryResponder,
    translation: Option<TranslationFilter>,
    aggregator: StreamAggregator,
    clock: Arc<dyn Clock>,
    locales: BTreeMap<String, LocaleConfig>,
    locale: String,
    context: ConversationContext,
    strict: bool,
    state: TurnState,
    session: SessionInfo,
}

impl TurnOrchestrator {
    /// Create an orchestrator in the configured default locale.
    pub fn new(
        config: &AeroConfig,
        model: impl Into<String>,
        service: Arc<dyn GenerationService>,
        classifier: IntentClassifier,
        telemetry: TelemetryResponder,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChatError> {
        let locale = config.general.default_locale.clone();
        let system_prompt = config.locale(&locale)?.system_prompt.clone();
        let session = SessionInfo::new(locale.clone());
        info!(session = %session.id, locale = %locale, "Session started");

        Ok(Self {
            service,
            model: model.into(),
            classifier,
            telemetry,
            translation: None,
            aggregator: StreamAggregator::new(
                clock.clone(),
                EarlyStopPolicy::from_config(&config.streaming),
            ),
            clock,
            locales: config.locales.clone(),
            locale,
            context: ConversationContext::new(system_prompt, config.history.max_history),
            strict: config.history.strict,
            state: TurnState::AwaitingInput,
            session,
        })
    }

    /// Build the production wiring: classifier artifact from disk, random
    /// telemetry values, the system clock, and the translation filter when
    /// enabled.
    pub fn from_config(
        config: &AeroConfig,
        model: impl Into<String>,
        service: Arc<dyn GenerationService>,
    ) -> Result<Self, ChatError> {
        let model = model.into();
        let classifier = IntentClassifier::load(Path::new(&config.classifier.model_path));
        let telemetry =
            TelemetryResponder::new(config.telemetry.clone(), Box::new(RandomSource::new()));

        let mut orchestrator = Self::new(
            config,
            model.clone(),
            service.clone(),
            classifier,
            telemetry,
            Arc::new(SystemClock),
        )?;

        if config.translation.enabled {
            orchestrator = orchestrator.with_translation(TranslationFilter::new(
                Box::new(StopwordDetector::new(&config.translation.languages)),
                Box::new(GenerationTranslator::new(service, model)),
                config.translation.pivot.clone(),
            ));
        }
        Ok(orchestrator)
    }

    pub fn with_translation(mut self, filter: TranslationFilter) -> Self {
        self.translation = Some(filter);
        self
    }

    /// Replace the early-stop policy, e.g. from a command-line override.
    pub fn with_early_stop(mut self, policy: EarlyStopPolicy) -> Self {
        self.aggregator = StreamAggregator::new(self.clock.clone(), policy);
        self
    }

    /// Replace the conversation history, e.g. with an imported transcript.
    pub fn replace_context(&mut self, context: ConversationContext) {
        self.context = context;
    }

    // -- Accessors --

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn available_locales(&self) -> Vec<String> {
        self.locales.keys().cloned().collect()
    }

    pub fn uses_keyword_fallback(&self) -> bool {
        self.classifier.is_fallback()
    }

    // -- Turn handling --

    /// Handle one line of input. Fragments of a generated answer are passed
    /// to `sink` as they arrive.
    pub async fn handle_line(
        &mut self,
        line: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<TurnOutcome, ChatError> {
        if self.state.is_terminal() {
            debug!("Session terminated, ignoring input");
            return Ok(TurnOutcome::Stopped);
        }

        match Command::parse(line) {
            Command::Empty => Ok(TurnOutcome::Ignored),
            Command::Stop => {
                self.transition(TurnState::Terminated)?;
                info!(
                    session = %self.session.id,
                    turns = self.session.turns_handled,
                    "Session stopped"
                );
                Ok(TurnOutcome::Stopped)
            }
            Command::SwitchLanguage(None) => Ok(TurnOutcome::LocaleRequired {
                available: self.available_locales(),
            }),
            Command::SwitchLanguage(Some(code)) => self.switch_language(&code),
            Command::Utterance(text) => self.handle_utterance(text, sink).await,
        }
    }

    /// Switch the active locale and restart the conversation with that
    /// locale's system prompt. An unknown code leaves everything unchanged.
    pub fn switch_language(&mut self, code: &str) -> Result<TurnOutcome, ChatError> {
        if self.state.is_terminal() {
            return Ok(TurnOutcome::Stopped);
        }
        let system_prompt = match self.locales.get(code) {
            Some(locale) => locale.system_prompt.clone(),
            None => return Err(ChatError::UnknownLocale(code.to_string())),
        };

        self.transition(TurnState::LanguageReset)?;
        self.context.reset(system_prompt);
        self.locale = code.to_string();
        self.session.locale = code.to_string();
        self.transition(TurnState::AwaitingInput)?;

        info!(locale = code, "Language switched");
        Ok(TurnOutcome::LanguageChanged {
            locale: code.to_string(),
        })
    }

    async fn handle_utterance(
        &mut self,
        text: String,
        sink: &mut dyn TokenSink,
    ) -> Result<TurnOutcome, ChatError> {
        let length = text.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let started = self.clock.now();
        self.transition(TurnState::Classifying)?;

        let pivot = match &self.translation {
            Some(filter) => Some(filter.to_pivot(&text).await),
            None => None,
        };
        let (pivot_text, source) = match pivot {
            Some(Ok(translated)) => translated,
            Some(Err(e)) => {
                self.transition(TurnState::AwaitingInput)?;
                return Err(e);
            }
            None => (text, None),
        };

        let label = self.classifier.classify(&pivot_text);
        debug!(label = %label, "Utterance classified");

        let outcome = match Route::from(label) {
            Route::Telemetry(kind) => self.telemetry_branch(label, kind, started)?,
            Route::Generate => self.qa_branch(pivot_text, source, sink).await?,
        };
        self.session.turns_handled += 1;
        Ok(outcome)
    }

    fn telemetry_branch(
        &mut self,
        label: IntentLabel,
        kind: TelemetryKind,
        started: Instant,
    ) -> Result<TurnOutcome, ChatError> {
        let locale = match self.locales.get(&self.locale).cloned() {
            Some(locale) => locale,
            None => {
                self.transition(TurnState::AwaitingInput)?;
                return Err(ChatError::UnknownLocale(self.locale.clone()));
            }
        };
        self.transition(TurnState::TelemetryBranch)?;

        let text = self.telemetry.respond(kind, &locale);
        // Only the answer is recorded for telemetry turns.
        self.context.append_assistant(text.clone());

        let metrics = TurnMetrics::Telemetry {
            total_time: elapsed_between(started, self.clock.now()),
        };
        self.transition(TurnState::AwaitingInput)?;
        Ok(TurnOutcome::Telemetry {
            label,
            text,
            metrics,
        })
    }

    async fn qa_branch(
        &mut self,
        question: String,
        source: Option<String>,
        sink: &mut dyn TokenSink,
    ) -> Result<TurnOutcome, ChatError> {
        self.transition(TurnState::QaBranch)?;

        let checkpoint = self.context.clone();
        self.context.append_user(question);

        if let Err(e) = self.context.validate() {
            self.context = checkpoint;
            let next = if self.strict {
                TurnState::Terminated
            } else {
                TurnState::AwaitingInput
            };
            warn!(error = %e, strict = self.strict, "Refusing to send malformed history");
            self.transition(next)?;
            return Err(e);
        }

        let request = GenerationRequest::streaming(self.model.clone(), self.context.snapshot());
        let request_start = self.clock.now();
        let stream = self.service.chat_stream(request);
        let response = match self.aggregator.run(stream, request_start, sink).await {
            Ok(response) => response,
            Err(e) => {
                self.context = checkpoint;
                self.transition(TurnState::AwaitingInput)?;
                return Err(e);
            }
        };

        self.context.append_assistant(response.text.clone());

        let (text, translated) = match (&self.translation, source) {
            (Some(filter), Some(source)) => match filter.from_pivot(&response.text, &source).await
            {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!(error = %e, "Answer left untranslated");
                    (response.text, false)
                }
            },
            _ => (response.text, false),
        };

        self.transition(TurnState::AwaitingInput)?;
        Ok(TurnOutcome::Answer {
            text,
            translated,
            metrics: response.metrics,
        })
    }

    fn transition(&mut self, next: TurnState) -> Result<(), ChatError> {
        validate_transition(self.state, next)?;
        debug!(from = %self.state, to = %next, "Turn state transition");
        self.state = next;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FragmentStream;
    use crate::stream::{CollectingSink, NullSink};
    use crate::telemetry::FixedSource;
    use aerochat_core::clock::ManualClock;
    use aerochat_core::types::{Role, Turn};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with fixed fragments and records every request.
    struct ScriptedService {
        fragments: Vec<&'static str>,
        fail: bool,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedService {
        fn replying(fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fragments,
                fail: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fragments: vec![],
                fail: true,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn chat(&self, _request: GenerationRequest) -> Result<String, ChatError> {
            Ok(String::new())
        }

        fn chat_stream(&self, request: GenerationRequest) -> FragmentStream<'_> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                return Box::pin(futures::stream::iter(vec![Err(ChatError::Generation(
                    "connection refused".to_string(),
                ))]));
            }
            let items: Vec<Result<String, ChatError>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Box::pin(futures::stream::iter(items))
        }

        async fn list_models(&self) -> Result<Vec<String>, ChatError> {
            Ok(vec!["llama3".to_string()])
        }

        async fn warm_up(&self, _model: &str) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn orchestrator(service: Arc<ScriptedService>) -> TurnOrchestrator {
        orchestrator_with(AeroConfig::default(), service)
    }

    fn orchestrator_with(config: AeroConfig, service: Arc<ScriptedService>) -> TurnOrchestrator {
        TurnOrchestrator::new(
            &config,
            "llama3",
            service,
            IntentClassifier::keyword_fallback(),
            TelemetryResponder::new(
                config.telemetry.clone(),
                Box::new(FixedSource::new([321.0, 22.5])),
            ),
            Arc::new(ManualClock::new()),
        )
        .unwrap()
    }

    // ---- Command parsing ----

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/stop"), Command::Stop);
        assert_eq!(Command::parse("  /stop \n"), Command::Stop);
        assert_eq!(
            Command::parse("/lang es"),
            Command::SwitchLanguage(Some("es".to_string()))
        );
        assert_eq!(Command::parse("/lang"), Command::SwitchLanguage(None));
        assert_eq!(Command::parse("/lang   "), Command::SwitchLanguage(None));
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(
            Command::parse("What is your altitude?"),
            Command::Utterance("What is your altitude?".to_string())
        );
        assert_eq!(
            Command::parse("/language"),
            Command::Utterance("/language".to_string())
        );
    }

    // ---- Construction ----

    #[test]
    fn test_new_orchestrator_starts_awaiting_input() {
        let orch = orchestrator(ScriptedService::replying(vec![]));
        assert_eq!(orch.state(), TurnState::AwaitingInput);
        assert_eq!(orch.locale(), "en");
        assert_eq!(orch.context().len(), 1);
        assert_eq!(orch.session().turns_handled, 0);
        assert_eq!(orch.available_locales(), vec!["ca", "en", "es"]);
        assert!(orch.uses_keyword_fallback());
    }

    #[test]
    fn test_unknown_default_locale_rejected() {
        let mut config = AeroConfig::default();
        config.general.default_locale = "fr".to_string();
        let result = TurnOrchestrator::new(
            &config,
            "llama3",
            ScriptedService::replying(vec![]),
            IntentClassifier::keyword_fallback(),
            TelemetryResponder::new(config.telemetry.clone(), Box::new(FixedSource::default())),
            Arc::new(ManualClock::new()),
        );
        assert!(matches!(result, Err(ChatError::UnknownLocale(_))));
    }

    // ---- Telemetry ----

    #[tokio::test]
    async fn test_telemetry_turn_appends_answer_only() {
        let service = ScriptedService::replying(vec!["unused"]);
        let mut orch = orchestrator(service.clone());

        let outcome = orch
            .handle_line("What is your altitude?", &mut NullSink)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Telemetry { label, text, .. } => {
                assert_eq!(label, IntentLabel::AltitudeTelemetry);
                assert_eq!(text, "My altitude is 321.0Km");
            }
            other => panic!("Expected telemetry, got {:?}", other),
        }
        assert_eq!(orch.context().len(), 2);
        assert_eq!(orch.context().turns()[1].role(), Role::Assistant);
        assert!(service.requests.lock().unwrap().is_empty());
        assert_eq!(orch.state(), TurnState::AwaitingInput);
        assert_eq!(orch.session().turns_handled, 1);
    }

    // ---- QA ----

    #[tokio::test]
    async fn test_qa_turn_streams_and_records() {
        let service = ScriptedService::replying(vec!["The", " sky", " is", " blue."]);
        let mut orch = orchestrator(service.clone());
        let mut sink = CollectingSink::default();

        let outcome = orch
            .handle_line("Why is the sky blue?", &mut sink)
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Answer {
                text,
                translated,
                metrics,
            } => {
                assert_eq!(text, "The sky is blue.");
                assert!(!translated);
                assert!(matches!(
                    metrics,
                    TurnMetrics::Generation { token_count: 4, .. }
                ));
            }
            other => panic!("Expected answer, got {:?}", other),
        }
        assert_eq!(sink.fragments.len(), 4);

        let turns = orch.context().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("Why is the sky blue?"));
        assert_eq!(turns[2], Turn::assistant("The sky is blue."));

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0].role(), Role::System);
    }

    #[tokio::test]
    async fn test_generation_failure_restores_context() {
        let mut orch = orchestrator(ScriptedService::failing());
        let before = orch.context().snapshot();

        let err = orch
            .handle_line("Tell me about stars", &mut NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Generation(_)));
        assert_eq!(orch.context().snapshot(), before);
        assert_eq!(orch.state(), TurnState::AwaitingInput);
        assert_eq!(orch.session().turns_handled, 0);
    }

    #[tokio::test]
    async fn test_message_too_long_rejected() {
        let mut orch = orchestrator(ScriptedService::replying(vec![]));
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        let err = orch.handle_line(&long, &mut NullSink).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(MAX_MESSAGE_LENGTH)));
        assert_eq!(orch.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_malformed_history_is_never_sent() {
        let service = ScriptedService::replying(vec!["ok"]);
        let mut orch = orchestrator(service.clone());
        orch.replace_context(ConversationContext::from_turns(vec![Turn::user("hi")], 20));

        let err = orch
            .handle_line("Tell me about stars", &mut NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::MalformedHistory(_)));
        assert!(service.requests.lock().unwrap().is_empty());
        assert_eq!(orch.context().len(), 1);
        assert_eq!(orch.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_malformed_history_strict_terminates() {
        let mut config = AeroConfig::default();
        config.history.strict = true;
        let mut orch = orchestrator_with(config, ScriptedService::replying(vec!["ok"]));
        orch.replace_context(ConversationContext::from_turns(vec![], 20));

        assert!(orch
            .handle_line("Tell me about stars", &mut NullSink)
            .await
            .is_err());
        assert_eq!(orch.state(), TurnState::Terminated);
        assert_eq!(
            orch.handle_line("hello", &mut NullSink).await.unwrap(),
            TurnOutcome::Stopped
        );
    }

    // ---- Commands ----

    #[tokio::test]
    async fn test_language_switch_resets_context() {
        let mut orch = orchestrator(ScriptedService::replying(vec!["Hi"]));
        orch.handle_line("Tell me a joke", &mut NullSink)
            .await
            .unwrap();
        assert_eq!(orch.context().len(), 3);

        let outcome = orch.handle_line("/lang ca", &mut NullSink).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::LanguageChanged {
                locale: "ca".to_string()
            }
        );
        assert_eq!(orch.locale(), "ca");
        assert_eq!(orch.session().locale, "ca");
        assert_eq!(orch.context().len(), 1);
        let ca_prompt = AeroConfig::default().locales["ca"].system_prompt.clone();
        assert_eq!(orch.context().system_prompt(), Some(ca_prompt.as_str()));
        assert_eq!(orch.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_language_switch_unknown_locale() {
        let mut orch = orchestrator(ScriptedService::replying(vec![]));
        let err = orch.handle_line("/lang fr", &mut NullSink).await.unwrap_err();
        assert!(matches!(err, ChatError::UnknownLocale(ref c) if c == "fr"));
        assert_eq!(orch.locale(), "en");
        assert_eq!(orch.state(), TurnState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_language_without_code_asks_for_one() {
        let mut orch = orchestrator(ScriptedService::replying(vec![]));
        let outcome = orch.handle_line("/lang", &mut NullSink).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::LocaleRequired {
                available: vec!["ca".to_string(), "en".to_string(), "es".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_stop_terminates_and_ignores_further_input() {
        let service = ScriptedService::replying(vec!["x"]);
        let mut orch = orchestrator(service.clone());

        assert_eq!(
            orch.handle_line("/stop", &mut NullSink).await.unwrap(),
            TurnOutcome::Stopped
        );
        assert_eq!(orch.state(), TurnState::Terminated);
        assert_eq!(
            orch.handle_line("Tell me about stars", &mut NullSink)
                .await
                .unwrap(),
            TurnOutcome::Stopped
        );
        assert_eq!(
            orch.switch_language("es").unwrap(),
            TurnOutcome::Stopped
        );
        assert!(service.requests.lock().unwrap().is_empty());
        assert_eq!(orch.locale(), "en");
    }

    #[tokio::test]
    async fn test_empty_line_ignored() {
        let mut orch = orchestrator(ScriptedService::replying(vec![]));
        assert_eq!(
            orch.handle_line("   ", &mut NullSink).await.unwrap(),
            TurnOutcome::Ignored
        );
        assert_eq!(orch.context().len(), 1);
    }
}
