//! Intent classification for incoming utterances.
//!
//! Wraps an external predictor and degrades to a keyword heuristic for the
//! rest of the process when the predictor cannot be loaded.

pub mod keywords;
pub mod linear;

use std::collections::HashMap;
use std::path::Path;

use aerochat_core::types::{IntentLabel, TelemetryKind};
use tracing::{debug, warn};

use crate::error::ChatError;
pub use keywords::KeywordClassifier;
pub use linear::LinearIntentModel;

/// External text classifier: text in, label string out.
pub trait IntentPredictor: Send + Sync {
    fn predict(&self, text: &str) -> String;
}

// =============================================================================
// Routing
// =============================================================================

/// What the orchestrator does with a classified utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Telemetry(TelemetryKind),
    Generate,
}

impl From<IntentLabel> for Route {
    fn from(label: IntentLabel) -> Self {
        match label.telemetry_kind() {
            Some(kind) => Route::Telemetry(kind),
            None => Route::Generate,
        }
    }
}

/// Total mapping from raw classifier output to an intent label.
///
/// Labels are compared by exact equality. Anything unrecognized resolves to
/// the named default, which is `qa` for the standard table.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    known: HashMap<&'static str, IntentLabel>,
    default_label: IntentLabel,
}

impl RoutingTable {
    pub fn standard() -> Self {
        let known = [
            IntentLabel::TemperatureTelemetry,
            IntentLabel::AltitudeTelemetry,
            IntentLabel::Qa,
        ]
        .into_iter()
        .map(|label| (label.as_str(), label))
        .collect();
        Self {
            known,
            default_label: IntentLabel::Qa,
        }
    }

    pub fn default_label(&self) -> IntentLabel {
        self.default_label
    }

    pub fn resolve(&self, raw: &str) -> IntentLabel {
        match self.known.get(raw) {
            Some(label) => *label,
            None => {
                debug!(raw, default = %self.default_label, "Unrecognized intent label, using default");
                self.default_label
            }
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// IntentClassifier
// =============================================================================

enum Backend {
    Primary(Box<dyn IntentPredictor>),
    Fallback(KeywordClassifier),
}

/// Classifier adapter with a permanent keyword fallback.
///
/// The backend is chosen once at construction. A load failure is logged a
/// single time and never retried.
pub struct IntentClassifier {
    backend: Backend,
    routes: RoutingTable,
}

impl IntentClassifier {
    pub fn new(primary: Box<dyn IntentPredictor>) -> Self {
        Self {
            backend: Backend::Primary(primary),
            routes: RoutingTable::standard(),
        }
    }

    pub fn keyword_fallback() -> Self {
        Self {
            backend: Backend::Fallback(KeywordClassifier::new()),
            routes: RoutingTable::standard(),
        }
    }

    /// Pick the primary predictor if it loaded, otherwise the keyword heuristic.
    pub fn from_load_result(result: Result<Box<dyn IntentPredictor>, ChatError>) -> Self {
        match result {
            Ok(primary) => Self::new(primary),
            Err(e) => {
                warn!(error = %e, "Intent classifier unavailable, falling back to keyword matching");
                Self::keyword_fallback()
            }
        }
    }

    /// Load the linear model artifact at `path`, falling back on failure.
    pub fn load(path: &Path) -> Self {
        Self::from_load_result(
            LinearIntentModel::load(path).map(|m| Box::new(m) as Box<dyn IntentPredictor>),
        )
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.backend, Backend::Fallback(_))
    }

    pub fn classify(&self, text: &str) -> IntentLabel {
        match &self.backend {
            Backend::Primary(predictor) => self.routes.resolve(&predictor.predict(text)),
            Backend::Fallback(keywords) => keywords.classify(text),
        }
    }
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("fallback", &self.is_fallback())
            .finish()
    }
}
