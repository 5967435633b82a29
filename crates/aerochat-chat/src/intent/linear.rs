//! Bag-of-words linear intent model loaded from a JSON artifact.
//!
//! The artifact is the export of a trained text classifier:
//!
//! ```json
//! {
//!   "labels": ["altitude telemetry", "qa", "temperature telemetry"],
//!   "vocabulary": {"altitude": 0, "how high": 1, "temperature": 2},
//!   "weights": [[2.1, 1.7, -0.4], [-0.8, -0.6, -0.9], [-0.5, -0.2, 2.4]],
//!   "bias": [-0.3, 0.6, -0.3]
//! }
//! ```
//!
//! `weights` has one row per label and one column per vocabulary entry.
//! Vocabulary entries are unigrams or space-joined bigrams.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use super::IntentPredictor;
use crate::error::ChatError;

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    labels: Vec<String>,
    vocabulary: HashMap<String, usize>,
    weights: Vec<Vec<f64>>,
    #[serde(default)]
    bias: Vec<f64>,
}

/// Linear scorer over unigram and bigram counts; predicts the argmax label.
#[derive(Debug, Clone)]
pub struct LinearIntentModel {
    labels: Vec<String>,
    vocabulary: HashMap<String, usize>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl LinearIntentModel {
    /// Load and validate a model artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::ClassifierUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let model = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            labels = model.labels.len(),
            vocabulary = model.vocabulary.len(),
            "Intent classifier loaded"
        );
        Ok(model)
    }

    /// Parse and validate a model artifact.
    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        let artifact: ModelArtifact = serde_json::from_str(json)
            .map_err(|e| ChatError::ClassifierUnavailable(format!("invalid artifact: {}", e)))?;

        if artifact.labels.is_empty() {
            return Err(ChatError::ClassifierUnavailable(
                "artifact has no labels".to_string(),
            ));
        }
        if artifact.weights.len() != artifact.labels.len() {
            return Err(ChatError::ClassifierUnavailable(format!(
                "expected {} weight rows, found {}",
                artifact.labels.len(),
                artifact.weights.len()
            )));
        }
        let width = artifact.vocabulary.len();
        if let Some(row) = artifact.weights.iter().find(|row| row.len() != width) {
            return Err(ChatError::ClassifierUnavailable(format!(
                "weight row has {} columns, vocabulary has {} entries",
                row.len(),
                width
            )));
        }
        if let Some((term, index)) = artifact.vocabulary.iter().find(|(_, i)| **i >= width) {
            return Err(ChatError::ClassifierUnavailable(format!(
                "vocabulary entry '{}' points at column {} of {}",
                term, index, width
            )));
        }
        let bias = if artifact.bias.is_empty() {
            vec![0.0; artifact.labels.len()]
        } else if artifact.bias.len() == artifact.labels.len() {
            artifact.bias
        } else {
            return Err(ChatError::ClassifierUnavailable(format!(
                "expected {} bias values, found {}",
                artifact.labels.len(),
                artifact.bias.len()
            )));
        };

        Ok(Self {
            labels: artifact.labels,
            vocabulary: artifact.vocabulary,
            weights: artifact.weights,
            bias,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Score of every label for the given text, in label order.
    pub fn scores(&self, text: &str) -> Vec<f64> {
        let mut scores = self.bias.clone();
        for term in features(text) {
            if let Some(&column) = self.vocabulary.get(&term) {
                for (score, row) in scores.iter_mut().zip(&self.weights) {
                    *score += row[column];
                }
            }
        }
        scores
    }
}

impl IntentPredictor for LinearIntentModel {
    fn predict(&self, text: &str) -> String {
        let scores = self.scores(text);
        // Ties resolve to the earliest label.
        let best = scores
            .iter()
            .enumerate()
            .fold(0usize, |best, (i, s)| if *s > scores[best] { i } else { best });
        self.labels[best].clone()
    }
}

/// Lowercased word unigrams (two or more word characters) followed by bigrams.
fn features(text: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let word = RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("Invalid token regex"));

    let lower = text.to_lowercase();
    let words: Vec<&str> = word.find_iter(&lower).map(|m| m.as_str()).collect();
    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}
