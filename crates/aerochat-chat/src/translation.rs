//! Round-trip translation around classification and generation.
//!
//! Utterances are translated into the pivot language before they are
//! classified and sent to the model; the final answer is translated back to
//! the language the user wrote in.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use aerochat_core::types::Turn;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::ChatError;
use crate::generation::{GenerationRequest, GenerationService};

/// Identifies the language of a text, returning a language tag.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

/// Translates a batch of texts between two languages.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, ChatError>;
}

// =============================================================================
// StopwordDetector
// =============================================================================

const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "is", "are", "what", "how", "you", "your", "of", "and", "to", "it", "me",
            "about", "tell", "in",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "los", "las", "es", "qué", "que", "cómo", "como", "tu", "de", "y",
            "estás", "está", "cuál", "dime", "del", "sobre", "eres",
        ],
    ),
    (
        "ca",
        &[
            "el", "la", "els", "les", "és", "què", "com", "teva", "de", "i", "ets", "estàs",
            "quina", "quin", "digues", "del", "sobre", "amb",
        ],
    ),
];

/// Scores candidate languages by how many of their stopwords appear.
///
/// Ties and texts with no stopword hit are reported as undetected.
pub struct StopwordDetector {
    languages: Vec<(String, &'static [&'static str])>,
}

impl StopwordDetector {
    /// Build a detector restricted to `languages`; unknown tags are ignored.
    pub fn new(languages: &[String]) -> Self {
        let table: HashMap<&str, &'static [&'static str]> = STOPWORDS.iter().copied().collect();
        let languages = languages
            .iter()
            .filter_map(|lang| table.get(lang.as_str()).map(|words| (lang.clone(), *words)))
            .collect();
        Self { languages }
    }
}

impl LanguageDetector for StopwordDetector {
    fn detect(&self, text: &str) -> Option<String> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let word = RE.get_or_init(|| Regex::new(r"\w+").expect("Invalid word regex"));

        let lower = text.to_lowercase();
        let words: Vec<&str> = word.find_iter(&lower).map(|m| m.as_str()).collect();

        let mut best: Option<(&str, usize)> = None;
        let mut tied = false;
        for (lang, stopwords) in &self.languages {
            let hits = words.iter().filter(|w| stopwords.contains(w)).count();
            match best {
                Some((_, top)) if hits == top => tied = true,
                Some((_, top)) if hits < top => {}
                _ => {
                    best = Some((lang.as_str(), hits));
                    tied = false;
                }
            }
        }

        match best {
            Some((lang, hits)) if hits > 0 && !tied => Some(lang.to_string()),
            _ => None,
        }
    }
}

// =============================================================================
// GenerationTranslator
// =============================================================================

/// Translator that asks the generation service for a plain translation.
pub struct GenerationTranslator {
    service: Arc<dyn GenerationService>,
    model: String,
}

impl GenerationTranslator {
    pub fn new(service: Arc<dyn GenerationService>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Translator for GenerationTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, ChatError> {
        let mut translated = Vec::with_capacity(texts.len());
        for text in texts {
            let request = GenerationRequest::single(
                self.model.clone(),
                vec![
                    Turn::system(format!(
                        "Translate the user's message from language '{}' to language '{}'. \
                         Reply with the translation only.",
                        source, target
                    )),
                    Turn::user(text.clone()),
                ],
            );
            let answer = self
                .service
                .chat(request)
                .await
                .map_err(|e| ChatError::Translation(e.to_string()))?;
            translated.push(answer.trim().to_string());
        }
        Ok(translated)
    }
}

// =============================================================================
// TranslationFilter
// =============================================================================

/// Pre/post filter that moves text in and out of the pivot language.
pub struct TranslationFilter {
    detector: Box<dyn LanguageDetector>,
    translator: Box<dyn Translator>,
    pivot: String,
}

impl TranslationFilter {
    pub fn new(
        detector: Box<dyn LanguageDetector>,
        translator: Box<dyn Translator>,
        pivot: impl Into<String>,
    ) -> Self {
        Self {
            detector,
            translator,
            pivot: pivot.into(),
        }
    }

    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    /// Translate `text` into the pivot language.
    ///
    /// Returns the pivot text and the detected source language, or the text
    /// unchanged with `None` when it is already in the pivot language or its
    /// language cannot be told.
    pub async fn to_pivot(&self, text: &str) -> Result<(String, Option<String>), ChatError> {
        let source = match self.detector.detect(text) {
            Some(lang) if lang != self.pivot => lang,
            other => {
                debug!(detected = ?other, "No translation needed");
                return Ok((text.to_string(), None));
            }
        };
        let translated = self
            .translator
            .translate(&[text.to_string()], &source, &self.pivot)
            .await?;
        let pivot_text = translated.into_iter().next().ok_or_else(|| {
            ChatError::Translation("translator returned no text".to_string())
        })?;
        debug!(source = %source, "Translated utterance to pivot language");
        Ok((pivot_text, Some(source)))
    }

    /// Translate `text` from the pivot language back to `target`.
    pub async fn from_pivot(&self, text: &str, target: &str) -> Result<String, ChatError> {
        if target == self.pivot {
            return Ok(text.to_string());
        }
        let translated = self
            .translator
            .translate(&[text.to_string()], &self.pivot, target)
            .await?;
        translated
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Translation("translator returned no text".to_string()))
    }
}
