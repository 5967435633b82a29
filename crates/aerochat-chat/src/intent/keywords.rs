//! Keyword heuristic used when the classifier artifact cannot be loaded.

use aerochat_core::types::IntentLabel;

use super::IntentPredictor;

/// Terms that mark a question about the onboard temperature.
pub const TEMPERATURE_KEYWORDS: &[&str] = &[
    "temperature",
    "degrees",
    "weather",
    "thermometer",
    "hot",
    "cold",
    "ambient",
];

/// Terms that mark a question about altitude.
pub const ALTITUDE_KEYWORDS: &[&str] = &[
    "altitude",
    "elevation",
    "height",
    "how high",
    "above sea level",
    "above the ground",
];

/// Case-insensitive substring matcher over two fixed keyword sets.
///
/// Temperature terms are checked first. Substring matching is approximate:
/// "hot" also matches "photo".
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> IntentLabel {
        let lower = text.to_lowercase();
        if TEMPERATURE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            IntentLabel::TemperatureTelemetry
        } else if ALTITUDE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            IntentLabel::AltitudeTelemetry
        } else {
            IntentLabel::Qa
        }
    }
}

impl IntentPredictor for KeywordClassifier {
    fn predict(&self, text: &str) -> String {
        self.classify(text).as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_question() {
        let clf = KeywordClassifier::new();
        assert_eq!(
            clf.classify("What is the temperature?"),
            IntentLabel::TemperatureTelemetry
        );
    }

    #[test]
    fn test_open_question_is_qa() {
        let clf = KeywordClassifier::new();
        assert_eq!(clf.classify("Tell me about stars"), IntentLabel::Qa);
    }

    #[test]
    fn test_altitude_question() {
        let clf = KeywordClassifier::new();
        assert_eq!(
            clf.classify("How high are you flying right now"),
            IntentLabel::AltitudeTelemetry
        );
        assert_eq!(
            clf.classify("Report your ALTITUDE"),
            IntentLabel::AltitudeTelemetry
        );
    }

    #[test]
    fn test_case_insensitive() {
        let clf = KeywordClassifier::new();
        assert_eq!(
            clf.classify("IS IT COLD UP THERE"),
            IntentLabel::TemperatureTelemetry
        );
    }

    #[test]
    fn test_temperature_wins_over_altitude() {
        let clf = KeywordClassifier::new();
        assert_eq!(
            clf.classify("what is the temperature at this altitude"),
            IntentLabel::TemperatureTelemetry
        );
    }

    #[test]
    fn test_empty_text_is_qa() {
        assert_eq!(KeywordClassifier::new().classify(""), IntentLabel::Qa);
    }

    #[test]
    fn test_predict_returns_label_string() {
        let clf = KeywordClassifier::new();
        assert_eq!(clf.predict("ambient reading"), "temperature telemetry");
    }
}
