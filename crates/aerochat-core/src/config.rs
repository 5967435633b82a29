use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AeroError, Result};

/// Top-level configuration for aerochat.
///
/// Loaded from `~/.aerochat/config.toml` by default. Each section corresponds
/// to one component of the turn pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeroConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Locale code to prompt and templates. Supplying this table replaces
    /// the built-in locales entirely.
    #[serde(default = "default_locales")]
    pub locales: BTreeMap<String, LocaleConfig>,
}

impl Default for AeroConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            generation: GenerationConfig::default(),
            history: HistoryConfig::default(),
            streaming: StreamingConfig::default(),
            classifier: ClassifierConfig::default(),
            telemetry: TelemetryConfig::default(),
            translation: TranslationConfig::default(),
            locales: default_locales(),
        }
    }
}

impl AeroConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AeroConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AeroError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.history.max_history < 2 {
            return Err(AeroError::Config(format!(
                "history.max_history must be at least 2 (system turn plus one exchange turn), got {}",
                self.history.max_history
            )));
        }
        let t = &self.telemetry;
        if ![t.altitude_min, t.altitude_max, t.temperature_min, t.temperature_max]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(AeroError::Config(
                "telemetry ranges must be finite numbers".to_string(),
            ));
        }
        if t.altitude_min > t.altitude_max {
            return Err(AeroError::Config(
                "telemetry.altitude_min exceeds telemetry.altitude_max".to_string(),
            ));
        }
        if t.temperature_min > t.temperature_max {
            return Err(AeroError::Config(
                "telemetry.temperature_min exceeds telemetry.temperature_max".to_string(),
            ));
        }
        if self.streaming.early_stop && self.streaming.terminators.is_empty() {
            return Err(AeroError::Config(
                "streaming.terminators cannot be empty while early_stop is enabled".to_string(),
            ));
        }
        if !self.locales.contains_key(&self.general.default_locale) {
            return Err(AeroError::UnknownLocale(self.general.default_locale.clone()));
        }
        Ok(())
    }

    /// Look up a locale by code.
    pub fn locale(&self, code: &str) -> Result<&LocaleConfig> {
        self.locales
            .get(code)
            .ok_or_else(|| AeroError::UnknownLocale(code.to_string()))
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Locale active at session start.
    pub default_locale: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            default_locale: "en".to_string(),
        }
    }
}

/// External generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the Ollama-compatible service.
    pub base_url: String,
    /// Model to use. When unset the user picks one from the service's list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Seconds to wait for a response to start, and for each streamed
    /// fragment after it. A long answer that keeps streaming is never cut.
    pub timeout_secs: u64,
    /// Send an empty generate request at startup so the model is loaded.
    pub warm_up: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: None,
            timeout_secs: 120,
            warm_up: true,
        }
    }
}

/// Conversation history bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of turns kept, the pinned system turn included.
    pub max_history: usize,
    /// End the session, instead of only the pending turn, on malformed history.
    pub strict: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: 20,
            strict: false,
        }
    }
}

/// Early-stop heuristic for streamed answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub early_stop: bool,
    /// Fragments that must be exceeded before a terminator can stop the stream.
    pub token_threshold: usize,
    /// Characters that count as a sentence boundary.
    pub terminators: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            early_stop: true,
            token_threshold: 50,
            terminators: ".!?\n:#".to_string(),
        }
    }
}

/// Intent classifier artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path to the JSON-exported linear model.
    pub model_path: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "models/telemetry_classifier.json".to_string(),
        }
    }
}

/// Ranges for the synthetic sensor readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub altitude_min: f64,
    pub altitude_max: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            altitude_min: 150.0,
            altitude_max: 500.0,
            temperature_min: 15.0,
            temperature_max: 40.0,
        }
    }
}

/// Round-trip translation around classification and generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    /// Language the classifier and the model work in.
    pub pivot: String,
    /// Candidate languages for detection.
    pub languages: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pivot: "en".to_string(),
            languages: vec!["en".to_string(), "es".to_string(), "ca".to_string()],
        }
    }
}

/// Per-locale persona and telemetry phrasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Human-readable name shown in the language menu.
    pub name: String,
    /// System turn pinned at the start of the conversation.
    pub system_prompt: String,
    /// Template with a `{value}` placeholder.
    pub altitude_template: String,
    /// Template with a `{value}` placeholder.
    pub temperature_template: String,
}

fn default_locales() -> BTreeMap<String, LocaleConfig> {
    let mut locales = BTreeMap::new();
    locales.insert(
        "en".to_string(),
        LocaleConfig {
            name: "English".to_string(),
            system_prompt: "You are the onboard assistant of a drone. Answer briefly and in English."
                .to_string(),
            altitude_template: "My altitude is {value}Km".to_string(),
            temperature_template: "My temperature is {value}ºC".to_string(),
        },
    );
    locales.insert(
        "es".to_string(),
        LocaleConfig {
            name: "Español".to_string(),
            system_prompt: "Eres el asistente a bordo de un dron. Responde de forma breve y en español."
                .to_string(),
            altitude_template: "Mi altitud es de {value}Km".to_string(),
            temperature_template: "Mi temperatura es de {value}ºC".to_string(),
        },
    );
    locales.insert(
        "ca".to_string(),
        LocaleConfig {
            name: "Català".to_string(),
            system_prompt: "Ets l'assistent a bord d'un dron. Respon breument i en català."
                .to_string(),
            altitude_template: "La meva altitud és de {value}Km".to_string(),
            temperature_template: "La meva temperatura és de {value}ºC".to_string(),
        },
    );
    locales
}
