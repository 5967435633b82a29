use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Dialogue
// =============================================================================

/// Speaker of a single dialogue turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// One message in the dialogue, tagged with its role.
///
/// Serializes to the `{role, content}` shape expected by the generation
/// service. Fields are private so a turn cannot change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

// =============================================================================
// Intents
// =============================================================================

/// Classified purpose of an utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentLabel {
    #[serde(rename = "temperature telemetry")]
    TemperatureTelemetry,
    #[serde(rename = "altitude telemetry")]
    AltitudeTelemetry,
    #[serde(rename = "qa")]
    Qa,
}

impl IntentLabel {
    /// The label string as produced by the classifier artifact.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::TemperatureTelemetry => "temperature telemetry",
            IntentLabel::AltitudeTelemetry => "altitude telemetry",
            IntentLabel::Qa => "qa",
        }
    }

    /// The telemetry reading this label asks for, if any.
    pub fn telemetry_kind(&self) -> Option<TelemetryKind> {
        match self {
            IntentLabel::TemperatureTelemetry => Some(TelemetryKind::Temperature),
            IntentLabel::AltitudeTelemetry => Some(TelemetryKind::Altitude),
            IntentLabel::Qa => None,
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of synthetic sensor reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Temperature,
    Altitude,
}

impl TelemetryKind {
    pub fn label(&self) -> IntentLabel {
        match self {
            TelemetryKind::Temperature => IntentLabel::TemperatureTelemetry,
            TelemetryKind::Altitude => IntentLabel::AltitudeTelemetry,
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Timing measured for one resolved turn. Surfaced to the caller, never stored.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnMetrics {
    /// A telemetry answer: only the end-to-end time is meaningful.
    Telemetry { total_time: Duration },
    /// A generated answer.
    Generation {
        /// Request start to first fragment. `None` when nothing arrived.
        time_to_first_token: Option<Duration>,
        /// Fragments per second between first and last arrival; 0.0 when
        /// fewer than two fragments arrived or they shared a timestamp.
        tokens_per_second: f64,
        token_count: usize,
        /// Mean gap between consecutive fragments, first gap excluded.
        mean_inter_token: Option<Duration>,
        total_time: Duration,
        early_stopped: bool,
    },
}

impl TurnMetrics {
    pub fn total_time(&self) -> Duration {
        match self {
            TurnMetrics::Telemetry { total_time } => *total_time,
            TurnMetrics::Generation { total_time, .. } => *total_time,
        }
    }
}

impl fmt::Display for TurnMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMetrics::Telemetry { total_time } => {
                write!(f, "total {:.3}s", total_time.as_secs_f64())
            }
            TurnMetrics::Generation {
                time_to_first_token,
                tokens_per_second,
                token_count,
                mean_inter_token,
                total_time,
                early_stopped,
            } => {
                match time_to_first_token {
                    Some(ttft) => write!(f, "ttft {:.3}s, ", ttft.as_secs_f64())?,
                    None => write!(f, "ttft n/a, ")?,
                }
                write!(
                    f,
                    "{} tokens, {:.1} tok/s, total {:.3}s",
                    token_count,
                    tokens_per_second,
                    total_time.as_secs_f64()
                )?;
                if let Some(gap) = mean_inter_token {
                    write!(f, ", avg gap {:.3}s", gap.as_secs_f64())?;
                }
                if *early_stopped {
                    write!(f, " (early stop)")?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Identity and counters of one conversation session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub locale: String,
    pub turns_handled: u64,
}

impl SessionInfo {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            locale: locale.into(),
            turns_handled: 0,
        }
    }
}
