//! Telemetry responder.
//!
//! Answers sensor questions with synthetic readings. There is no real sensor
//! behind these numbers: each call draws a fresh value from the configured
//! range and renders it with the active locale's template.

use std::collections::VecDeque;

use aerochat_core::config::{LocaleConfig, TelemetryConfig};
use aerochat_core::types::TelemetryKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Capability that yields a number within `[low, high]`.
pub trait ValueSource: Send {
    fn sample(&mut self, low: f64, high: f64) -> f64;
}

/// Uniform random values.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueSource for RandomSource {
    fn sample(&mut self, low: f64, high: f64) -> f64 {
        self.rng.random_range(low..=high)
    }
}

/// Scripted values, replayed in order and clamped into the requested range.
/// Once exhausted it keeps returning `low`.
#[derive(Debug, Clone, Default)]
pub struct FixedSource {
    values: VecDeque<f64>,
}

impl FixedSource {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl ValueSource for FixedSource {
    fn sample(&mut self, low: f64, high: f64) -> f64 {
        self.values.pop_front().map_or(low, |v| v.clamp(low, high))
    }
}

/// Produces sensor-style answers for telemetry intents.
pub struct TelemetryResponder {
    ranges: TelemetryConfig,
    source: Box<dyn ValueSource>,
}

impl TelemetryResponder {
    pub fn new(ranges: TelemetryConfig, source: Box<dyn ValueSource>) -> Self {
        Self { ranges, source }
    }

    /// Render one reading of `kind`, rounded to one decimal, in `locale`.
    pub fn respond(&mut self, kind: TelemetryKind, locale: &LocaleConfig) -> String {
        let (low, high, template) = match kind {
            TelemetryKind::Altitude => (
                self.ranges.altitude_min,
                self.ranges.altitude_max,
                &locale.altitude_template,
            ),
            TelemetryKind::Temperature => (
                self.ranges.temperature_min,
                self.ranges.temperature_max,
                &locale.temperature_template,
            ),
        };
        let value = self.source.sample(low, high);
        template.replace("{value}", &format!("{:.1}", value))
    }
}
