//! Streaming response aggregation.
//!
//! Consumes the fragments of a streamed answer, accumulates the text, times
//! every arrival, and stops reading early once the early-stop policy fires.
//! Printing is delegated to a `TokenSink` so the algorithm has no I/O.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aerochat_core::clock::{elapsed_between, Clock};
use aerochat_core::config::StreamingConfig;
use aerochat_core::types::TurnMetrics;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::ChatError;

// =============================================================================
// EarlyStopPolicy
// =============================================================================

/// Heuristic cut-off for long answers.
///
/// Once more than `token_threshold` fragments have arrived, the first fragment
/// containing a terminator character ends the answer. This is approximate: a
/// terminator inside an abbreviation or a list marker stops the answer
/// mid-thought just the same.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopPolicy {
    enabled: bool,
    token_threshold: usize,
    terminators: Vec<char>,
}

impl EarlyStopPolicy {
    pub fn new(token_threshold: usize, terminators: &str) -> Self {
        Self {
            enabled: true,
            token_threshold,
            terminators: terminators.chars().collect(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            token_threshold: 0,
            terminators: Vec::new(),
        }
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        if config.early_stop {
            Self::new(config.token_threshold, &config.terminators)
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn should_stop(&self, token_count: usize, fragment: &str) -> bool {
        self.enabled
            && token_count > self.token_threshold
            && fragment.chars().any(|c| self.terminators.contains(&c))
    }
}

impl Default for EarlyStopPolicy {
    fn default() -> Self {
        Self::from_config(&StreamingConfig::default())
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receives fragments as they arrive, e.g. to print them.
pub trait TokenSink {
    fn on_fragment(&mut self, fragment: &str);

    /// Called once the answer is complete or was cut off.
    fn on_finish(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TokenSink for NullSink {
    fn on_fragment(&mut self, _fragment: &str) {}
}

/// Records fragments in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub fragments: Vec<String>,
    pub finished: bool,
}

impl TokenSink for CollectingSink {
    fn on_fragment(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    fn on_finish(&mut self) {
        self.finished = true;
    }
}

// =============================================================================
// StreamAggregator
// =============================================================================

/// Full text of an answer plus its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResponse {
    pub text: String,
    pub metrics: TurnMetrics,
}

impl AggregatedResponse {
    pub fn token_count(&self) -> usize {
        match self.metrics {
            TurnMetrics::Generation { token_count, .. } => token_count,
            TurnMetrics::Telemetry { .. } => 0,
        }
    }

    pub fn early_stopped(&self) -> bool {
        matches!(
            self.metrics,
            TurnMetrics::Generation {
                early_stopped: true,
                ..
            }
        )
    }
}

/// Drives one fragment stream to completion or early stop.
pub struct StreamAggregator {
    clock: Arc<dyn Clock>,
    policy: EarlyStopPolicy,
}

impl StreamAggregator {
    pub fn new(clock: Arc<dyn Clock>, policy: EarlyStopPolicy) -> Self {
        Self { clock, policy }
    }

    pub fn policy(&self) -> &EarlyStopPolicy {
        &self.policy
    }

    /// Consume `stream`, which was requested at `request_start`.
    ///
    /// The stream is dropped on return. For a streamed HTTP body that closes
    /// the connection, which is the only cancellation the service gets.
    pub async fn run<S>(
        &self,
        mut stream: S,
        request_start: Instant,
        sink: &mut dyn TokenSink,
    ) -> Result<AggregatedResponse, ChatError>
    where
        S: Stream<Item = Result<String, ChatError>> + Unpin,
    {
        let mut text = String::new();
        let mut token_count = 0usize;
        let mut first_arrival: Option<Instant> = None;
        let mut last_arrival: Option<Instant> = None;
        let mut gap_total = Duration::ZERO;
        let mut gap_count = 0u32;
        let mut early_stopped = false;

        while let Some(item) = stream.next().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => {
                    warn!(error = %e, received = token_count, "Stream failed mid-answer");
                    return Err(e);
                }
            };
            let arrival = self.clock.now();

            sink.on_fragment(&fragment);
            text.push_str(&fragment);
            token_count += 1;

            if first_arrival.is_none() {
                first_arrival = Some(arrival);
            }
            if let Some(previous) = last_arrival {
                gap_total += elapsed_between(previous, arrival);
                gap_count += 1;
            }
            last_arrival = Some(arrival);

            if self.policy.should_stop(token_count, &fragment) {
                debug!(token_count, "Early stop triggered");
                early_stopped = true;
                break;
            }
        }
        drop(stream);

        let finished_at = self.clock.now();
        sink.on_finish();

        let tokens_per_second = match (first_arrival, last_arrival) {
            (Some(first), Some(last)) if token_count > 1 => {
                let span = elapsed_between(first, last).as_secs_f64();
                if span > 0.0 {
                    token_count as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let metrics = TurnMetrics::Generation {
            time_to_first_token: first_arrival.map(|first| elapsed_between(request_start, first)),
            tokens_per_second,
            token_count,
            mean_inter_token: (gap_count > 0).then(|| gap_total / gap_count),
            total_time: elapsed_between(request_start, finished_at),
            early_stopped,
        };
        debug!(%metrics, "Stream aggregated");

        Ok(AggregatedResponse { text, metrics })
    }
}
