use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::constants::{INTEGRATION_RELAXATION, MAX_TICK_DELTA};
use crate::error::{Result, validate_input};
use crate::noise::NoiseSource;
use crate::scorer::{
    EmotionScorer, KeywordUrgencyScorer, LexiconEmotionScorer, PassRole, TemplateGenerator,
    TextGenerator, UrgencyScorer,
};
use crate::time::{Clock, SystemClock};

/// Lightweight fast-pass state. Consumers only ever see copies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub integration_score: f64,
    pub awareness: f64,
    pub coherence: f64,
    pub timestamp: u64,
    pub tick: u64,
}

impl Snapshot {
    fn initial(timestamp: u64) -> Self {
        Self {
            integration_score: 0.5,
            awareness: 0.5,
            coherence: 0.5,
            timestamp,
            tick: 0,
        }
    }
}

/// Immediate answer for one input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastResult {
    pub response: String,
    pub awareness: f64,
    pub emotion_score: f64,
    pub integration_score: f64,
    pub urgency: f64,
    pub latency_ms: f64,
    pub timestamp: u64,
    /// Set when no text was produced: the generator failed or the pass died.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl FastResult {
    pub fn generation_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Collaborators consulted by the fast pass.
#[derive(Clone)]
pub struct FastScorers {
    pub generator: Arc<dyn TextGenerator>,
    pub urgency: Arc<dyn UrgencyScorer>,
    pub emotion: Arc<dyn EmotionScorer>,
}

impl Default for FastScorers {
    fn default() -> Self {
        Self {
            generator: Arc::new(TemplateGenerator),
            urgency: Arc::new(KeywordUrgencyScorer),
            emotion: Arc::new(LexiconEmotionScorer),
        }
    }
}

/// Fixed-period reactive pass.
///
/// `tick` is driven externally (the runtime heartbeat); `process_immediate`
/// answers one input from the current state without waiting on a tick.
pub struct FastPass {
    state: Mutex<Snapshot>,
    scorers: FastScorers,
    noise: Arc<NoiseSource>,
    clock: Arc<dyn Clock>,
}

impl FastPass {
    pub fn new(scorers: FastScorers, noise: Arc<NoiseSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(Snapshot::initial(clock.now_millis())),
            scorers,
            noise,
            clock,
        }
    }

    /// Default heuristics, silent noise, system clock.
    pub fn with_defaults() -> Self {
        Self::new(
            FastScorers::default(),
            Arc::new(NoiseSource::silent()),
            Arc::new(SystemClock),
        )
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance one tick: jitter awareness, relax integration toward the
    /// awareness/coherence mean. Both moves are bounded by MAX_TICK_DELTA.
    pub fn tick(&self) -> Snapshot {
        let jitter = self.noise.sample().clamp(-MAX_TICK_DELTA, MAX_TICK_DELTA);
        let now = self.clock.now_millis();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.awareness = (state.awareness + jitter).clamp(0.0, 1.0);
        let target = (state.awareness + state.coherence) / 2.0;
        let pull = ((target - state.integration_score) * INTEGRATION_RELAXATION)
            .clamp(-MAX_TICK_DELTA, MAX_TICK_DELTA);
        state.integration_score = (state.integration_score + pull).clamp(0.0, 1.0);
        state.timestamp = now;
        state.tick += 1;
        *state
    }

    pub fn process_immediate(&self, input: &str) -> Result<FastResult> {
        validate_input(input)?;
        let started = Instant::now();

        let urgency = self.scorers.urgency.urgency(input).clamp(0.0, 1.0);
        let emotion_score = self.scorers.emotion.emotion(input).clamp(0.0, 1.0);
        let snapshot = self.snapshot();

        let (response, failure) = match self.scorers.generator.generate(input, PassRole::Fast) {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::warn!("fast pass generator failed: {e}");
                (String::new(), Some(e.to_string()))
            }
        };

        Ok(FastResult {
            response,
            awareness: snapshot.awareness,
            emotion_score,
            integration_score: snapshot.integration_score,
            urgency,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            timestamp: self.clock.now_millis(),
            failure,
        })
    }

    /// Stand-in when the pass could not finish: current state, empty
    /// response, `failure` set to `reason`.
    pub fn failed_result(&self, reason: impl Into<String>) -> FastResult {
        let snapshot = self.snapshot();
        FastResult {
            response: String::new(),
            awareness: snapshot.awareness,
            emotion_score: 0.5,
            integration_score: snapshot.integration_score,
            urgency: 0.0,
            latency_ms: 0.0,
            timestamp: self.clock.now_millis(),
            failure: Some(reason.into()),
        }
    }

    /// Blend an externally supplied coherence into the running value by averaging.
    pub fn receive_deep_insight(&self, partial_coherence: f64) {
        let partial = partial_coherence.clamp(0.0, 1.0);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.coherence = (state.coherence + partial) / 2.0;
    }
}
