//! Bounded-depth recursive mirror.
//!
//! Level 0 is scored directly from the input; level d is a fixed rotation of
//! level d-1 at angle φ·d. Levels are evaluated iteratively from the deepest
//! memoized ancestor, so a repeated input costs one map lookup and a deeper
//! request only pays for the layers it adds.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_RECURSION_DEPTH, FALLBACK_ARCHETYPE, FALLBACK_COHERENCE, MEMO_CAPACITY, PHI,
};
use crate::error::{Result, TandemError, validate_input};
use crate::scorer::{
    ArchetypeMatcher, HashingVectorExtractor, KeywordArchetypeMatcher, LexiconToneScorer,
    PassRole, TemplateGenerator, TextGenerator, ToneScorer, VectorExtractor,
};
use crate::time::{Clock, SystemClock};
use crate::tokenizer::lexical_diversity;

/// One recursion level. `coherence` is always the mean of the three axis scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorState {
    pub depth: usize,
    pub coherence: f64,
    pub vector: Vec<f64>,
    pub tone_field: f64,
    pub archetype_match: f64,
    pub trace: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

impl MirrorState {
    fn compose(
        depth: usize,
        vector: Vec<f64>,
        tone_field: f64,
        archetype_match: f64,
        trace: Vec<String>,
    ) -> Self {
        let coherence = (vector_score(&vector) + tone_field + archetype_match) / 3.0;
        Self {
            depth,
            coherence,
            vector,
            tone_field,
            archetype_match,
            trace,
            fallback: false,
        }
    }

    /// Conservative stand-in when a scorer fails: coherence 0.5, archetype 0.7.
    pub fn fallback(depth: usize, reason: &str) -> Self {
        let mut state = Self::compose(
            depth,
            vec![0.3],
            0.5,
            FALLBACK_ARCHETYPE,
            vec![format!("fallback: {reason}")],
        );
        debug_assert!((state.coherence - FALLBACK_COHERENCE).abs() < 1e-12);
        state.fallback = true;
        state
    }

    /// Level `self.depth + 1`.
    fn refine(&self) -> Self {
        let depth = self.depth + 1;
        let theta = PHI * depth as f64;
        let len = self.vector.len().max(1) as f64;
        let vector = self
            .vector
            .iter()
            .enumerate()
            .map(|(i, v)| v * (theta + i as f64 * std::f64::consts::PI / len).cos())
            .collect();
        let tone_field = (self.tone_field * (1.0 + 0.1 * theta.sin())).clamp(0.0, 1.0);
        let archetype_match = (self.archetype_match * (1.0 + 0.05 * depth as f64)).min(1.0);

        let mut trace = self.trace.clone();
        let mut next = Self::compose(depth, vector, tone_field, archetype_match, Vec::new());
        trace.push(format!("depth {depth}: coherence {:.3}", next.coherence));
        next.trace = trace;
        next
    }
}

/// Euclidean norm clamped to [0, 1].
fn vector_score(vector: &[f64]) -> f64 {
    vector.iter().map(|v| v * v).sum::<f64>().sqrt().clamp(0.0, 1.0)
}

fn unit_score(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(TandemError::ExtractionFailure(format!("{name} is not finite")));
    }
    Ok(value.clamp(0.0, 1.0))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MemoKey {
    input: String,
    depth: usize,
}

/// Insertion-ordered bounded cache; evicts the oldest key on overflow.
#[derive(Debug)]
struct MirrorMemo {
    entries: HashMap<MemoKey, MirrorState>,
    order: VecDeque<MemoKey>,
    capacity: usize,
    hits: u64,
    evictions: u64,
}

impl MirrorMemo {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            evictions: 0,
        }
    }

    fn get(&self, input: &str, depth: usize) -> Option<&MirrorState> {
        self.entries.get(&MemoKey {
            input: input.to_string(),
            depth,
        })
    }

    /// Deepest cached level at or below `depth`.
    fn deepest(&self, input: &str, depth: usize) -> Option<&MirrorState> {
        (0..=depth).rev().find_map(|d| self.get(input, d))
    }

    fn insert(&mut self, input: &str, state: MirrorState) {
        let key = MemoKey {
            input: input.to_string(),
            depth: state.depth,
        };
        if self.entries.contains_key(&key) {
            return;
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, state);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            self.evictions += 1;
        }
    }
}

/// Collaborators consulted by the deep pass.
#[derive(Clone)]
pub struct DeepScorers {
    pub vector: Arc<dyn VectorExtractor>,
    pub tone: Arc<dyn ToneScorer>,
    pub archetype: Arc<dyn ArchetypeMatcher>,
    pub generator: Arc<dyn TextGenerator>,
}

impl Default for DeepScorers {
    fn default() -> Self {
        Self {
            vector: Arc::new(HashingVectorExtractor::default()),
            tone: Arc::new(LexiconToneScorer),
            archetype: Arc::new(KeywordArchetypeMatcher::default()),
            generator: Arc::new(TemplateGenerator),
        }
    }
}

/// Interpretation for one input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepResult {
    pub insight: String,
    pub understanding: String,
    pub recursion_depth: usize,
    pub coherence: f64,
    pub complexity: f64,
    pub latency_ms: f64,
    pub timestamp: u64,
    /// Tone field of the deepest level, the deep pass's emotional reading.
    pub emotion_score: f64,
    /// Mirror chain substituted a fallback state or was cut short.
    #[serde(default)]
    pub degraded: bool,
    /// Set when no text was produced: the generator failed or the pass died.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl DeepResult {
    pub fn generation_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Cheap estimate available without running the full chain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialInsight {
    pub depth: usize,
    pub coherence: f64,
    pub memoized: bool,
}

pub struct DeepPass {
    scorers: DeepScorers,
    memo: Mutex<MirrorMemo>,
    max_depth: usize,
    clock: Arc<dyn Clock>,
}

impl DeepPass {
    pub fn new(
        scorers: DeepScorers,
        memo_capacity: usize,
        max_depth: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scorers,
            memo: Mutex::new(MirrorMemo::new(memo_capacity)),
            max_depth,
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            DeepScorers::default(),
            MEMO_CAPACITY,
            DEFAULT_RECURSION_DEPTH,
            Arc::new(SystemClock),
        )
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn memo(&self) -> std::sync::MutexGuard<'_, MirrorMemo> {
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn memo_len(&self) -> usize {
        self.memo().entries.len()
    }

    pub fn memo_hits(&self) -> u64 {
        self.memo().hits
    }

    pub fn memo_evictions(&self) -> u64 {
        self.memo().evictions
    }

    fn base_state(&self, input: &str) -> Result<MirrorState> {
        let vector = self.scorers.vector.extract(input)?;
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(TandemError::ExtractionFailure(
                "vector has non-finite components".to_string(),
            ));
        }
        let tone = unit_score("tone", self.scorers.tone.tone(input)?)?;
        let archetype = unit_score(
            "archetype",
            self.scorers.archetype.archetype_match(input)?,
        )?;
        Ok(MirrorState::compose(
            0,
            vector,
            tone,
            archetype,
            vec!["depth 0: base".to_string()],
        ))
    }

    /// Mirror state at `depth` (clamped to the configured maximum). Never fails:
    /// a scorer error yields the fallback state, which is not memoized.
    pub fn mirror(&self, input: &str, depth: usize) -> MirrorState {
        let depth = depth.min(self.max_depth);

        let start = {
            let mut memo = self.memo();
            if let Some(hit) = memo.get(input, depth).cloned() {
                memo.hits += 1;
                return hit;
            }
            memo.deepest(input, depth).cloned()
        };

        let mut computed = Vec::new();
        let mut state = match start {
            Some(state) => state,
            None => match self.base_state(input) {
                Ok(state) => {
                    computed.push(state.clone());
                    state
                }
                Err(e) => {
                    tracing::warn!("deep pass scorer failed, using fallback state: {e}");
                    return MirrorState::fallback(depth, &e.to_string());
                }
            },
        };

        while state.depth < depth {
            state = state.refine();
            computed.push(state.clone());
        }

        let mut memo = self.memo();
        for layer in computed {
            memo.insert(input, layer);
        }
        state
    }

    pub fn process_recursive(&self, input: &str, depth: usize) -> Result<DeepResult> {
        validate_input(input)?;
        let started = Instant::now();

        let state = self.mirror(input, depth);
        let complexity = lexical_diversity(input);

        let (insight, failure) = match self.scorers.generator.generate(input, PassRole::Deep) {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::warn!("deep pass generator failed: {e}");
                (String::new(), Some(e.to_string()))
            }
        };

        Ok(DeepResult {
            insight,
            understanding: describe(&state),
            recursion_depth: state.depth,
            coherence: state.coherence,
            complexity,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            timestamp: self.clock.now_millis(),
            emotion_score: state.tone_field,
            degraded: state.fallback,
            failure,
        })
    }

    /// Deepest memoized level if any, otherwise the base level.
    pub fn get_partial_insight(&self, input: &str) -> PartialInsight {
        if let Some(partial) = self.memoized_insight(input) {
            return partial;
        }
        let state = self.mirror(input, 0);
        PartialInsight {
            depth: 0,
            coherence: state.coherence,
            memoized: false,
        }
    }

    /// Deepest memoized level only. Never runs a scorer.
    pub fn memoized_insight(&self, input: &str) -> Option<PartialInsight> {
        self.memo()
            .deepest(input, self.max_depth)
            .map(|state| PartialInsight {
                depth: state.depth,
                coherence: state.coherence,
                memoized: true,
            })
    }

    /// Stand-in result when the full chain is not available in time. Uses the
    /// memo when it can, else the fallback coherence, so it never waits on a
    /// scorer that may be the reason the deadline passed.
    pub fn partial_result(&self, input: &str, timeout_ms: u64) -> DeepResult {
        let mut result = self.failed_result(
            input,
            TandemError::TimeoutExceeded { millis: timeout_ms }.to_string(),
        );
        result.understanding = format!(
            "partial insight at depth {} (deadline {timeout_ms}ms)",
            result.recursion_depth
        );
        result.latency_ms = timeout_ms as f64;
        result
    }

    /// Stand-in result when the chain could not finish at all. Same memo-only
    /// estimate as `partial_result`, with `failure` set to `reason`.
    pub fn failed_result(&self, input: &str, reason: impl Into<String>) -> DeepResult {
        let partial = self.memoized_insight(input).unwrap_or(PartialInsight {
            depth: 0,
            coherence: FALLBACK_COHERENCE,
            memoized: false,
        });
        DeepResult {
            insight: String::new(),
            understanding: format!("partial insight at depth {}", partial.depth),
            recursion_depth: partial.depth,
            coherence: partial.coherence,
            complexity: lexical_diversity(input),
            latency_ms: 0.0,
            timestamp: self.clock.now_millis(),
            emotion_score: 0.5,
            degraded: true,
            failure: Some(reason.into()),
        }
    }
}

fn describe(state: &MirrorState) -> String {
    if state.fallback {
        return format!("fallback reading at depth {}", state.depth);
    }
    format!(
        "{} layers, coherence {:.2}, tone {:.2}, archetype {:.2}",
        state.depth + 1,
        state.coherence,
        state.tone_field,
        state.archetype_match
    )
}
