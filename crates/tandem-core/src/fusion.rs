//! Fan-in synthesis of one fast result and one deep result.
//!
//! Fusion here is pure: it scores agreement, picks weights, and blends text.
//! Waiting for both halves and persisting the memory entry is the runtime's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COMPLEXITY_TIER, CONCATENATE_ABOVE, PHILOSOPHICAL_COMPLEXITY, TRANSITION_ABOVE, URGENCY_RAISED,
    URGENCY_TIER,
};
use crate::deep::DeepResult;
use crate::error::{Result, TandemError};
use crate::fast::FastResult;
use crate::scorer::{JaccardSimilarity, SemanticSimilarity};
use crate::stimulus::ContextTag;

/// Marker placed between the two texts in the middle coherence tier.
pub const TRANSITION_MARKER: &str = "[on reflection]";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub fast: f64,
    pub deep: f64,
}

impl FusionWeights {
    pub const FAST_LEANING: Self = Self { fast: 0.7, deep: 0.3 };
    pub const DEEP_LEANING: Self = Self { fast: 0.3, deep: 0.7 };
    pub const BALANCED: Self = Self { fast: 0.5, deep: 0.5 };

    /// Urgency wins over complexity.
    pub fn select(urgency: f64, complexity: f64) -> Self {
        if urgency > URGENCY_TIER {
            Self::FAST_LEANING
        } else if complexity > COMPLEXITY_TIER {
            Self::DEEP_LEANING
        } else {
            Self::BALANCED
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationStrategy {
    /// streamCoherence > 0.8
    Concatenate,
    /// 0.5 < streamCoherence ≤ 0.8
    Transition,
    /// streamCoherence ≤ 0.5
    Alternatives,
}

impl CombinationStrategy {
    pub fn for_coherence(stream_coherence: f64) -> Self {
        if stream_coherence > CONCATENATE_ABOVE {
            Self::Concatenate
        } else if stream_coherence > TRANSITION_ABOVE {
            Self::Transition
        } else {
            Self::Alternatives
        }
    }

    pub fn combine(self, fast: &str, deep: &str) -> String {
        match self {
            Self::Concatenate => format!("{fast} {deep}"),
            Self::Transition => format!("{fast}\n{TRANSITION_MARKER}\n{deep}"),
            Self::Alternatives => format!("Immediate: {fast}\nReflective: {deep}"),
        }
    }
}

/// The three agreement terms between the passes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub semantic: f64,
    pub temporal: f64,
    pub emotional: f64,
}

impl Alignment {
    pub fn stream_coherence(&self) -> f64 {
        (self.semantic + self.temporal + self.emotional) / 3.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionResult {
    pub unified_text: String,
    pub combined_score: f64,
    pub stream_coherence: f64,
    pub weights: FusionWeights,
    pub strategy: CombinationStrategy,
    pub alignment: Alignment,
    /// Either pass fell back (generator failure, scorer fallback, or deadline).
    pub degraded: bool,
}

pub struct Fusion {
    similarity: Arc<dyn SemanticSimilarity>,
}

impl Default for Fusion {
    fn default() -> Self {
        Self::new(Arc::new(JaccardSimilarity))
    }
}

impl Fusion {
    pub fn new(similarity: Arc<dyn SemanticSimilarity>) -> Self {
        Self { similarity }
    }

    pub fn alignment(&self, fast: &FastResult, deep: &DeepResult) -> Alignment {
        let semantic = self
            .similarity
            .similarity(&fast.response, &deep.insight)
            .clamp(0.0, 1.0);
        let gap_ms = fast.timestamp.abs_diff(deep.timestamp) as f64;
        let temporal = 1.0 / (1.0 + gap_ms / 1000.0);
        let emotional = (1.0 - (fast.emotion_score - deep.emotion_score).abs()).clamp(0.0, 1.0);
        Alignment {
            semantic,
            temporal,
            emotional,
        }
    }

    /// Weighting after context tags adjust the effective urgency and complexity.
    pub fn weights(
        fast: &FastResult,
        deep: &DeepResult,
        context: Option<&ContextTag>,
    ) -> FusionWeights {
        let mut urgency = fast.urgency;
        let mut complexity = deep.complexity;
        match context {
            Some(ContextTag::Urgent) => urgency = urgency.max(URGENCY_RAISED),
            Some(ContextTag::Philosophical) => complexity = complexity.max(PHILOSOPHICAL_COMPLEXITY),
            _ => {}
        }
        FusionWeights::select(urgency, complexity)
    }

    /// Join a matched pair. Fatal only when neither pass produced text.
    pub fn fuse(
        &self,
        fast: &FastResult,
        deep: &DeepResult,
        context: Option<&ContextTag>,
    ) -> Result<FusionResult> {
        if let (Some(fast_err), Some(deep_err)) = (&fast.failure, &deep.failure) {
            return Err(TandemError::BothPassesFailed {
                fast: fast_err.clone(),
                deep: deep_err.clone(),
            });
        }

        let alignment = self.alignment(fast, deep);
        let stream_coherence = alignment.stream_coherence();
        let weights = Self::weights(fast, deep, context);
        let combined_score = (fast.integration_score * weights.fast
            + deep.coherence * weights.deep)
            .clamp(0.0, 1.0);
        let strategy = CombinationStrategy::for_coherence(stream_coherence);

        let unified_text = if fast.generation_failed() {
            deep.insight.clone()
        } else if deep.generation_failed() {
            fast.response.clone()
        } else {
            strategy.combine(&fast.response, &deep.insight)
        };

        Ok(FusionResult {
            unified_text,
            combined_score,
            stream_coherence,
            weights,
            strategy,
            alignment,
            degraded: fast.generation_failed() || deep.generation_failed() || deep.degraded,
        })
    }
}

/// Memory payload recorded for a completed fusion.
pub fn fusion_payload(input: &str, result: &FusionResult) -> serde_json::Value {
    serde_json::json!({
        "kind": "fusion",
        "input": input,
        "unifiedText": result.unified_text,
        "combinedScore": result.combined_score,
        "streamCoherence": result.stream_coherence,
        "strategy": result.strategy,
    })
}
