//! Pluggable collaborators and their default keyword heuristics.
//!
//! Language generation, semantic vectors, tone, archetype, urgency and
//! emotion scoring are all consumed through these traits. The defaults
//! are cheap lexicon lookups, good enough to exercise the pipeline and
//! deterministic unless an archetype noise source is attached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{URGENCY_BASELINE, URGENCY_RAISED};
use crate::error::{Result, TandemError};
use crate::noise::NoiseSource;
use crate::tokenizer::{jaccard, tokenize};

/// Which pass is asking the generator for text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassRole {
    Fast,
    Deep,
}

pub trait TextGenerator: Send + Sync {
    fn generate(&self, input: &str, role: PassRole) -> Result<String>;
}

pub trait VectorExtractor: Send + Sync {
    fn extract(&self, input: &str) -> Result<Vec<f64>>;
}

/// Tone in [0, 1], 0.5 neutral.
pub trait ToneScorer: Send + Sync {
    fn tone(&self, input: &str) -> Result<f64>;
}

/// Best archetype match in [0, 1].
pub trait ArchetypeMatcher: Send + Sync {
    fn archetype_match(&self, input: &str) -> Result<f64>;
}

/// Urgency in [0, 1].
pub trait UrgencyScorer: Send + Sync {
    fn urgency(&self, input: &str) -> f64;
}

/// Emotional valence in [0, 1], 0.5 neutral.
pub trait EmotionScorer: Send + Sync {
    fn emotion(&self, input: &str) -> f64;
}

/// Similarity of two texts in [0, 1].
pub trait SemanticSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

// ---------------------------------------------------------------------------
// Lexicons
// ---------------------------------------------------------------------------

const URGENCY_MARKERS: &[&str] = &[
    "urgent", "help", "now", "emergency", "asap", "immediately", "quick", "quickly", "hurry",
    "critical",
];

const POSITIVE: &[&str] = &[
    "good", "great", "love", "happy", "joy", "thanks", "thank", "wonderful", "hope", "calm",
    "beautiful", "glad", "excited", "peace", "kind",
];

const NEGATIVE: &[&str] = &[
    "bad", "sad", "angry", "hate", "fear", "afraid", "pain", "worried", "issue", "problem",
    "broken", "lost", "alone", "terrible", "wrong",
];

const ARCHETYPES: &[(&str, &[&str])] = &[
    ("seeker", &["why", "meaning", "truth", "purpose", "search", "wonder"]),
    ("sage", &["know", "understand", "learn", "explain", "wisdom", "think"]),
    ("creator", &["make", "build", "imagine", "create", "design", "write"]),
    ("caregiver", &["help", "care", "support", "protect", "heal", "comfort"]),
    ("hero", &["fight", "overcome", "brave", "win", "challenge", "strong"]),
];

/// Net valence of a token list mapped to [0, 1].
fn valence(tokens: &[String]) -> f64 {
    let pos = tokens.iter().filter(|t| POSITIVE.contains(&t.as_str())).count() as f64;
    let neg = tokens.iter().filter(|t| NEGATIVE.contains(&t.as_str())).count() as f64;
    if pos + neg == 0.0 {
        return 0.5;
    }
    0.5 + 0.5 * (pos - neg) / (pos + neg)
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in token.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Local stand-in for a remote generation service.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateGenerator;

impl TextGenerator for TemplateGenerator {
    fn generate(&self, input: &str, role: PassRole) -> Result<String> {
        let text = input.trim();
        match role {
            PassRole::Fast => Ok(format!("Heard you: {text}")),
            PassRole::Deep => {
                let tokens = tokenize(text);
                let focus = tokens
                    .iter()
                    .max_by_key(|t| t.len())
                    .map(String::as_str)
                    .unwrap_or(text);
                Ok(format!("Looking deeper at {text}, the thread that matters is {focus}."))
            }
        }
    }
}

/// Hashes tokens into a fixed number of buckets; each component is the
/// share of tokens that fell into it.
#[derive(Clone, Copy, Debug)]
pub struct HashingVectorExtractor {
    pub dims: usize,
}

impl Default for HashingVectorExtractor {
    fn default() -> Self {
        Self { dims: 16 }
    }
}

impl VectorExtractor for HashingVectorExtractor {
    fn extract(&self, input: &str) -> Result<Vec<f64>> {
        let tokens = tokenize(input);
        if tokens.is_empty() || self.dims == 0 {
            return Err(TandemError::ExtractionFailure(
                "no tokens to embed".to_string(),
            ));
        }
        let mut vector = vec![0.0; self.dims];
        for token in &tokens {
            vector[(fnv1a(token) % self.dims as u64) as usize] += 1.0;
        }
        let total = tokens.len() as f64;
        vector.iter_mut().for_each(|v| *v /= total);
        Ok(vector)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LexiconToneScorer;

impl ToneScorer for LexiconToneScorer {
    fn tone(&self, input: &str) -> Result<f64> {
        Ok(valence(&tokenize(input)))
    }
}

/// Share of tokens belonging to the best-matching archetype lexicon,
/// lifted onto [0.4, 1.0] and optionally perturbed.
#[derive(Debug, Default)]
pub struct KeywordArchetypeMatcher {
    noise: Option<Arc<NoiseSource>>,
}

impl KeywordArchetypeMatcher {
    pub fn with_noise(noise: Arc<NoiseSource>) -> Self {
        Self { noise: Some(noise) }
    }
}

impl ArchetypeMatcher for KeywordArchetypeMatcher {
    fn archetype_match(&self, input: &str) -> Result<f64> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return Err(TandemError::ExtractionFailure(
                "no tokens to match".to_string(),
            ));
        }
        let best = ARCHETYPES
            .iter()
            .map(|(_, words)| tokens.iter().filter(|t| words.contains(&t.as_str())).count())
            .max()
            .unwrap_or(0);
        let share = best as f64 / tokens.len() as f64;
        let jitter = self.noise.as_ref().map_or(0.0, |n| n.sample());
        Ok((0.4 + 0.6 * share + jitter).clamp(0.0, 1.0))
    }
}

/// Baseline 0.3; any marker lifts urgency to 0.9, each further marker adds 0.025.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordUrgencyScorer;

impl UrgencyScorer for KeywordUrgencyScorer {
    fn urgency(&self, input: &str) -> f64 {
        let hits = tokenize(input)
            .iter()
            .filter(|t| URGENCY_MARKERS.contains(&t.as_str()))
            .count();
        if hits == 0 {
            return URGENCY_BASELINE;
        }
        (URGENCY_RAISED + 0.025 * (hits - 1) as f64).min(1.0)
    }
}

/// Lexicon valence, pushed away from neutral by exclamation marks.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexiconEmotionScorer;

impl EmotionScorer for LexiconEmotionScorer {
    fn emotion(&self, input: &str) -> f64 {
        let base = valence(&tokenize(input));
        let bangs = input.matches('!').count().min(4) as f64;
        let push = 0.05 * bangs;
        let shifted = if base >= 0.5 { base + push } else { base - push };
        shifted.clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JaccardSimilarity;

impl SemanticSimilarity for JaccardSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(a, b)
    }
}
