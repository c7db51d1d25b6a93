//! Dual-cadence response engine.
//!
//! A fast pass answers immediately while a 100 Hz heartbeat keeps its
//! awareness state drifting. A deep pass reflects on the same input through
//! a memoized, depth-bounded mirror recursion. Fusion aligns the two results
//! and blends them into one response, and an associative memory stores
//! outcomes on a golden-ratio spiral in the complex plane.
//!
//! Zero I/O: scheduling, timeouts and transport live in `tandem-runtime`.

pub mod constants;
pub mod deep;
pub mod error;
pub mod fast;
pub mod fusion;
pub mod memory;
pub mod noise;
pub mod phasor;
pub mod scorer;
pub mod stimulus;
pub mod time;
pub mod tokenizer;

pub use constants::{EPSILON, PHI};
pub use deep::{DeepPass, DeepResult, DeepScorers, MirrorState, PartialInsight};
pub use error::{Result, TandemError, validate_input};
pub use fast::{FastPass, FastResult, FastScorers, Snapshot};
pub use fusion::{
    Alignment, CombinationStrategy, Fusion, FusionResult, FusionWeights, fusion_payload,
};
pub use memory::{AssociativeMemory, MemoryEntry, MemoryStats};
pub use noise::NoiseSource;
pub use phasor::{Coordinate, angular_gap, spiral_phase};
pub use scorer::{
    ArchetypeMatcher, EmotionScorer, PassRole, SemanticSimilarity, TextGenerator, ToneScorer,
    UrgencyScorer, VectorExtractor,
};
pub use stimulus::{ContextTag, Stimulus};
pub use time::{Clock, ManualClock, SystemClock};
