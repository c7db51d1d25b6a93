/// Golden ratio: (1 + √5) / 2
pub const PHI: f64 = 1.618_033_988_749_895;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// FastPass heartbeat period (100 Hz)
pub const TICK_PERIOD_MS: u64 = 10;

/// Upper bound on a single tick's awareness/integration nudge
pub const MAX_TICK_DELTA: f64 = 0.05;

/// Integration score relaxes toward the awareness/coherence mean at this rate per tick
pub const INTEGRATION_RELAXATION: f64 = 0.1;

/// Urgency reported when no marker is present
pub const URGENCY_BASELINE: f64 = 0.3;

/// Urgency floor once any urgency marker is present
pub const URGENCY_RAISED: f64 = 0.9;

/// Default recursion depth N for the deep pass
pub const DEFAULT_RECURSION_DEPTH: usize = 7;

/// Deep pass memo bound (entries keyed by input and depth)
pub const MEMO_CAPACITY: usize = 1000;

/// Fallback mirror state when a scorer fails
pub const FALLBACK_COHERENCE: f64 = 0.5;
pub const FALLBACK_ARCHETYPE: f64 = 0.7;

/// Token count at which lexical diversity stops being discounted for brevity
pub const COMPLEXITY_SATURATION: usize = 12;

/// Weight tier thresholds
pub const URGENCY_TIER: f64 = 0.7;
pub const COMPLEXITY_TIER: f64 = 0.7;

/// Effective complexity floor for philosophical inputs.
pub const PHILOSOPHICAL_COMPLEXITY: f64 = 0.8;

/// Stream-coherence tiers for text combination
pub const CONCATENATE_ABOVE: f64 = 0.8;
pub const TRANSITION_ABOVE: f64 = 0.5;

/// AssociativeMemory bound
pub const MEMORY_CAPACITY: usize = 10_000;

/// Default resonance recall tolerance
pub const RESONANCE_TOLERANCE: f64 = 0.1;

/// Default harmonic consolidation threshold
pub const CONSOLIDATION_THRESHOLD: f64 = 0.7;

/// Amplitude multiplier applied to a consolidated entry
pub const CONSOLIDATION_BOOST: f64 = 1.2;

/// Spiral traversal step: 1000·φ milliseconds
pub const SPIRAL_STEP_MS: f64 = 1000.0 * PHI;

/// Upper bound on steps in one spiral traversal
pub const MAX_SPIRAL_STEPS: usize = 1_024;

/// Weights of (spatial, amplitude, temporal) terms in pairwise memory coherence
pub const COHERENCE_WEIGHTS: [f64; 3] = [0.4, 0.3, 0.3];
