//! Associative memory over the complex plane.
//!
//! Each entry sits at amplitude·(cos θ, sin θ) with θ = φ·createdAt + correction.
//! Three access paths share one id-keyed map:
//! - a resonance index, bucketing entries by their quantized frequency,
//! - an amplitude-ordered set, so eviction touches only the overflow,
//! - full scans for spatial proximity, spiral replay and consolidation.
//!
//! The store is a plain `&mut self` structure; callers sharing it across
//! tasks wrap it in a reader/writer lock.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    COHERENCE_WEIGHTS, CONSOLIDATION_BOOST, EPSILON, MAX_SPIRAL_STEPS, MEMORY_CAPACITY,
    SPIRAL_STEP_MS,
};
use crate::phasor::{Coordinate, angular_gap, spiral_phase};
use crate::time::{Clock, SystemClock};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: Uuid,
    pub created_at: u64,
    pub amplitude: f64,
    pub payload: serde_json::Value,
    pub coordinate: Coordinate,
    /// Angle of `coordinate` in [0, 2π).
    pub phase: f64,
    pub resonance_frequency: f64,
}

/// round((im + 1)·100) / 100, where im = amplitude·sin θ.
fn resonance_frequency(im: f64) -> f64 {
    ((im + 1.0) * 100.0).round() / 100.0
}

fn sanitize_amplitude(amplitude: f64) -> f64 {
    if amplitude.is_finite() {
        amplitude.max(0.0)
    } else {
        0.0
    }
}

impl MemoryEntry {
    /// Entry placed on the golden spiral at `created_at`.
    pub fn encode(
        payload: serde_json::Value,
        amplitude: f64,
        created_at: u64,
        phase_correction: f64,
    ) -> Self {
        let amplitude = sanitize_amplitude(amplitude);
        let theta = spiral_phase(created_at as f64, phase_correction);
        let coordinate = Coordinate::from_polar(amplitude, theta);
        Self {
            id: Uuid::new_v4(),
            created_at,
            amplitude,
            payload,
            coordinate,
            phase: theta,
            resonance_frequency: resonance_frequency(coordinate.im),
        }
    }

    /// Entry at an explicit coordinate (consolidation centroids).
    /// Its phase is the coordinate's angle.
    pub fn at(
        payload: serde_json::Value,
        amplitude: f64,
        created_at: u64,
        coordinate: Coordinate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            amplitude: sanitize_amplitude(amplitude),
            payload,
            coordinate,
            phase: coordinate.angle(),
            resonance_frequency: resonance_frequency(coordinate.im),
        }
    }

    fn bucket(&self) -> i64 {
        (self.resonance_frequency * 100.0).round() as i64
    }

    fn amplitude_key(&self) -> AmplitudeKey {
        AmplitudeKey {
            amplitude: self.amplitude,
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Eviction order: lowest amplitude first, oldest first among equals.
#[derive(Clone, Copy, Debug)]
struct AmplitudeKey {
    amplitude: f64,
    created_at: u64,
    id: Uuid,
}

impl PartialEq for AmplitudeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AmplitudeKey {}

impl PartialOrd for AmplitudeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AmplitudeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amplitude
            .total_cmp(&other.amplitude)
            .then(self.created_at.cmp(&other.created_at))
            .then(self.id.cmp(&other.id))
    }
}

/// Union-find with path halving and union by rank.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub entries: usize,
    pub capacity: usize,
    pub buckets: usize,
    pub total_amplitude: f64,
    pub evictions: u64,
    pub consolidations: u64,
}

pub struct AssociativeMemory {
    entries: HashMap<Uuid, MemoryEntry>,
    buckets: BTreeMap<i64, HashSet<Uuid>>,
    by_amplitude: BTreeSet<AmplitudeKey>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    evictions: u64,
    consolidations: u64,
}

impl AssociativeMemory {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            buckets: BTreeMap::new(),
            by_amplitude: BTreeSet::new(),
            capacity: capacity.max(1),
            clock,
            evictions: 0,
            consolidations: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MEMORY_CAPACITY, Arc::new(SystemClock))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &Uuid) -> Option<&MemoryEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.values()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            buckets: self.buckets.len(),
            total_amplitude: self.entries.values().map(|e| e.amplitude).sum(),
            evictions: self.evictions,
            consolidations: self.consolidations,
        }
    }

    /// Place a payload on the spiral at the current time and store it.
    ///
    /// The returned entry may already have been evicted if its amplitude is
    /// the lowest in a full store.
    pub fn encode(
        &mut self,
        payload: serde_json::Value,
        amplitude: f64,
        phase_correction: f64,
    ) -> MemoryEntry {
        let entry = MemoryEntry::encode(
            payload,
            amplitude,
            self.clock.now_millis(),
            phase_correction,
        );
        self.insert(entry.clone());
        entry
    }

    /// Store a pre-built entry, replacing any entry with the same id, then
    /// prune down to capacity.
    pub fn insert(&mut self, entry: MemoryEntry) {
        self.remove(&entry.id);
        self.buckets.entry(entry.bucket()).or_default().insert(entry.id);
        self.by_amplitude.insert(entry.amplitude_key());
        self.entries.insert(entry.id, entry);
        self.prune();
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<MemoryEntry> {
        let entry = self.entries.remove(id)?;
        self.by_amplitude.remove(&entry.amplitude_key());
        let bucket = entry.bucket();
        if let Some(ids) = self.buckets.get_mut(&bucket) {
            ids.remove(id);
            if ids.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
        Some(entry)
    }

    /// Evict lowest-amplitude entries until at capacity. Returns the count evicted.
    fn prune(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some(lowest) = self.by_amplitude.first().copied() else {
                break;
            };
            self.remove(&lowest.id);
            evicted += 1;
        }
        if evicted > 0 {
            self.evictions += evicted as u64;
            tracing::debug!("pruned {evicted} lowest-amplitude entries");
        }
        evicted
    }

    /// Entries whose resonance frequency is within `tolerance` of `target`,
    /// highest amplitude first.
    pub fn recall_by_resonance(&self, target: f64, tolerance: f64) -> Vec<MemoryEntry> {
        if tolerance.is_nan() || tolerance < 0.0 || !target.is_finite() {
            return Vec::new();
        }
        let lo = ((target - tolerance) * 100.0).floor() as i64;
        let hi = ((target + tolerance) * 100.0).ceil() as i64;

        let mut found: Vec<MemoryEntry> = self
            .buckets
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.entries.get(id))
            .filter(|e| (e.resonance_frequency - target).abs() <= tolerance + EPSILON)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.amplitude
                .total_cmp(&a.amplitude)
                .then(a.created_at.cmp(&b.created_at))
        });
        found
    }

    /// Entries within Euclidean `radius` of `reference`, nearest first.
    pub fn recall_by_spatial_proximity(
        &self,
        reference: Coordinate,
        radius: f64,
    ) -> Vec<MemoryEntry> {
        let mut found: Vec<(f64, &MemoryEntry)> = self
            .entries
            .values()
            .map(|e| (e.coordinate.distance(reference), e))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, e)| e.clone()).collect()
    }

    /// Ordered replay: from `start_time`, step forward 1000·φ ms at a time and
    /// take the entry nearest by angle to θ = φ·t at each step. `steps` is
    /// capped at MAX_SPIRAL_STEPS.
    pub fn traverse_spiral(&self, start_time: u64, steps: usize) -> Vec<MemoryEntry> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        (0..steps.min(MAX_SPIRAL_STEPS))
            .filter_map(|step| {
                let t = start_time as f64 + step as f64 * SPIRAL_STEP_MS;
                let target = spiral_phase(t, 0.0);
                self.entries
                    .values()
                    .min_by(|a, b| {
                        angular_gap(a.phase, target)
                            .total_cmp(&angular_gap(b.phase, target))
                            .then(b.amplitude.total_cmp(&a.amplitude))
                    })
                    .cloned()
            })
            .collect()
    }

    /// Pairwise affinity in [0, 1]: weighted mean of inverse spatial distance,
    /// amplitude similarity and inverse time gap (seconds). Symmetric and pure.
    pub fn calculate_coherence(a: &MemoryEntry, b: &MemoryEntry) -> f64 {
        let spatial = 1.0 / (1.0 + a.coordinate.distance(b.coordinate));
        let max_amp = a.amplitude.max(b.amplitude);
        let amplitude = if max_amp < EPSILON {
            1.0
        } else {
            1.0 - (a.amplitude - b.amplitude).abs() / max_amp
        };
        let gap_secs = a.created_at.abs_diff(b.created_at) as f64 / 1000.0;
        let temporal = 1.0 / (1.0 + gap_secs);

        let [ws, wa, wt] = COHERENCE_WEIGHTS;
        ws * spatial + wa * amplitude + wt * temporal
    }

    /// Cluster entries whose pairwise coherence reaches `threshold` (transitively,
    /// via union-find) and merge each cluster of two or more. Returns the
    /// consolidated entries.
    pub fn harmonic_consolidation(&mut self, threshold: f64) -> Vec<MemoryEntry> {
        let mut ordered: Vec<&MemoryEntry> = self.entries.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let n = ordered.len();

        let mut sets = DisjointSet::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if Self::calculate_coherence(ordered[i], ordered[j]) >= threshold {
                    sets.union(i, j);
                }
            }
        }

        let mut clusters: BTreeMap<usize, Vec<Uuid>> = BTreeMap::new();
        for (i, entry) in ordered.iter().enumerate() {
            clusters.entry(sets.find(i)).or_default().push(entry.id);
        }

        let consolidated: Vec<MemoryEntry> = clusters
            .into_values()
            .filter(|ids| ids.len() >= 2)
            .filter_map(|ids| self.merge_memories(&ids))
            .collect();
        if !consolidated.is_empty() {
            tracing::debug!("harmonic consolidation produced {} entries", consolidated.len());
        }
        consolidated
    }

    /// Replace the given entries with one at their centroid, amplitude
    /// mean × 1.2. Unknown and duplicate ids are ignored; fewer than two
    /// known entries leaves the store untouched and returns None.
    pub fn merge_memories(&mut self, ids: &[Uuid]) -> Option<MemoryEntry> {
        let mut seen = HashSet::new();
        let sources: Vec<&MemoryEntry> = ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.entries.get(id))
            .collect();
        if sources.len() < 2 {
            return None;
        }

        let coordinates: Vec<Coordinate> = sources.iter().map(|e| e.coordinate).collect();
        let centroid = Coordinate::centroid(&coordinates);
        let mean_amplitude =
            sources.iter().map(|e| e.amplitude).sum::<f64>() / sources.len() as f64;
        let payload = serde_json::json!({
            "kind": "consolidated",
            "sourceIds": sources.iter().map(|e| e.id).collect::<Vec<_>>(),
            "sources": sources.iter().map(|e| e.payload.clone()).collect::<Vec<_>>(),
        });
        let source_ids: Vec<Uuid> = sources.iter().map(|e| e.id).collect();

        let merged = MemoryEntry::at(
            payload,
            mean_amplitude * CONSOLIDATION_BOOST,
            self.clock.now_millis(),
            centroid,
        );
        for id in &source_ids {
            self.remove(id);
        }
        self.insert(merged.clone());
        self.consolidations += 1;
        Some(merged)
    }
}

impl std::fmt::Debug for AssociativeMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociativeMemory")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
