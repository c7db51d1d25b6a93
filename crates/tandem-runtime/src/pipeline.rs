//! Per-input fan-out/fan-in around the core passes.
//!
//! For each input the fast and deep passes run on the blocking pool
//! concurrently. Fusion waits for both halves of the same input, and only
//! then is one memory entry written. The heartbeat ticks the fast pass
//! independently and never waits on a request.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tandem_core::scorer::{JaccardSimilarity, KeywordArchetypeMatcher};
use tandem_core::time::millis_to_iso8601;
use tandem_core::{
    AssociativeMemory, Clock, Coordinate, DeepPass, DeepResult, DeepScorers, FastPass,
    FastResult, FastScorers, Fusion, FusionResult, MemoryEntry, MemoryStats, NoiseSource,
    SemanticSimilarity, Snapshot, Stimulus, SystemClock, fusion_payload,
};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{Result, RuntimeError};
use crate::events::PipelineEvent;
use crate::heartbeat::Heartbeat;

/// Everything the pipeline consults, injectable for tests.
#[derive(Clone)]
pub struct Collaborators {
    pub fast: FastScorers,
    pub deep: DeepScorers,
    pub similarity: Arc<dyn SemanticSimilarity>,
    pub clock: Arc<dyn Clock>,
    pub tick_noise: Arc<NoiseSource>,
}

impl Collaborators {
    /// Default heuristics with noise sources drawn from `config.noise`.
    pub fn for_config(config: &PipelineConfig) -> Self {
        let noise = &config.noise;
        let (tick, archetype) = match noise.seed {
            Some(seed) => (
                NoiseSource::seeded(seed, noise.tick_jitter),
                NoiseSource::seeded(seed.wrapping_add(1), noise.archetype_jitter),
            ),
            None => (
                NoiseSource::from_os_rng(noise.tick_jitter),
                NoiseSource::from_os_rng(noise.archetype_jitter),
            ),
        };

        let mut deep = DeepScorers::default();
        if noise.archetype_jitter > 0.0 {
            deep.archetype = Arc::new(KeywordArchetypeMatcher::with_noise(Arc::new(archetype)));
        }

        Self {
            fast: FastScorers::default(),
            deep,
            similarity: Arc::new(JaccardSimilarity),
            clock: Arc::new(SystemClock),
            tick_noise: Arc::new(tick),
        }
    }

    pub fn with_fast(mut self, fast: FastScorers) -> Self {
        self.fast = fast;
        self
    }

    pub fn with_deep(mut self, deep: DeepScorers) -> Self {
        self.deep = deep;
        self
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SemanticSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_noise(mut self, noise: Arc<NoiseSource>) -> Self {
        self.tick_noise = noise;
        self
    }
}

/// Everything produced for one input.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request: Uuid,
    pub fast: FastResult,
    pub deep: DeepResult,
    pub fusion: FusionResult,
    pub memory_id: Uuid,
}

pub struct Pipeline {
    config: PipelineConfig,
    fast: Arc<FastPass>,
    deep: Arc<DeepPass>,
    fusion: Fusion,
    memory: Arc<RwLock<AssociativeMemory>>,
    events: broadcast::Sender<PipelineEvent>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let Collaborators {
            fast,
            deep,
            similarity,
            clock,
            tick_noise,
        } = collaborators;

        let (events, _) = broadcast::channel(config.event_buffer);
        Ok(Self {
            fast: Arc::new(FastPass::new(fast, tick_noise, clock.clone())),
            deep: Arc::new(DeepPass::new(
                deep,
                config.memo_capacity,
                config.recursion_depth,
                clock.clone(),
            )),
            fusion: Fusion::new(similarity),
            memory: Arc::new(RwLock::new(AssociativeMemory::new(
                config.memory_capacity,
                clock,
            ))),
            events,
            heartbeat: Mutex::new(None),
            config,
        })
    }

    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let collaborators = Collaborators::for_config(&config);
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fast(&self) -> &Arc<FastPass> {
        &self.fast
    }

    pub fn deep(&self) -> &Arc<DeepPass> {
        &self.deep
    }

    pub fn memory(&self) -> &Arc<RwLock<AssociativeMemory>> {
        &self.memory
    }

    pub fn snapshot(&self) -> Snapshot {
        self.fast.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Start the heartbeat if it is not already running. Every tick is
    /// broadcast; every `tick_memory_stride`-th snapshot is also encoded
    /// into memory with its integration score as amplitude.
    pub fn start_heartbeat(&self) -> Result<bool> {
        let mut slot = self.heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|hb| !hb.is_stopped()) {
            return Ok(false);
        }

        let events = self.events.clone();
        let memory = Arc::clone(&self.memory);
        let stride = self.config.tick_memory_stride;
        let heartbeat = Heartbeat::start(
            Arc::clone(&self.fast),
            self.config.tick_period(),
            move |snapshot| {
                // No subscribers is not an error.
                let _ = events.send(PipelineEvent::Tick { snapshot });
                if stride > 0 && snapshot.tick % stride == 0 {
                    let memory = Arc::clone(&memory);
                    tokio::spawn(async move {
                        memory.write().await.encode(
                            tick_payload(&snapshot),
                            snapshot.integration_score,
                            0.0,
                        );
                    });
                }
                Ok(())
            },
        )?;
        *slot = Some(heartbeat);
        Ok(true)
    }

    /// Stop the heartbeat and wait for it. Returns the ticks it ran, if any.
    pub async fn stop_heartbeat(&self) -> Result<Option<u64>> {
        let heartbeat = self
            .heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match heartbeat {
            Some(hb) => Ok(Some(hb.shutdown().await?)),
            None => Ok(None),
        }
    }

    pub async fn respond(&self, stimulus: &Stimulus, salience: Option<f64>) -> Result<Response> {
        self.respond_with_depth(stimulus, salience, self.config.recursion_depth)
            .await
    }

    /// Run one input through both passes, fuse and remember it.
    ///
    /// Invalid input is rejected before either pass runs. A deep pass that
    /// misses the configured deadline is replaced by its partial insight, and
    /// a pass whose task panics is replaced by a failed result, so only the
    /// loss of both halves fails the request.
    pub async fn respond_with_depth(
        &self,
        stimulus: &Stimulus,
        salience: Option<f64>,
        depth: usize,
    ) -> Result<Response> {
        stimulus.validate()?;
        let request = Uuid::new_v4();
        let started = std::time::Instant::now();

        let fast_half = async {
            let pass = Arc::clone(&self.fast);
            let text = stimulus.text.clone();
            let result = match tokio::task::spawn_blocking(move || pass.process_immediate(&text))
                .await
            {
                Ok(joined) => joined?,
                Err(e) => {
                    tracing::warn!("request {request}: fast pass died: {e}");
                    self.fast.failed_result(pass_died(&e))
                }
            };
            let _ = self.events.send(PipelineEvent::FastPartial {
                request,
                result: result.clone(),
            });
            Ok::<FastResult, RuntimeError>(result)
        };

        let deep_half = async {
            let pass = Arc::clone(&self.deep);
            let text = stimulus.text.clone();
            let work = tokio::task::spawn_blocking(move || pass.process_recursive(&text, depth));
            let joined = match self.config.deep_deadline() {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        let millis = limit.as_millis() as u64;
                        tracing::warn!(
                            "request {request}: deep pass missed {millis}ms deadline, using partial insight"
                        );
                        Ok(Ok(self.deep.partial_result(&stimulus.text, millis)))
                    }
                },
                None => work.await,
            };
            let result = match joined {
                Ok(result) => result?,
                Err(e) => {
                    tracing::warn!("request {request}: deep pass died: {e}");
                    self.deep.failed_result(&stimulus.text, pass_died(&e))
                }
            };
            let _ = self.events.send(PipelineEvent::DeepPartial {
                request,
                result: result.clone(),
            });
            Ok::<DeepResult, RuntimeError>(result)
        };

        let (fast, deep) = tokio::join!(fast_half, deep_half);
        let (fast, deep) = (fast?, deep?);

        let fusion = self
            .fusion
            .fuse(&fast, &deep, stimulus.context.as_ref())?;
        // Only a complete deep reading feeds back into the fast pass.
        if !deep.degraded && deep.failure.is_none() {
            self.fast.receive_deep_insight(deep.coherence);
        }

        let amplitude = salience.unwrap_or(fusion.alignment.emotional);
        let entry = self.memory.write().await.encode(
            fusion_payload(&stimulus.text, &fusion),
            amplitude,
            0.0,
        );

        let _ = self.events.send(PipelineEvent::Unified {
            request,
            result: fusion.clone(),
            memory_id: entry.id,
        });
        tracing::debug!(
            "request {request}: fast {:.2}ms, deep {:.2}ms, total {:.2}ms, strategy {:?}",
            fast.latency_ms,
            deep.latency_ms,
            started.elapsed().as_secs_f64() * 1000.0,
            fusion.strategy,
        );

        Ok(Response {
            request,
            fast,
            deep,
            fusion,
            memory_id: entry.id,
        })
    }

    /// Resonance recall; `tolerance` defaults to the configured value.
    pub async fn recall_by_resonance(&self, target: f64, tolerance: Option<f64>) -> Vec<MemoryEntry> {
        let tolerance = tolerance.unwrap_or(self.config.resonance_tolerance);
        self.memory.read().await.recall_by_resonance(target, tolerance)
    }

    pub async fn recall_nearby(&self, reference: Coordinate, radius: f64) -> Vec<MemoryEntry> {
        self.memory
            .read()
            .await
            .recall_by_spatial_proximity(reference, radius)
    }

    pub async fn traverse_spiral(&self, start_time: u64, steps: usize) -> Vec<MemoryEntry> {
        self.memory.read().await.traverse_spiral(start_time, steps)
    }

    /// Harmonic consolidation; `threshold` defaults to the configured value.
    pub async fn consolidate(&self, threshold: Option<f64>) -> Vec<MemoryEntry> {
        let threshold = threshold.unwrap_or(self.config.consolidation_threshold);
        let merged = self.memory.write().await.harmonic_consolidation(threshold);
        tracing::info!("consolidated {} clusters at threshold {threshold}", merged.len());
        merged
    }

    pub async fn memory_stats(&self) -> MemoryStats {
        self.memory.read().await.stats()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let slot = self.heartbeat.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(heartbeat) = slot.as_ref() {
            heartbeat.stop();
        }
    }
}

fn pass_died(e: &tokio::task::JoinError) -> String {
    if e.is_panic() {
        format!("pass panicked: {e}")
    } else {
        format!("pass cancelled: {e}")
    }
}

fn tick_payload(snapshot: &Snapshot) -> serde_json::Value {
    serde_json::json!({
        "kind": "tick",
        "tick": snapshot.tick,
        "at": millis_to_iso8601(snapshot.timestamp),
        "awareness": snapshot.awareness,
        "coherence": snapshot.coherence,
        "integrationScore": snapshot.integration_score,
    })
}
