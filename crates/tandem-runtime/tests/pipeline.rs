use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tandem_core::scorer::HashingVectorExtractor;
use tandem_core::{
    ContextTag, DeepScorers, FastScorers, FusionWeights, ManualClock, NoiseSource, PassRole,
    Stimulus, TandemError, TextGenerator, ToneScorer, UrgencyScorer, VectorExtractor,
};
use tandem_runtime::{Collaborators, Pipeline, PipelineConfig, PipelineEvent, RuntimeError};

struct BrokenGenerator;

impl TextGenerator for BrokenGenerator {
    fn generate(&self, _input: &str, role: PassRole) -> tandem_core::Result<String> {
        Err(TandemError::GenerationFailure(format!("{role:?} backend offline")))
    }
}

struct CrashingTone;

impl ToneScorer for CrashingTone {
    fn tone(&self, _input: &str) -> tandem_core::Result<f64> {
        panic!("tone model crashed");
    }
}

struct CrashingUrgency;

impl UrgencyScorer for CrashingUrgency {
    fn urgency(&self, _input: &str) -> f64 {
        panic!("urgency model crashed");
    }
}

struct SlowExtractor(Duration);

impl VectorExtractor for SlowExtractor {
    fn extract(&self, input: &str) -> tandem_core::Result<Vec<f64>> {
        std::thread::sleep(self.0);
        HashingVectorExtractor::default().extract(input)
    }
}

fn quiet_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.noise.seed = Some(7);
    config.deep_timeout_ms = Some(2_000);
    config
}

fn collaborators(config: &PipelineConfig) -> Collaborators {
    Collaborators::for_config(config)
        .with_clock(Arc::new(ManualClock::new(1_700_000_000_000)))
        .with_tick_noise(Arc::new(NoiseSource::silent()))
}

fn pipeline() -> Pipeline {
    let config = quiet_config();
    let collaborators = collaborators(&config);
    Pipeline::new(config, collaborators).unwrap()
}

#[tokio::test]
async fn respond_pairs_both_passes_and_writes_memory() {
    let pipeline = pipeline();
    let stimulus = Stimulus::new("what does the lantern remember");
    let response = pipeline.respond(&stimulus, None).await.unwrap();

    assert!(response.fast.response.contains("what does the lantern remember"));
    assert!(response.deep.insight.contains("what does the lantern remember"));
    assert_eq!(response.deep.recursion_depth, 7);
    assert!(!response.fusion.degraded);
    assert!(!response.fusion.unified_text.is_empty());

    let memory = pipeline.memory().read().await;
    let entry = memory.get(&response.memory_id).unwrap();
    assert_eq!(entry.payload["kind"], "fusion");
    assert_eq!(entry.payload["input"], "what does the lantern remember");
    assert!((entry.amplitude - response.fusion.alignment.emotional).abs() < 1e-12);
}

#[tokio::test]
async fn explicit_salience_sets_amplitude() {
    let pipeline = pipeline();
    let response = pipeline
        .respond(&Stimulus::new("a small bright note"), Some(0.42))
        .await
        .unwrap();
    let memory = pipeline.memory().read().await;
    assert_eq!(memory.get(&response.memory_id).unwrap().amplitude, 0.42);
}

#[tokio::test]
async fn invalid_input_rejected_before_any_work() {
    let pipeline = pipeline();
    let before = pipeline.snapshot();
    let err = pipeline.respond(&Stimulus::new("  \n"), None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Core(TandemError::InvalidInput(_))));
    assert_eq!(pipeline.snapshot(), before);
    assert_eq!(pipeline.deep().memo_len(), 0);
    assert!(pipeline.memory().read().await.is_empty());
}

#[tokio::test]
async fn events_arrive_per_request_with_unified_last() {
    let pipeline = pipeline();
    let mut events = pipeline.subscribe();
    let response = pipeline
        .respond(&Stimulus::new("tell me about tides"), None)
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.request(), Some(response.request));
        kinds.push(match event {
            PipelineEvent::FastPartial { .. } => "fast",
            PipelineEvent::DeepPartial { .. } => "deep",
            PipelineEvent::Unified { memory_id, .. } => {
                assert_eq!(memory_id, response.memory_id);
                "unified"
            }
            PipelineEvent::Tick { .. } => "tick",
        });
    }
    assert_eq!(kinds.len(), 3);
    assert!(kinds.contains(&"fast"));
    assert!(kinds.contains(&"deep"));
    assert_eq!(kinds.last(), Some(&"unified"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inputs_fuse_their_own_pairs() {
    let pipeline = Arc::new(pipeline());
    let inputs: Vec<String> = (0..8).map(|i| format!("question number {i} about rivers")).collect();

    let tasks: Vec<_> = inputs
        .iter()
        .cloned()
        .map(|text| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.respond(&Stimulus::new(text), None).await })
        })
        .collect();

    let mut requests = HashSet::new();
    for (text, task) in inputs.iter().zip(tasks) {
        let response = task.await.unwrap().unwrap();
        assert!(response.fast.response.contains(text.as_str()));
        assert!(response.deep.insight.contains(text.as_str()));
        requests.insert(response.request);
    }
    assert_eq!(requests.len(), 8);
    assert_eq!(pipeline.memory_stats().await.entries, 8);
}

#[tokio::test]
async fn urgent_context_leans_fast() {
    let pipeline = pipeline();
    let stimulus = Stimulus::new("the meadow is calm today").with_context(ContextTag::Urgent);
    let response = pipeline.respond(&stimulus, None).await.unwrap();
    assert_eq!(response.fusion.weights, FusionWeights::FAST_LEANING);
}

#[tokio::test]
async fn deep_result_nudges_fast_coherence() {
    let pipeline = pipeline();
    let before = pipeline.snapshot().coherence;
    let response = pipeline
        .respond(&Stimulus::new("quiet reflection on patience"), None)
        .await
        .unwrap();
    let expected = (before + response.deep.coherence) / 2.0;
    assert!((pipeline.snapshot().coherence - expected).abs() < 1e-12);
}

#[tokio::test]
async fn deep_deadline_falls_back_to_partial_insight() {
    let mut config = quiet_config();
    config.deep_timeout_ms = Some(20);
    let deep = DeepScorers {
        vector: Arc::new(SlowExtractor(Duration::from_millis(300))),
        ..DeepScorers::default()
    };
    let collaborators = collaborators(&config).with_deep(deep);
    let pipeline = Pipeline::new(config, collaborators).unwrap();

    let before = pipeline.snapshot().coherence;
    let response = pipeline
        .respond(&Stimulus::new("slow thoughts arrive late"), None)
        .await
        .unwrap();
    assert_eq!(pipeline.snapshot().coherence, before, "partial insight must not nudge");
    assert!(response.deep.degraded);
    assert!(response.deep.failure.as_deref().unwrap().contains("20ms"));
    assert!(response.fusion.degraded);
    assert_eq!(response.fusion.unified_text, response.fast.response);
}

#[tokio::test]
async fn one_failed_generator_degrades_result() {
    let config = quiet_config();
    let fast = FastScorers {
        generator: Arc::new(BrokenGenerator),
        ..FastScorers::default()
    };
    let collaborators = collaborators(&config).with_fast(fast);
    let pipeline = Pipeline::new(config, collaborators).unwrap();

    let response = pipeline
        .respond(&Stimulus::new("only the deep side speaks"), None)
        .await
        .unwrap();
    assert!(response.fast.generation_failed());
    assert!(response.fusion.degraded);
    assert_eq!(response.fusion.unified_text, response.deep.insight);
}

#[tokio::test]
async fn both_generators_failing_is_fatal() {
    let config = quiet_config();
    let fast = FastScorers {
        generator: Arc::new(BrokenGenerator),
        ..FastScorers::default()
    };
    let deep = DeepScorers {
        generator: Arc::new(BrokenGenerator),
        ..DeepScorers::default()
    };
    let collaborators = collaborators(&config).with_fast(fast).with_deep(deep);
    let pipeline = Pipeline::new(config, collaborators).unwrap();

    let err = pipeline
        .respond(&Stimulus::new("nobody answers"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Core(TandemError::BothPassesFailed { .. })
    ));
    assert!(pipeline.memory().read().await.is_empty());
}

#[tokio::test]
async fn panicking_deep_scorer_degrades_instead_of_failing() {
    let config = quiet_config();
    let deep = DeepScorers {
        tone: Arc::new(CrashingTone),
        ..DeepScorers::default()
    };
    let collaborators = collaborators(&config).with_deep(deep);
    let pipeline = Pipeline::new(config, collaborators).unwrap();
    let before = pipeline.snapshot().coherence;

    let response = pipeline
        .respond(&Stimulus::new("the tone model is down"), None)
        .await
        .unwrap();
    assert!(response.deep.degraded);
    assert!(response.deep.failure.as_deref().unwrap().contains("panicked"));
    assert!(response.fusion.degraded);
    assert_eq!(response.fusion.unified_text, response.fast.response);
    assert_eq!(pipeline.snapshot().coherence, before);
    assert_eq!(pipeline.memory().read().await.len(), 1);
}

#[tokio::test]
async fn panicking_fast_scorer_degrades_instead_of_failing() {
    let config = quiet_config();
    let fast = FastScorers {
        urgency: Arc::new(CrashingUrgency),
        ..FastScorers::default()
    };
    let collaborators = collaborators(&config).with_fast(fast);
    let pipeline = Pipeline::new(config, collaborators).unwrap();

    let response = pipeline
        .respond(&Stimulus::new("the urgency model is down"), None)
        .await
        .unwrap();
    assert!(response.fast.generation_failed());
    assert!(response.fusion.degraded);
    assert_eq!(response.fusion.unified_text, response.deep.insight);
    assert_eq!(pipeline.memory().read().await.len(), 1);
}

#[tokio::test]
async fn both_passes_panicking_is_fatal() {
    let config = quiet_config();
    let fast = FastScorers {
        urgency: Arc::new(CrashingUrgency),
        ..FastScorers::default()
    };
    let deep = DeepScorers {
        tone: Arc::new(CrashingTone),
        ..DeepScorers::default()
    };
    let collaborators = collaborators(&config).with_fast(fast).with_deep(deep);
    let pipeline = Pipeline::new(config, collaborators).unwrap();

    let err = pipeline
        .respond(&Stimulus::new("everything is down"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Core(TandemError::BothPassesFailed { .. })
    ));
    assert!(pipeline.memory().read().await.is_empty());
}

#[tokio::test]
async fn heartbeat_writes_every_stride_tick() {
    let mut config = quiet_config();
    config.tick_period_ms = 2;
    config.tick_memory_stride = 5;
    let collaborators = collaborators(&config);
    let pipeline = Pipeline::new(config, collaborators).unwrap();
    let mut events = pipeline.subscribe();

    assert!(pipeline.start_heartbeat().unwrap());
    assert!(!pipeline.start_heartbeat().unwrap(), "already running");
    tokio::time::sleep(Duration::from_millis(120)).await;
    let ticks = pipeline.stop_heartbeat().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(ticks >= 10, "only {ticks} ticks");
    let memory = pipeline.memory().read().await;
    let tick_entries = memory.entries().filter(|e| e.payload["kind"] == "tick").count();
    assert!(tick_entries >= 1);
    assert!(tick_entries as u64 <= ticks / 5);
    assert!(events.try_recv().map(|e| e.is_tick()).unwrap_or(false));
}

#[tokio::test]
async fn recall_and_consolidate_pass_through() {
    let pipeline = pipeline();
    let response = pipeline
        .respond(&Stimulus::new("the same words twice"), Some(0.8))
        .await
        .unwrap();
    pipeline
        .respond(&Stimulus::new("the same words twice"), Some(0.8))
        .await
        .unwrap();

    let frequency = pipeline
        .memory()
        .read()
        .await
        .get(&response.memory_id)
        .unwrap()
        .resonance_frequency;
    // Both share a creation instant on the manual clock.
    assert_eq!(pipeline.recall_by_resonance(frequency, None).await.len(), 2);

    let merged = pipeline.consolidate(Some(0.9)).await;
    assert_eq!(merged.len(), 1);
    let stats = pipeline.memory_stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.consolidations, 1);
}

#[test]
fn invalid_config_rejected() {
    let mut config = PipelineConfig::default();
    config.memory_capacity = 0;
    let collaborators = Collaborators::for_config(&config);
    assert!(matches!(
        Pipeline::new(config, collaborators),
        Err(RuntimeError::Config(_))
    ));
}

#[tokio::test]
async fn huge_spiral_request_is_capped() {
    let pipeline = pipeline();
    pipeline
        .respond(&Stimulus::new("a single memory to replay"), None)
        .await
        .unwrap();

    let replay = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.traverse_spiral(0, usize::MAX),
    )
    .await
    .unwrap();
    assert_eq!(replay.len(), tandem_core::constants::MAX_SPIRAL_STEPS);
}
