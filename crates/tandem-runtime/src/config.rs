//! Pipeline configuration, loaded from TOML over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::constants::{
    CONSOLIDATION_THRESHOLD, DEFAULT_RECURSION_DEPTH, MEMO_CAPACITY, MEMORY_CAPACITY,
    RESONANCE_TOLERANCE, TICK_PERIOD_MS,
};

use crate::error::ConfigError;

/// Environment variable consulted when no explicit config path is given.
pub const CONFIG_ENV: &str = "TANDEM_CONFIG";

/// Upper bound (exclusive) for any jitter amplitude.
const MAX_JITTER: f64 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Seed for reproducible runs. Absent means OS entropy.
    pub seed: Option<u64>,
    pub tick_jitter: f64,
    pub archetype_jitter: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_jitter: 0.01,
            archetype_jitter: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tick_period_ms: u64,
    /// Every Nth tick snapshot is written to memory. 0 disables the writes.
    pub tick_memory_stride: u64,
    pub recursion_depth: usize,
    pub memo_capacity: usize,
    pub memory_capacity: usize,
    pub resonance_tolerance: f64,
    pub consolidation_threshold: f64,
    /// Deep-pass deadline. 0 disables it.
    pub deep_timeout_ms: Option<u64>,
    pub event_buffer: usize,
    pub noise: NoiseConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: TICK_PERIOD_MS,
            tick_memory_stride: 100,
            recursion_depth: DEFAULT_RECURSION_DEPTH,
            memo_capacity: MEMO_CAPACITY,
            memory_capacity: MEMORY_CAPACITY,
            resonance_tolerance: RESONANCE_TOLERANCE,
            consolidation_threshold: CONSOLIDATION_THRESHOLD,
            deep_timeout_ms: Some(250),
            event_buffer: 256,
            noise: NoiseConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit`, else from `$TANDEM_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_path(explicit) {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.tick_period_ms == 0 {
            return invalid("tick_period_ms must be positive".into());
        }
        for (name, value) in [
            ("memo_capacity", self.memo_capacity),
            ("memory_capacity", self.memory_capacity),
            ("event_buffer", self.event_buffer),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        if self.resonance_tolerance.is_nan() || self.resonance_tolerance < 0.0 {
            return invalid(format!(
                "resonance_tolerance must be non-negative, got {}",
                self.resonance_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.consolidation_threshold) {
            return invalid(format!(
                "consolidation_threshold must be in [0, 1], got {}",
                self.consolidation_threshold
            ));
        }
        for (name, value) in [
            ("noise.tick_jitter", self.noise.tick_jitter),
            ("noise.archetype_jitter", self.noise.archetype_jitter),
        ] {
            if !(0.0..MAX_JITTER).contains(&value) {
                return invalid(format!("{name} must be in [0, {MAX_JITTER}), got {value}"));
            }
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn deep_deadline(&self) -> Option<Duration> {
        self.deep_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert_eq!(config.deep_deadline(), Some(Duration::from_millis(250)));
        assert_eq!(config.recursion_depth, 7);
        assert_eq!(config.memory_capacity, 10_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            "recursion_depth = 3\n[noise]\nseed = 42\n",
        )
        .unwrap();
        assert_eq!(config.recursion_depth, 3);
        assert_eq!(config.noise.seed, Some(42));
        assert_eq!(config.noise.tick_jitter, 0.01);
        assert_eq!(config.memo_capacity, 1000);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = PipelineConfig::from_toml_str("deep_timeout_ms = 0").unwrap();
        assert_eq!(config.deep_deadline(), None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for text in [
            "tick_period_ms = 0",
            "memory_capacity = 0",
            "event_buffer = 0",
            "resonance_tolerance = -0.5",
            "consolidation_threshold = 1.5",
            "[noise]\ntick_jitter = 0.1",
            "[noise]\narchetype_jitter = -0.01",
        ] {
            let err = PipelineConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{text}: {err}");
        }
    }

    #[test]
    fn test_parse_error_reported() {
        let err = PipelineConfig::from_toml_str("recursion_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_memory_stride = 5").unwrap();
        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tick_memory_stride, 5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = PipelineConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }
}
