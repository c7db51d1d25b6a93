//! Async wiring for tandem-core.
//!
//! Hosts the 100 Hz heartbeat, runs both passes per input on the blocking
//! pool, joins them for fusion, and serializes writes to the shared
//! associative memory behind a reader/writer lock.

pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod pipeline;

pub use config::{CONFIG_ENV, NoiseConfig, PipelineConfig};
pub use error::{ConfigError, Result, RuntimeError};
pub use events::PipelineEvent;
pub use heartbeat::{Heartbeat, TickResult};
pub use pipeline::{Collaborators, Pipeline, Response};
