use serde::Serialize;
use tandem_core::{DeepResult, FastResult, FusionResult, Snapshot};
use uuid::Uuid;

/// Observable output of the pipeline. Per-input events carry the request id.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PipelineEvent {
    Tick {
        snapshot: Snapshot,
    },
    FastPartial {
        request: Uuid,
        result: FastResult,
    },
    DeepPartial {
        request: Uuid,
        result: DeepResult,
    },
    Unified {
        request: Uuid,
        result: FusionResult,
        memory_id: Uuid,
    },
}

impl PipelineEvent {
    pub fn request(&self) -> Option<Uuid> {
        match self {
            PipelineEvent::Tick { .. } => None,
            PipelineEvent::FastPartial { request, .. }
            | PipelineEvent::DeepPartial { request, .. }
            | PipelineEvent::Unified { request, .. } => Some(*request),
        }
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, PipelineEvent::Tick { .. })
    }
}
