//! Outcomes reported back to whatever renders the console.

use serde_json::Value;
use shared::{
    domain::{Centre, CentreId, StudentId},
    protocol::ParallelDijkstraResponse,
};

use crate::{
    controller::{AllotmentReport, PathOutcome, SimulationReport},
    error::WorkflowError,
    session::{GraphSummary, PathView},
};

#[derive(Debug)]
pub enum WorkflowEvent {
    SelectionEnabled {
        capacity: u32,
    },
    CentreAdded(Centre),
    SessionCleared,
    GraphBuilt(GraphSummary),
    StudentsSimulated(SimulationReport),
    AllotmentCompleted(AllotmentReport),
    PathFound(PathView),
    NoRoute {
        student_id: StudentId,
        centre_id: CentreId,
    },
    DiagnosticsReady(Value),
    BenchmarkCompleted(ParallelDijkstraResponse),
    Failed {
        command: &'static str,
        error: WorkflowError,
    },
}

impl From<PathOutcome> for WorkflowEvent {
    fn from(value: PathOutcome) -> Self {
        match value {
            PathOutcome::Found(view) => Self::PathFound(view),
            PathOutcome::NoRoute {
                student_id,
                centre_id,
            } => Self::NoRoute {
                student_id,
                centre_id,
            },
        }
    }
}

impl WorkflowEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
