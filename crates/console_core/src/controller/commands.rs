//! Operator actions delivered to the workflow controller.

use shared::domain::{BoundingBox, CentreId, GraphDetail, StudentId};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCommand {
    EnableSelection {
        capacity: i64,
    },
    AddCentre {
        lat: f64,
        lon: f64,
    },
    ClearAll,
    BuildGraph {
        bbox: BoundingBox,
        graph_detail: GraphDetail,
        use_cache: bool,
    },
    Simulate {
        count: i64,
    },
    RunAllotment,
    /// Without a centre the student's assigned centre is used.
    InspectPath {
        student_id: StudentId,
        centre_id: Option<CentreId>,
    },
    ExportDiagnostics,
    RunParallelBenchmark,
}

impl WorkflowCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::EnableSelection { .. } => "enable_selection",
            WorkflowCommand::AddCentre { .. } => "add_centre",
            WorkflowCommand::ClearAll => "clear_all",
            WorkflowCommand::BuildGraph { .. } => "build_graph",
            WorkflowCommand::Simulate { .. } => "simulate",
            WorkflowCommand::RunAllotment => "run_allotment",
            WorkflowCommand::InspectPath { .. } => "inspect_path",
            WorkflowCommand::ExportDiagnostics => "export_diagnostics",
            WorkflowCommand::RunParallelBenchmark => "run_parallel_benchmark",
        }
    }

    /// Whether the command waits on the backend or a worker task.
    pub fn is_long_running(&self) -> bool {
        !matches!(
            self,
            WorkflowCommand::EnableSelection { .. }
                | WorkflowCommand::AddCentre { .. }
                | WorkflowCommand::ClearAll
        )
    }
}
