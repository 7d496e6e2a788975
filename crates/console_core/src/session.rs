use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use serde_json::{Map, Value};
use shared::{
    domain::{Centre, CentreId, GeoPoint, Student, StudentId},
    protocol::{CentreDistances, ParallelDijkstraResponse, RunAllotmentResponse, Timing},
};
use tracing::warn;

use crate::error::{ValidationError, WorkflowError};

pub type DistanceMatrix = HashMap<StudentId, CentreDistances>;

/// Backend-issuing operation kinds. At most one of each kind is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    BuildGraph,
    Simulate,
    RunAllotment,
    InspectPath,
    ExportDiagnostics,
    ParallelBenchmark,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BuildGraph => "graph build",
            Self::Simulate => "student simulation",
            Self::RunAllotment => "allotment",
            Self::InspectPath => "path lookup",
            Self::ExportDiagnostics => "diagnostics export",
            Self::ParallelBenchmark => "parallel benchmark",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    SelectingCentres,
    GraphBuilding,
    GraphReady,
    Simulating,
    Allotting,
    Inspecting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowFlags {
    pub selection_enabled: bool,
    pub graph_built: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphSummary {
    pub nodes_count: u64,
    pub edges_count: u64,
    pub timing: Option<Timing>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathView {
    pub student_id: StudentId,
    pub centre_id: CentreId,
    pub polyline: Vec<GeoPoint>,
    pub travel_time_seconds: Option<f64>,
    pub timing: Option<Timing>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Generation {
    session: u64,
    students: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    centres: Vec<Centre>,
    students: Vec<Student>,
    assignments: HashMap<StudentId, CentreId>,
    distances: DistanceMatrix,
    flags: WorkflowFlags,
    capacity: Option<u32>,
    graph: Option<GraphSummary>,
    allotment_timing: Option<Timing>,
    active_path: Option<PathView>,
    last_benchmark: Option<ParallelDijkstraResponse>,
    in_flight: HashSet<Operation>,
    session_generation: u64,
    student_generation: u64,
}

impl SessionState {
    pub fn centres(&self) -> &[Centre] {
        &self.centres
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn assignments(&self) -> &HashMap<StudentId, CentreId> {
        &self.assignments
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }

    pub fn flags(&self) -> WorkflowFlags {
        self.flags
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn graph(&self) -> Option<&GraphSummary> {
        self.graph.as_ref()
    }

    pub fn allotment_timing(&self) -> Option<&Timing> {
        self.allotment_timing.as_ref()
    }

    pub fn active_path(&self) -> Option<&PathView> {
        self.active_path.as_ref()
    }

    pub fn last_benchmark(&self) -> Option<&ParallelDijkstraResponse> {
        self.last_benchmark.as_ref()
    }

    pub fn centre(&self, centre_id: &CentreId) -> Option<&Centre> {
        self.centres.iter().find(|c| &c.centre_id == centre_id)
    }

    pub fn centre_index(&self, centre_id: &CentreId) -> Option<usize> {
        self.centres.iter().position(|c| &c.centre_id == centre_id)
    }

    pub fn student(&self, student_id: &StudentId) -> Option<&Student> {
        self.students.iter().find(|s| &s.student_id == student_id)
    }

    pub fn assigned_centre(&self, student_id: &StudentId) -> Option<&CentreId> {
        self.assignments.get(student_id)
    }

    pub fn is_in_flight(&self, operation: Operation) -> bool {
        self.in_flight.contains(&operation)
    }

    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn phase(&self) -> WorkflowPhase {
        if self.is_in_flight(Operation::BuildGraph) {
            WorkflowPhase::GraphBuilding
        } else if self.is_in_flight(Operation::Simulate) {
            WorkflowPhase::Simulating
        } else if self.is_in_flight(Operation::RunAllotment) {
            WorkflowPhase::Allotting
        } else if self.is_in_flight(Operation::InspectPath) || self.active_path.is_some() {
            WorkflowPhase::Inspecting
        } else if self.flags.graph_built {
            WorkflowPhase::GraphReady
        } else if self.flags.selection_enabled {
            WorkflowPhase::SelectingCentres
        } else {
            WorkflowPhase::Idle
        }
    }

    pub(crate) fn generation(&self) -> Generation {
        Generation {
            session: self.session_generation,
            students: self.student_generation,
        }
    }

    /// Whether a completion issued at `issued` may still be applied. Student
    /// dependent results also need the student set to be unchanged.
    pub(crate) fn accepts(&self, issued: Generation, depends_on_students: bool) -> bool {
        issued.session == self.session_generation
            && (!depends_on_students || issued.students == self.student_generation)
    }

    pub(crate) fn begin(&mut self, operation: Operation) -> Result<(), WorkflowError> {
        if !self.in_flight.insert(operation) {
            return Err(WorkflowError::Busy(operation));
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, operation: Operation) {
        self.in_flight.remove(&operation);
    }

    pub(crate) fn enable_selection(&mut self, capacity: u32) {
        self.flags.selection_enabled = true;
        self.capacity = Some(capacity);
    }

    pub(crate) fn push_centre(&mut self, lat: f64, lon: f64) -> Result<Centre, ValidationError> {
        let max_capacity = self.capacity.ok_or(ValidationError::SelectionInactive)?;
        let centre = Centre {
            centre_id: CentreId::sequential(self.centres.len() + 1),
            lat,
            lon,
            max_capacity,
        };
        self.centres.push(centre.clone());
        Ok(centre)
    }

    // In-flight marks survive until their requests complete.
    pub(crate) fn reset(&mut self) {
        let in_flight = std::mem::take(&mut self.in_flight);
        let session_generation = self.session_generation + 1;
        let student_generation = self.student_generation + 1;
        *self = Self {
            in_flight,
            session_generation,
            student_generation,
            ..Self::default()
        };
    }

    pub(crate) fn mark_graph_built(&mut self, summary: GraphSummary) {
        self.flags.graph_built = true;
        self.graph = Some(summary);
    }

    pub(crate) fn replace_students(&mut self, students: Vec<Student>) {
        self.students = students;
        self.student_generation += 1;
        self.assignments.clear();
        self.distances.clear();
        self.allotment_timing = None;
        self.active_path = None;
    }

    /// Returns the number of assignments dropped for unknown ids.
    pub(crate) fn apply_allotment(&mut self, response: RunAllotmentResponse) -> usize {
        let known_students: HashSet<&StudentId> =
            self.students.iter().map(|s| &s.student_id).collect();
        let known_centres: HashSet<&CentreId> =
            self.centres.iter().map(|c| &c.centre_id).collect();

        let total = response.assignments.len();
        let assignments: HashMap<StudentId, CentreId> = response
            .assignments
            .into_iter()
            .filter(|(student_id, centre_id)| {
                let keep =
                    known_students.contains(student_id) && known_centres.contains(centre_id);
                if !keep {
                    warn!(
                        %student_id,
                        %centre_id,
                        "dropping assignment outside the current session"
                    );
                }
                keep
            })
            .collect();
        let dropped = total - assignments.len();

        let distances: DistanceMatrix = response
            .debug_distances
            .into_iter()
            .filter(|(student_id, _)| known_students.contains(student_id))
            .collect();

        self.assignments = assignments;
        self.distances = distances;
        self.allotment_timing = response.timing;
        dropped
    }

    pub(crate) fn show_path(&mut self, path: PathView) {
        self.active_path = Some(path);
    }

    pub(crate) fn record_benchmark(&mut self, response: ParallelDijkstraResponse) {
        self.last_benchmark = Some(response);
    }
}

#[cfg(test)]
mod tests {
    use shared::{domain::StudentCategory, error::ResponseStatus};

    use super::*;

    fn student(n: usize) -> Student {
        Student {
            student_id: StudentId::sequential(n),
            lat: 26.0,
            lon: 73.0,
            category: StudentCategory::General,
        }
    }

    fn session_with_centres(n: usize) -> SessionState {
        let mut state = SessionState::default();
        state.enable_selection(50);
        for i in 0..n {
            state.push_centre(26.0 + i as f64 * 0.01, 73.0).expect("centre");
        }
        state
    }

    #[test]
    fn phase_follows_flags_and_work() {
        let mut state = SessionState::default();
        assert_eq!(state.phase(), WorkflowPhase::Idle);
        state.enable_selection(10);
        assert_eq!(state.phase(), WorkflowPhase::SelectingCentres);
        state.begin(Operation::BuildGraph).expect("begin");
        assert_eq!(state.phase(), WorkflowPhase::GraphBuilding);
        state.finish(Operation::BuildGraph);
        state.mark_graph_built(GraphSummary {
            nodes_count: 1,
            edges_count: 1,
            timing: None,
            extra: Map::new(),
        });
        assert_eq!(state.phase(), WorkflowPhase::GraphReady);
    }

    #[test]
    fn begin_is_single_flight_per_operation() {
        let mut state = SessionState::default();
        state.begin(Operation::RunAllotment).expect("first");
        assert!(matches!(
            state.begin(Operation::RunAllotment),
            Err(WorkflowError::Busy(Operation::RunAllotment))
        ));
        state.begin(Operation::InspectPath).expect("other kinds are independent");
        state.finish(Operation::RunAllotment);
        state.begin(Operation::RunAllotment).expect("free again");
    }

    #[test]
    fn centres_get_sequential_ids_and_configured_capacity() {
        let state = session_with_centres(3);
        let ids: Vec<&str> = state.centres().iter().map(|c| c.centre_id.as_str()).collect();
        assert_eq!(ids, ["centre_1", "centre_2", "centre_3"]);
        assert!(state.centres().iter().all(|c| c.max_capacity == 50));
    }

    #[test]
    fn reset_keeps_in_flight_marks_but_invalidates_generation() {
        let mut state = session_with_centres(1);
        state.begin(Operation::BuildGraph).expect("begin");
        let issued = state.generation();
        state.reset();
        assert!(state.centres().is_empty());
        assert_eq!(state.flags(), WorkflowFlags::default());
        assert!(state.is_in_flight(Operation::BuildGraph));
        assert!(!state.accepts(issued, false));
    }

    #[test]
    fn apply_allotment_drops_unknown_ids() {
        let mut state = session_with_centres(2);
        state.replace_students(vec![student(1), student(2)]);
        let response = RunAllotmentResponse {
            status: ResponseStatus::Success,
            assignments: HashMap::from([
                (StudentId::sequential(1), CentreId::sequential(2)),
                (StudentId::sequential(2), CentreId::sequential(9)),
                (StudentId::sequential(7), CentreId::sequential(1)),
            ]),
            debug_distances: HashMap::new(),
            timing: None,
            extra: Map::new(),
        };
        assert_eq!(state.apply_allotment(response), 2);
        assert_eq!(state.assignments().len(), 1);
        assert_eq!(
            state.assigned_centre(&StudentId::sequential(1)),
            Some(&CentreId::sequential(2))
        );
    }

    #[test]
    fn replacing_students_clears_derived_results() {
        let mut state = session_with_centres(1);
        state.replace_students(vec![student(1)]);
        let issued = state.generation();
        state.assignments.insert(StudentId::sequential(1), CentreId::sequential(1));
        state.replace_students(vec![student(1), student(2)]);
        assert!(state.assignments().is_empty());
        assert!(state.distances().is_empty());
        assert!(!state.accepts(issued, true));
        assert!(state.accepts(issued, false));
    }
}
