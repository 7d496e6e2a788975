use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{Map, Value};
use shared::{
    domain::{BoundingBox, Centre, CentreId, GeoPoint, GraphDetail, StudentId},
    protocol::{
        BuildGraphRequest, ParallelDijkstraRequest, ParallelDijkstraResponse, PathQuery,
        RunAllotmentRequest, Timing,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    backend::BackendClient,
    error::{ValidationError, WorkflowError},
    session::{GraphSummary, Operation, PathView, SessionState, WorkflowPhase},
    simulator::{self, SimulationArea},
};

pub mod commands;
pub mod events;

pub use commands::WorkflowCommand;
pub use events::WorkflowEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub requested: usize,
    pub generated: usize,
    pub area: SimulationArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllotmentReport {
    pub student_count: usize,
    pub assigned_count: usize,
    pub dropped_count: usize,
    pub timing: Option<Timing>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found(PathView),
    NoRoute {
        student_id: StudentId,
        centre_id: CentreId,
    },
}

struct Inner {
    session: SessionState,
    rng: StdRng,
}

pub struct WorkflowController<B: BackendClient> {
    backend: Arc<B>,
    inner: Mutex<Inner>,
}

impl<B: BackendClient> WorkflowController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_rng(backend, StdRng::from_entropy())
    }

    pub fn with_seed(backend: Arc<B>, seed: u64) -> Self {
        Self::with_rng(backend, StdRng::seed_from_u64(seed))
    }

    fn with_rng(backend: Arc<B>, rng: StdRng) -> Self {
        Self {
            backend,
            inner: Mutex::new(Inner {
                session: SessionState::default(),
                rng,
            }),
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.session.clone()
    }

    pub async fn phase(&self) -> WorkflowPhase {
        self.inner.lock().await.session.phase()
    }

    pub async fn is_in_flight(&self, operation: Operation) -> bool {
        self.inner.lock().await.session.is_in_flight(operation)
    }

    pub async fn enable_selection(&self, capacity: i64) -> Result<u32, WorkflowError> {
        let capacity = u32::try_from(capacity)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(ValidationError::InvalidCapacity(capacity))?;

        let mut inner = self.inner.lock().await;
        if inner.session.flags().selection_enabled {
            return Err(ValidationError::SelectionAlreadyEnabled.into());
        }
        inner.session.enable_selection(capacity);
        info!(capacity, "centre selection enabled");
        Ok(capacity)
    }

    pub async fn add_centre(&self, lat: f64, lon: f64) -> Result<Centre, WorkflowError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::InvalidCoordinates { lat, lon }.into());
        }

        let mut inner = self.inner.lock().await;
        if inner.session.phase() != WorkflowPhase::SelectingCentres {
            return Err(ValidationError::SelectionInactive.into());
        }
        let centre = inner.session.push_centre(lat, lon)?;
        info!(centre_id = %centre.centre_id, lat, lon, "added centre");
        Ok(centre)
    }

    pub async fn clear_all(&self) {
        let mut inner = self.inner.lock().await;
        inner.session.reset();
        info!("session cleared");
    }

    pub async fn build_graph(
        &self,
        bbox: BoundingBox,
        graph_detail: GraphDetail,
        use_cache: bool,
    ) -> Result<GraphSummary, WorkflowError> {
        const OP: Operation = Operation::BuildGraph;
        if !bbox.is_well_formed() {
            return Err(ValidationError::InvalidBoundingBox.into());
        }

        let (request, issued) = {
            let mut inner = self.inner.lock().await;
            if inner.session.centres().is_empty() {
                return Err(ValidationError::NoCentres.into());
            }
            inner.session.begin(OP)?;
            let request = BuildGraphRequest {
                bbox,
                centres: inner.session.centres().to_vec(),
                graph_detail,
                use_cache,
            };
            (request, inner.session.generation())
        };

        info!(centres = request.centres.len(), ?graph_detail, use_cache, "building graph");
        let outcome = self.backend.build_graph(&request).await;

        let mut inner = self.inner.lock().await;
        inner.session.finish(OP);
        let response = outcome.map_err(|err| {
            warn!(error = %err, "graph build failed");
            WorkflowError::from(err)
        })?;
        if !inner.session.accepts(issued, false) {
            warn!("discarding graph build result from a superseded session");
            return Err(WorkflowError::Superseded(OP));
        }

        let summary = GraphSummary {
            nodes_count: response.nodes_count,
            edges_count: response.edges_count,
            timing: response.timing,
            extra: response.extra,
        };
        inner.session.mark_graph_built(summary.clone());
        info!(
            nodes = summary.nodes_count,
            edges = summary.edges_count,
            "graph built"
        );
        Ok(summary)
    }

    pub async fn simulate(&self, count: i64) -> Result<SimulationReport, WorkflowError> {
        const OP: Operation = Operation::Simulate;
        let requested = usize::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(ValidationError::InvalidStudentCount(count))?;

        let (centres, mut rng, issued) = {
            let mut inner = self.inner.lock().await;
            if inner.session.centres().is_empty() {
                return Err(ValidationError::NoCentres.into());
            }
            inner.session.begin(OP)?;
            let rng = StdRng::seed_from_u64(inner.rng.gen());
            (
                inner.session.centres().to_vec(),
                rng,
                inner.session.generation(),
            )
        };

        debug!(requested, centres = centres.len(), "simulating students");
        let outcome = tokio::task::spawn_blocking(move || {
            simulator::generate(requested, &centres, &mut rng)
        })
        .await;

        let mut inner = self.inner.lock().await;
        inner.session.finish(OP);
        let simulation = outcome
            .map_err(|err| WorkflowError::Simulation(err.to_string()))??;
        if !inner.session.accepts(issued, false) {
            warn!("discarding simulated students from a superseded session");
            return Err(WorkflowError::Superseded(OP));
        }

        let report = SimulationReport {
            requested,
            generated: simulation.students.len(),
            area: simulation.area,
        };
        if simulation.is_short() {
            warn!(
                requested,
                generated = report.generated,
                draws = simulation.draws,
                "draw budget exhausted before reaching requested population"
            );
        }
        inner.session.replace_students(simulation.students);
        info!(
            generated = report.generated,
            radius_m = report.area.radius_m.round(),
            centroid_lat = report.area.centroid.lat,
            centroid_lon = report.area.centroid.lon,
            "simulated students"
        );
        Ok(report)
    }

    pub async fn run_allotment(&self) -> Result<AllotmentReport, WorkflowError> {
        const OP: Operation = Operation::RunAllotment;
        let (request, issued) = {
            let mut inner = self.inner.lock().await;
            if !inner.session.flags().graph_built {
                return Err(ValidationError::GraphNotBuilt.into());
            }
            if inner.session.students().is_empty() {
                return Err(ValidationError::NoStudents.into());
            }
            inner.session.begin(OP)?;
            let request = RunAllotmentRequest {
                students: inner.session.students().to_vec(),
            };
            (request, inner.session.generation())
        };

        info!(students = request.students.len(), "running allotment");
        let outcome = self.backend.run_allotment(&request).await;

        let mut inner = self.inner.lock().await;
        inner.session.finish(OP);
        let mut response = outcome.map_err(|err| {
            warn!(error = %err, "allotment failed");
            WorkflowError::from(err)
        })?;
        if !inner.session.accepts(issued, true) {
            warn!("discarding allotment for a superseded student set");
            return Err(WorkflowError::Superseded(OP));
        }

        let extra = std::mem::take(&mut response.extra);
        let dropped_count = inner.session.apply_allotment(response);
        let report = AllotmentReport {
            student_count: inner.session.students().len(),
            assigned_count: inner.session.assignments().len(),
            dropped_count,
            timing: inner.session.allotment_timing().cloned(),
            extra,
        };
        info!(
            assigned = report.assigned_count,
            students = report.student_count,
            "allotment complete"
        );
        Ok(report)
    }

    pub async fn inspect_path(
        &self,
        student_id: &StudentId,
        centre_id: &CentreId,
    ) -> Result<PathOutcome, WorkflowError> {
        const OP: Operation = Operation::InspectPath;
        let (query, issued) = {
            let mut inner = self.inner.lock().await;
            let student = inner
                .session
                .student(student_id)
                .ok_or_else(|| ValidationError::UnknownStudent(student_id.clone()))?;
            let centre = inner
                .session
                .centre(centre_id)
                .ok_or_else(|| ValidationError::UnknownCentre(centre_id.clone()))?;
            let query = PathQuery {
                student_lat: student.lat,
                student_lon: student.lon,
                centre_lat: centre.lat,
                centre_lon: centre.lon,
            };
            inner.session.begin(OP)?;
            (query, inner.session.generation())
        };

        debug!(%student_id, %centre_id, "requesting path");
        let outcome = self.backend.get_path(query).await;

        let mut inner = self.inner.lock().await;
        inner.session.finish(OP);
        let response = outcome.map_err(|err| {
            warn!(error = %err, %student_id, %centre_id, "path lookup failed");
            WorkflowError::from(err)
        })?;
        if !inner.session.accepts(issued, true) {
            warn!("discarding path for a superseded student set");
            return Err(WorkflowError::Superseded(OP));
        }

        let polyline: Vec<GeoPoint> = response
            .path
            .unwrap_or_default()
            .into_iter()
            .map(|[lat, lon]| GeoPoint::new(lat, lon))
            .collect();
        if polyline.is_empty() {
            info!(%student_id, %centre_id, "no route between student and centre");
            return Ok(PathOutcome::NoRoute {
                student_id: student_id.clone(),
                centre_id: centre_id.clone(),
            });
        }

        let view = PathView {
            student_id: student_id.clone(),
            centre_id: centre_id.clone(),
            polyline,
            travel_time_seconds: response.travel_time_seconds,
            timing: response.timing,
            extra: response.extra,
        };
        info!(%student_id, %centre_id, points = view.polyline.len(), "path found");
        inner.session.show_path(view.clone());
        Ok(PathOutcome::Found(view))
    }

    pub async fn export_diagnostics(&self) -> Result<Value, WorkflowError> {
        const OP: Operation = Operation::ExportDiagnostics;
        self.inner.lock().await.session.begin(OP)?;

        info!("requesting diagnostics report");
        let outcome = self.backend.export_diagnostics().await;

        self.inner.lock().await.session.finish(OP);
        outcome.map_err(|err| {
            warn!(error = %err, "diagnostics export failed");
            WorkflowError::from(err)
        })
    }

    pub async fn run_parallel_benchmark(&self) -> Result<ParallelDijkstraResponse, WorkflowError> {
        const OP: Operation = Operation::ParallelBenchmark;
        let issued = {
            let mut inner = self.inner.lock().await;
            if !inner.session.flags().graph_built {
                return Err(ValidationError::GraphNotBuilt.into());
            }
            if inner.session.centres().is_empty() {
                return Err(ValidationError::NoCentres.into());
            }
            inner.session.begin(OP)?;
            inner.session.generation()
        };

        info!("running parallel dijkstra benchmark");
        let outcome = self
            .backend
            .run_parallel_dijkstra(&ParallelDijkstraRequest::default())
            .await;

        let mut inner = self.inner.lock().await;
        inner.session.finish(OP);
        let response = outcome.map_err(|err| {
            warn!(error = %err, "parallel benchmark failed");
            WorkflowError::from(err)
        })?;
        if !inner.session.accepts(issued, false) {
            warn!("discarding benchmark result from a superseded session");
            return Err(WorkflowError::Superseded(OP));
        }
        info!(
            processed = response.centres_processed,
            successful = response.successful,
            speedup = response.timing.speedup,
            "parallel benchmark complete"
        );
        inner.session.record_benchmark(response.clone());
        Ok(response)
    }

    /// Runs one operator command and reports its outcome as an event.
    pub async fn dispatch(&self, command: WorkflowCommand) -> WorkflowEvent {
        let name = command.name();
        debug!(command = name, "dispatching workflow command");
        let result = match command {
            WorkflowCommand::EnableSelection { capacity } => self
                .enable_selection(capacity)
                .await
                .map(|capacity| WorkflowEvent::SelectionEnabled { capacity }),
            WorkflowCommand::AddCentre { lat, lon } => self
                .add_centre(lat, lon)
                .await
                .map(WorkflowEvent::CentreAdded),
            WorkflowCommand::ClearAll => {
                self.clear_all().await;
                Ok(WorkflowEvent::SessionCleared)
            }
            WorkflowCommand::BuildGraph {
                bbox,
                graph_detail,
                use_cache,
            } => self
                .build_graph(bbox, graph_detail, use_cache)
                .await
                .map(WorkflowEvent::GraphBuilt),
            WorkflowCommand::Simulate { count } => self
                .simulate(count)
                .await
                .map(WorkflowEvent::StudentsSimulated),
            WorkflowCommand::RunAllotment => self
                .run_allotment()
                .await
                .map(WorkflowEvent::AllotmentCompleted),
            WorkflowCommand::InspectPath {
                student_id,
                centre_id,
            } => match self.resolve_centre(&student_id, centre_id).await {
                Ok(centre_id) => self
                    .inspect_path(&student_id, &centre_id)
                    .await
                    .map(WorkflowEvent::from),
                Err(err) => Err(err),
            },
            WorkflowCommand::ExportDiagnostics => self
                .export_diagnostics()
                .await
                .map(WorkflowEvent::DiagnosticsReady),
            WorkflowCommand::RunParallelBenchmark => self
                .run_parallel_benchmark()
                .await
                .map(WorkflowEvent::BenchmarkCompleted),
        };

        result.unwrap_or_else(|error| WorkflowEvent::Failed {
            command: name,
            error,
        })
    }

    // Falls back to the student's assigned centre.
    async fn resolve_centre(
        &self,
        student_id: &StudentId,
        centre_id: Option<CentreId>,
    ) -> Result<CentreId, WorkflowError> {
        if let Some(centre_id) = centre_id {
            return Ok(centre_id);
        }
        let inner = self.inner.lock().await;
        if inner.session.student(student_id).is_none() {
            return Err(ValidationError::UnknownStudent(student_id.clone()).into());
        }
        inner
            .session
            .assigned_centre(student_id)
            .cloned()
            .ok_or_else(|| ValidationError::Unassigned(student_id.clone()).into())
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
