//! Bodies of the route-planning backend's HTTP contract. Unread fields land in `extra`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{BoundingBox, Centre, CentreId, GraphDetail, Student, StudentId},
    error::ResponseStatus,
};

pub type Timing = Map<String, Value>;

/// Travel time in seconds per centre. `None` is a JSON `null`, which the
/// backend writes for distances it could not encode.
pub type CentreDistances = HashMap<CentreId, Option<f64>>;

pub const BUILD_GRAPH_PATH: &str = "/build-graph";
pub const RUN_ALLOTMENT_PATH: &str = "/run-allotment";
pub const GET_PATH_PATH: &str = "/get-path";
pub const EXPORT_DIAGNOSTICS_PATH: &str = "/export-diagnostics";
pub const PARALLEL_DIJKSTRA_PATH: &str = "/parallel-dijkstra";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildGraphRequest {
    #[serde(flatten)]
    pub bbox: BoundingBox,
    pub centres: Vec<Centre>,
    pub graph_detail: GraphDetail,
    pub use_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildGraphResponse {
    pub status: ResponseStatus,
    pub nodes_count: u64,
    pub edges_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAllotmentRequest {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAllotmentResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub assignments: HashMap<StudentId, CentreId>,
    #[serde(default)]
    pub debug_distances: HashMap<StudentId, CentreDistances>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathQuery {
    pub student_lat: f64,
    pub student_lon: f64,
    pub centre_lat: f64,
    pub centre_lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub status: ResponseStatus,
    /// Ordered `[lat, lon]` pairs. Empty or missing means no route was found.
    #[serde(default)]
    pub path: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelDijkstraRequest {
    pub workflow_name: String,
    pub workflow_type: String,
    pub save_to_files: bool,
}

impl Default for ParallelDijkstraRequest {
    fn default() -> Self {
        Self {
            workflow_name: "Parallel_Center_Dijkstra_Precomputation".to_string(),
            workflow_type: "parallel".to_string(),
            save_to_files: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentreRunResult {
    pub centre_id: CentreId,
    pub success: bool,
    #[serde(default)]
    pub computation_time_ms: u64,
    #[serde(default)]
    pub reachable_nodes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelTiming {
    #[serde(default)]
    pub parallel_execution_ms: u64,
    #[serde(default)]
    pub estimated_sequential_ms: u64,
    #[serde(default)]
    pub speedup: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelDijkstraResponse {
    pub status: ResponseStatus,
    pub centres_processed: u64,
    pub successful: u64,
    #[serde(default)]
    pub results: Vec<CentreRunResult>,
    #[serde(default)]
    pub timing: ParallelTiming,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
