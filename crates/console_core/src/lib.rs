pub mod backend;
pub mod controller;
pub mod error;
pub mod geo;
pub mod projector;
pub mod session;
pub mod simulator;

pub use backend::{BackendClient, BackendError, BackendResult, HttpBackendClient};
pub use controller::{
    AllotmentReport, PathOutcome, SimulationReport, WorkflowCommand, WorkflowController,
    WorkflowEvent,
};
pub use error::{ValidationError, WorkflowError};
pub use projector::{travel_time_label, ResultProjector};
pub use session::{Operation, SessionState, WorkflowPhase};
