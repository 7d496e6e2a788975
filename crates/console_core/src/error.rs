use shared::domain::{CentreId, StudentId};
use thiserror::Error;

use crate::{backend::BackendError, session::Operation};

/// Local input problems, rejected before any backend call and without
/// touching session state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("centre capacity must be a positive integer, got {0}")]
    InvalidCapacity(i64),
    #[error("centre selection is already active")]
    SelectionAlreadyEnabled,
    #[error("centre selection is not active")]
    SelectionInactive,
    #[error("coordinates ({lat}, {lon}) are outside the valid range")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("add at least one test centre first")]
    NoCentres,
    #[error("number of students must be positive, got {0}")]
    InvalidStudentCount(i64),
    #[error("build the graph first")]
    GraphNotBuilt,
    #[error("simulate students first")]
    NoStudents,
    #[error("student {0} not found")]
    UnknownStudent(StudentId),
    #[error("centre {0} not found")]
    UnknownCentre(CentreId),
    #[error("student {0} has no assigned centre")]
    Unassigned(StudentId),
    #[error("map bounds are malformed")]
    InvalidBoundingBox,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} is already in progress")]
    Busy(Operation),
    #[error("{0}")]
    Application(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0} result discarded because the session changed while it was running")]
    Superseded(Operation),
    #[error("simulation task failed: {0}")]
    Simulation(String),
}

impl From<BackendError> for WorkflowError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Application(message) => Self::Application(message),
            BackendError::Transport(message) => Self::Transport(message),
        }
    }
}

impl WorkflowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Text for the operator. Transport details go to the log, the operator
    /// gets a generic connectivity hint.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => {
                "Failed to connect to backend server. Make sure it is running and reachable."
                    .to_string()
            }
            Self::Application(message) => format!("Backend error: {message}"),
            other => other.to_string(),
        }
    }
}
