use thiserror::Error;

use crate::path_id::PathId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("malformed route geometry: {0}")]
    MalformedGeometry(String),
    #[error("unknown path {0}")]
    UnknownPath(PathId),
    #[error("no route is bound for playback")]
    NoActiveRoute,
    /// Carries the backend (or transport) message verbatim.
    #[error("{0}")]
    PlanningRequestFailed(String),
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
