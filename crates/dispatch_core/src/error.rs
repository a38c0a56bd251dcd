use thiserror::Error;

use crate::agents::{RequesterId, WorkerId};
use crate::spatial::Point;

/// Caller-facing failures of dispatch operations. None of these leave the
/// registry in a partially mutated state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("worker {0} not found")]
    NotFound(WorkerId),

    #[error("worker {0} is serving a trip")]
    Busy(WorkerId),

    #[error("worker {0} has no active trip")]
    Idle(WorkerId),

    #[error("requester id {0} is not positive")]
    InvalidId(RequesterId),

    #[error("requester {0} already has a trip in progress")]
    AlreadyTraveling(RequesterId),

    #[error("trip endpoint {0} is not a finite point")]
    InvalidLocation(Point),

    #[error("no free worker within coverage and queueing is disabled")]
    NoCapacity,

    #[error("applicant with plate {plate} failed the background check")]
    BackgroundCheckFailed { plate: String },

    #[error("fare {0} is not a non-negative finite amount")]
    InvalidFare(f64),

    #[error("tick interval must be positive, got {0} ms")]
    InvalidTickInterval(u64),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
