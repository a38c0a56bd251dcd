//! Movement engine: advances a worker one tick toward its destination.
//!
//! [`advance`] is a pure function of the current position, the destination and
//! the step size. It never locks anything; the tick driver decides which
//! workers move and when the results are written back to the registry.

use serde::Serialize;
use thiserror::Error;

use crate::spatial::Point;

/// Remaining distance under which a worker counts as arrived.
pub const ARRIVAL_EPSILON: f64 = 1e-6;

/// Numeric faults detected while computing a move. The tick driver recovers
/// from these by resetting the worker instead of surfacing them to callers.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize)]
pub enum MathFault {
    #[error("non-finite coordinates")]
    NonFiniteCoordinates,
    #[error("step size {0} is not a positive finite number")]
    InvalidStep(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// Position snapped exactly onto the destination.
    Arrived(Point),
    /// Moved by exactly one step; the destination is still ahead.
    InTransit(Point),
    Fault(MathFault),
}

impl MoveOutcome {
    /// New position, if the move produced one.
    pub fn position(&self) -> Option<Point> {
        match self {
            MoveOutcome::Arrived(p) | MoveOutcome::InTransit(p) => Some(*p),
            MoveOutcome::Fault(_) => None,
        }
    }
}

/// Moves `position` toward `destination` by `step_size` distance units.
///
/// Arrival is reported when the remaining distance is below
/// [`ARRIVAL_EPSILON`] or when one step would reach or overshoot the target;
/// in both cases the returned position is exactly `destination`. Starting on
/// the destination never normalizes a zero vector.
pub fn advance(position: Point, destination: Point, step_size: f64) -> MoveOutcome {
    if !position.is_finite() || !destination.is_finite() {
        return MoveOutcome::Fault(MathFault::NonFiniteCoordinates);
    }
    if !step_size.is_finite() || step_size <= 0.0 {
        return MoveOutcome::Fault(MathFault::InvalidStep(step_size));
    }

    let dx = destination.x - position.x;
    let dy = destination.y - position.y;
    let remaining = dx.hypot(dy);
    if !remaining.is_finite() {
        return MoveOutcome::Fault(MathFault::NonFiniteCoordinates);
    }

    // The epsilon slack on the step keeps accumulated rounding from costing an
    // extra tick on the final approach.
    if remaining < ARRIVAL_EPSILON || remaining <= step_size + ARRIVAL_EPSILON {
        return MoveOutcome::Arrived(destination);
    }

    let next = Point::new(
        position.x + dx / remaining * step_size,
        position.y + dy / remaining * step_size,
    );
    if !next.is_finite() {
        return MoveOutcome::Fault(MathFault::NonFiniteCoordinates);
    }
    MoveOutcome::InTransit(next)
}
