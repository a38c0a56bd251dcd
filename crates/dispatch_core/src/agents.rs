use std::fmt;

use serde::{Deserialize, Serialize};

use crate::movement::{self, MoveOutcome};
use crate::spatial::Point;

/// Identifier of a registered worker. Allocated by the registry, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requester ids come from callers; only positive values are accepted.
pub type RequesterId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Free,
    Busy,
}

/// The trip a busy worker is currently serving.
///
/// Destination and requester live together here, so a worker is busy exactly
/// when it carries an `ActiveTrip`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveTrip {
    /// Registry-wide dispatch number. A worker re-dispatched between two
    /// ticks carries a different sequence, which lets stale movement results
    /// be told apart from current ones.
    pub sequence: u64,
    pub requester: RequesterId,
    pub origin: Point,
    pub destination: Point,
    /// Simulated minute at which the worker was dispatched.
    pub matched_at: u64,
}

impl ActiveTrip {
    /// Straight-line pickup-to-dropoff distance, used for pricing.
    pub fn length(&self) -> f64 {
        self.origin.distance_to(self.destination)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Worker {
    pub id: WorkerId,
    pub model: String,
    pub plate: String,
    pub position: Point,
    /// Fixed at creation, in `[3.5, 5.0]`.
    pub rating: f64,
    trip: Option<ActiveTrip>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        model: impl Into<String>,
        plate: impl Into<String>,
        position: Point,
        rating: f64,
    ) -> Self {
        Self {
            id,
            model: model.into(),
            plate: plate.into(),
            position,
            rating,
            trip: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        if self.trip.is_some() {
            WorkerState::Busy
        } else {
            WorkerState::Free
        }
    }

    pub fn is_free(&self) -> bool {
        self.trip.is_none()
    }

    pub fn trip(&self) -> Option<&ActiveTrip> {
        self.trip.as_ref()
    }

    pub fn destination(&self) -> Option<Point> {
        self.trip.as_ref().map(|t| t.destination)
    }

    pub fn assigned_requester(&self) -> Option<RequesterId> {
        self.trip.as_ref().map(|t| t.requester)
    }

    /// Dispatches the worker: it is relocated onto the pickup point and heads
    /// for the request's destination.
    pub(crate) fn claim(&mut self, request: &TripRequest, now: u64, sequence: u64) {
        debug_assert!(self.is_free(), "claiming a busy worker");
        self.position = request.origin;
        self.trip = Some(ActiveTrip {
            sequence,
            requester: request.requester,
            origin: request.origin,
            destination: request.destination,
            matched_at: now,
        });
    }

    /// Frees the worker, returning the trip it was serving.
    pub(crate) fn release(&mut self) -> Option<ActiveTrip> {
        self.trip.take()
    }

    /// Runs one movement step toward the current destination and applies the
    /// new position. Returns `None` for a free worker. A fault leaves the
    /// position untouched.
    pub fn advance(&mut self, step_size: f64) -> Option<MoveOutcome> {
        let destination = self.destination()?;
        let outcome = movement::advance(self.position, destination, step_size);
        if let Some(position) = outcome.position() {
            self.position = position;
        }
        Some(outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requester {
    pub id: RequesterId,
    pub name: String,
    #[serde(skip_serializing)]
    pub payment_token: String,
    pub completed_trips: u32,
}

impl Requester {
    pub fn new(id: RequesterId, name: impl Into<String>, payment_token: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            payment_token: payment_token.into(),
            completed_trips: 0,
        }
    }
}

/// A pickup-to-destination request, either claimed immediately or parked in
/// the waiting queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRequest {
    pub requester: RequesterId,
    pub origin: Point,
    pub destination: Point,
    /// Simulated minute the request was submitted.
    pub requested_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(requester: RequesterId) -> TripRequest {
        TripRequest {
            requester,
            origin: Point::new(5.0, 5.0),
            destination: Point::new(5.0, 9.0),
            requested_at: 0,
        }
    }

    #[test]
    fn claim_teleports_to_origin_and_marks_busy() {
        let mut worker = Worker::new(WorkerId(1), "Corolla", "ABC-123", Point::new(0.0, 0.0), 4.2);
        assert_eq!(worker.state(), WorkerState::Free);
        assert_eq!(worker.destination(), None);

        worker.claim(&request(7), 40, 1);

        assert_eq!(worker.state(), WorkerState::Busy);
        assert_eq!(worker.position, Point::new(5.0, 5.0));
        assert_eq!(worker.destination(), Some(Point::new(5.0, 9.0)));
        assert_eq!(worker.assigned_requester(), Some(7));
        assert_eq!(worker.trip().map(|t| t.matched_at), Some(40));
        assert_eq!(worker.trip().map(|t| t.sequence), Some(1));
    }

    #[test]
    fn release_clears_destination_and_requester_together() {
        let mut worker = Worker::new(WorkerId(1), "Corolla", "ABC-123", Point::new(0.0, 0.0), 4.2);
        worker.claim(&request(7), 0, 1);

        let trip = worker.release().expect("active trip");
        assert_eq!(trip.requester, 7);
        assert_eq!(trip.length(), 4.0);
        assert!(worker.is_free());
        assert_eq!(worker.destination(), None);
        assert_eq!(worker.assigned_requester(), None);
    }

    #[test]
    fn advance_moves_only_busy_workers() {
        let mut worker = Worker::new(WorkerId(1), "Corolla", "ABC-123", Point::new(0.0, 0.0), 4.2);
        assert_eq!(worker.advance(1.0), None);

        worker.claim(&request(7), 0, 1);
        assert_eq!(
            worker.advance(3.0),
            Some(MoveOutcome::InTransit(Point::new(5.0, 8.0)))
        );
        assert_eq!(
            worker.advance(3.0),
            Some(MoveOutcome::Arrived(Point::new(5.0, 9.0)))
        );
        assert_eq!(worker.position, Point::new(5.0, 9.0));
    }
}
