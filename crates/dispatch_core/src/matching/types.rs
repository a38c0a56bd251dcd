use crate::agents::WorkerId;
use crate::spatial::Point;

/// A free worker as seen by the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub worker: WorkerId,
    pub position: Point,
    pub rating: f64,
}

/// A candidate with its distance to the pickup point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub worker: WorkerId,
    pub distance: f64,
    pub rating: f64,
}

impl ScoredCandidate {
    pub fn score(candidate: &MatchCandidate, origin: Point) -> Self {
        Self {
            worker: candidate.worker,
            distance: candidate.position.distance_to(origin),
            rating: candidate.rating,
        }
    }

    /// Strictly closer, or exactly as close with a higher rating.
    pub fn beats(&self, other: &ScoredCandidate) -> bool {
        self.distance < other.distance
            || (self.distance == other.distance && self.rating > other.rating)
    }
}
