use crate::agents::WorkerId;
use crate::spatial::Point;

use super::algorithm::MatchingAlgorithm;
use super::types::{MatchCandidate, ScoredCandidate};

/// Default coverage radius in distance units.
pub const DEFAULT_COVERAGE_RADIUS: f64 = 20.0;

/// Nearest free worker within a fixed coverage radius (inclusive).
///
/// Exactly equidistant candidates are separated by rating, higher first; any
/// tie left after that goes to the earlier-registered worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestWithinRadius {
    pub radius: f64,
}

impl NearestWithinRadius {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Default for NearestWithinRadius {
    fn default() -> Self {
        Self::new(DEFAULT_COVERAGE_RADIUS)
    }
}

impl MatchingAlgorithm for NearestWithinRadius {
    fn find_match(&self, origin: Point, candidates: &[MatchCandidate]) -> Option<WorkerId> {
        select_nearest(origin, candidates, Some(self.radius))
    }

    fn name(&self) -> &'static str {
        "nearest-within-radius"
    }
}

/// Nearest free worker anywhere in the plane, same tie-break as
/// [`NearestWithinRadius`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GlobalNearest;

impl MatchingAlgorithm for GlobalNearest {
    fn find_match(&self, origin: Point, candidates: &[MatchCandidate]) -> Option<WorkerId> {
        select_nearest(origin, candidates, None)
    }

    fn name(&self) -> &'static str {
        "global-nearest"
    }
}

fn select_nearest(
    origin: Point,
    candidates: &[MatchCandidate],
    max_distance: Option<f64>,
) -> Option<WorkerId> {
    let mut best: Option<ScoredCandidate> = None;

    for candidate in candidates {
        let scored = ScoredCandidate::score(candidate, origin);
        // NaN distances fail both comparisons and are never selected.
        let in_range = match max_distance {
            Some(radius) => scored.distance <= radius,
            None => scored.distance.is_finite(),
        };
        if !in_range {
            continue;
        }
        match best {
            Some(current) if !scored.beats(&current) => {}
            _ => best = Some(scored),
        }
    }

    best.map(|scored| scored.worker)
}
