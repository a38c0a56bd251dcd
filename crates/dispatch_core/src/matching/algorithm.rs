use std::fmt::Debug;

use crate::agents::WorkerId;
use crate::spatial::Point;

use super::types::MatchCandidate;

/// Chooses which free worker should serve a pickup.
///
/// Implementations receive the free workers in registry order (increasing id)
/// and must be deterministic for a given input: the registry calls them while
/// holding the fleet lock and claims whatever they return.
pub trait MatchingAlgorithm: Send + Sync + Debug {
    /// Returns the worker to dispatch to `origin`, or `None` when no candidate
    /// qualifies and the request should be queued.
    fn find_match(&self, origin: Point, candidates: &[MatchCandidate]) -> Option<WorkerId>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
