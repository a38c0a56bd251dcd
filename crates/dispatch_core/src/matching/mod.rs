//! Worker selection for incoming trip requests.
//!
//! The registry gathers the free workers into [`MatchCandidate`]s and hands
//! them to a [`MatchingAlgorithm`] while it holds the fleet lock; the
//! algorithm only chooses, claiming is the registry's job.

pub mod algorithm;
pub mod nearest;
pub mod types;

pub use algorithm::MatchingAlgorithm;
pub use nearest::{GlobalNearest, NearestWithinRadius};
pub use types::{MatchCandidate, ScoredCandidate};

use crate::config::{MatchingConfig, MatchingPolicy};

/// Builds the algorithm selected by configuration.
pub fn build_matching_algorithm(config: &MatchingConfig) -> Box<dyn MatchingAlgorithm> {
    match config.policy {
        MatchingPolicy::Radius => Box::new(NearestWithinRadius::new(config.coverage_radius)),
        MatchingPolicy::GlobalNearest => Box::new(GlobalNearest),
    }
}
