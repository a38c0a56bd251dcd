//! Synthetic demand for simulations: random requesters asking for random
//! trips inside the operating area.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::RequesterId;
use crate::config::DemandConfig;
use crate::spatial::{Bounds, Point};

/// A generated trip request, not yet submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRequest {
    pub requester: RequesterId,
    pub origin: Point,
    pub destination: Point,
}

#[derive(Debug)]
pub struct DemandGenerator {
    rng: StdRng,
    area: Bounds,
    requester_pool: u32,
}

impl DemandGenerator {
    pub fn new(config: &DemandConfig, area: Bounds, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            area,
            requester_pool: config.requester_pool.max(1),
        }
    }

    pub fn next_request(&mut self) -> SyntheticRequest {
        let requester = RequesterId::from(self.rng.gen_range(1..=self.requester_pool));
        SyntheticRequest {
            requester,
            origin: self.area.sample(&mut self.rng),
            destination: self.area.sample(&mut self.rng),
        }
    }
}
