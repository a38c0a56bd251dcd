//! Fleet reinforcement: hire one more worker when the waiting queue backs up.
//!
//! This is a hysteresis loop, not an autoscaler. One hire per check at most,
//! a cooldown between hires, a hard cap on fleet size and no down-scaling.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ReinforcementConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HoldReason {
    Disabled,
    QueueBelowThreshold,
    FleetAtCapacity,
    CoolingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReinforcementDecision {
    Hire,
    Hold(HoldReason),
}

#[derive(Debug, Clone)]
pub struct ReinforcementPolicy {
    config: ReinforcementConfig,
    last_hire: Option<Instant>,
    hires: u64,
}

impl ReinforcementPolicy {
    pub fn new(config: ReinforcementConfig) -> Self {
        Self {
            config,
            last_hire: None,
            hires: 0,
        }
    }

    pub fn hires(&self) -> u64 {
        self.hires
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    pub fn evaluate(&self, queue_depth: usize, fleet_size: usize, now: Instant) -> ReinforcementDecision {
        if !self.config.enabled {
            return ReinforcementDecision::Hold(HoldReason::Disabled);
        }
        if queue_depth < self.config.queue_threshold {
            return ReinforcementDecision::Hold(HoldReason::QueueBelowThreshold);
        }
        if fleet_size >= self.config.fleet_cap {
            return ReinforcementDecision::Hold(HoldReason::FleetAtCapacity);
        }
        if let Some(last) = self.last_hire {
            if now.saturating_duration_since(last) < self.cooldown() {
                return ReinforcementDecision::Hold(HoldReason::CoolingDown);
            }
        }
        ReinforcementDecision::Hire
    }

    /// Starts the cooldown and returns the sequence number of this hire.
    pub fn record_hire(&mut self, at: Instant) -> u64 {
        self.last_hire = Some(at);
        self.hires += 1;
        self.hires
    }
}
