//! Dispatch configuration.
//!
//! Every field has a default, so a TOML file only needs the values it wants to
//! override:
//!
//! ```toml
//! seed = 42
//!
//! [matching]
//! policy = "global_nearest"
//!
//! [movement]
//! step_size = 2.0
//! tick_interval_ms = 250
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::DEFAULT_MINUTES_PER_TICK;
use crate::matching::nearest::DEFAULT_COVERAGE_RADIUS;
use crate::pricing::PricingConfig;
use crate::spatial::Bounds;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the matcher picks among free workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPolicy {
    /// Nearest free worker within `coverage_radius`.
    #[default]
    Radius,
    /// Nearest free worker anywhere.
    GlobalNearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub policy: MatchingPolicy,
    pub coverage_radius: f64,
    /// When false, requests with no eligible worker fail with `NoCapacity`
    /// instead of joining the waiting queue.
    pub queue_when_unavailable: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            policy: MatchingPolicy::default(),
            coverage_radius: DEFAULT_COVERAGE_RADIUS,
            queue_when_unavailable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Distance units covered by a busy worker per tick.
    pub step_size: f64,
    /// Wall-clock period of the tick driver.
    pub tick_interval_ms: u64,
    pub sim_minutes_per_tick: u64,
    /// Whether the tick driver starts running immediately.
    pub start_active: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            step_size: 5.0,
            tick_interval_ms: 1_000,
            sim_minutes_per_tick: DEFAULT_MINUTES_PER_TICK,
            start_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Fraction of each fare retained by the company.
    pub commission_rate: f64,
    /// Every Nth completed trip is flagged for a quality audit (0 disables).
    pub audit_every: u64,
    /// Completed-trip records kept for reporting; oldest are dropped first.
    pub trip_log_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.20,
            audit_every: 5,
            trip_log_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReinforcementConfig {
    pub enabled: bool,
    /// Queue depth at or above which a hire is considered.
    pub queue_threshold: usize,
    /// No hires once the fleet has this many workers.
    pub fleet_cap: usize,
    /// Minimum wall-clock time between two reinforcement hires.
    pub cooldown_ms: u64,
    /// How often the controller inspects the queue.
    pub check_interval_ms: u64,
}

impl Default for ReinforcementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_threshold: 5,
            fleet_cap: 20,
            cooldown_ms: 10_000,
            check_interval_ms: 1_000,
        }
    }
}

/// Synthetic demand, only used by simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Requests are drawn from requester ids `1..=requester_pool`.
    pub requester_pool: u32,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 500,
            requester_pool: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// RNG seed for placement, ratings, background checks and demand.
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Probability that a registration is rejected by the background check.
    pub background_check_failure_rate: f64,
    pub area: Bounds,
    pub matching: MatchingConfig,
    pub movement: MovementConfig,
    pub pricing: PricingConfig,
    pub ledger: LedgerConfig,
    pub reinforcement: ReinforcementConfig,
    pub demand: DemandConfig,
}

impl DispatchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.into()))
        }

        if !self.area.is_valid() {
            return invalid("area bounds must be finite with min <= max");
        }
        if !(0.0..=1.0).contains(&self.background_check_failure_rate) {
            return invalid("background_check_failure_rate must be within [0, 1]");
        }
        if !self.matching.coverage_radius.is_finite() || self.matching.coverage_radius < 0.0 {
            return invalid("matching.coverage_radius must be a non-negative finite number");
        }
        if !self.movement.step_size.is_finite() || self.movement.step_size <= 0.0 {
            return invalid("movement.step_size must be a positive finite number");
        }
        if self.movement.tick_interval_ms == 0 {
            return invalid("movement.tick_interval_ms must be positive");
        }
        if !(0.0..=1.0).contains(&self.ledger.commission_rate) {
            return invalid("ledger.commission_rate must be within [0, 1]");
        }
        let pricing = &self.pricing;
        if !pricing.base_fare.is_finite()
            || !pricing.per_unit_rate.is_finite()
            || pricing.base_fare < 0.0
            || pricing.per_unit_rate < 0.0
        {
            return invalid("pricing rates must be non-negative finite numbers");
        }
        if self.reinforcement.check_interval_ms == 0 {
            return invalid("reinforcement.check_interval_ms must be positive");
        }
        if self.demand.enabled && (self.demand.interval_ms == 0 || self.demand.requester_pool == 0)
        {
            return invalid("demand.interval_ms and demand.requester_pool must be positive");
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_matching_policy(mut self, policy: MatchingPolicy) -> Self {
        self.matching.policy = policy;
        self
    }

    pub fn with_coverage_radius(mut self, radius: f64) -> Self {
        self.matching.coverage_radius = radius;
        self
    }

    pub fn with_queueing(mut self, enabled: bool) -> Self {
        self.matching.queue_when_unavailable = enabled;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.movement.step_size = step_size;
        self
    }

    pub fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.movement.tick_interval_ms = interval_ms;
        self
    }

    pub fn with_background_check_failure_rate(mut self, rate: f64) -> Self {
        self.background_check_failure_rate = rate;
        self
    }

    pub fn with_reinforcement(mut self, reinforcement: ReinforcementConfig) -> Self {
        self.reinforcement = reinforcement;
        self
    }

    pub fn with_demand(mut self, demand: DemandConfig) -> Self {
        self.demand = demand;
        self
    }
}
