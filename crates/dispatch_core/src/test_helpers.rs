//! Test helpers shared by unit tests, integration tests and benches.

use std::sync::Arc;

use crate::agents::Worker;
use crate::config::{DispatchConfig, ReinforcementConfig};
use crate::dispatcher::Dispatcher;
use crate::spatial::Point;

/// Seed used by every helper-built dispatcher.
pub const TEST_SEED: u64 = 42;

/// Deterministic config with the reinforcement controller switched off, so
/// tests control fleet size themselves.
pub fn test_config() -> DispatchConfig {
    DispatchConfig::default()
        .with_seed(TEST_SEED)
        .with_reinforcement(ReinforcementConfig {
            enabled: false,
            ..ReinforcementConfig::default()
        })
}

/// Builds a dispatcher from `config`.
///
/// # Panics
///
/// Panics if the config does not validate.
pub fn dispatcher_with(config: DispatchConfig) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(config).expect("test config should validate"))
}

pub fn test_dispatcher() -> Arc<Dispatcher> {
    dispatcher_with(test_config())
}

/// Registers a worker at a fixed position with a fixed rating.
pub fn place_worker(dispatcher: &Dispatcher, plate: &str, x: f64, y: f64, rating: f64) -> Worker {
    dispatcher.register_worker_at("Test", plate, Point::new(x, y), rating)
}
