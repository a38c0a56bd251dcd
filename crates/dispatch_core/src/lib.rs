pub mod agents;
pub mod clock;
pub mod config;
pub mod controller;
pub mod demand;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod movement;
pub mod pricing;
pub mod registry;
pub mod runner;
pub mod spatial;
mod sync;
pub mod telemetry;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
