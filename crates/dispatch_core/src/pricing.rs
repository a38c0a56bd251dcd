//! Fare pricing for completed trips.

use serde::{Deserialize, Serialize};

/// Base fare in currency units.
pub const BASE_FARE: f64 = 2.50;

/// Rate per distance unit travelled from pickup to dropoff.
pub const PER_UNIT_RATE: f64 = 1.50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_unit_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: BASE_FARE,
            per_unit_rate: PER_UNIT_RATE,
        }
    }
}

impl PricingConfig {
    /// `fare = base_fare + trip_length * per_unit_rate`
    pub fn fare_for(&self, trip_length: f64) -> f64 {
        self.base_fare + trip_length.max(0.0) * self.per_unit_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fare_includes_base_and_distance() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.fare_for(0.0), BASE_FARE);
        assert!((pricing.fare_for(10.0) - (BASE_FARE + 15.0)).abs() < 1e-12);
    }

    #[test]
    fn custom_rates_apply() {
        let pricing = PricingConfig {
            base_fare: 0.0,
            per_unit_rate: 5.0,
        };
        assert_eq!(pricing.fare_for(10.0), 50.0);
    }
}
