//! Simulated clock: a minute counter advanced once per tick, independent of
//! the wall-clock tick rate.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub const MINUTES_PER_HOUR: u64 = 60;
pub const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;

/// Simulated minutes added by each tick.
pub const DEFAULT_MINUTES_PER_TICK: u64 = 20;

/// A point in simulated time, in minutes since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct SimTime(pub u64);

impl SimTime {
    pub fn minutes(self) -> u64 {
        self.0
    }

    pub fn day(self) -> u64 {
        self.0 / MINUTES_PER_DAY + 1
    }

    pub fn hour(self) -> u64 {
        (self.0 % MINUTES_PER_DAY) / MINUTES_PER_HOUR
    }

    pub fn minute(self) -> u64 {
        self.0 % MINUTES_PER_HOUR
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Day {} {:02}:{:02}", self.day(), self.hour(), self.minute())
    }
}

#[derive(Debug)]
pub struct SimulationClock {
    minutes: AtomicU64,
    minutes_per_tick: u64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_MINUTES_PER_TICK)
    }
}

impl SimulationClock {
    pub fn new(minutes_per_tick: u64) -> Self {
        Self {
            minutes: AtomicU64::new(0),
            minutes_per_tick,
        }
    }

    pub fn now(&self) -> SimTime {
        SimTime(self.minutes.load(Ordering::Acquire))
    }

    /// Advances by one tick and returns the new time.
    pub fn advance(&self) -> SimTime {
        let previous = self
            .minutes
            .fetch_add(self.minutes_per_tick, Ordering::AcqRel);
        SimTime(previous + self.minutes_per_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_twenty_minutes_per_tick() {
        let clock = SimulationClock::default();
        assert_eq!(clock.now(), SimTime(0));
        assert_eq!(clock.advance(), SimTime(20));
        assert_eq!(clock.advance(), SimTime(40));
        assert_eq!(clock.now().minutes(), 40);
    }

    #[test]
    fn sim_time_formats_as_day_and_wall_time() {
        assert_eq!(SimTime(0).to_string(), "Day 1 00:00");
        assert_eq!(SimTime(20 * 4).to_string(), "Day 1 01:20");
        assert_eq!(SimTime(MINUTES_PER_DAY + 59).to_string(), "Day 2 00:59");
    }
}
