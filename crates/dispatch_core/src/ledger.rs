//! Trip-completion accounting.
//!
//! The ledger has its own lock, separate from the fleet registry, so settling a
//! fare never waits behind matching. It owns every monetary value in the
//! system: company earnings, per-worker payout accounts and the completed-trip
//! log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::info;

use crate::agents::{ActiveTrip, WorkerId};
use crate::config::LedgerConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::sync::lock_or_recover;
use crate::telemetry::{CompletedTripRecord, LedgerTotals};

/// Result of settling one trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settlement {
    pub worker: WorkerId,
    pub fare: f64,
    pub payout: f64,
    pub commission: f64,
    /// Sequence number of this trip among all completed trips.
    pub trip_number: u64,
    /// Whether this trip was selected for a quality audit.
    pub audited: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    company_earnings: f64,
    total_trips: u64,
    accounts: HashMap<WorkerId, f64>,
    trip_log: VecDeque<CompletedTripRecord>,
}

#[derive(Debug)]
pub struct Ledger {
    commission_rate: f64,
    audit_every: u64,
    trip_log_capacity: usize,
    state: Mutex<LedgerState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            commission_rate: config.commission_rate,
            audit_every: config.audit_every,
            trip_log_capacity: config.trip_log_capacity,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        lock_or_recover(&self.state, "ledger")
    }

    /// Splits `fare` between the worker and the company and records the trip.
    pub fn settle(
        &self,
        worker: WorkerId,
        trip: &ActiveTrip,
        fare: f64,
        completed_at: u64,
    ) -> DispatchResult<Settlement> {
        if !fare.is_finite() || fare < 0.0 {
            return Err(DispatchError::InvalidFare(fare));
        }
        let commission = fare * self.commission_rate;
        let payout = fare - commission;

        let mut state = self.lock();
        state.company_earnings += commission;
        state.total_trips += 1;
        *state.accounts.entry(worker).or_insert(0.0) += payout;
        let trip_number = state.total_trips;

        if self.trip_log_capacity > 0 {
            if state.trip_log.len() == self.trip_log_capacity {
                state.trip_log.pop_front();
            }
            state.trip_log.push_back(CompletedTripRecord {
                trip_number,
                worker,
                requester: trip.requester,
                origin: trip.origin,
                destination: trip.destination,
                fare,
                payout,
                commission,
                matched_at: trip.matched_at,
                completed_at,
            });
        }
        drop(state);

        let audited = self.audit_every > 0 && trip_number % self.audit_every == 0;
        if audited {
            info!(
                worker = %worker,
                trip_number,
                fare,
                "quality audit: reviewing completed trip"
            );
        }

        Ok(Settlement {
            worker,
            fare,
            payout,
            commission,
            trip_number,
            audited,
        })
    }

    /// Cumulative payout for one worker; zero if it never completed a trip.
    pub fn earnings_of(&self, worker: WorkerId) -> f64 {
        self.lock().accounts.get(&worker).copied().unwrap_or(0.0)
    }

    pub fn accounts(&self) -> HashMap<WorkerId, f64> {
        self.lock().accounts.clone()
    }

    pub fn totals(&self) -> LedgerTotals {
        let state = self.lock();
        LedgerTotals {
            company_earnings: state.company_earnings,
            worker_payouts: state.accounts.values().sum(),
            total_trips: state.total_trips,
        }
    }

    /// Most recent completed trips, oldest first.
    pub fn completed_trips(&self) -> Vec<CompletedTripRecord> {
        self.lock().trip_log.iter().cloned().collect()
    }
}
