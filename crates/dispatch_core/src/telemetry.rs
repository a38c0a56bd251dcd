//! Reporting types: completed-trip records and point-in-time snapshots.

use serde::Serialize;

use crate::agents::{Requester, RequesterId, Worker, WorkerId, WorkerState};
use crate::clock::SimTime;
use crate::dispatcher::SimulationSettings;
use crate::spatial::Point;

/// One settled trip, recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTripRecord {
    pub trip_number: u64,
    pub worker: WorkerId,
    pub requester: RequesterId,
    pub origin: Point,
    pub destination: Point,
    pub fare: f64,
    pub payout: f64,
    pub commission: f64,
    pub matched_at: u64,
    pub completed_at: u64,
}

impl CompletedTripRecord {
    /// Simulated minutes from dispatch to settlement.
    pub fn trip_duration(&self) -> u64 {
        self.completed_at.saturating_sub(self.matched_at)
    }
}

/// Worker as reported to callers, with earnings joined from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub model: String,
    pub plate: String,
    pub position: Point,
    pub state: WorkerState,
    pub rating: f64,
    pub earnings: f64,
    pub destination: Option<Point>,
    pub assigned_requester: Option<RequesterId>,
}

impl WorkerSnapshot {
    pub fn new(worker: &Worker, earnings: f64) -> Self {
        Self {
            id: worker.id,
            model: worker.model.clone(),
            plate: worker.plate.clone(),
            position: worker.position,
            state: worker.state(),
            rating: worker.rating,
            earnings,
            destination: worker.destination(),
            assigned_requester: worker.assigned_requester(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerTotals {
    pub company_earnings: f64,
    pub worker_payouts: f64,
    pub total_trips: u64,
}

/// Fleet-wide counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub workers_free: usize,
    pub workers_busy: usize,
    pub requesters_in_flight: usize,
    pub queue_depth: usize,
}

impl FleetCounts {
    pub fn add_worker(&mut self, state: WorkerState) {
        match state {
            WorkerState::Free => self.workers_free += 1,
            WorkerState::Busy => self.workers_busy += 1,
        }
    }

    pub fn fleet_size(&self) -> usize {
        self.workers_free + self.workers_busy
    }
}

/// Everything the transport layer needs to render the system state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSnapshot {
    pub clock: SimTime,
    pub clock_label: String,
    pub settings: SimulationSettings,
    pub counts: FleetCounts,
    pub workers: Vec<WorkerSnapshot>,
    pub requesters: Vec<Requester>,
    pub queue_depth: usize,
    pub ledger: LedgerTotals,
}
