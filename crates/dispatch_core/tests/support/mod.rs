#![allow(dead_code)]

use dispatch_core::agents::WorkerState;
use dispatch_core::dispatcher::{Dispatcher, TickReport};

/// Ticks until no worker is busy, returning every report. Panics after
/// `max_ticks`.
pub fn tick_until_idle(dispatcher: &Dispatcher, max_ticks: usize) -> Vec<TickReport> {
    let mut reports = Vec::new();
    for _ in 0..max_ticks {
        if dispatcher.snapshot().counts.workers_busy == 0 {
            return reports;
        }
        reports.push(dispatcher.tick());
    }
    panic!("fleet still busy after {max_ticks} ticks");
}

/// Checks the structural invariants on a consistent snapshot.
pub fn assert_fleet_invariants(dispatcher: &Dispatcher) {
    let snapshot = dispatcher.snapshot();
    let mut assigned = Vec::new();
    for worker in &snapshot.workers {
        let busy = worker.state == WorkerState::Busy;
        assert_eq!(
            busy,
            worker.destination.is_some(),
            "worker {} busy/destination mismatch",
            worker.id
        );
        assert_eq!(busy, worker.assigned_requester.is_some());
        if let Some(requester) = worker.assigned_requester {
            assigned.push(requester);
        }
    }
    let before = assigned.len();
    assigned.sort_unstable();
    assigned.dedup();
    assert_eq!(before, assigned.len(), "requester assigned to two workers");
    assert_eq!(
        snapshot.counts.requesters_in_flight,
        snapshot.counts.workers_busy + snapshot.queue_depth
    );

    let ledger = snapshot.ledger;
    let earned: f64 = snapshot.workers.iter().map(|w| w.earnings).sum();
    assert!(earned <= ledger.worker_payouts + 1e-6);
    assert!(ledger.company_earnings >= 0.0);
}
