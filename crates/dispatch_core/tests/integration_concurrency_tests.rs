mod support;

use std::collections::HashSet;
use std::sync::Mutex;

use dispatch_core::agents::WorkerId;
use dispatch_core::config::MatchingPolicy;
use dispatch_core::registry::TripOutcome;
use dispatch_core::spatial::Point;
use dispatch_core::test_helpers::{dispatcher_with, place_worker, test_config, test_dispatcher};

use support::{assert_fleet_invariants, tick_until_idle};

#[test]
fn one_free_worker_is_claimed_at_most_once() {
    for _ in 0..20 {
        let dispatcher = test_dispatcher();
        let worker = place_worker(&dispatcher, "ONLY", 0.0, 0.0, 4.0);
        let assigned = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for requester in 1..=16i64 {
                let dispatcher = &dispatcher;
                let assigned = &assigned;
                scope.spawn(move || {
                    let outcome = dispatcher
                        .request_trip(requester, Point::new(1.0, 1.0), Point::new(9.0, 9.0))
                        .expect("request");
                    if let TripOutcome::Assigned(w) = outcome {
                        assigned.lock().expect("lock").push(w.id);
                    }
                });
            }
        });

        let assigned = assigned.into_inner().expect("lock");
        assert_eq!(assigned, vec![worker.id]);
        assert_eq!(dispatcher.snapshot().queue_depth, 15);
        assert_fleet_invariants(&dispatcher);
    }
}

#[test]
fn requests_ticks_and_completions_interleave_safely() {
    // Global matching keeps the queue empty whenever a worker is free.
    let dispatcher = dispatcher_with(
        test_config()
            .with_step_size(3.0)
            .with_matching_policy(MatchingPolicy::GlobalNearest),
    );
    for i in 0..8 {
        place_worker(&dispatcher, &format!("W-{i}"), i as f64 * 10.0, 50.0, 4.0);
    }

    std::thread::scope(|scope| {
        for thread in 0..4i64 {
            let dispatcher = &dispatcher;
            scope.spawn(move || {
                for round in 0..25i64 {
                    let requester = thread * 100 + round + 1;
                    let origin = Point::new((round * 4 % 100) as f64, (thread * 20) as f64);
                    let destination = Point::new(50.0, 50.0);
                    let _ = dispatcher.request_trip(requester, origin, destination);
                }
            });
        }
        {
            let dispatcher = &dispatcher;
            scope.spawn(move || {
                for _ in 0..60 {
                    dispatcher.tick();
                }
            });
        }
        {
            let dispatcher = &dispatcher;
            scope.spawn(move || {
                for round in 0..200u64 {
                    let id = WorkerId(round % 8 + 1);
                    let _ = dispatcher.complete_trip(id, 12.0);
                    let _ = dispatcher.snapshot();
                }
            });
        }
    });

    assert_fleet_invariants(&dispatcher);
    tick_until_idle(&dispatcher, 10_000);
    let snapshot = dispatcher.snapshot();
    assert_eq!(snapshot.queue_depth, 0);
    assert_eq!(snapshot.counts.requesters_in_flight, 0);

    let totals = dispatcher.ledger().totals();
    let fares: f64 = dispatcher
        .ledger()
        .completed_trips()
        .iter()
        .map(|t| t.fare)
        .sum();
    assert!((totals.company_earnings + totals.worker_payouts - fares).abs() < 1e-6);
    assert!((totals.company_earnings - 0.2 * fares).abs() < 1e-6);
    let earned: f64 = snapshot.workers.iter().map(|w| w.earnings).sum();
    assert!((earned - totals.worker_payouts).abs() < 1e-6);
}

#[test]
fn concurrent_registrations_get_unique_ids() {
    let dispatcher = test_dispatcher();
    let ids = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for thread in 0..8 {
            let dispatcher = &dispatcher;
            let ids = &ids;
            scope.spawn(move || {
                for i in 0..10 {
                    let worker = dispatcher
                        .register_worker("M", &format!("T{thread}-{i}"))
                        .expect("register");
                    ids.lock().expect("lock").push(worker.id);
                }
            });
        }
    });
    let ids = ids.into_inner().expect("lock");
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 80);
    assert_eq!(dispatcher.snapshot().counts.fleet_size(), 80);
}

#[test]
fn every_requester_is_assigned_to_at_most_one_worker() {
    let dispatcher = test_dispatcher();
    for i in 0..10 {
        place_worker(&dispatcher, &format!("W-{i}"), 50.0, 50.0, 4.0);
    }
    std::thread::scope(|scope| {
        for _ in 0..6 {
            let dispatcher = &dispatcher;
            scope.spawn(move || {
                for requester in 1..=10i64 {
                    let _ = dispatcher.request_trip(
                        requester,
                        Point::new(50.0, 50.0),
                        Point::new(60.0, 60.0),
                    );
                }
            });
        }
    });
    let snapshot = dispatcher.snapshot();
    assert_eq!(snapshot.counts.workers_busy, 10);
    assert_eq!(snapshot.queue_depth, 0);
    assert_fleet_invariants(&dispatcher);
}
