//! Run a small fleet through a burst of requests and print completed trips.
//!
//! Run with: cargo run -p dispatch_core --example scenario_run

use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::spatial::Point;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const NUM_WORKERS: usize = 6;
    const NUM_REQUESTERS: i64 = 25;
    const MAX_TICKS: usize = 500;

    let dispatcher = Dispatcher::new(DispatchConfig::default().with_seed(123).with_step_size(4.0))?;
    for i in 0..NUM_WORKERS {
        dispatcher.register_worker("Corolla", &format!("EX-{i:03}"))?;
    }
    for requester in 1..=NUM_REQUESTERS {
        let origin = Point::new((requester * 7 % 100) as f64, (requester * 13 % 100) as f64);
        let destination = Point::new((requester * 29 % 100) as f64, (requester * 3 % 100) as f64);
        dispatcher.request_trip(requester, origin, destination)?;
    }

    let mut ticks = 0;
    while ticks < MAX_TICKS {
        let snapshot = dispatcher.snapshot();
        if snapshot.counts.workers_busy == 0 {
            break;
        }
        dispatcher.tick();
        ticks += 1;
    }

    let snapshot = dispatcher.snapshot();
    println!(
        "--- Scenario run ({} workers, {} requesters, seed 123) ---",
        NUM_WORKERS, NUM_REQUESTERS
    );
    println!("Ticks executed: {ticks}");
    println!("Simulated time: {}", snapshot.clock_label);
    println!("Still queued: {}", snapshot.queue_depth);
    println!(
        "Company earnings: {:.2}  worker payouts: {:.2}  trips: {}",
        snapshot.ledger.company_earnings, snapshot.ledger.worker_payouts, snapshot.ledger.total_trips
    );

    println!("\nCompleted trips:");
    for trip in dispatcher.ledger().completed_trips() {
        println!(
            "  #{:<3} worker={} requester={:<3} {} -> {}  fare={:.2}  duration={} min",
            trip.trip_number,
            trip.worker,
            trip.requester,
            trip.origin,
            trip.destination,
            trip.fare,
            trip.trip_duration(),
        );
    }
    println!("\nWorkers:");
    for worker in &snapshot.workers {
        println!(
            "  {} {} rating={:.2} earnings={:.2} at {}",
            worker.id, worker.plate, worker.rating, worker.earnings, worker.position
        );
    }
    Ok(())
}
