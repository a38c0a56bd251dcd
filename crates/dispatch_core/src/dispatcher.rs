//! The dispatch context.
//!
//! A [`Dispatcher`] owns the fleet registry, the ledger, the simulated clock
//! and the runtime simulation settings. The process entry point creates one,
//! wraps it in an `Arc` and hands clones to the transport layer and to the
//! background tasks in [`crate::runner`]. There is no global state.
//!
//! Lock discipline: the registry lock and the ledger lock are never held at
//! the same time. Operations that touch both (trip completion, ticks,
//! snapshots) take them one after the other.

use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agents::{Requester, RequesterId, Worker, WorkerId};
use crate::clock::{SimTime, SimulationClock};
use crate::config::{ConfigError, DispatchConfig};
use crate::controller::{HoldReason, ReinforcementDecision, ReinforcementPolicy};
use crate::demand::{DemandGenerator, SyntheticRequest};
use crate::error::{DispatchError, DispatchResult};
use crate::ledger::{Ledger, Settlement};
use crate::matching::build_matching_algorithm;
use crate::movement::{self, MathFault, MoveOutcome};
use crate::registry::{FleetRegistry, FleetState, PendingMove, TripOutcome};
use crate::spatial::Point;
use crate::sync::lock_or_recover;
use crate::telemetry::{DispatchSnapshot, WorkerSnapshot};

/// Model name given to workers hired by the reinforcement controller.
pub const REINFORCEMENT_MODEL: &str = "Reinforcement";

/// Runtime-adjustable simulation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationSettings {
    /// When false the background tasks idle and the simulated clock stops.
    pub active: bool,
    pub tick_interval_ms: u64,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Simulated time after the tick.
    pub time: SimTime,
    pub in_transit: usize,
    pub settlements: Vec<Settlement>,
    pub faults: Vec<(WorkerId, MathFault)>,
    /// Workers that picked up a queued request right after being freed.
    pub dispatched_from_queue: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReinforcementOutcome {
    Hired(Worker),
    Held(HoldReason),
    /// The policy asked for a hire but registration failed.
    Rejected(DispatchError),
}

#[derive(Debug)]
pub struct Dispatcher {
    config: DispatchConfig,
    registry: FleetRegistry,
    ledger: Ledger,
    clock: SimulationClock,
    settings: Mutex<SimulationSettings>,
    reinforcement: Mutex<ReinforcementPolicy>,
    demand: Mutex<DemandGenerator>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let matcher = build_matching_algorithm(&config.matching);
        info!(
            matcher = matcher.name(),
            coverage_radius = config.matching.coverage_radius,
            step_size = config.movement.step_size,
            "dispatcher initialised"
        );
        let state = FleetState::new(matcher, config.area, config.seed)
            .with_queueing(config.matching.queue_when_unavailable)
            .with_background_check_failure_rate(config.background_check_failure_rate);
        // Offset so demand does not replay the placement sequence.
        let demand_seed = config.seed.map(|seed| seed.wrapping_add(1));

        Ok(Self {
            registry: FleetRegistry::new(state),
            ledger: Ledger::new(&config.ledger),
            clock: SimulationClock::new(config.movement.sim_minutes_per_tick),
            settings: Mutex::new(SimulationSettings {
                active: config.movement.start_active,
                tick_interval_ms: config.movement.tick_interval_ms,
            }),
            reinforcement: Mutex::new(ReinforcementPolicy::new(config.reinforcement)),
            demand: Mutex::new(DemandGenerator::new(&config.demand, config.area, demand_seed)),
            config,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &FleetRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    fn now(&self) -> u64 {
        self.clock.now().minutes()
    }

    pub fn register_worker(&self, model: &str, plate: &str) -> DispatchResult<Worker> {
        let now = self.now();
        self.registry
            .with_state(|state| state.register(model, plate, now))
    }

    pub fn remove_worker(&self, id: WorkerId) -> DispatchResult<Worker> {
        self.registry.with_state(|state| state.remove(id))
    }

    pub fn register_requester(&self, name: &str, payment_token: &str) -> Requester {
        self.registry
            .with_state(|state| state.register_requester(name, payment_token))
    }

    pub fn request_trip(
        &self,
        requester: RequesterId,
        origin: Point,
        destination: Point,
    ) -> DispatchResult<TripOutcome> {
        let now = self.now();
        self.registry
            .with_state(|state| state.request_trip(requester, origin, destination, now))
    }

    /// Finishes the worker's current trip and settles `cost` with the ledger.
    ///
    /// The worker is freed (and may immediately pick up a queued request)
    /// before the ledger is touched, so the fleet lock is never held during
    /// accounting.
    pub fn complete_trip(&self, worker: WorkerId, cost: f64) -> DispatchResult<Settlement> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(DispatchError::InvalidFare(cost));
        }
        let now = self.now();
        let released = self.registry.with_state(|state| state.release(worker, now))?;
        self.ledger.settle(worker, &released.trip, cost, now)
    }

    /// One worker with its earnings, if registered.
    pub fn worker(&self, id: WorkerId) -> Option<WorkerSnapshot> {
        let worker = self
            .registry
            .with_state(|state| state.worker(id).cloned())?;
        Some(WorkerSnapshot::new(&worker, self.ledger.earnings_of(id)))
    }

    pub fn requester(&self, id: RequesterId) -> Option<Requester> {
        self.registry
            .with_state(|state| state.requester(id).cloned())
    }

    pub fn settings(&self) -> SimulationSettings {
        *lock_or_recover(&self.settings, "simulation settings")
    }

    /// Toggles the simulation and/or changes the tick period. `None` leaves a
    /// setting unchanged. Returns the settings now in effect.
    pub fn configure_simulation(
        &self,
        active: Option<bool>,
        tick_interval_ms: Option<u64>,
    ) -> DispatchResult<SimulationSettings> {
        if tick_interval_ms == Some(0) {
            return Err(DispatchError::InvalidTickInterval(0));
        }
        let mut settings = lock_or_recover(&self.settings, "simulation settings");
        if let Some(active) = active {
            settings.active = active;
        }
        if let Some(interval) = tick_interval_ms {
            settings.tick_interval_ms = interval;
        }
        info!(
            active = settings.active,
            tick_interval_ms = settings.tick_interval_ms,
            "simulation configured"
        );
        Ok(*settings)
    }

    /// Advances every busy worker by one step, settles arrivals and moves the
    /// simulated clock forward.
    ///
    /// Movement is computed between two short registry critical sections.
    /// A trip can be completed and the worker re-dispatched in between; each
    /// outcome carries its trip sequence and is dropped if the worker has
    /// moved on to another trip.
    pub fn tick(&self) -> TickReport {
        let step_size = self.config.movement.step_size;
        let pending = self.registry.with_state(|state| state.pending_moves());
        let outcomes: Vec<(PendingMove, MoveOutcome)> = pending
            .into_iter()
            .map(|m| (m, movement::advance(m.position, m.destination, step_size)))
            .collect();

        let now = self.now();
        let effects = self
            .registry
            .with_state(|state| state.apply_moves(&outcomes, now));

        let mut settlements = Vec::with_capacity(effects.arrivals.len());
        for arrival in &effects.arrivals {
            let fare = self.config.pricing.fare_for(arrival.trip.length());
            match self.ledger.settle(arrival.worker, &arrival.trip, fare, now) {
                Ok(settlement) => settlements.push(settlement),
                Err(err) => warn!(worker = %arrival.worker, %err, "trip could not be settled"),
            }
        }

        let dispatched_from_queue = effects
            .arrivals
            .iter()
            .chain(effects.faults.iter().map(|(released, _)| released))
            .filter(|released| released.next_requester.is_some())
            .count();
        let faults = effects
            .faults
            .iter()
            .map(|(released, fault)| (released.worker, *fault))
            .collect();

        let time = self.clock.advance();
        debug!(
            %time,
            in_transit = effects.in_transit,
            arrivals = settlements.len(),
            dispatched_from_queue,
            "tick complete"
        );

        TickReport {
            time,
            in_transit: effects.in_transit,
            settlements,
            faults,
            dispatched_from_queue,
        }
    }

    /// Runs the reinforcement policy once. Queue depth, fleet size and the
    /// hire itself are handled in a single registry critical section.
    pub fn reinforce(&self, now: Instant) -> ReinforcementOutcome {
        let mut policy = lock_or_recover(&self.reinforcement, "reinforcement policy");
        let sim_now = self.now();
        self.registry.with_state(|state| {
            match policy.evaluate(state.queue_depth(), state.fleet_size(), now) {
                ReinforcementDecision::Hold(reason) => ReinforcementOutcome::Held(reason),
                ReinforcementDecision::Hire => {
                    let plate = format!("RF-{:03}", policy.hires() + 1);
                    match state.register(REINFORCEMENT_MODEL, &plate, sim_now) {
                        Ok(worker) => {
                            let hire = policy.record_hire(now);
                            info!(
                                worker = %worker.id,
                                hire,
                                queue_depth = state.queue_depth(),
                                fleet_size = state.fleet_size(),
                                "reinforcement hired"
                            );
                            ReinforcementOutcome::Hired(worker)
                        }
                        Err(err) => ReinforcementOutcome::Rejected(err),
                    }
                }
            }
        })
    }

    /// Generates one random trip request and submits it.
    pub fn submit_synthetic_request(&self) -> (SyntheticRequest, DispatchResult<TripOutcome>) {
        let request = lock_or_recover(&self.demand, "demand generator").next_request();
        let outcome = self.request_trip(request.requester, request.origin, request.destination);
        (request, outcome)
    }

    /// Point-in-time view for reporting.
    ///
    /// The fleet part is consistent on its own (one registry critical
    /// section); ledger totals are read right after and may already include a
    /// trip settled in between.
    pub fn snapshot(&self) -> DispatchSnapshot {
        let (workers, requesters, counts) = self.registry.with_state(|state| {
            (
                state.workers().to_vec(),
                state.requesters().cloned().collect::<Vec<_>>(),
                state.counts(),
            )
        });
        let accounts = self.ledger.accounts();
        let ledger = self.ledger.totals();
        let clock = self.clock.now();

        DispatchSnapshot {
            clock,
            clock_label: clock.to_string(),
            settings: self.settings(),
            counts,
            workers: workers
                .iter()
                .map(|w| WorkerSnapshot::new(w, accounts.get(&w.id).copied().unwrap_or(0.0)))
                .collect(),
            requesters,
            queue_depth: counts.queue_depth,
            ledger,
        }
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn register_worker_at(
        &self,
        model: &str,
        plate: &str,
        position: Point,
        rating: f64,
    ) -> Worker {
        let now = self.now();
        self.registry
            .with_state(|state| state.register_at(model, plate, position, rating, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::WorkerState;
    use crate::config::ReinforcementConfig;
    use std::time::Duration;

    fn dispatcher(config: DispatchConfig) -> Dispatcher {
        Dispatcher::new(config.with_seed(7)).expect("valid config")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Dispatcher::new(DispatchConfig::default().with_step_size(-1.0)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn tick_moves_busy_workers_and_advances_clock() {
        let dispatcher = dispatcher(DispatchConfig::default().with_step_size(2.0));
        let worker = dispatcher.register_worker_at("M", "A", Point::new(0.0, 0.0), 4.0);
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(10.0, 0.0))
            .expect("request");

        let report = dispatcher.tick();
        assert_eq!(report.time, SimTime(20));
        assert_eq!(report.in_transit, 1);
        assert!(report.settlements.is_empty());
        let position = dispatcher.worker(worker.id).expect("worker").position;
        assert!((position.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn arrival_is_priced_and_settled() {
        let dispatcher = dispatcher(DispatchConfig::default().with_step_size(100.0));
        let worker = dispatcher.register_worker_at("M", "A", Point::new(0.0, 0.0), 4.0);
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(10.0, 0.0))
            .expect("request");

        let report = dispatcher.tick();
        assert_eq!(report.settlements.len(), 1);
        let expected_fare = dispatcher.config().pricing.fare_for(10.0);
        assert!((report.settlements[0].fare - expected_fare).abs() < 1e-9);

        let snapshot = dispatcher.worker(worker.id).expect("worker");
        assert_eq!(snapshot.state, WorkerState::Free);
        assert_eq!(snapshot.position, Point::new(10.0, 0.0));
        assert!((snapshot.earnings - expected_fare * 0.8).abs() < 1e-9);
        assert_eq!(dispatcher.requester(1).map(|r| r.completed_trips), Some(1));
    }

    #[test]
    fn faulted_worker_is_reset_and_others_keep_moving() {
        let dispatcher = dispatcher(DispatchConfig::default().with_step_size(1.0));
        let healthy = dispatcher.register_worker_at("M", "OK", Point::new(0.0, 0.0), 4.0);
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(0.0, 10.0))
            .expect("request");
        // Both endpoints are finite but the distance between them overflows.
        dispatcher
            .request_trip(2, Point::new(-f64::MAX, 50.0), Point::new(f64::MAX, 50.0))
            .expect("request");
        let broken = dispatcher.register_worker_at("M", "HUGE", Point::new(50.0, 50.0), 4.0);
        assert_eq!(broken.assigned_requester(), Some(2));

        let report = dispatcher.tick();
        assert_eq!(
            report.faults,
            vec![(broken.id, MathFault::NonFiniteCoordinates)]
        );
        assert_eq!(report.in_transit, 1);

        let broken = dispatcher.worker(broken.id).expect("worker");
        assert_eq!(broken.state, WorkerState::Free);
        assert_eq!(broken.destination, None);
        assert!(broken.position.is_finite());
        let healthy = dispatcher.worker(healthy.id).expect("worker");
        assert_eq!(healthy.state, WorkerState::Busy);
        assert!((healthy.position.y - 1.0).abs() < 1e-12);

        // The faulted requester may ask again.
        assert!(dispatcher
            .request_trip(2, Point::new(50.0, 50.0), Point::new(55.0, 50.0))
            .is_ok());
    }

    #[test]
    fn trip_completed_mid_tick_keeps_the_next_assignment() {
        let dispatcher = dispatcher(DispatchConfig::default().with_step_size(100.0));
        let worker = dispatcher.register_worker_at("M", "A", Point::new(0.0, 0.0), 4.0);
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(10.0, 0.0))
            .expect("request");
        dispatcher
            .request_trip(2, Point::new(80.0, 80.0), Point::new(90.0, 80.0))
            .expect("request");

        // Same two critical sections as `tick`, with a manual completion in
        // the gap that hands the worker requester 2.
        let pending = dispatcher.registry().with_state(|state| state.pending_moves());
        let outcomes: Vec<(PendingMove, MoveOutcome)> = pending
            .into_iter()
            .map(|m| (m, movement::advance(m.position, m.destination, 100.0)))
            .collect();
        dispatcher.complete_trip(worker.id, 50.0).expect("complete");
        let effects = dispatcher
            .registry()
            .with_state(|state| state.apply_moves(&outcomes, 20));

        assert!(effects.arrivals.is_empty());
        let snapshot = dispatcher.worker(worker.id).expect("worker");
        assert_eq!(snapshot.state, WorkerState::Busy);
        assert_eq!(snapshot.assigned_requester, Some(2));
        assert_eq!(snapshot.position, Point::new(80.0, 80.0));
        assert_eq!(dispatcher.requester(2).map(|r| r.completed_trips), Some(0));
        assert_eq!(dispatcher.ledger().totals().total_trips, 1);
    }

    #[test]
    fn complete_trip_rejects_bad_fares_before_touching_the_fleet() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let worker = dispatcher.register_worker_at("M", "A", Point::new(0.0, 0.0), 4.0);
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(1.0, 0.0))
            .expect("request");

        assert_eq!(
            dispatcher.complete_trip(worker.id, -5.0),
            Err(DispatchError::InvalidFare(-5.0))
        );
        assert_eq!(
            dispatcher.worker(worker.id).map(|w| w.state),
            Some(WorkerState::Busy)
        );
        assert_eq!(
            dispatcher.complete_trip(WorkerId(99), 5.0),
            Err(DispatchError::NotFound(WorkerId(99)))
        );
    }

    #[test]
    fn configure_simulation_updates_only_given_fields() {
        let dispatcher = dispatcher(DispatchConfig::default().with_tick_interval_ms(500));
        let settings = dispatcher
            .configure_simulation(Some(false), None)
            .expect("configure");
        assert!(!settings.active);
        assert_eq!(settings.tick_interval_ms, 500);

        let settings = dispatcher
            .configure_simulation(None, Some(250))
            .expect("configure");
        assert!(!settings.active);
        assert_eq!(settings.tick_interval_ms, 250);

        assert_eq!(
            dispatcher.configure_simulation(Some(true), Some(0)),
            Err(DispatchError::InvalidTickInterval(0))
        );
        assert!(!dispatcher.settings().active);
    }

    #[test]
    fn reinforcement_hires_once_per_cooldown_and_drains_queue() {
        let config = DispatchConfig::default().with_reinforcement(ReinforcementConfig {
            cooldown_ms: 1_000,
            ..ReinforcementConfig::default()
        });
        let dispatcher = dispatcher(config);
        for requester in 1..=6 {
            dispatcher
                .request_trip(requester, Point::new(1.0, 1.0), Point::new(2.0, 2.0))
                .expect("request");
        }

        let start = Instant::now();
        let ReinforcementOutcome::Hired(worker) = dispatcher.reinforce(start) else {
            panic!("expected a hire");
        };
        assert_eq!(worker.model, REINFORCEMENT_MODEL);
        assert_eq!(worker.plate, "RF-001");
        assert_eq!(worker.assigned_requester(), Some(1));

        // Queue is at 5, still at threshold, but the cooldown holds.
        assert_eq!(
            dispatcher.reinforce(start + Duration::from_millis(10)),
            ReinforcementOutcome::Held(HoldReason::CoolingDown)
        );
        assert!(matches!(
            dispatcher.reinforce(start + Duration::from_millis(1_000)),
            ReinforcementOutcome::Hired(_)
        ));
        // Queue now at 4: below threshold.
        assert_eq!(
            dispatcher.reinforce(start + Duration::from_millis(5_000)),
            ReinforcementOutcome::Held(HoldReason::QueueBelowThreshold)
        );
    }

    #[test]
    fn snapshot_reports_fleet_queue_ledger_and_clock() {
        let dispatcher = dispatcher(DispatchConfig::default());
        let worker = dispatcher.register_worker_at("M", "A", Point::new(0.0, 0.0), 4.0);
        dispatcher.register_requester("Ana", "tok_visa");
        dispatcher
            .request_trip(1, Point::new(0.0, 0.0), Point::new(3.0, 4.0))
            .expect("request");
        dispatcher
            .request_trip(2, Point::new(90.0, 90.0), Point::new(3.0, 4.0))
            .expect("request");
        dispatcher.complete_trip(worker.id, 50.0).expect("complete");
        dispatcher.tick();

        let snapshot = dispatcher.snapshot();
        assert_eq!(snapshot.clock, SimTime(20));
        assert_eq!(snapshot.clock_label, "Day 1 00:20");
        assert_eq!(snapshot.workers.len(), 1);
        assert!((snapshot.workers[0].earnings - 40.0).abs() < 1e-9);
        // The freed worker picked up requester 2 from the queue.
        assert_eq!(snapshot.workers[0].assigned_requester, Some(2));
        assert_eq!(snapshot.queue_depth, 0);
        assert_eq!(snapshot.requesters.len(), 2);
        assert_eq!(snapshot.requesters[0].name, "Ana");
        assert!((snapshot.ledger.company_earnings - 10.0).abs() < 1e-9);
        assert_eq!(snapshot.ledger.total_trips, 1);
    }
}
