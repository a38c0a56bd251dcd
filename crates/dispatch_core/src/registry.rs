//! Fleet registry: workers, the waiting queue, requesters and the in-flight
//! set, all behind one mutex.
//!
//! [`FleetState`] holds the data and implements every composite operation
//! (register + drain, match + claim, release + drain) as a plain `&mut self`
//! method. [`FleetRegistry`] owns the mutex and runs closures against the
//! state, so each public operation is exactly one lock acquisition and no
//! code path ever needs to re-acquire the lock it already holds.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::agents::{ActiveTrip, Requester, RequesterId, TripRequest, Worker, WorkerId};
use crate::error::{DispatchError, DispatchResult};
use crate::matching::{MatchCandidate, MatchingAlgorithm};
use crate::movement::{MathFault, MoveOutcome};
use crate::spatial::{Bounds, Point};
use crate::sync::lock_or_recover;
use crate::telemetry::FleetCounts;

pub const MIN_RATING: f64 = 3.5;
pub const MAX_RATING: f64 = 5.0;

/// Outcome of a successful trip request.
#[derive(Debug, Clone, PartialEq)]
pub enum TripOutcome {
    /// A worker was claimed; this is its state right after dispatch.
    Assigned(Worker),
    /// No eligible worker; the request waits at this 1-based queue position.
    Queued { position: usize },
}

/// A busy worker's movement input, captured under the lock so the movement
/// engine can run without it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMove {
    pub worker: WorkerId,
    /// Sequence of the trip being driven; see [`ActiveTrip::sequence`].
    pub trip: u64,
    pub position: Point,
    pub destination: Point,
}

/// A worker that finished (or was forced off) its trip and went back to Free.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasedTrip {
    pub worker: WorkerId,
    pub trip: ActiveTrip,
    /// Requester picked up from the waiting queue right after the release.
    pub next_requester: Option<RequesterId>,
}

/// What writing one tick's movement results back produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementEffects {
    pub in_transit: usize,
    pub arrivals: Vec<ReleasedTrip>,
    pub faults: Vec<(ReleasedTrip, MathFault)>,
}

#[derive(Debug)]
pub struct FleetState {
    workers: Vec<Worker>,
    next_worker_id: u64,
    next_trip_sequence: u64,
    queue: VecDeque<TripRequest>,
    in_flight: HashSet<RequesterId>,
    requesters: BTreeMap<RequesterId, Requester>,
    rng: StdRng,
    area: Bounds,
    matcher: Box<dyn MatchingAlgorithm>,
    queue_when_unavailable: bool,
    background_check_failure_rate: f64,
}

impl FleetState {
    pub fn new(matcher: Box<dyn MatchingAlgorithm>, area: Bounds, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            workers: Vec::new(),
            next_worker_id: 1,
            next_trip_sequence: 1,
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            requesters: BTreeMap::new(),
            rng,
            area,
            matcher,
            queue_when_unavailable: true,
            background_check_failure_rate: 0.0,
        }
    }

    pub fn with_queueing(mut self, enabled: bool) -> Self {
        self.queue_when_unavailable = enabled;
        self
    }

    pub fn with_background_check_failure_rate(mut self, rate: f64) -> Self {
        self.background_check_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    fn index_of(&self, id: WorkerId) -> DispatchResult<usize> {
        self.workers
            .iter()
            .position(|w| w.id == id)
            .ok_or(DispatchError::NotFound(id))
    }

    pub fn fleet_size(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_requests(&self) -> impl Iterator<Item = &TripRequest> {
        self.queue.iter()
    }

    pub fn is_in_flight(&self, requester: RequesterId) -> bool {
        self.in_flight.contains(&requester)
    }

    pub fn requesters(&self) -> impl Iterator<Item = &Requester> {
        self.requesters.values()
    }

    pub fn requester(&self, id: RequesterId) -> Option<&Requester> {
        self.requesters.get(&id)
    }

    pub fn counts(&self) -> FleetCounts {
        let mut counts = FleetCounts {
            requesters_in_flight: self.in_flight.len(),
            queue_depth: self.queue.len(),
            ..FleetCounts::default()
        };
        for worker in &self.workers {
            counts.add_worker(worker.state());
        }
        counts
    }

    /// Hires a worker at a random position with a random rating, then lets it
    /// take the oldest queued request.
    pub fn register(&mut self, model: &str, plate: &str, now: u64) -> DispatchResult<Worker> {
        if self.background_check_failure_rate > 0.0
            && self.rng.gen_bool(self.background_check_failure_rate)
        {
            info!(plate, "registration rejected by background check");
            return Err(DispatchError::BackgroundCheckFailed {
                plate: plate.to_string(),
            });
        }
        let position = self.area.sample(&mut self.rng);
        let rating = round_rating(self.rng.gen_range(MIN_RATING..=MAX_RATING));
        Ok(self.insert_worker(model, plate, position, rating, now))
    }

    /// Same as [`FleetState::register`] with a fixed position and rating and
    /// no background check.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn register_at(
        &mut self,
        model: &str,
        plate: &str,
        position: Point,
        rating: f64,
        now: u64,
    ) -> Worker {
        self.insert_worker(model, plate, position, rating, now)
    }

    fn insert_worker(
        &mut self,
        model: &str,
        plate: &str,
        position: Point,
        rating: f64,
        now: u64,
    ) -> Worker {
        let id = WorkerId(self.next_worker_id);
        self.next_worker_id += 1;
        self.workers
            .push(Worker::new(id, model, plate, position, rating));
        info!(worker = %id, model, plate, %position, rating, "worker registered");

        let index = self.workers.len() - 1;
        self.drain_queue_into(index, now);
        self.workers[index].clone()
    }

    /// Removes a free worker.
    pub fn remove(&mut self, id: WorkerId) -> DispatchResult<Worker> {
        let index = self.index_of(id)?;
        if !self.workers[index].is_free() {
            return Err(DispatchError::Busy(id));
        }
        let worker = self.workers.remove(index);
        info!(worker = %id, plate = %worker.plate, "worker removed");
        Ok(worker)
    }

    pub fn register_requester(&mut self, name: &str, payment_token: &str) -> Requester {
        let id = self.requesters.keys().next_back().copied().unwrap_or(0) + 1;
        let requester = Requester::new(id, name, payment_token);
        self.requesters.insert(id, requester.clone());
        requester
    }

    /// Matches the request to the best free worker, or queues it.
    ///
    /// Scan, selection and claim happen within this one call, so no other
    /// operation can observe the chosen worker as free in between.
    pub fn request_trip(
        &mut self,
        requester: RequesterId,
        origin: Point,
        destination: Point,
        now: u64,
    ) -> DispatchResult<TripOutcome> {
        if requester <= 0 {
            return Err(DispatchError::InvalidId(requester));
        }
        for point in [origin, destination] {
            if !point.is_finite() {
                return Err(DispatchError::InvalidLocation(point));
            }
        }
        if self.in_flight.contains(&requester) {
            return Err(DispatchError::AlreadyTraveling(requester));
        }

        let candidates: Vec<MatchCandidate> = self
            .workers
            .iter()
            .filter(|w| w.is_free())
            .map(|w| MatchCandidate {
                worker: w.id,
                position: w.position,
                rating: w.rating,
            })
            .collect();
        let request = TripRequest {
            requester,
            origin,
            destination,
            requested_at: now,
        };

        if let Some(chosen) = self.matcher.find_match(origin, &candidates) {
            let index = self.index_of(chosen)?;
            self.ensure_requester(requester);
            self.in_flight.insert(requester);
            let sequence = self.take_trip_sequence();
            let worker = &mut self.workers[index];
            worker.claim(&request, now, sequence);
            debug!(
                worker = %chosen,
                requester,
                %origin,
                %destination,
                matcher = self.matcher.name(),
                "trip assigned"
            );
            return Ok(TripOutcome::Assigned(worker.clone()));
        }

        if !self.queue_when_unavailable {
            return Err(DispatchError::NoCapacity);
        }
        self.ensure_requester(requester);
        self.in_flight.insert(requester);
        self.queue.push_back(request);
        let position = self.queue.len();
        debug!(requester, %origin, position, "no free worker in coverage; request queued");
        Ok(TripOutcome::Queued { position })
    }

    fn take_trip_sequence(&mut self) -> u64 {
        let sequence = self.next_trip_sequence;
        self.next_trip_sequence += 1;
        sequence
    }

    fn ensure_requester(&mut self, id: RequesterId) {
        self.requesters
            .entry(id)
            .or_insert_with(|| Requester::new(id, format!("requester-{id}"), ""));
    }

    /// Lets a free worker take the oldest queued request. Coverage radius does
    /// not apply here; the queue is served strictly in arrival order.
    fn drain_queue_into(&mut self, index: usize, now: u64) -> Option<RequesterId> {
        if !self.workers[index].is_free() {
            return None;
        }
        let request = self.queue.pop_front()?;
        let sequence = self.take_trip_sequence();
        let worker = &mut self.workers[index];
        worker.claim(&request, now, sequence);
        debug!(
            worker = %worker.id,
            requester = request.requester,
            waited_minutes = now.saturating_sub(request.requested_at),
            "queued request dispatched"
        );
        Some(request.requester)
    }

    /// Ends the worker's trip: frees it, closes the requester's in-flight
    /// entry, credits the requester with a completed trip and drains the queue.
    pub fn release(&mut self, id: WorkerId, now: u64) -> DispatchResult<ReleasedTrip> {
        let index = self.index_of(id)?;
        let trip = self.workers[index]
            .release()
            .ok_or(DispatchError::Idle(id))?;
        self.in_flight.remove(&trip.requester);
        if let Some(requester) = self.requesters.get_mut(&trip.requester) {
            requester.completed_trips += 1;
        }
        let next_requester = self.drain_queue_into(index, now);
        Ok(ReleasedTrip {
            worker: id,
            trip,
            next_requester,
        })
    }

    /// Forces a faulted worker back to Free without completing its trip. The
    /// requester is released so it can request again.
    ///
    /// A worker whose position went non-finite is put back on the trip's
    /// pickup point. Pickup points are validated on request, so that one is
    /// always finite.
    pub fn force_reset(&mut self, id: WorkerId, now: u64) -> DispatchResult<ReleasedTrip> {
        let index = self.index_of(id)?;
        let trip = self.workers[index]
            .release()
            .ok_or(DispatchError::Idle(id))?;
        if !self.workers[index].position.is_finite() {
            warn!(worker = %id, position = %trip.origin, "non-finite position replaced");
            self.workers[index].position = trip.origin;
        }
        self.in_flight.remove(&trip.requester);
        let next_requester = self.drain_queue_into(index, now);
        Ok(ReleasedTrip {
            worker: id,
            trip,
            next_requester,
        })
    }

    pub fn pending_moves(&self) -> Vec<PendingMove> {
        self.workers
            .iter()
            .filter_map(|w| {
                w.trip().map(|trip| PendingMove {
                    worker: w.id,
                    trip: trip.sequence,
                    position: w.position,
                    destination: trip.destination,
                })
            })
            .collect()
    }

    /// Writes movement results back. Arrivals are released, faults are reset;
    /// either way the worker then tries the waiting queue.
    ///
    /// An outcome only applies to the trip it was computed for. If the worker
    /// was released, removed or re-dispatched since [`FleetState::pending_moves`]
    /// captured it, the outcome is dropped.
    pub fn apply_moves(&mut self, outcomes: &[(PendingMove, MoveOutcome)], now: u64) -> MovementEffects {
        let mut effects = MovementEffects::default();
        for (pending, outcome) in outcomes {
            let id = pending.worker;
            let Ok(index) = self.index_of(id) else {
                continue;
            };
            let current = self.workers[index].trip().map(|t| t.sequence);
            if current != Some(pending.trip) {
                debug!(worker = %id, trip = pending.trip, ?current, "stale movement outcome dropped");
                continue;
            }
            match *outcome {
                MoveOutcome::InTransit(position) => {
                    self.workers[index].position = position;
                    effects.in_transit += 1;
                }
                MoveOutcome::Arrived(position) => {
                    self.workers[index].position = position;
                    if let Ok(released) = self.release(id, now) {
                        debug!(worker = %id, requester = released.trip.requester, "worker arrived");
                        effects.arrivals.push(released);
                    }
                }
                MoveOutcome::Fault(fault) => {
                    if let Ok(released) = self.force_reset(id, now) {
                        warn!(
                            worker = %id,
                            requester = released.trip.requester,
                            %fault,
                            "movement fault; worker reset to free"
                        );
                        effects.faults.push((released, fault));
                    }
                }
            }
        }
        effects
    }
}

fn round_rating(rating: f64) -> f64 {
    ((rating * 100.0).round() / 100.0).clamp(MIN_RATING, MAX_RATING)
}

/// Mutex-guarded [`FleetState`].
#[derive(Debug)]
pub struct FleetRegistry {
    state: Mutex<FleetState>,
}

impl FleetRegistry {
    pub fn new(state: FleetState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Runs `f` with exclusive access to the fleet. `f` must not call back
    /// into the registry; compose operations on the `FleetState` instead.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FleetState) -> R) -> R {
        let mut guard = lock_or_recover(&self.state, "fleet registry");
        f(&mut guard)
    }

    /// Consistent copy of all workers, in registration order.
    pub fn snapshot(&self) -> Vec<Worker> {
        self.with_state(|state| state.workers().to_vec())
    }
}
