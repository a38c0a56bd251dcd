//! Background tasks: the tick driver, the reinforcement controller and the
//! optional synthetic demand generator.
//!
//! Each task is a tokio loop over a shared [`Dispatcher`]. All of them stop
//! when the shared [`CancellationToken`] is cancelled; [`BackgroundTasks::shutdown`]
//! cancels and waits for them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{Dispatcher, ReinforcementOutcome};
use crate::registry::TripOutcome;

/// Handles to the running background loops.
#[derive(Debug)]
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Starts the loops enabled in the dispatcher's config. Must be called
    /// from within a tokio runtime.
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> Self {
        let cancel = CancellationToken::new();
        let config = dispatcher.config().clone();
        let mut handles = vec![tokio::spawn(tick_loop(
            Arc::clone(&dispatcher),
            cancel.clone(),
        ))];
        if config.reinforcement.enabled {
            handles.push(tokio::spawn(controller_loop(
                Arc::clone(&dispatcher),
                cancel.clone(),
                Duration::from_millis(config.reinforcement.check_interval_ms),
            )));
        }
        if config.demand.enabled {
            handles.push(tokio::spawn(demand_loop(
                Arc::clone(&dispatcher),
                cancel.clone(),
                Duration::from_millis(config.demand.interval_ms),
            )));
        }
        info!(tasks = handles.len(), "background tasks started");
        Self { cancel, handles }
    }

    /// Cancels every loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(%err, "background task ended abnormally");
            }
        }
        info!("background tasks stopped");
    }
}

/// Runs one unit of loop work, turning a panic into a logged error so the
/// loop survives it. Registry and ledger locks recover from poisoning, so the
/// next iteration sees usable state.
fn run_isolated<T>(task: &'static str, work: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(task, panic = %message, "background work panicked; continuing");
            None
        }
    }
}

/// Ticks the simulation every `tick_interval_ms`. The interval is re-read
/// before each sleep so runtime changes apply from the next tick. While the
/// simulation is inactive the loop keeps sleeping but does not tick.
async fn tick_loop(dispatcher: Arc<Dispatcher>, cancel: CancellationToken) {
    loop {
        let settings = dispatcher.settings();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = time::sleep(Duration::from_millis(settings.tick_interval_ms)) => {}
        }
        if !dispatcher.settings().active {
            continue;
        }
        let Some(report) = run_isolated("tick", || dispatcher.tick()) else {
            continue;
        };
        for (worker, fault) in &report.faults {
            warn!(%worker, %fault, "worker reset after movement fault");
        }
        debug!(time = %report.time, arrivals = report.settlements.len(), "tick");
    }
    debug!("tick loop stopped");
}

async fn controller_loop(dispatcher: Arc<Dispatcher>, cancel: CancellationToken, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !dispatcher.settings().active {
            continue;
        }
        let now = time::Instant::now().into_std();
        match run_isolated("reinforce", || dispatcher.reinforce(now)) {
            None | Some(ReinforcementOutcome::Held(_)) => {}
            Some(ReinforcementOutcome::Hired(worker)) => {
                debug!(worker = %worker.id, "controller hired a worker");
            }
            Some(ReinforcementOutcome::Rejected(err)) => {
                warn!(%err, "reinforcement hire rejected");
            }
        }
    }
    debug!("controller loop stopped");
}

async fn demand_loop(dispatcher: Arc<Dispatcher>, cancel: CancellationToken, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !dispatcher.settings().active {
            continue;
        }
        let Some((request, outcome)) =
            run_isolated("demand", || dispatcher.submit_synthetic_request())
        else {
            continue;
        };
        match outcome {
            Ok(TripOutcome::Assigned(worker)) => {
                debug!(requester = request.requester, worker = %worker.id, "synthetic request assigned");
            }
            Ok(TripOutcome::Queued { position }) => {
                debug!(requester = request.requester, position, "synthetic request queued");
            }
            // Pool requesters already on a trip are expected.
            Err(err) => debug!(requester = request.requester, %err, "synthetic request refused"),
        }
    }
    debug!("demand loop stopped");
}
