use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Locks `mutex`, recovering the inner value if a previous holder panicked.
/// Every critical section in this crate leaves its state consistent before it
/// can panic, so the data behind a poisoned lock is still usable.
pub(crate) fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'a, T>>| {
        warn!(lock = name, "lock poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}
