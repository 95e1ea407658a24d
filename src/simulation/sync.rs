//! Checked lock/wait/broadcast helpers
//!
//! A poisoned mutex means some vehicle thread panicked while holding it.
//! That is an environment fault rather than something a caller can handle,
//! so these helpers report it with the caller's source location and hand the
//! guard back so the simulation keeps running.

use log::{error, trace};
use std::panic::Location;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

fn report<G>(what: &str, location: &Location<'_>, poisoned: PoisonError<G>) -> G {
    error!(
        "{} failed: mutex poisoned @ {}:{}",
        what,
        location.file(),
        location.line()
    );
    poisoned.into_inner()
}

/// Lock a mutex, reporting and recovering from poisoning
#[track_caller]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    let location = Location::caller();
    mutex
        .lock()
        .unwrap_or_else(|poisoned| report("Mutex lock", location, poisoned))
}

/// Block on `cond`, releasing the guard's mutex until woken
///
/// A single wake guarantees nothing; callers must re-check their predicate.
#[track_caller]
pub fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    let location = Location::caller();
    cond.wait(guard)
        .unwrap_or_else(|poisoned| report("Condition variable wait", location, poisoned))
}

/// Block on `cond` for as long as `blocked` holds
///
/// The predicate is re-evaluated under the lock after every wake.
#[track_caller]
pub fn wait_while<'a, T, F>(
    cond: &Condvar,
    mut guard: MutexGuard<'a, T>,
    mut blocked: F,
) -> MutexGuard<'a, T>
where
    F: FnMut(&mut T) -> bool,
{
    let location = Location::caller();
    while blocked(&mut *guard) {
        trace!("waiting @ {}:{}", location.file(), location.line());
        guard = cond
            .wait(guard)
            .unwrap_or_else(|poisoned| report("Condition variable wait", location, poisoned));
    }
    guard
}

/// Wake every thread waiting on `cond`
pub fn broadcast(cond: &Condvar) {
    cond.notify_all();
}
