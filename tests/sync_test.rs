//! Checked synchronization helper tests

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use safe_intersection::simulation::sync;

#[test]
fn test_lock_recovers_from_poisoning() {
    let counter = Arc::new(Mutex::new(5));

    let poisoner = Arc::clone(&counter);
    let result = thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("car thread crashed while holding the lock");
    })
    .join();
    assert!(result.is_err());
    assert!(counter.is_poisoned());

    let mut guard = sync::lock(&counter);
    *guard += 1;
    assert_eq!(*guard, 6);
}

#[test]
fn test_wait_while_returns_once_predicate_clears() {
    let state = Arc::new((Mutex::new(0usize), Condvar::new()));

    let producer = Arc::clone(&state);
    let handle = thread::spawn(move || {
        for _ in 0..3 {
            let (count, changed) = &*producer;
            *sync::lock(count) += 1;
            sync::broadcast(changed);
        }
    });

    let (count, changed) = &*state;
    let guard = sync::wait_while(changed, sync::lock(count), |count| *count < 3);
    assert_eq!(*guard, 3);
    drop(guard);

    handle.join().unwrap();
}

#[test]
fn test_wait_while_does_not_block_when_already_satisfied() {
    let state = (Mutex::new(true), Condvar::new());
    let guard = sync::wait_while(&state.1, sync::lock(&state.0), |ready| !*ready);
    assert!(*guard);
}
