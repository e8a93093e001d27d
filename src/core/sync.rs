//! Lock helpers with consistent poison handling
//!
//! Every shared structure in the host (module list, subscription sets,
//! in-memory configuration) sits behind a std lock. A poisoned lock means a
//! panic happened while it was held; these helpers turn that into the
//! caller's own error type instead of propagating the panic.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn poison_message(kind: &str, what: &str) -> String {
    format!(
        "Internal synchronisation error ({kind} poisoned while guarding {what}). \
         A panic occurred while the lock was held."
    )
}

/// Acquire a mutex, mapping poisoning through `error_constructor`.
pub fn lock_mutex<'a, T, E>(
    mutex: &'a Mutex<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    mutex
        .lock()
        .map_err(|_| error_constructor(poison_message("mutex", what)))
}

/// Acquire a read guard, mapping poisoning through `error_constructor`.
pub fn read_lock<'a, T, E>(
    lock: &'a RwLock<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    lock.read()
        .map_err(|_| error_constructor(poison_message("RwLock read", what)))
}

/// Acquire a write guard, mapping poisoning through `error_constructor`.
pub fn write_lock<'a, T, E>(
    lock: &'a RwLock<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    lock.write()
        .map_err(|_| error_constructor(poison_message("RwLock write", what)))
}

/// Read guard that recovers from poisoning.
///
/// Used on paths that must never fail (dispatch enumeration, teardown), where
/// the protected data is still structurally valid after a panicking writer.
pub fn read_recover<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("{}", poison_message("RwLock read", what));
        poisoned.into_inner()
    })
}

/// Write guard that recovers from poisoning. See [`read_recover`].
pub fn write_recover<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("{}", poison_message("RwLock write", what));
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct TestError {
        message: String,
    }

    fn poison<T: Send + Sync + 'static>(lock: Arc<RwLock<T>>) {
        let _ = thread::spawn(move || {
            let _guard = lock.write().unwrap();
            panic!("Intentional panic to poison lock");
        })
        .join();
    }

    #[test]
    fn test_lock_mutex_success() {
        let mutex = Mutex::new(42);
        let guard = lock_mutex(&mutex, "answer", |message| TestError { message }).unwrap();
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_lock_mutex_poisoned() {
        let mutex = Arc::new(Mutex::new(42));
        let clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("Intentional panic to poison mutex");
        })
        .join();

        let error = lock_mutex(&mutex, "answer", |message| TestError { message }).unwrap_err();
        assert!(error.message.contains("mutex poisoned"));
        assert!(error.message.contains("answer"));
    }

    #[test]
    fn test_read_and_write_lock_success() {
        let lock = RwLock::new(1);
        {
            let mut guard = write_lock(&lock, "value", |message| TestError { message }).unwrap();
            *guard = 2;
        }
        let guard = read_lock(&lock, "value", |message| TestError { message }).unwrap();
        assert_eq!(*guard, 2);
    }

    #[test]
    fn test_read_lock_poisoned_maps_error() {
        let lock = Arc::new(RwLock::new(1));
        poison(lock.clone());

        let error = read_lock(&lock, "value", |message| TestError { message }).unwrap_err();
        assert!(error.message.contains("RwLock read poisoned"));
    }

    #[test]
    fn test_recover_helpers_ignore_poison() {
        let lock = Arc::new(RwLock::new(vec![1, 2, 3]));
        poison(lock.clone());

        assert_eq!(read_recover(&lock, "list").len(), 3);
        write_recover(&lock, "list").push(4);
        assert_eq!(read_recover(&lock, "list").len(), 4);
    }
}
