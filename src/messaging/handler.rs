//! Message handlers and filters
//!
//! A handler's identity is its shared allocation: clones of the same
//! [`Handler`] are the same handler, two `Handler::new` calls with identical
//! closures are different handlers. Keep a clone to unsubscribe later.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Error type returned by handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers
pub type HandlerResult = Result<(), HandlerError>;

type HandlerFn<U> = dyn Fn(Arc<U>) -> BoxFuture<'static, HandlerResult> + Send + Sync;
type FilterFn<U> = dyn Fn(&U) -> bool + Send + Sync;

/// Identity of a handler, stable across clones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HandlerKey(usize);

/// Callback invoked for every accepted message of type `U`
pub struct Handler<U: ?Sized> {
    callback: Arc<HandlerFn<U>>,
}

impl<U> Handler<U>
where
    U: ?Sized + Send + Sync + 'static,
{
    /// Asynchronous handler.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<U>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let callback: Arc<HandlerFn<U>> =
            Arc::new(move |message: Arc<U>| Box::pin(f(message)) as BoxFuture<'static, _>);
        Self { callback }
    }

    /// Synchronous handler; it still runs on a pool task like any other.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&U) -> HandlerResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |message: Arc<U>| {
            let f = Arc::clone(&f);
            async move { (*f)(&*message) }
        })
    }

    pub(crate) fn key(&self) -> HandlerKey {
        HandlerKey(Arc::as_ptr(&self.callback) as *const () as usize)
    }

    pub(crate) fn invoke(&self, message: Arc<U>) -> BoxFuture<'static, HandlerResult> {
        (self.callback)(message)
    }

    /// True when both values are the same handler.
    pub fn same_as(&self, other: &Handler<U>) -> bool {
        self.key() == other.key()
    }
}

impl<U: ?Sized> Clone for Handler<U> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<U: ?Sized> fmt::Debug for Handler<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("message_type", &std::any::type_name::<U>())
            .finish()
    }
}

/// Predicate deciding whether a handler sees a message
pub struct Filter<U: ?Sized> {
    predicate: Arc<FilterFn<U>>,
}

impl<U: ?Sized + 'static> Filter<U> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&U) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn accepts(&self, message: &U) -> bool {
        (self.predicate)(message)
    }
}

impl<U: ?Sized> Clone for Filter<U> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<U: ?Sized> fmt::Debug for Filter<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("message_type", &std::any::type_name::<U>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clones_share_identity() {
        let handler = Handler::<u32>::from_fn(|_| Ok(()));
        let clone = handler.clone();
        assert!(handler.same_as(&clone));
        assert_eq!(handler.key(), clone.key());
    }

    #[test]
    fn test_identical_closures_are_distinct_handlers() {
        let first = Handler::<u32>::from_fn(|_| Ok(()));
        let second = Handler::<u32>::from_fn(|_| Ok(()));
        assert!(!first.same_as(&second));
    }

    #[tokio::test]
    async fn test_invoke_runs_callback() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let handler = Handler::<u32>::new(move |value| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(*value as usize, Ordering::SeqCst);
                Ok(())
            }
        });

        handler.invoke(Arc::new(5)).await.unwrap();
        handler.invoke(Arc::new(2)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_filter_accepts() {
        let filter = Filter::<u32>::new(|value| *value == 1);
        assert!(filter.accepts(&1));
        assert!(!filter.accepts(&2));
    }

    #[test]
    fn test_filter_on_trait_object() {
        trait Coded: Send + Sync {
            fn code(&self) -> u32;
        }
        struct Event(u32);
        impl Coded for Event {
            fn code(&self) -> u32 {
                self.0
            }
        }

        let filter = Filter::<dyn Coded>::new(|event| event.code() == 3);
        assert!(filter.accepts(&Event(3)));
        assert!(!filter.accepts(&Event(4)));
    }
}
