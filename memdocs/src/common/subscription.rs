use crate::errors::DocsResult;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives every emission of a live query: a result or an error.
///
/// Errors do not end the stream. An observer that saw `Err` keeps receiving
/// values after the next change that evaluates successfully.
pub trait Observer<T>: Fn(DocsResult<T>) + Send + Sync {}

impl<T, F> Observer<T> for F where F: Fn(DocsResult<T>) + Send + Sync {}

pub type SharedObserver<T> = Arc<dyn Observer<T>>;

type Teardown = Box<dyn FnOnce() + Send + Sync>;

/// A cancellable handle to a live stream.
///
/// Dropping the subscription cancels it. Once cancelled, the observer behind
/// it is never invoked again, even if a change is being delivered at the
/// same moment on another thread.
pub struct Subscription {
    active: Arc<AtomicBool>,
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Creates a subscription over a shared `active` flag.
    ///
    /// Cancelling clears the flag first, then runs `teardown` once.
    pub fn new(active: Arc<AtomicBool>, teardown: impl FnOnce() + Send + Sync + 'static) -> Self {
        Subscription {
            active,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription that is already cancelled.
    pub fn closed() -> Self {
        Subscription {
            active: Arc::new(AtomicBool::new(false)),
            teardown: None,
        }
    }

    /// Bundles several subscriptions so they are cancelled together.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        Subscription::new(active, move || drop(subscriptions))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Cancels the subscription. Calling it again has no effect.
    pub fn unsubscribe(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
