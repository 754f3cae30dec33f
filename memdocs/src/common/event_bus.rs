use crate::common::DOCS_EVENT;
use crate::errors::{DocsError, DocsResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A typed publish/subscribe channel built on a `basu` event bus.
///
/// Every reactive piece of memdocs (store change signals, subjects feeding
/// the pagination driver) rides on one of these. Listeners are plain
/// `basu` handlers.
///
/// # Delivery
///
/// The `basu` bus only keeps the roster of registered listeners. A publish
/// asks it for the current roster and invokes the listeners after every bus
/// lock has been released, on the publishing thread. Listeners are therefore
/// free to publish, register or remove listeners on the same bus.
///
/// Events are delivered one at a time in publish order. An event published
/// while another is being delivered (from a listener, or from another
/// thread) is queued and delivered by the publisher already draining the
/// queue, after the current event has reached every listener.
///
/// # Example
///
/// ```ignore
/// let bus: DocsEventBus<ChangeSignal, ChangeListener> = DocsEventBus::new();
/// let subscriber = bus.register(listener)?;
/// bus.publish(signal)?;
/// bus.retire(subscriber);
/// ```
pub struct DocsEventBus<E, L> {
    inner: Arc<DocsEventBusInner<E, L>>,
}

impl<E, L> Clone for DocsEventBus<E, L> {
    fn clone(&self) -> Self {
        DocsEventBus {
            inner: self.inner.clone(),
        }
    }
}

impl<E, L> Default for DocsEventBus<E, L>
where
    L: Handle<E> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> DocsEventBus<E, L>
where
    L: Handle<E> + 'static,
{
    pub fn new() -> Self {
        DocsEventBus {
            inner: Arc::new(DocsEventBusInner::new()),
        }
    }

    /// Registers a listener and returns the reference needed to remove it.
    pub fn register(&self, listener: L) -> DocsResult<SubscriberRef> {
        self.inner.register(listener)
    }

    /// Removes a listener.
    pub fn deregister(&self, subscriber: SubscriberRef) -> DocsResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Removes a listener, logging instead of failing. Used by subscription
    /// teardowns, which have nobody to report to.
    pub fn retire(&self, subscriber: SubscriberRef) {
        if let Err(e) = self.inner.deregister(subscriber) {
            log::warn!("Failed to remove retired listener: {}", e);
        }
    }

    /// Delivers `event` to every registered listener.
    ///
    /// Returns the first listener error of the events this call delivered.
    /// When another publisher is draining the queue, `event` is left to it
    /// and this returns right away.
    pub fn publish(&self, event: E) -> DocsResult<()> {
        self.inner.publish(event)
    }

    /// Drops every listener.
    pub fn close(&self) -> DocsResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Handle of a registered listener.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

/// Listeners collected by one roster call.
type Roster<L> = Mutex<Vec<Arc<L>>>;

/// The handler actually registered with `basu`: it only enlists its
/// listener on the roster being collected.
struct Enlist<L> {
    listener: Arc<L>,
}

impl<L: Send + Sync> Handle<Roster<L>> for Enlist<L> {
    fn handle(&self, event: &Event<Roster<L>>) -> Result<(), BasuError> {
        event.data.lock().push(self.listener.clone());
        Ok(())
    }
}

struct Dispatch<E> {
    pending: VecDeque<E>,
    draining: bool,
}

/// Marks the owner as the draining publisher until the queue runs dry or
/// delivery unwinds.
struct Drain<'a, E> {
    dispatch: &'a Mutex<Dispatch<E>>,
    finished: bool,
}

impl<E> Drain<'_, E> {
    fn next(&mut self) -> Option<E> {
        let mut dispatch = self.dispatch.lock();
        let event = dispatch.pending.pop_front();
        if event.is_none() {
            dispatch.draining = false;
            self.finished = true;
        }
        event
    }
}

impl<E> Drop for Drain<'_, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.dispatch.lock().draining = false;
        }
    }
}

struct DocsEventBusInner<E, L> {
    event_bus: EventBus<Roster<L>>,
    dispatch: Mutex<Dispatch<E>>,
}

impl<E, L> DocsEventBusInner<E, L>
where
    L: Handle<E> + 'static,
{
    fn new() -> Self {
        DocsEventBusInner {
            event_bus: EventBus::new(),
            dispatch: Mutex::new(Dispatch {
                pending: VecDeque::new(),
                draining: false,
            }),
        }
    }

    fn register(&self, listener: L) -> DocsResult<SubscriberRef> {
        let enlist = Enlist {
            listener: Arc::new(listener),
        };
        match self.event_bus.subscribe(DOCS_EVENT, Box::new(enlist)) {
            Ok(handler_id) => Ok(SubscriberRef::new(handler_id)),
            Err(e) => Err(Self::docs_error(e)),
        }
    }

    #[inline]
    fn deregister(&self, subscriber: SubscriberRef) -> DocsResult<()> {
        self.event_bus
            .unsubscribe(DOCS_EVENT, &subscriber.inner)
            .map_err(Self::docs_error)
    }

    fn publish(&self, event: E) -> DocsResult<()> {
        {
            let mut dispatch = self.dispatch.lock();
            dispatch.pending.push_back(event);
            if dispatch.draining {
                log::trace!("Event queued behind the delivery in progress");
                return Ok(());
            }
            dispatch.draining = true;
        }

        let mut drain = Drain {
            dispatch: &self.dispatch,
            finished: false,
        };
        let mut outcome = Ok(());
        while let Some(event) = drain.next() {
            if let Err(e) = self.deliver(event) {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    fn deliver(&self, event: E) -> DocsResult<()> {
        let listeners = self.roster()?;
        if listeners.is_empty() {
            return Ok(());
        }

        let event = Event::new(event);
        let mut outcome = Ok(());
        for listener in listeners {
            if let Err(e) = listener.handle(&event) {
                let error = Self::docs_error(e);
                if outcome.is_ok() {
                    outcome = Err(error);
                }
            }
        }
        outcome
    }

    /// Snapshot of the registered listeners, taken under the bus lock.
    fn roster(&self) -> DocsResult<Vec<Arc<L>>> {
        let roster: Event<Roster<L>> = Event::new(Mutex::new(Vec::new()));
        match self.event_bus.publish(DOCS_EVENT, &roster) {
            Ok(()) => Ok(roster.data.into_inner()),
            // nobody ever registered
            Err(BasuError::EventTypeNotFOUND) => Ok(Vec::new()),
            Err(e) => Err(Self::docs_error(e)),
        }
    }

    #[inline]
    fn close(&self) -> DocsResult<()> {
        self.event_bus.clear().map_err(Self::docs_error)
    }

    #[inline]
    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(DOCS_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn docs_error(e: BasuError) -> DocsError {
        let error = DocsError::from(e);
        log::error!("{}", error);
        error
    }
}
