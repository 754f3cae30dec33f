use crate::common::{atomic, Atomic, DocsEventBus, Subscription, WriteExecutor};
use crate::errors::DocsResult;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A multicast value source that remembers its latest value.
///
/// New subscribers receive the latest value (if any) right away, then
/// every value passed to [`Subject::next`]. Paginators, sorters and query
/// constraints are all subjects.
///
/// ```rust
/// use memdocs::common::Subject;
/// use std::sync::{Arc, Mutex};
///
/// let subject = Subject::with_value(1);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let _subscription = subject.subscribe(move |v| sink.lock().unwrap().push(v)).unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
pub struct Subject<T> {
    latest: Atomic<Option<Stamped<T>>>,
    bus: DocsEventBus<Stamped<T>, SubjectListener<T>>,
}

/// A value tagged with its position in the subject's history.
#[derive(Clone)]
pub struct Stamped<T> {
    sequence: u64,
    value: T,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Subject {
            latest: self.latest.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<T> Subject<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A subject with no value yet.
    pub fn new() -> Self {
        Subject {
            latest: atomic(None),
            bus: DocsEventBus::new(),
        }
    }

    pub fn with_value(value: T) -> Self {
        Subject {
            latest: atomic(Some(Stamped { sequence: 1, value })),
            bus: DocsEventBus::new(),
        }
    }

    /// The latest value, if one was ever emitted.
    pub fn value(&self) -> Option<T> {
        self.latest.read().as_ref().map(|stamped| stamped.value.clone())
    }

    /// Records `value` as the latest and delivers it to every subscriber.
    pub fn next(&self, value: T) -> DocsResult<()> {
        let stamped = self.stamp(value);
        self.bus.publish(stamped)
    }

    /// Replaces the latest value without notifying anyone.
    pub(crate) fn set_silently(&self, value: T) {
        self.stamp(value);
    }

    /// Subscribes `on_next` and replays the latest value to it.
    ///
    /// A subscriber never sees a value older than one it already received,
    /// so a replay racing a concurrent [`Subject::next`] is dropped when the
    /// newer value got there first.
    pub fn subscribe(&self, on_next: impl Fn(T) + Send + Sync + 'static) -> DocsResult<Subscription> {
        let active = Arc::new(AtomicBool::new(true));
        let listener = SubjectListener {
            on_next: Arc::new(on_next),
            active: active.clone(),
            delivered: Arc::new(AtomicU64::new(0)),
        };
        let replay = listener.clone();
        let subscriber = self.bus.register(listener)?;

        let bus = self.bus.clone();
        let subscription = Subscription::new(active, move || bus.retire(subscriber));

        let latest = self.latest.read().clone();
        if let Some(stamped) = latest {
            replay.offer(stamped);
        }
        Ok(subscription)
    }

    pub fn has_subscribers(&self) -> bool {
        self.bus.has_listeners()
    }

    fn stamp(&self, value: T) -> Stamped<T> {
        self.latest.write_with(|latest| {
            let sequence = latest.as_ref().map_or(0, |stamped| stamped.sequence) + 1;
            let stamped = Stamped { sequence, value };
            *latest = Some(stamped.clone());
            stamped
        })
    }
}

impl<T> Default for Subject<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("latest", &self.latest.read().as_ref().map(|stamped| &stamped.value))
            .finish()
    }
}

pub struct SubjectListener<T> {
    on_next: Arc<dyn Fn(T) + Send + Sync>,
    active: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
}

impl<T> Clone for SubjectListener<T> {
    fn clone(&self) -> Self {
        SubjectListener {
            on_next: self.on_next.clone(),
            active: self.active.clone(),
            delivered: self.delivered.clone(),
        }
    }
}

impl<T: Clone> SubjectListener<T> {
    fn offer(&self, stamped: Stamped<T>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        // stale or already seen
        if self.delivered.fetch_max(stamped.sequence, Ordering::SeqCst) >= stamped.sequence {
            return;
        }
        (self.on_next)(stamped.value);
    }
}

impl<T: Clone> Handle<Stamped<T>> for SubjectListener<T> {
    fn handle(&self, event: &Event<Stamped<T>>) -> Result<(), BasuError> {
        self.offer(event.data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn collect<T: Clone + Send + Sync + 'static>(subject: &Subject<T>) -> (Subscription, Arc<Mutex<Vec<T>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = subject.subscribe(move |v| sink.lock().push(v)).unwrap();
        (subscription, seen)
    }

    #[test]
    fn test_no_replay_without_value() {
        let subject: Subject<i32> = Subject::new();
        let (_subscription, seen) = collect(&subject);
        assert!(seen.lock().is_empty());
        assert_eq!(subject.value(), None);
    }

    #[test]
    fn test_replays_latest_then_streams() {
        let subject = Subject::with_value("a".to_string());
        subject.next("b".to_string()).unwrap();
        let (_subscription, seen) = collect(&subject);
        assert_eq!(*seen.lock(), vec!["b".to_string()]);

        subject.next("c".to_string()).unwrap();
        awaitility::at_most(Duration::from_secs(2)).until(|| seen.lock().len() == 2);
        assert_eq!(seen.lock()[1], "c");
    }

    #[test]
    fn test_cancelled_subscriber_is_silent() {
        let subject = Subject::new();
        let (mut subscription, seen) = collect(&subject);
        subscription.unsubscribe();

        subject.next(5).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(seen.lock().is_empty());
        assert!(!subject.has_subscribers());
    }

    #[test]
    fn test_set_silently_updates_without_emitting() {
        let subject = Subject::with_value(0);
        let (_subscription, seen) = collect(&subject);
        subject.set_silently(3);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(*seen.lock(), vec![0]);
        assert_eq!(subject.value(), Some(3));
    }

    #[test]
    fn test_stale_value_after_newer_is_dropped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = SubjectListener {
            on_next: Arc::new(move |v: &str| sink.lock().push(v)),
            active: Arc::new(AtomicBool::new(true)),
            delivered: Arc::new(AtomicU64::new(0)),
        };

        // a newer value delivered by the bus overtakes the replay
        listener.offer(Stamped { sequence: 2, value: "v2" });
        listener.offer(Stamped { sequence: 1, value: "v1" });
        listener.offer(Stamped { sequence: 2, value: "v2" });
        listener.offer(Stamped { sequence: 3, value: "v3" });
        assert_eq!(*seen.lock(), vec!["v2", "v3"]);
    }

    #[test]
    fn test_subscriber_sees_each_value_once() {
        let subject = Subject::with_value(1);
        let (_subscription, seen) = collect(&subject);
        subject.next(2).unwrap();
        subject.next(3).unwrap();
        awaitility::at_most(Duration::from_secs(2)).until(|| seen.lock().len() == 3);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_subscribe_from_inside_a_callback() {
        let subject = Subject::with_value(0);
        let inner_seen = Arc::new(Mutex::new(Vec::new()));
        let inner_subscriptions = Arc::new(Mutex::new(Vec::new()));
        let inner_subject = subject.clone();
        let sink = inner_seen.clone();
        let keep = inner_subscriptions.clone();
        let _outer = subject
            .subscribe(move |v| {
                if v == 1 {
                    let sink = sink.clone();
                    let subscription = inner_subject.subscribe(move |v| sink.lock().push(v)).unwrap();
                    keep.lock().push(subscription);
                }
            })
            .unwrap();

        subject.next(1).unwrap();
        subject.next(2).unwrap();
        assert_eq!(*inner_seen.lock(), vec![1, 2]);
    }
}
