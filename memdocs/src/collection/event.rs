use crate::errors::DocsResult;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kinds of mutation a store announces.
///
/// # Variants
/// - `Create`: a document was added by `create`
/// - `Update`: a document was merged or upserted by `update_by_id`
/// - `Replace`: a document was overwritten by `replace_by_id`
/// - `Delete`: `delete_by_id` ran (whether or not the id existed)
/// - `AddCollection`: a new collection was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Replace,
    Delete,
    AddCollection,
}

/// Notification that the contents of one collection changed.
///
/// Live queries compare [`ChangeSignal::path`] with their own collection
/// path and re-evaluate on a match. The signal carries no payload beyond
/// the affected id; queries always read a fresh snapshot.
#[derive(Clone)]
pub struct ChangeSignal {
    inner: Arc<ChangeSignalInner>,
}

struct ChangeSignalInner {
    path: String,
    kind: ChangeKind,
    id: Option<String>,
    timestamp: u128,
}

impl ChangeSignal {
    pub fn new(path: &str, kind: ChangeKind, id: Option<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        ChangeSignal {
            inner: Arc::new(ChangeSignalInner {
                path: path.to_string(),
                kind,
                id,
                timestamp,
            }),
        }
    }

    /// The collection key the change was applied to.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.inner.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.inner.id.as_deref()
    }

    /// Milliseconds since the Unix epoch at which the signal was raised.
    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("path", &self.path())
            .field("kind", &self.kind())
            .field("id", &self.id())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

/// Closure form of a change handler.
///
/// Handlers run on whichever thread publishes the signal, hence `Send + Sync`.
/// They may mutate the store or subscribe again.
pub trait ChangeCallback: Send + Sync + Fn(ChangeSignal) -> DocsResult<()> {}

impl<F> ChangeCallback for F where F: Send + Sync + Fn(ChangeSignal) -> DocsResult<()> {}

/// A store listener that forwards [ChangeSignal]s to a callback while its
/// subscription is active.
#[derive(Clone)]
pub struct ChangeListener {
    on_change: Arc<dyn ChangeCallback>,
    active: Arc<AtomicBool>,
}

impl ChangeListener {
    pub fn new(on_change: impl ChangeCallback + 'static) -> Self {
        ChangeListener {
            on_change: Arc::new(on_change),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Creates a listener gated by an existing flag, so the callback can
    /// re-check the same flag before emitting.
    pub fn with_active_flag(active: Arc<AtomicBool>, on_change: impl ChangeCallback + 'static) -> Self {
        ChangeListener {
            on_change: Arc::new(on_change),
            active,
        }
    }

    /// The flag a [crate::common::Subscription] clears to silence this listener.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }
}

impl Handle<ChangeSignal> for ChangeListener {
    fn handle(&self, event: &Event<ChangeSignal>) -> Result<(), BasuError> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        match (self.on_change)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for ChangeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListener")
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}
