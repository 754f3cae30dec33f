use crate::collection::{lookup_keys, ChangeKind, ChangeListener, ChangeSignal, DocPath, Document};
use crate::common::{atomic, Atomic, DocsEventBus, ReadExecutor, Subscription, Value, WriteExecutor};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use crate::store::StoreConfig;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Documents of one collection keyed by id, in insertion order.
pub type Collection = IndexMap<String, Document>;

/// Values to union into array fields during `update_by_id`.
///
/// Each listed value is appended to the named array field unless the field
/// already holds an equal value, so applying the same union twice changes
/// nothing the second time.
///
/// ```rust
/// use memdocs::store::ArrayUnion;
///
/// let union = ArrayUnion::new().field("tags", vec!["red", "blue"]);
/// assert_eq!(union.fields().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayUnion {
    fields: IndexMap<String, Vec<Value>>,
}

impl ArrayUnion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: Into<Value>>(mut self, name: &str, values: Vec<T>) -> Self {
        self.fields
            .entry(name.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.fields.iter()
    }

    /// Applies the union to `document`. A field holding a scalar becomes an
    /// array that starts with that scalar.
    fn apply(&self, document: &mut Document) -> DocsResult<()> {
        for (field, values) in self.fields.iter() {
            let mut items = match document.remove(field) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(scalar) => vec![scalar],
            };
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            document.put(field.as_str(), Value::Array(items))?;
        }
        Ok(())
    }
}

/// The in-memory document store.
///
/// Owns every collection, applies the four mutations and announces each one
/// with a [ChangeSignal] for the mutated collection. Cloning the store is
/// cheap and every clone shares the same collections and listeners.
///
/// # Concurrency
///
/// Each mutation runs as one read-modify-write under the write lock; reads
/// take a snapshot under the read lock. Signals are published after the lock
/// is released, one mutation at a time, so every listener sees a mutation's
/// signal before the signal of any later mutation made by the same caller.
///
/// # Examples
///
/// ```rust
/// use memdocs::doc;
/// use memdocs::store::StoreBuilder;
/// use std::time::Duration;
///
/// let store = StoreBuilder::new()
///     .create_latency(Duration::ZERO)
///     .collection("/items")
///     .open()
///     .unwrap();
///
/// let id = store.create("/items", doc! { "name": "a" }).unwrap();
/// assert_eq!(id, "0");
/// store.update_by_id("/items/0", Some(&doc! { "tag": "x" }), None).unwrap();
/// assert_eq!(store.get("/items").unwrap()["0"], doc! { "id": "0", "name": "a", "tag": "x" });
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<DocumentStoreInner>,
}

struct DocumentStoreInner {
    config: StoreConfig,
    collections: Atomic<BTreeMap<String, Collection>>,
    event_bus: DocsEventBus<ChangeSignal, ChangeListener>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    pub(crate) fn new(config: StoreConfig, collections: BTreeMap<String, Collection>) -> Self {
        DocumentStore {
            inner: Arc::new(DocumentStoreInner {
                config,
                collections: atomic(collections),
                event_bus: DocsEventBus::new(),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Returns a copy of the collection at `path`.
    ///
    /// `path` is looked up as `/path` first, then as given.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::NotFound] if no such collection exists. Reads
    /// never create collections.
    pub fn get(&self, path: &str) -> DocsResult<Collection> {
        self.inner.collections.read_with(|collections| {
            let key = Self::resolve(collections, path)?;
            Ok(collections.get(&key).cloned().unwrap_or_default())
        })
    }

    /// The documents of the collection at `path`, in insertion order.
    pub fn snapshot(&self, path: &str) -> DocsResult<Vec<Document>> {
        self.inner.collections.read_with(|collections| {
            let key = Self::resolve(collections, path)?;
            Ok(collections
                .get(&key)
                .map(|c| c.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    pub fn contains_collection(&self, path: &str) -> bool {
        self.inner
            .collections
            .read_with(|collections| Self::lookup(collections, path).is_some())
    }

    pub fn collection_paths(&self) -> Vec<String> {
        self.inner
            .collections
            .read_with(|collections| collections.keys().cloned().collect())
    }

    /// Registers an empty collection at `path` unless one already resolves
    /// there. A new collection is announced, which lets queries that failed
    /// with `NotFound` recover.
    pub fn add_collection(&self, path: &str) -> DocsResult<()> {
        let added = self.inner.collections.write_with(|collections| {
            if Self::lookup(collections, path).is_some() {
                false
            } else {
                collections.insert(path.to_string(), Collection::new());
                true
            }
        });
        if added {
            self.notify(ChangeSignal::new(path, ChangeKind::AddCollection, None))?;
        }
        Ok(())
    }

    /// Stores `document` under a new id and returns that id.
    ///
    /// The id is the collection's document count, advanced past any id still
    /// in use. The document is stored at once; the change signal follows
    /// after the configured create latency, and this call returns only then.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::NotFound] if the collection does not exist.
    pub fn create(&self, path: &str, document: Document) -> DocsResult<String> {
        let id_field = self.inner.config.id_field();
        let (key, id) = self.inner.collections.write_with(|collections| {
            let key = Self::resolve(collections, path)?;
            let collection = collections.entry(key.clone()).or_default();
            let id = Self::next_id(collection);
            let mut stored = document;
            stored.put(id_field, id.as_str())?;
            collection.insert(id.clone(), stored);
            Ok::<_, DocsError>((key, id))
        })?;

        let latency = self.inner.config.create_latency();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        self.notify(ChangeSignal::new(&key, ChangeKind::Create, Some(id.clone())))?;
        Ok(id)
    }

    /// Merges `partial` into the document at `path` and unions `array_union`
    /// into its array fields. The id field keeps the path id.
    ///
    /// A missing document is created from `partial` (upsert).
    ///
    /// # Errors
    ///
    /// * [ErrorKind::InvalidPath] if `path` has no id segment
    /// * [ErrorKind::NotFound] if the collection does not exist
    pub fn update_by_id(
        &self,
        path: &str,
        partial: Option<&Document>,
        array_union: Option<&ArrayUnion>,
    ) -> DocsResult<()> {
        let doc_path = DocPath::parse(path)?;
        let id_field = self.inner.config.id_field();
        let key = self.inner.collections.write_with(|collections| {
            let key = Self::resolve(collections, doc_path.collection())?;
            let collection = collections.entry(key.clone()).or_default();
            let existing = collection.get(doc_path.id()).cloned().unwrap_or_default();
            let mut merged = match partial {
                Some(partial) => existing.merge(partial),
                None => existing,
            };
            if let Some(array_union) = array_union {
                array_union.apply(&mut merged)?;
            }
            merged.put(id_field, doc_path.id())?;
            collection.insert(doc_path.id().to_string(), merged);
            Ok::<_, DocsError>(key)
        })?;

        self.notify(ChangeSignal::new(&key, ChangeKind::Update, Some(doc_path.id().to_string())))
    }

    /// Replaces the whole document at `path`. Any id inside `document` is
    /// overwritten with the path id.
    pub fn replace_by_id(&self, path: &str, document: Document) -> DocsResult<()> {
        let doc_path = DocPath::parse(path)?;
        let id_field = self.inner.config.id_field();
        let key = self.inner.collections.write_with(|collections| {
            let key = Self::resolve(collections, doc_path.collection())?;
            let mut replacement = document;
            replacement.put(id_field, doc_path.id())?;
            collections
                .entry(key.clone())
                .or_default()
                .insert(doc_path.id().to_string(), replacement);
            Ok::<_, DocsError>(key)
        })?;

        self.notify(ChangeSignal::new(&key, ChangeKind::Replace, Some(doc_path.id().to_string())))
    }

    /// Removes the document at `path`. Removing an absent id is not an
    /// error, and is still announced.
    pub fn delete_by_id(&self, path: &str) -> DocsResult<()> {
        let doc_path = DocPath::parse(path)?;
        let key = self.inner.collections.write_with(|collections| {
            let key = Self::resolve(collections, doc_path.collection())?;
            if let Some(collection) = collections.get_mut(&key) {
                if collection.shift_remove(doc_path.id()).is_none() {
                    log::debug!("Document {} already absent", doc_path);
                }
            }
            Ok::<_, DocsError>(key)
        })?;

        self.notify(ChangeSignal::new(&key, ChangeKind::Delete, Some(doc_path.id().to_string())))
    }

    /// Registers a listener for change signals of every collection.
    pub fn subscribe(&self, listener: ChangeListener) -> DocsResult<Subscription> {
        let active = listener.active_flag();
        let subscriber = self.inner.event_bus.register(listener)?;
        let event_bus = self.inner.event_bus.clone();
        log::trace!("Change listener registered");
        Ok(Subscription::new(active, move || {
            log::trace!("Change listener retired");
            event_bus.retire(subscriber)
        }))
    }

    /// A handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakDocumentStore {
        WeakDocumentStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Drops every change listener.
    pub fn close(&self) -> DocsResult<()> {
        self.inner.event_bus.close()
    }

    /// First id not in use, counting up from the collection size.
    pub(crate) fn next_id(collection: &Collection) -> String {
        let mut next = collection.len();
        while collection.contains_key(next.to_string().as_str()) {
            next += 1;
        }
        next.to_string()
    }

    fn notify(&self, signal: ChangeSignal) -> DocsResult<()> {
        log::debug!("Broadcasting {:?} on {}", signal.kind(), signal.path());
        self.inner.event_bus.publish(signal)
    }

    fn lookup(collections: &BTreeMap<String, Collection>, path: &str) -> Option<String> {
        lookup_keys(path)
            .into_iter()
            .find(|key| collections.contains_key(key))
    }

    fn resolve(collections: &BTreeMap<String, Collection>, path: &str) -> DocsResult<String> {
        Self::lookup(collections, path).ok_or_else(|| {
            log::error!("Collection {} not found", path);
            DocsError::new(&format!("Collection {} not found", path), ErrorKind::NotFound)
        })
    }
}

/// Non-owning reference to a [DocumentStore], held by listeners the store
/// itself keeps alive.
#[derive(Clone)]
pub struct WeakDocumentStore {
    inner: Weak<DocumentStoreInner>,
}

impl WeakDocumentStore {
    pub fn upgrade(&self) -> Option<DocumentStore> {
        self.inner.upgrade().map(|inner| DocumentStore { inner })
    }
}
