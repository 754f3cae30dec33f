use crate::collection::{lookup_keys, ChangeListener, ChangeSignal, Document};
use crate::common::{Observer, SharedObserver, Subscription};
use crate::errors::DocsResult;
use crate::query::{evaluate, DocsQuery};
use crate::store::{ArrayUnion, DocumentStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Live queries and mutations over a [DocumentStore].
///
/// `value_changes` and `count` emit once on subscription, on the calling
/// thread, then again after every change signal for the queried collection.
/// An evaluation error is emitted like a value and does not end the stream,
/// so a query that failed with `NotFound` recovers once the collection is
/// added.
///
/// ```rust
/// use memdocs::collection::Document;
/// use memdocs::doc;
/// use memdocs::errors::DocsResult;
/// use memdocs::query::{DocsQuery, QueryService};
/// use memdocs::store::StoreBuilder;
/// use std::sync::{Arc, Mutex};
///
/// let store = StoreBuilder::new()
///     .documents("/items", vec![doc! { "id": "0", "name": "a" }])
///     .open()
///     .unwrap();
/// let service = QueryService::new(store);
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let _subscription = service
///     .value_changes(DocsQuery::new("/items"), move |result: DocsResult<Vec<Document>>| {
///         sink.lock().unwrap().push(result.unwrap().len());
///     })
///     .unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
#[derive(Clone)]
pub struct QueryService {
    store: DocumentStore,
}

impl QueryService {
    pub fn new(store: DocumentStore) -> Self {
        QueryService { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Evaluates `query` once against the current contents.
    pub fn get(&self, query: &DocsQuery) -> DocsResult<Vec<Document>> {
        Self::run(&self.store, query)
    }

    /// Streams the result of `query` as the collection changes.
    pub fn value_changes(
        &self,
        query: DocsQuery,
        observer: impl Observer<Vec<Document>> + 'static,
    ) -> DocsResult<Subscription> {
        self.watch(query, |documents: Vec<Document>| documents, Arc::new(observer))
    }

    /// Streams the number of documents `query` returns.
    pub fn count(&self, query: DocsQuery, observer: impl Observer<usize> + 'static) -> DocsResult<Subscription> {
        self.watch(query, |documents: Vec<Document>| documents.len(), Arc::new(observer))
    }

    pub fn create(&self, path: &str, document: Document) -> DocsResult<String> {
        self.store.create(path, document)
    }

    pub fn update_by_id(
        &self,
        path: &str,
        partial: Option<&Document>,
        array_union: Option<&ArrayUnion>,
    ) -> DocsResult<()> {
        self.store.update_by_id(path, partial, array_union)
    }

    pub fn replace_by_id(&self, path: &str, document: Document) -> DocsResult<()> {
        self.store.replace_by_id(path, document)
    }

    pub fn delete_by_id(&self, path: &str) -> DocsResult<()> {
        self.store.delete_by_id(path)
    }

    /// Shared core of every live query: `project` shapes each evaluated
    /// result before it reaches `observer`.
    pub(crate) fn watch<T: 'static>(
        &self,
        query: DocsQuery,
        project: impl Fn(Vec<Document>) -> T + Send + Sync + 'static,
        observer: SharedObserver<T>,
    ) -> DocsResult<Subscription> {
        let active = Arc::new(AtomicBool::new(true));
        let project = Arc::new(project);
        let keys = lookup_keys(&query.path);
        let weak_store = self.store.downgrade();

        let listener_active = active.clone();
        let listener_query = query.clone();
        let listener_observer = observer.clone();
        let listener_project = project.clone();
        let listener = ChangeListener::with_active_flag(active.clone(), move |signal: ChangeSignal| {
            if !keys.iter().any(|key| key == signal.path()) {
                return Ok(());
            }
            let Some(store) = weak_store.upgrade() else {
                return Ok(());
            };
            log::debug!("Re-evaluating query on {} after {:?}", listener_query.path, signal.kind());
            let result = Self::run(&store, &listener_query).map(|documents| listener_project(documents));
            if listener_active.load(Ordering::SeqCst) {
                listener_observer(result);
            }
            Ok(())
        });
        let subscription = self.store.subscribe(listener)?;

        let result = Self::run(&self.store, &query).map(|documents| project(documents));
        if active.load(Ordering::SeqCst) {
            observer(result);
        }
        Ok(subscription)
    }

    fn run(store: &DocumentStore, query: &DocsQuery) -> DocsResult<Vec<Document>> {
        let snapshot = store.snapshot(&query.path)?;
        evaluate(snapshot, query)
    }
}
