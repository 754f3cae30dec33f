use crate::collection::{DocPath, Document};
use crate::common::{atomic, Atomic, Observer, SharedObserver, Subject, Subscription, WriteExecutor};
use crate::errors::DocsResult;
use crate::filter::WhereClause;
use crate::query::{DocsQuery, QueryService};
use crate::store::ArrayUnion;
use crate::table::{PageRequest, TableDataService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Dynamic constraint of a [DocsDelegate]. `None` means "nothing to show".
pub type ConstraintSource = Subject<Option<Vec<WhereClause>>>;

/// A [QueryService] bound to one collection.
///
/// Every query runs against the fixed path with the fixed id field, and
/// every mutation takes a bare id instead of a document path.
///
/// # Dynamic constraint
///
/// A delegate built with [`DocsDelegate::constrained_by`] follows a
/// [ConstraintSource]. Each value it emits replaces the caller's own where
/// clauses and restarts the live query; the query for the previous value is
/// cancelled first. When the source emits `None`, no query runs and the
/// stream emits an empty result (an empty list, or `0` for `count`).
///
/// ```rust
/// use memdocs::doc;
/// use memdocs::errors::DocsResult;
/// use memdocs::common::Subject;
/// use memdocs::filter::field;
/// use memdocs::query::{DocsDelegate, QueryService};
/// use memdocs::store::StoreBuilder;
/// use memdocs::table::PageRequest;
/// use std::sync::{Arc, Mutex};
///
/// let store = StoreBuilder::new()
///     .documents("/items", vec![doc! { "id": "0", "tag": "x" }, doc! { "id": "1", "tag": "y" }])
///     .open()
///     .unwrap();
/// let constraint = Subject::with_value(Some(vec![field("tag").eq("y")]));
/// let delegate = DocsDelegate::new(QueryService::new(store), "/items").constrained_by(constraint.clone());
///
/// let counts = Arc::new(Mutex::new(Vec::new()));
/// let sink = counts.clone();
/// let _subscription = delegate
///     .count(PageRequest::new(), move |count: DocsResult<usize>| sink.lock().unwrap().push(count.unwrap()))
///     .unwrap();
/// constraint.next(None).unwrap();
/// ```
#[derive(Clone)]
pub struct DocsDelegate {
    scope: DelegateScope,
    constraint: Option<ConstraintSource>,
}

#[derive(Clone)]
struct DelegateScope {
    service: QueryService,
    path: String,
    id_field: String,
}

impl DelegateScope {
    fn query(&self, request: &PageRequest<Vec<WhereClause>>, filters: Vec<WhereClause>) -> DocsQuery {
        DocsQuery {
            path: self.path.clone(),
            id_field: Some(self.id_field.clone()),
            filters,
            order_by: request.order_by.clone(),
            limit: request.limit,
            start_after: request.start_after.clone(),
        }
    }

    fn document_path(&self, id: &str) -> String {
        DocPath::new(&self.path, id).to_string()
    }
}

impl DocsDelegate {
    /// Binds `service` to the collection at `path`, using the store's id field.
    pub fn new(service: QueryService, path: &str) -> Self {
        let id_field = service.store().config().id_field().to_string();
        DocsDelegate {
            scope: DelegateScope {
                service,
                path: path.to_string(),
                id_field,
            },
            constraint: None,
        }
    }

    pub fn id_field(mut self, id_field: &str) -> Self {
        self.scope.id_field = id_field.to_string();
        self
    }

    pub fn constrained_by(mut self, constraint: ConstraintSource) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn path(&self) -> &str {
        &self.scope.path
    }

    pub fn value_changes(
        &self,
        request: PageRequest<Vec<WhereClause>>,
        observer: impl Observer<Vec<Document>> + 'static,
    ) -> DocsResult<Subscription> {
        self.switch_where(request, |documents: Vec<Document>| documents, Vec::new(), Arc::new(observer))
    }

    pub fn count(
        &self,
        request: PageRequest<Vec<WhereClause>>,
        observer: impl Observer<usize> + 'static,
    ) -> DocsResult<Subscription> {
        self.switch_where(request, |documents: Vec<Document>| documents.len(), 0, Arc::new(observer))
    }

    pub fn create(&self, document: Document) -> DocsResult<String> {
        self.scope.service.create(&self.scope.path, document)
    }

    pub fn update_by_id(
        &self,
        id: &str,
        partial: Option<&Document>,
        array_union: Option<&ArrayUnion>,
    ) -> DocsResult<()> {
        self.scope
            .service
            .update_by_id(&self.scope.document_path(id), partial, array_union)
    }

    pub fn replace_by_id(&self, id: &str, document: Document) -> DocsResult<()> {
        self.scope
            .service
            .replace_by_id(&self.scope.document_path(id), document)
    }

    pub fn delete_by_id(&self, id: &str) -> DocsResult<()> {
        self.scope.service.delete_by_id(&self.scope.document_path(id))
    }

    fn switch_where<T: Clone + Send + Sync + 'static>(
        &self,
        request: PageRequest<Vec<WhereClause>>,
        project: fn(Vec<Document>) -> T,
        if_none: T,
        observer: SharedObserver<T>,
    ) -> DocsResult<Subscription> {
        let Some(constraint) = &self.constraint else {
            let filters = request.constraint.clone().unwrap_or_default();
            let query = self.scope.query(&request, filters);
            return self.scope.service.watch(query, project, observer);
        };

        let active = Arc::new(AtomicBool::new(true));
        let current: Atomic<Option<Subscription>> = atomic(None);

        let scope = self.scope.clone();
        let slot = current.clone();
        let switch_active = active.clone();
        let outer = constraint.subscribe(move |filters: Option<Vec<WhereClause>>| {
            let previous = slot.write_with(|inner| inner.take());
            drop(previous);
            if !switch_active.load(Ordering::SeqCst) {
                return;
            }

            match filters {
                None => {
                    log::trace!("Constraint on {} cleared", scope.path);
                    observer(Ok(if_none.clone()));
                }
                Some(filters) => {
                    let query = scope.query(&request, filters);
                    match scope.service.watch(query, project, observer.clone()) {
                        Ok(inner) => {
                            if switch_active.load(Ordering::SeqCst) {
                                slot.write_with(|current| *current = Some(inner));
                            }
                        }
                        Err(e) => observer(Err(e)),
                    }
                }
            }
        })?;

        Ok(Subscription::new(active, move || {
            drop(outer);
            let inner = current.write_with(|inner| inner.take());
            drop(inner);
        }))
    }
}

impl TableDataService for DocsDelegate {
    type Constraint = Vec<WhereClause>;

    fn value_changes(
        &self,
        request: PageRequest<Vec<WhereClause>>,
        observer: SharedObserver<Vec<Document>>,
    ) -> DocsResult<Subscription> {
        self.switch_where(request, |documents: Vec<Document>| documents, Vec::new(), observer)
    }

    fn count(&self, request: PageRequest<Vec<WhereClause>>, observer: SharedObserver<usize>) -> DocsResult<Subscription> {
        self.switch_where(request, |documents: Vec<Document>| documents.len(), 0, observer)
    }
}
