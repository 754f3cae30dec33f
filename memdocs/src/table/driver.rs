use crate::collection::Document;
use crate::common::{atomic, Atomic, Observer, SharedObserver, Subject, Subscription, WriteExecutor};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use crate::query::OrderBy;
use crate::table::{PageEvent, PageRequest, Paginator, SortState, Sorter, TableDataService};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Drives a paged, sorted table view over a [TableDataService].
///
/// The driver combines three event sources: a [Paginator], a [Sorter] and,
/// optionally, a constraint [Subject]. Every event from any of them issues
/// exactly one page request and the previous request is cancelled.
///
/// Pages are fetched with cursors. After a page arrives, its last row is
/// remembered as the `start_after` cursor of the page that follows it, so
/// moving forward one page never reads the rows before it again. A page
/// without a remembered cursor starts from the first row.
///
/// A new sort, a new page size or a new constraint value forgets every
/// remembered cursor and rewinds the paginator to the first page without
/// publishing a second event.
///
/// With a constraint source attached, nothing is requested until the source
/// has produced its first value.
///
/// ```rust
/// use memdocs::collection::Document;
/// use memdocs::doc;
/// use memdocs::errors::DocsResult;
/// use memdocs::query::{DocsDelegate, QueryService};
/// use memdocs::store::StoreBuilder;
/// use memdocs::table::{PaginationDriver, Paginator, Sorter};
/// use std::sync::{Arc, Mutex};
///
/// let rows = (0..5).map(|i| doc! { "id": (i.to_string()) }).collect();
/// let store = StoreBuilder::new().documents("/rows", rows).open().unwrap();
/// let delegate = DocsDelegate::new(QueryService::new(store), "/rows");
///
/// let paginator = Paginator::new(2);
/// let driver = PaginationDriver::new(delegate)
///     .paginator(paginator.clone())
///     .sorter(Sorter::new());
///
/// let pages = Arc::new(Mutex::new(Vec::new()));
/// let sink = pages.clone();
/// let _connection = driver
///     .connect(move |page: DocsResult<Vec<Document>>| sink.lock().unwrap().push(page.unwrap().len()))
///     .unwrap();
/// assert_eq!(*pages.lock().unwrap(), vec![2]);
/// ```
pub struct PaginationDriver<S: TableDataService> {
    service: S,
    paginator: Option<Paginator>,
    sorter: Option<Sorter>,
    constraint: Option<Subject<S::Constraint>>,
}

impl<S: TableDataService> PaginationDriver<S> {
    pub fn new(service: S) -> Self {
        PaginationDriver {
            service,
            paginator: None,
            sorter: None,
            constraint: None,
        }
    }

    pub fn paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = Some(paginator);
        self
    }

    pub fn sorter(mut self, sorter: Sorter) -> Self {
        self.sorter = Some(sorter);
        self
    }

    pub fn constraint(mut self, constraint: Subject<S::Constraint>) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Starts streaming pages to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ConfigurationError] unless both a paginator and
    /// a sorter are attached.
    pub fn connect(&self, observer: impl Observer<Vec<Document>> + 'static) -> DocsResult<Subscription> {
        let (Some(paginator), Some(sorter)) = (&self.paginator, &self.sorter) else {
            log::error!("Pagination driver needs a paginator and a sorter before connecting");
            return Err(DocsError::new(
                "driver not fully configured",
                ErrorKind::ConfigurationError,
            ));
        };

        let active = Arc::new(AtomicBool::new(true));
        let view = Arc::new(TableView {
            service: self.service.clone(),
            paginator: paginator.clone(),
            observer: Arc::new(observer),
            active: active.clone(),
            cursor: Mutex::new(PageCursorState::new(self.constraint.is_some())),
        });

        let mut sources = Vec::with_capacity(3);
        let weak = Arc::downgrade(&view);
        sources.push(paginator.subscribe(move |event: PageEvent| {
            if let Some(view) = TableView::upgrade(&weak, "page") {
                view.on_page(event);
            }
        })?);

        let weak = Arc::downgrade(&view);
        sources.push(sorter.subscribe(move |state: SortState| {
            if let Some(view) = TableView::upgrade(&weak, "sort") {
                view.on_sort(state);
            }
        })?);

        if let Some(constraint) = &self.constraint {
            let weak = Arc::downgrade(&view);
            sources.push(constraint.subscribe(move |value: S::Constraint| {
                if let Some(view) = TableView::upgrade(&weak, "constraint") {
                    view.on_constraint(value);
                }
            })?);
        }

        view.cursor.lock().connected = true;
        view.issue();

        Ok(Subscription::new(active, move || {
            drop(sources);
            view.disconnect();
        }))
    }

    /// Streams the total row count for the current constraint.
    ///
    /// Paging and sorting do not affect the count. With a constraint source
    /// attached, the count follows its values and starts with the first one.
    pub fn count(&self, observer: impl Observer<usize> + 'static) -> DocsResult<Subscription> {
        let observer: SharedObserver<usize> = Arc::new(observer);
        let Some(constraint) = &self.constraint else {
            return self.service.count(PageRequest::new(), observer);
        };

        let active = Arc::new(AtomicBool::new(true));
        let current: Atomic<Option<Subscription>> = atomic(None);

        let service = self.service.clone();
        let slot = current.clone();
        let switch_active = active.clone();
        let source = constraint.subscribe(move |value: S::Constraint| {
            let previous = slot.write_with(|inner| inner.take());
            drop(previous);
            if !switch_active.load(Ordering::SeqCst) {
                return;
            }
            match service.count(PageRequest::new().constraint(value), observer.clone()) {
                Ok(inner) => {
                    if switch_active.load(Ordering::SeqCst) {
                        slot.write_with(|current| *current = Some(inner));
                    }
                }
                Err(e) => observer(Err(e)),
            }
        })?;

        Ok(Subscription::new(active, move || {
            drop(source);
            let inner = current.write_with(|inner| inner.take());
            drop(inner);
        }))
    }
}

/// Cursor bookkeeping of one connected view.
struct PageCursorState<C> {
    page: Option<PageEvent>,
    sort: Option<SortState>,
    constraint: Option<C>,
    awaits_constraint: bool,
    // page index -> last row of the page before it
    last_row: HashMap<usize, Document>,
    current: Option<Subscription>,
    generation: u64,
    connected: bool,
}

impl<C> PageCursorState<C> {
    fn new(awaits_constraint: bool) -> Self {
        PageCursorState {
            page: None,
            sort: None,
            constraint: None,
            awaits_constraint,
            last_row: HashMap::new(),
            current: None,
            generation: 0,
            connected: false,
        }
    }
}

struct TableView<S: TableDataService> {
    service: S,
    paginator: Paginator,
    observer: SharedObserver<Vec<Document>>,
    active: Arc<AtomicBool>,
    cursor: Mutex<PageCursorState<S::Constraint>>,
}

impl<S: TableDataService> TableView<S> {
    fn upgrade(weak: &Weak<TableView<S>>, source: &str) -> Option<Arc<TableView<S>>> {
        match weak.upgrade() {
            Some(view) if view.active.load(Ordering::SeqCst) => Some(view),
            _ => {
                log::warn!("Ignoring {} event for a disconnected table view", source);
                None
            }
        }
    }

    fn on_page(self: &Arc<Self>, mut event: PageEvent) {
        {
            let mut cursor = self.cursor.lock();
            let resized = cursor
                .page
                .map(|previous| previous.page_size != event.page_size)
                .unwrap_or(false);
            if resized {
                log::debug!("Page size changed to {}, returning to first page", event.page_size);
                cursor.last_row.clear();
                if event.page_index != 0 {
                    self.paginator.rewind_silently();
                    event.page_index = 0;
                }
            }
            cursor.page = Some(event);
        }
        self.issue();
    }

    fn on_sort(self: &Arc<Self>, state: SortState) {
        {
            let mut cursor = self.cursor.lock();
            self.rewind(&mut cursor);
            cursor.sort = Some(state);
        }
        self.issue();
    }

    fn on_constraint(self: &Arc<Self>, value: S::Constraint) {
        {
            let mut cursor = self.cursor.lock();
            self.rewind(&mut cursor);
            cursor.constraint = Some(value);
        }
        self.issue();
    }

    fn rewind(&self, cursor: &mut PageCursorState<S::Constraint>) {
        cursor.last_row.clear();
        if let Some(page) = cursor.page.as_mut() {
            if page.page_index != 0 {
                self.paginator.rewind_silently();
                page.previous_page_index = page.page_index;
                page.page_index = 0;
            }
        }
    }

    /// Replaces the in-flight request with one for the current state.
    fn issue(self: &Arc<Self>) {
        let (request, page_index, generation, previous) = {
            let mut cursor = self.cursor.lock();
            if !cursor.connected {
                return;
            }
            let (Some(page), Some(sort)) = (cursor.page, cursor.sort.clone()) else {
                return;
            };
            if cursor.awaits_constraint && cursor.constraint.is_none() {
                log::trace!("Table view waits for its first constraint");
                return;
            }

            cursor.generation += 1;
            let request = PageRequest {
                constraint: cursor.constraint.clone(),
                order_by: order_of(&sort),
                limit: Some(page.page_size),
                start_after: cursor.last_row.get(&page.page_index).cloned(),
            };
            (request, page.page_index, cursor.generation, cursor.current.take())
        };
        drop(previous);

        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        log::debug!("Requesting page {} (generation {})", page_index, generation);
        match self.service.value_changes(request, self.page_observer(page_index, generation)) {
            Ok(subscription) => {
                let stale = {
                    let mut cursor = self.cursor.lock();
                    if cursor.generation == generation && self.active.load(Ordering::SeqCst) {
                        cursor.current = Some(subscription);
                        None
                    } else {
                        Some(subscription)
                    }
                };
                drop(stale);
            }
            Err(e) => (self.observer)(Err(e)),
        }
    }

    fn page_observer(self: &Arc<Self>, page_index: usize, generation: u64) -> SharedObserver<Vec<Document>> {
        let weak = Arc::downgrade(self);
        Arc::new(move |result: DocsResult<Vec<Document>>| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            if !view.active.load(Ordering::SeqCst) {
                return;
            }
            {
                let mut cursor = view.cursor.lock();
                if cursor.generation != generation {
                    return;
                }
                if let Ok(rows) = &result {
                    match rows.last() {
                        Some(last) => cursor.last_row.insert(page_index + 1, last.clone()),
                        None => cursor.last_row.remove(&(page_index + 1)),
                    };
                }
            }
            (view.observer)(result);
        })
    }

    fn disconnect(&self) {
        let current = self.cursor.lock().current.take();
        drop(current);
        log::trace!("Table view disconnected");
    }
}

fn order_of(sort: &SortState) -> Vec<OrderBy> {
    match &sort.active {
        Some(field) => vec![OrderBy::new(field, sort.direction)],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SortOrder, Value};
    use crate::doc;
    use crate::filter::{field, WhereClause};
    use crate::query::{DocsDelegate, QueryService};
    use crate::search::{ScopedSearch, SearchFilter, SearchQuery, SearchService};
    use crate::store::StoreBuilder;
    use std::time::Duration;

    type Requests = Arc<Mutex<Vec<PageRequest<Vec<WhereClause>>>>>;

    #[derive(Clone)]
    struct RecordingService {
        inner: DocsDelegate,
        requests: Requests,
    }

    impl TableDataService for RecordingService {
        type Constraint = Vec<WhereClause>;

        fn value_changes(
            &self,
            request: PageRequest<Vec<WhereClause>>,
            observer: SharedObserver<Vec<Document>>,
        ) -> DocsResult<Subscription> {
            self.requests.lock().push(request.clone());
            TableDataService::value_changes(&self.inner, request, observer)
        }

        fn count(
            &self,
            request: PageRequest<Vec<WhereClause>>,
            observer: SharedObserver<usize>,
        ) -> DocsResult<Subscription> {
            TableDataService::count(&self.inner, request, observer)
        }
    }

    fn query_service() -> QueryService {
        let rows = (0..5)
            .map(|i| doc! { "id": (i.to_string()), "name": (format!("r{}", i)), "tag": (if i % 2 == 0 { "x" } else { "y" }) })
            .collect();
        let store = StoreBuilder::new()
            .create_latency(Duration::ZERO)
            .documents("/rows", rows)
            .open()
            .unwrap();
        QueryService::new(store)
    }

    fn recording() -> (RecordingService, Requests) {
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let service = RecordingService {
            inner: DocsDelegate::new(query_service(), "/rows"),
            requests: requests.clone(),
        };
        (service, requests)
    }

    type Pages = Arc<Mutex<Vec<Vec<String>>>>;

    fn page_recorder() -> (Pages, impl Observer<Vec<Document>> + 'static) {
        let pages: Pages = Arc::new(Mutex::new(Vec::new()));
        let sink = pages.clone();
        let observer = move |result: DocsResult<Vec<Document>>| {
            let names = result
                .unwrap()
                .iter()
                .filter_map(|d| d.get("name").and_then(Value::as_string).cloned())
                .collect();
            sink.lock().push(names);
        };
        (pages, observer)
    }

    fn wait_for(pages: &Pages, count: usize) {
        awaitility::at_most(Duration::from_secs(2)).until(|| pages.lock().len() >= count);
    }

    fn last(pages: &Pages) -> Vec<String> {
        pages.lock().last().cloned().unwrap_or_default()
    }

    #[test]
    fn test_requires_paginator_and_sorter() {
        let (service, _) = recording();
        let err = PaginationDriver::new(service.clone())
            .sorter(Sorter::new())
            .connect(|_: DocsResult<Vec<Document>>| {})
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);

        let err = PaginationDriver::new(service)
            .paginator(Paginator::new(2))
            .connect(|_: DocsResult<Vec<Document>>| {})
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_forward_paging_uses_cached_cursors() {
        let (service, requests) = recording();
        let paginator = Paginator::new(2);
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(Sorter::new());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        paginator.next_page().unwrap();
        wait_for(&pages, 3);

        assert_eq!(
            *pages.lock(),
            vec![vec!["r0", "r1"], vec!["r2", "r3"], vec!["r4"]]
                .into_iter()
                .map(|p| p.into_iter().map(String::from).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
        let cursors: Vec<Option<Document>> = requests.lock().iter().map(|r| r.start_after.clone()).collect();
        assert_eq!(cursors.len(), 3);
        assert_eq!(cursors[0], None);
        assert_eq!(cursors[1].as_ref().and_then(Document::id), Some("1".to_string()));
        assert_eq!(cursors[2].as_ref().and_then(Document::id), Some("3".to_string()));
        assert!(requests.lock().iter().all(|r| r.limit == Some(2) && r.order_by.is_empty()));
    }

    #[test]
    fn test_previous_page_reuses_cursor() {
        let (service, _) = recording();
        let paginator = Paginator::new(2);
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(Sorter::new());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        paginator.next_page().unwrap();
        wait_for(&pages, 3);
        paginator.previous_page().unwrap();
        wait_for(&pages, 4);
        assert_eq!(last(&pages), vec!["r2", "r3"]);
    }

    #[test]
    fn test_sort_change_rewinds_with_one_request() {
        let (service, requests) = recording();
        let paginator = Paginator::new(2);
        let sorter = Sorter::new();
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(sorter.clone());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        sorter.sort_by("name", SortOrder::Descending).unwrap();
        wait_for(&pages, 3);

        assert_eq!(paginator.page_index(), 0);
        assert_eq!(last(&pages), vec!["r4", "r3"]);
        let requests = requests.lock();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].order_by, vec![OrderBy::new("name", SortOrder::Descending)]);
        assert_eq!(requests[2].start_after, None);
    }

    #[test]
    fn test_page_size_change_resets_cursors() {
        let (service, requests) = recording();
        let paginator = Paginator::new(2);
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(Sorter::new());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        paginator.set_page_size(3).unwrap();
        wait_for(&pages, 3);

        assert_eq!(last(&pages), vec!["r0", "r1", "r2"]);
        let requests = requests.lock();
        assert_eq!(requests[2].limit, Some(3));
        assert_eq!(requests[2].start_after, None);
    }

    #[test]
    fn test_waits_for_first_constraint() {
        let (service, requests) = recording();
        let constraint = Subject::new();
        let driver = PaginationDriver::new(service)
            .paginator(Paginator::new(2))
            .sorter(Sorter::new())
            .constraint(constraint.clone());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();
        assert!(pages.lock().is_empty());
        assert!(requests.lock().is_empty());

        constraint.next(vec![field("tag").eq("x")]).unwrap();
        wait_for(&pages, 1);
        assert_eq!(last(&pages), vec!["r0", "r2"]);
        assert_eq!(requests.lock().len(), 1);
    }

    #[test]
    fn test_constraint_change_rewinds() {
        let (service, _) = recording();
        let paginator = Paginator::new(1);
        let constraint = Subject::with_value(vec![field("tag").eq("y")]);
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(Sorter::new())
            .constraint(constraint.clone());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();
        assert_eq!(last(&pages), vec!["r1"]);

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        assert_eq!(last(&pages), vec!["r3"]);

        constraint.next(vec![field("tag").eq("x")]).unwrap();
        wait_for(&pages, 3);
        assert_eq!(paginator.page_index(), 0);
        assert_eq!(last(&pages), vec!["r0"]);
    }

    #[test]
    fn test_current_page_follows_changes() {
        let (service, _) = recording();
        let delegate = service.inner.clone();
        let driver = PaginationDriver::new(service)
            .paginator(Paginator::new(2))
            .sorter(Sorter::new());
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();

        delegate.delete_by_id("0").unwrap();
        wait_for(&pages, 2);
        assert_eq!(last(&pages), vec!["r1", "r2"]);
    }

    #[test]
    fn test_disconnect_stops_pages() {
        let (service, _) = recording();
        let delegate = service.inner.clone();
        let paginator = Paginator::new(2);
        let driver = PaginationDriver::new(service)
            .paginator(paginator.clone())
            .sorter(Sorter::new());
        let (pages, observer) = page_recorder();
        let mut connection = driver.connect(observer).unwrap();
        connection.unsubscribe();

        paginator.next_page().unwrap();
        delegate.delete_by_id("1").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pages.lock().len(), 1);
    }

    #[test]
    fn test_count_follows_constraint() {
        let (service, _) = recording();
        let constraint = Subject::with_value(vec![field("tag").eq("x")]);
        let driver = PaginationDriver::new(service)
            .paginator(Paginator::new(2))
            .sorter(Sorter::new())
            .constraint(constraint.clone());
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let _subscription = driver
            .count(move |count: DocsResult<usize>| sink.lock().push(count.unwrap()))
            .unwrap();

        constraint.next(vec![field("tag").eq("y")]).unwrap();
        awaitility::at_most(Duration::from_secs(2)).until(|| counts.lock().len() == 2);
        assert_eq!(*counts.lock(), vec![3, 2]);
    }

    #[test]
    fn test_drives_search_tables() {
        let search = ScopedSearch::new(SearchService::new(query_service()), "/rows");
        let paginator = Paginator::new(2);
        let query = Subject::with_value(SearchQuery::new(SearchFilter::new("x").column("tag").keyword()));
        let driver = PaginationDriver::new(search)
            .paginator(paginator.clone())
            .sorter(Sorter::with_state(SortState::new("name", SortOrder::Descending)))
            .constraint(query);
        let (pages, observer) = page_recorder();
        let _connection = driver.connect(observer).unwrap();
        assert_eq!(last(&pages), vec!["r4", "r2"]);

        paginator.next_page().unwrap();
        wait_for(&pages, 2);
        assert_eq!(last(&pages), vec!["r0"]);
    }
}
