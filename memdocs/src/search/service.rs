use crate::collection::Document;
use crate::common::{Observer, SharedObserver, Subscription};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use crate::query::{limit_documents, skip_through, sort_documents, DocsQuery, QueryService};
use crate::search::{SearchParameters, SearchQuery};
use crate::table::{PageRequest, TableDataService};
use std::sync::Arc;

/// Client-side text search over the collections of a [QueryService].
///
/// The whole index is read through a live query and every record is
/// matched in memory, so results follow the collection as it changes.
/// Matches are ordered by the parameters' `order_by`, then sliced just
/// after the `start_after` cursor and truncated to `limit`.
#[derive(Clone)]
pub struct SearchService {
    service: QueryService,
}

impl SearchService {
    pub fn new(service: QueryService) -> Self {
        SearchService { service }
    }

    pub fn service(&self) -> &QueryService {
        &self.service
    }

    /// Runs a search once against the current contents.
    pub fn get(&self, params: &SearchParameters) -> DocsResult<Vec<Document>> {
        let index = Self::index_of(params)?;
        let records = self.service.get(&DocsQuery::new(&index))?;
        Ok(page(params, matching(params, records)))
    }

    /// Streams the matching page as the index changes.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidOperation] right away if `params` names
    /// no index.
    pub fn value_changes(
        &self,
        params: SearchParameters,
        observer: impl Observer<Vec<Document>> + 'static,
    ) -> DocsResult<Subscription> {
        self.watch_page(params, Arc::new(observer))
    }

    /// Streams the number of matches; cursor and limit do not apply.
    pub fn count(&self, params: SearchParameters, observer: impl Observer<usize> + 'static) -> DocsResult<Subscription> {
        self.watch_count(params, Arc::new(observer))
    }

    fn watch_page(&self, params: SearchParameters, observer: SharedObserver<Vec<Document>>) -> DocsResult<Subscription> {
        let index = Self::index_of(&params)?;
        self.service.watch(
            DocsQuery::new(&index),
            move |records: Vec<Document>| page(&params, matching(&params, records)),
            observer,
        )
    }

    fn watch_count(&self, params: SearchParameters, observer: SharedObserver<usize>) -> DocsResult<Subscription> {
        let index = Self::index_of(&params)?;
        self.service.watch(
            DocsQuery::new(&index),
            move |records: Vec<Document>| matching(&params, records).len(),
            observer,
        )
    }

    fn index_of(params: &SearchParameters) -> DocsResult<String> {
        match &params.index {
            Some(index) => Ok(index.clone()),
            None => {
                log::error!("Search requires an index");
                Err(DocsError::new("Search requires an index", ErrorKind::InvalidOperation))
            }
        }
    }
}

fn matching(params: &SearchParameters, records: Vec<Document>) -> Vec<Document> {
    match &params.query {
        Some(query) => records.into_iter().filter(|r| query.matches(r)).collect(),
        None => records,
    }
}

fn page(params: &SearchParameters, mut matches: Vec<Document>) -> Vec<Document> {
    sort_documents(&mut matches, &params.order_by);
    let matches = match &params.start_after {
        Some(cursor) => skip_through(matches, cursor, params.id_field_name()),
        None => matches,
    };
    limit_documents(matches, params.limit)
}

/// A [SearchService] bound to one index, usable as a table source.
#[derive(Clone)]
pub struct ScopedSearch {
    search: SearchService,
    index: String,
    id_field: Option<String>,
}

impl ScopedSearch {
    pub fn new(search: SearchService, index: &str) -> Self {
        ScopedSearch {
            search,
            index: index.to_string(),
            id_field: None,
        }
    }

    pub fn id_field(mut self, id_field: &str) -> Self {
        self.id_field = Some(id_field.to_string());
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn parameters(&self, request: PageRequest<SearchQuery>) -> SearchParameters {
        SearchParameters {
            index: Some(self.index.clone()),
            query: request.constraint,
            order_by: request.order_by,
            limit: request.limit,
            start_after: request.start_after,
            id_field: self.id_field.clone(),
        }
    }
}

impl TableDataService for ScopedSearch {
    type Constraint = SearchQuery;

    fn value_changes(
        &self,
        request: PageRequest<SearchQuery>,
        observer: SharedObserver<Vec<Document>>,
    ) -> DocsResult<Subscription> {
        self.search.watch_page(self.parameters(request), observer)
    }

    fn count(&self, request: PageRequest<SearchQuery>, observer: SharedObserver<usize>) -> DocsResult<Subscription> {
        self.search.watch_count(self.parameters(request), observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SortOrder, Value};
    use crate::doc;
    use crate::query::OrderBy;
    use crate::search::SearchFilter;
    use crate::store::StoreBuilder;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn search() -> SearchService {
        let store = StoreBuilder::new()
            .create_latency(Duration::ZERO)
            .documents(
                "/people",
                vec![
                    doc! { "id": "0", "name": "Alice", "city": "Oslo" },
                    doc! { "id": "1", "name": "al", "city": "Bergen" },
                    doc! { "id": "2", "name": "Bob", "city": "Alesund" },
                    doc! { "id": "3", "name": "Carl", "city": "Oslo" },
                ],
            )
            .open()
            .unwrap();
        SearchService::new(QueryService::new(store))
    }

    fn names(documents: &[Document]) -> Vec<String> {
        documents
            .iter()
            .filter_map(|d| d.get("name").and_then(Value::as_string).cloned())
            .collect()
    }

    fn by_name() -> Vec<OrderBy> {
        vec![OrderBy::new("name", SortOrder::Ascending)]
    }

    #[test]
    fn test_substring_search_over_all_fields() {
        let params = SearchParameters::new("/people")
            .query(SearchQuery::new(SearchFilter::new("al")))
            .order_by(by_name());
        assert_eq!(names(&search().get(&params).unwrap()), vec!["Alice", "Bob", "Carl", "al"]);
    }

    #[test]
    fn test_keyword_search() {
        let params = SearchParameters::new("/people").query(SearchQuery::new(SearchFilter::new("al").keyword()));
        assert_eq!(names(&search().get(&params).unwrap()), vec!["al"]);
    }

    #[test]
    fn test_without_query_returns_everything() {
        let params = SearchParameters::new("/people");
        assert_eq!(search().get(&params).unwrap().len(), 4);
    }

    #[test]
    fn test_missing_index_is_invalid() {
        let search = search();
        let err = search.get(&SearchParameters::default()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = search
            .value_changes(SearchParameters::default(), |_: DocsResult<Vec<Document>>| {})
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_cursor_and_limit_apply_after_matching() {
        let params = SearchParameters::new("/people")
            .query(SearchQuery::new(SearchFilter::new("al")))
            .order_by(by_name())
            .start_after(doc! { "id": "0" })
            .limit(2);
        assert_eq!(names(&search().get(&params).unwrap()), vec!["Bob", "Carl"]);
    }

    #[test]
    fn test_count_ignores_cursor_and_limit() {
        let search = search();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        let params = SearchParameters::new("/people")
            .query(SearchQuery::new(SearchFilter::new("oslo").column("city")))
            .limit(1);
        let _subscription = search
            .count(params, move |count: DocsResult<usize>| sink.lock().push(count.unwrap()))
            .unwrap();
        assert_eq!(*counts.lock(), vec![2]);

        search
            .service()
            .create("/people", doc! { "name": "Dag", "city": "OSLO" })
            .unwrap();
        awaitility::at_most(Duration::from_secs(5)).until(|| counts.lock().len() == 2);
        assert_eq!(*counts.lock(), vec![2, 3]);
    }

    #[test]
    fn test_scoped_search_maps_page_request() {
        let scoped = ScopedSearch::new(search(), "/people");
        let pages = Arc::new(Mutex::new(Vec::new()));
        let sink = pages.clone();
        let request = PageRequest::new()
            .constraint(SearchQuery::new(SearchFilter::new("o")))
            .order_by(by_name())
            .limit(2);
        let _subscription = scoped
            .value_changes(
                request,
                Arc::new(move |result: DocsResult<Vec<Document>>| sink.lock().push(names(&result.unwrap()))),
            )
            .unwrap();
        assert_eq!(*pages.lock(), vec![vec!["Alice".to_string(), "Bob".to_string()]]);
    }
}
