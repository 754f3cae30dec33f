use crate::collection::Document;
use crate::common::{SharedObserver, SortOrder, Subscription};
use crate::errors::DocsResult;
use crate::query::OrderBy;

/// One page worth of query arguments, independent of the backing service.
///
/// `constraint` is the service specific filter: where clauses for a
/// [DocsDelegate](crate::query::DocsDelegate), a search query for a
/// [ScopedSearch](crate::search::ScopedSearch).
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest<C> {
    pub constraint: Option<C>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<Document>,
}

impl<C> Default for PageRequest<C> {
    fn default() -> Self {
        PageRequest {
            constraint: None,
            order_by: Vec::new(),
            limit: None,
            start_after: None,
        }
    }
}

impl<C> PageRequest<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraint(mut self, constraint: C) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn sort_by(mut self, field: &str, direction: SortOrder) -> Self {
        self.order_by.push(OrderBy::new(field, direction));
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

/// A source of live, pageable rows for a table view.
///
/// Both methods emit on the calling thread before returning, then again
/// whenever the underlying collection changes, until the returned
/// [Subscription] is cancelled.
pub trait TableDataService: Clone + Send + Sync + 'static {
    type Constraint: Clone + Send + Sync + 'static;

    fn value_changes(
        &self,
        request: PageRequest<Self::Constraint>,
        observer: SharedObserver<Vec<Document>>,
    ) -> DocsResult<Subscription>;

    fn count(&self, request: PageRequest<Self::Constraint>, observer: SharedObserver<usize>) -> DocsResult<Subscription>;
}
