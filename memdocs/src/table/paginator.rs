use crate::common::{SortOrder, Subject, Subscription};
use crate::errors::DocsResult;

/// State of a paginator after a page change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    pub page_index: usize,
    pub page_size: usize,
    pub previous_page_index: usize,
}

/// Page position of a table view.
///
/// Every move publishes a [PageEvent]; subscribers get the current one
/// immediately. Clones share state.
#[derive(Debug, Clone)]
pub struct Paginator {
    events: Subject<PageEvent>,
}

impl Paginator {
    /// A paginator on the first page. A page size of zero puts every row
    /// on one page.
    pub fn new(page_size: usize) -> Self {
        Paginator {
            events: Subject::with_value(PageEvent {
                page_index: 0,
                page_size,
                previous_page_index: 0,
            }),
        }
    }

    pub fn page_index(&self) -> usize {
        self.current().page_index
    }

    pub fn page_size(&self) -> usize {
        self.current().page_size
    }

    pub fn next_page(&self) -> DocsResult<()> {
        let current = self.current();
        self.move_to(current.page_index + 1, current.page_size)
    }

    /// Moves back one page. Does nothing on the first page.
    pub fn previous_page(&self) -> DocsResult<()> {
        let current = self.current();
        if current.page_index == 0 {
            return Ok(());
        }
        self.move_to(current.page_index - 1, current.page_size)
    }

    pub fn first_page(&self) -> DocsResult<()> {
        self.move_to(0, self.page_size())
    }

    /// Changes the page size and returns to the first page. Zero puts every
    /// row on one page.
    pub fn set_page_size(&self, page_size: usize) -> DocsResult<()> {
        self.move_to(0, page_size)
    }

    pub fn subscribe(&self, on_page: impl Fn(PageEvent) + Send + Sync + 'static) -> DocsResult<Subscription> {
        self.events.subscribe(on_page)
    }

    /// Rewinds to the first page without publishing.
    pub(crate) fn rewind_silently(&self) {
        let current = self.current();
        self.events.set_silently(PageEvent {
            page_index: 0,
            page_size: current.page_size,
            previous_page_index: current.page_index,
        });
    }

    fn move_to(&self, page_index: usize, page_size: usize) -> DocsResult<()> {
        let previous = self.current();
        self.events.next(PageEvent {
            page_index,
            page_size,
            previous_page_index: previous.page_index,
        })
    }

    fn current(&self) -> PageEvent {
        // always seeded in new()
        self.events.value().unwrap_or(PageEvent {
            page_index: 0,
            page_size: 0,
            previous_page_index: 0,
        })
    }
}

/// The active sort column of a table view. No column means unsorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    pub active: Option<String>,
    pub direction: SortOrder,
}

impl SortState {
    pub fn new(active: &str, direction: SortOrder) -> Self {
        SortState {
            active: Some(active.to_string()),
            direction,
        }
    }
}

/// Sort selection of a table view, published as [SortState] events.
#[derive(Debug, Clone)]
pub struct Sorter {
    events: Subject<SortState>,
}

impl Sorter {
    /// An unsorted sorter.
    pub fn new() -> Self {
        Sorter {
            events: Subject::with_value(SortState::default()),
        }
    }

    pub fn with_state(state: SortState) -> Self {
        Sorter {
            events: Subject::with_value(state),
        }
    }

    pub fn state(&self) -> SortState {
        self.events.value().unwrap_or_default()
    }

    pub fn sort_by(&self, active: &str, direction: SortOrder) -> DocsResult<()> {
        self.events.next(SortState::new(active, direction))
    }

    pub fn clear(&self) -> DocsResult<()> {
        self.events.next(SortState::default())
    }

    pub fn subscribe(&self, on_sort: impl Fn(SortState) + Send + Sync + 'static) -> DocsResult<Subscription> {
        self.events.subscribe(on_sort)
    }
}

impl Default for Sorter {
    fn default() -> Self {
        Self::new()
    }
}
