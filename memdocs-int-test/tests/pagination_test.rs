use memdocs::collection::Document;
use memdocs::common::{SortOrder, Subject, Value};
use memdocs::errors::{DocsResult, ErrorKind};
use memdocs::filter::{field, WhereClause};
use memdocs::query::DocsDelegate;
use memdocs::search::{ScopedSearch, SearchFilter, SearchQuery, SearchService};
use memdocs::table::{PaginationDriver, Paginator, SortState, Sorter};
use memdocs_int_test::test_util::{cleanup, create_test_context, run_test, wait_until, ROWS};
use std::sync::{Arc, Mutex};

#[ctor::ctor]
fn init() {
    colog::init();
}

type Pages = Arc<Mutex<Vec<Vec<String>>>>;

fn recorder() -> (Pages, impl Fn(DocsResult<Vec<Document>>) + Send + Sync + 'static) {
    let pages: Pages = Arc::new(Mutex::new(Vec::new()));
    let sink = pages.clone();
    let observer = move |result: DocsResult<Vec<Document>>| {
        let names = result
            .unwrap()
            .iter()
            .filter_map(|d| d.get("name").and_then(Value::as_string).cloned())
            .collect();
        sink.lock().unwrap().push(names);
    };
    (pages, observer)
}

fn snapshot(pages: &Pages) -> Vec<Vec<String>> {
    pages.lock().unwrap().clone()
}

#[test]
fn test_pages_of_two_over_five_rows() {
    run_test(
        || create_test_context(),
        |ctx| {
            let paginator = Paginator::new(2);
            let driver = PaginationDriver::new(DocsDelegate::new(ctx.service(), ROWS))
                .paginator(paginator.clone())
                .sorter(Sorter::with_state(SortState::new("rank", SortOrder::Ascending)));
            let (pages, observer) = recorder();
            let _connection = driver.connect(observer)?;

            paginator.next_page()?;
            wait_until(|| pages.lock().unwrap().len() == 2);
            paginator.next_page()?;
            wait_until(|| pages.lock().unwrap().len() == 3);

            assert_eq!(
                snapshot(&pages),
                vec![
                    vec!["r0".to_string(), "r1".to_string()],
                    vec!["r2".to_string(), "r3".to_string()],
                    vec!["r4".to_string()],
                ]
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unconfigured_driver() {
    run_test(
        || create_test_context(),
        |ctx| {
            let driver = PaginationDriver::new(DocsDelegate::new(ctx.service(), ROWS));
            let err = driver.connect(|_: DocsResult<Vec<Document>>| {}).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_filter_and_sort_changes_rewind() {
    run_test(
        || create_test_context(),
        |ctx| {
            let paginator = Paginator::new(2);
            let sorter = Sorter::new();
            let constraint: Subject<Vec<WhereClause>> = Subject::new();
            let driver = PaginationDriver::new(DocsDelegate::new(ctx.service(), ROWS))
                .paginator(paginator.clone())
                .sorter(sorter.clone())
                .constraint(constraint.clone());
            let (pages, observer) = recorder();
            let _connection = driver.connect(observer)?;
            assert!(pages.lock().unwrap().is_empty());

            constraint.next(vec![field("tag").eq("x")])?;
            wait_until(|| pages.lock().unwrap().len() == 1);
            paginator.next_page()?;
            wait_until(|| pages.lock().unwrap().len() == 2);
            assert_eq!(snapshot(&pages)[1], vec!["r4".to_string()]);

            sorter.sort_by("rank", SortOrder::Descending)?;
            wait_until(|| pages.lock().unwrap().len() == 3);
            assert_eq!(paginator.page_index(), 0);
            assert_eq!(snapshot(&pages)[2], vec!["r4".to_string(), "r2".to_string()]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_search_table() {
    run_test(
        || create_test_context(),
        |ctx| {
            let search = ScopedSearch::new(SearchService::new(ctx.service()), ROWS);
            let paginator = Paginator::new(2);
            let query = Subject::with_value(SearchQuery::new(SearchFilter::new("r").column("name")));
            let driver = PaginationDriver::new(search)
                .paginator(paginator.clone())
                .sorter(Sorter::with_state(SortState::new("rank", SortOrder::Descending)))
                .constraint(query.clone());
            let (pages, observer) = recorder();
            let _connection = driver.connect(observer)?;
            assert_eq!(snapshot(&pages)[0], vec!["r4".to_string(), "r3".to_string()]);

            paginator.next_page()?;
            wait_until(|| pages.lock().unwrap().len() == 2);
            assert_eq!(snapshot(&pages)[1], vec!["r2".to_string(), "r1".to_string()]);

            query.next(SearchQuery::new(SearchFilter::new("r0").keyword()))?;
            wait_until(|| pages.lock().unwrap().len() == 3);
            assert_eq!(snapshot(&pages)[2], vec!["r0".to_string()]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
