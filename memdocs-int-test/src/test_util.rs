use fake::faker::name::en::Name;
use fake::Fake;
use memdocs::collection::Document;
use memdocs::doc;
use memdocs::errors::DocsResult;
use memdocs::query::QueryService;
use memdocs::store::{DocumentStore, Fixture, StoreBuilder};
use std::backtrace::Backtrace;
use std::thread;
use std::time::{Duration, Instant};

pub const ITEMS: &str = "/items";
pub const ROWS: &str = "/rows";

/// Runs a test between a setup and a teardown, retrying a failed attempt.
///
/// Live queries deliver later emissions from the event bus, so a few tests
/// wait on timing; a failure is reported only after every attempt failed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocsResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocsResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocsResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            let ctx = before().map_err(|e| (format!("Before run failed: {:?}", e), backtrace.to_string()))?;
            match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            }
        });

        let elapsed = start_time.elapsed();
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    eprintln!("Backtrace:\n{}", bt);
                }
                e
            }
            Err(panic_err) => {
                if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Panic: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Panic: {}", s)
                } else {
                    "Panic: unknown payload".to_string()
                }
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", error);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    store: DocumentStore,
}

impl TestContext {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> DocumentStore {
        self.store.clone()
    }

    pub fn service(&self) -> QueryService {
        QueryService::new(self.store.clone())
    }
}

/// The two-item collection most scenarios start from.
pub fn items_fixture() -> Fixture {
    let mut fixture = Fixture::new();
    fixture.insert("items", "0", doc! { "id": "0", "name": "a", "tag": "x" });
    fixture.insert("items", "1", doc! { "id": "1", "name": "b", "tag": "y" });
    fixture
}

/// `count` rows with ids `0..count`, names `r0..`, a generated `owner` and
/// a `tag` alternating between `x` and `y`.
pub fn rows(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let owner: String = Name().fake();
            doc! {
                "id": (i.to_string()),
                "name": (format!("r{}", i)),
                "owner": owner,
                "rank": i,
                "tag": (if i % 2 == 0 { "x" } else { "y" }),
            }
        })
        .collect()
}

pub fn create_test_context() -> DocsResult<TestContext> {
    let store = StoreBuilder::new()
        .create_latency(Duration::ZERO)
        .fixture(items_fixture())
        .documents(ROWS, rows(5))
        .open()?;
    Ok(TestContext::new(store))
}

/// Like [create_test_context], keeping a real creation delay.
pub fn create_delayed_test_context(latency: Duration) -> DocsResult<TestContext> {
    let store = StoreBuilder::new()
        .create_latency(latency)
        .fixture(items_fixture())
        .open()?;
    Ok(TestContext::new(store))
}

pub fn cleanup(ctx: TestContext) -> DocsResult<()> {
    ctx.store().close()
}

pub fn wait_until<F: Fn() -> bool>(check: F) {
    awaitility::at_most(Duration::from_secs(5)).until(check);
}
