use bson::Document;
use docscan::client::DocClient;
use docscan::client_builder::ClientConfigBuilder;
use docscan::collection::{
    Collection, CollectionProvider, DeleteResult, FindOptions, IndexSpec, InsertManyResult,
    InsertOneResult, UpdateResult,
};
use docscan::cursor::DocumentCursor;
use docscan::errors::{DocScanError, DocScanResult, ErrorKind};
use docscan::pool::ConnectionPool;
use docscan::store::memory::InMemoryConnector;
use docscan::store::StoreProvider;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const TEST_DB: &str = "test";
pub const TEST_COLLECTION: &str = "user";

/// Runs a test with retry logic and error handling.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocScanResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocScanResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocScanResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => {
                            Err((format!("After run failed: {:?}", e), backtrace.to_string()))
                        }
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = None;
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("{}", err_msg);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    pool: ConnectionPool,
    connector: Arc<InMemoryConnector>,
}

impl TestContext {
    pub fn new(pool: ConnectionPool, connector: Arc<InMemoryConnector>) -> Self {
        Self { pool, connector }
    }

    pub fn pool(&self) -> ConnectionPool {
        self.pool.clone()
    }

    /// Client on the test collection.
    pub fn client(&self) -> DocScanResult<DocClient> {
        self.pool.client(TEST_DB, TEST_COLLECTION)
    }

    pub fn collection(&self) -> DocScanResult<Collection> {
        self.pool.store()?.collection(TEST_DB, TEST_COLLECTION)
    }

    pub fn connect_count(&self) -> usize {
        self.connector.connect_count()
    }
}

pub fn init_logging() {
    let _ = colog::basic_builder().is_test(true).try_init();
}

/// Context with a unique index on `username` of the test collection.
pub fn create_test_context() -> DocScanResult<TestContext> {
    create_test_context_with(
        ClientConfigBuilder::new("memory://local", TEST_DB)
            .index(IndexSpec::new(TEST_DB, TEST_COLLECTION, &["username"]).unique(true)),
    )
}

/// Context whose client scans with the given batch size.
pub fn create_batched_test_context(batch_size: u64) -> DocScanResult<TestContext> {
    let builder = ClientConfigBuilder::new("memory://local", TEST_DB).batch_size(batch_size);
    create_test_context_with(builder)
}

pub fn create_test_context_with(builder: ClientConfigBuilder) -> DocScanResult<TestContext> {
    init_logging();
    let config = builder.build()?;
    let connector = Arc::new(InMemoryConnector::new());
    let pool = ConnectionPool::new(config, connector.clone());
    Ok(TestContext::new(pool, connector))
}

pub fn cleanup(ctx: TestContext) -> DocScanResult<()> {
    ctx.pool().disconnect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub age: i32,
    pub city: String,
}

pub fn user(i: i32) -> User {
    const CITIES: [&str; 3] = ["Beijing", "Shanghai", "Shenzhen"];
    User {
        username: format!("user{:05}", i),
        age: 18 + i % 50,
        city: CITIES[(i % 3) as usize].to_string(),
    }
}

/// Inserts `count` users, numbered from zero, in insertion order.
pub fn seed_users(client: &DocClient, count: i32) -> DocScanResult<()> {
    if count == 0 {
        return Ok(());
    }
    let users: Vec<User> = (0..count).map(user).collect();
    client.insert_many(&users)?;
    Ok(())
}

/// Collection wrapper that records every window it is asked for and can be
/// told to fail.
pub struct FaultyCollection {
    delegate: Collection,
    fail_find_at_skip: Option<u64>,
    fail_count: bool,
    finds: Mutex<Vec<(u64, Option<u64>)>>,
}

impl FaultyCollection {
    pub fn new(delegate: Collection) -> Self {
        FaultyCollection {
            delegate,
            fail_find_at_skip: None,
            fail_count: false,
            finds: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_find_at_skip(mut self, skip: u64) -> Self {
        self.fail_find_at_skip = Some(skip);
        self
    }

    pub fn fail_count(mut self) -> Self {
        self.fail_count = true;
        self
    }
}

/// Shared handle so a test can read the recorded windows after a scan.
#[derive(Clone)]
pub struct FaultyHandle {
    inner: Arc<FaultyCollection>,
}

impl FaultyHandle {
    pub fn new(collection: FaultyCollection) -> Self {
        FaultyHandle {
            inner: Arc::new(collection),
        }
    }

    /// `(skip, limit)` of every find so far.
    pub fn finds(&self) -> Vec<(u64, Option<u64>)> {
        self.inner.finds.lock().clone()
    }

    pub fn client(&self, batch_size: u64) -> DocScanResult<DocClient> {
        DocClient::new(Collection::new(self.clone()), batch_size, 5)
    }
}

impl CollectionProvider for FaultyHandle {
    fn count(&self, filter: &Document) -> DocScanResult<u64> {
        if self.inner.fail_count {
            log::warn!("Injecting count failure on {}", self.name());
            return Err(DocScanError::new("count timed out", ErrorKind::FetchFailure));
        }
        self.inner.delegate.count(filter)
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> DocScanResult<DocumentCursor> {
        let skip = options.skip_value();
        self.inner.finds.lock().push((skip, options.limit_value()));
        if self.inner.fail_find_at_skip == Some(skip) {
            log::warn!("Injecting find failure at skip {}", skip);
            return Err(DocScanError::new(
                &format!("find at skip {} failed", skip),
                ErrorKind::FetchFailure,
            ));
        }
        self.inner.delegate.find(filter, options)
    }

    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> DocScanResult<Option<Document>> {
        self.inner.delegate.find_one(filter, projection)
    }

    fn insert_one(&self, document: Document) -> DocScanResult<InsertOneResult> {
        self.inner.delegate.insert_one(document)
    }

    fn insert_many(&self, documents: Vec<Document>) -> DocScanResult<InsertManyResult> {
        self.inner.delegate.insert_many(documents)
    }

    fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> DocScanResult<UpdateResult> {
        self.inner.delegate.replace_one(filter, replacement, upsert)
    }

    fn update_one(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.inner.delegate.update_one(filter, update)
    }

    fn update_many(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.inner.delegate.update_many(filter, update)
    }

    fn delete_one(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.inner.delegate.delete_one(filter)
    }

    fn delete_many(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.inner.delegate.delete_many(filter)
    }

    fn create_index(&self, index: &IndexSpec) -> DocScanResult<()> {
        self.inner.delegate.create_index(index)
    }

    fn name(&self) -> String {
        self.inner.delegate.name()
    }
}
