use crate::client::DocClient;
use crate::client_config::ClientConfig;
use crate::collection::CollectionProvider;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::store::{Store, StoreConnector, StoreProvider};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Lazily connected, shared access to a store.
///
/// The first call to [`store`](ConnectionPool::store) connects and creates
/// the configured indexes. Concurrent first callers wait on the connection in
/// progress instead of starting their own, so at most one connect is ever in
/// flight and every caller gets the same [`Store`]. Waiting is bounded by the
/// configured init timeout.
///
/// A failed connect, or a failed index creation, leaves the pool
/// unconnected; the next call tries again.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: ClientConfig,
    connector: Arc<dyn StoreConnector>,
    store: Mutex<Option<Store>>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig, connector: Arc<dyn StoreConnector>) -> ConnectionPool {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                connector,
                store: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The connected store, connecting first when needed.
    pub fn store(&self) -> DocScanResult<Store> {
        let mut guard = self.inner.lock_store()?;

        if let Some(store) = guard.as_ref() {
            if !store.is_closed() {
                return Ok(store.clone());
            }
            log::warn!("Connection to {} was closed, reconnecting", self.inner.config.db_name());
        }

        *guard = None;
        let store = self.inner.connect()?;
        *guard = Some(store.clone());
        Ok(store)
    }

    /// A client on collection `collection` of database `db`, using the
    /// configured batch and page sizes.
    pub fn client(&self, db: &str, collection: &str) -> DocScanResult<DocClient> {
        let collection = self.store()?.collection(db, collection)?;
        DocClient::new(
            collection,
            self.inner.config.batch_size(),
            self.inner.config.page_size(),
        )
    }

    /// A client on `collection` of the configured database.
    pub fn default_client(&self, collection: &str) -> DocScanResult<DocClient> {
        self.client(self.inner.config.db_name(), collection)
    }

    /// Closes the store, if connected. A later call to `store` reconnects.
    ///
    /// Waits at most the init timeout for a connect in progress.
    pub fn disconnect(&self) -> DocScanResult<()> {
        let store = self.inner.lock_store()?.take();
        match store {
            Some(store) => {
                log::debug!("Disconnecting from {}", self.inner.config.db_name());
                store.close()
            }
            None => Ok(()),
        }
    }

    /// Whether an open store is held. A connect still in progress after the
    /// init timeout counts as not connected.
    pub fn is_connected(&self) -> bool {
        self.inner
            .store
            .try_lock_for(self.inner.config.init_timeout())
            .is_some_and(|guard| guard.as_ref().is_some_and(|store| !store.is_closed()))
    }
}

impl PoolInner {
    fn lock_store(&self) -> DocScanResult<MutexGuard<'_, Option<Store>>> {
        let timeout = self.config.init_timeout();
        self.store.try_lock_for(timeout).ok_or_else(|| {
            log::error!("Timed out after {:?} waiting for connection initialisation", timeout);
            DocScanError::new(
                "Timed out waiting for connection initialisation",
                ErrorKind::ConnectionFailure,
            )
        })
    }

    fn connect(&self) -> DocScanResult<Store> {
        log::debug!("Connecting to database {}", self.config.db_name());
        let store = self.connector.connect(&self.config).map_err(|err| {
            log::error!("Failed to connect to {}: {}", self.config.db_name(), err);
            err
        })?;

        for index in self.config.indexes() {
            let created = store
                .collection(index.db(), index.collection())
                .and_then(|collection| collection.create_index(index));

            if let Err(err) = created {
                log::error!(
                    "Failed to create index {} on {}.{}: {}",
                    index.name(),
                    index.db(),
                    index.collection(),
                    err
                );
                if let Err(close_err) = store.close() {
                    log::warn!("Failed to close store after index failure: {}", close_err);
                }
                return Err(DocScanError::new_with_cause(
                    &format!("Failed to create index {}", index.name()),
                    ErrorKind::IndexingError,
                    err,
                ));
            }
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_builder::ClientConfigBuilder;
    use crate::collection::IndexSpec;
    use crate::store::memory::InMemoryConnector;
    use bson::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    fn config() -> ClientConfig {
        let _ = colog::basic_builder().is_test(true).try_init();
        ClientConfigBuilder::new("memory://local", "test")
            .index(IndexSpec::new("test", "user", &["username"]).unique(true))
            .build()
            .unwrap()
    }

    struct FailingConnector {
        attempts: AtomicUsize,
        fail_first: usize,
        delegate: InMemoryConnector,
    }

    impl StoreConnector for FailingConnector {
        fn connect(&self, config: &ClientConfig) -> DocScanResult<Store> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(DocScanError::new("connection refused", ErrorKind::ConnectionFailure));
            }
            self.delegate.connect(config)
        }
    }

    struct SlowConnector {
        delegate: InMemoryConnector,
        delay: Duration,
    }

    impl SlowConnector {
        fn new(delay: Duration) -> SlowConnector {
            SlowConnector {
                delegate: InMemoryConnector::new(),
                delay,
            }
        }
    }

    impl StoreConnector for SlowConnector {
        fn connect(&self, config: &ClientConfig) -> DocScanResult<Store> {
            thread::sleep(self.delay);
            self.delegate.connect(config)
        }
    }

    #[test]
    fn connects_lazily_once() {
        let connector = Arc::new(InMemoryConnector::new());
        let pool = ConnectionPool::new(config(), connector.clone());
        assert!(!pool.is_connected());
        assert_eq!(connector.connect_count(), 0);

        let first = pool.store().unwrap();
        let second = pool.store().unwrap();
        assert!(pool.is_connected());
        assert_eq!(connector.connect_count(), 1);

        first.collection("test", "user").unwrap().insert_one(doc! { "a": 1 }).unwrap();
        assert_eq!(second.collection("test", "user").unwrap().count(&doc! {}).unwrap(), 1);
    }

    #[test]
    fn concurrent_callers_share_one_connect() {
        let connector = Arc::new(SlowConnector::new(Duration::from_millis(50)));
        let pool = ConnectionPool::new(config(), connector.clone());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let store = pool.store().unwrap();
                    store.collection("test", "user").unwrap().insert_one(doc! {}).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(connector.delegate.connect_count(), 1);
        let store = pool.store().unwrap();
        assert_eq!(store.collection("test", "user").unwrap().count(&doc! {}).unwrap(), 8);
    }

    #[test]
    fn indexes_are_created_on_connect() {
        let pool = ConnectionPool::new(config(), Arc::new(InMemoryConnector::new()));
        let client = pool.client("test", "user").unwrap();
        client.insert_one(&doc! { "username": "zhangsan" }).unwrap();
        let err = client.insert_one(&doc! { "username": "zhangsan" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert_eq!(client.batch_size(), 4096);
        assert_eq!(client.page_size(), 5);
    }

    #[test]
    fn failed_connect_is_retried() {
        let connector = Arc::new(FailingConnector {
            attempts: AtomicUsize::new(0),
            fail_first: 1,
            delegate: InMemoryConnector::new(),
        });
        let pool = ConnectionPool::new(config(), connector.clone());

        let err = pool.store().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionFailure);
        assert!(!pool.is_connected());

        assert!(pool.store().is_ok());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn index_failure_leaves_pool_unconnected() {
        let config = ClientConfigBuilder::new("memory://local", "test")
            .index(IndexSpec::new("test", "user", &["username"]).unique(true))
            .index(IndexSpec::new("test", "user", &["username"]))
            .build()
            .unwrap();
        let connector = Arc::new(InMemoryConnector::new());
        let pool = ConnectionPool::new(config, connector.clone());

        let err = pool.store().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);
        assert!(err.cause().is_some());
        assert!(!pool.is_connected());

        assert!(pool.store().is_err());
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn disconnect_closes_and_allows_reconnect() {
        let connector = Arc::new(InMemoryConnector::new());
        let pool = ConnectionPool::new(config(), connector.clone());
        let store = pool.store().unwrap();

        pool.disconnect().unwrap();
        assert!(store.is_closed());
        assert!(!pool.is_connected());
        pool.disconnect().unwrap();

        let reconnected = pool.store().unwrap();
        assert!(!reconnected.is_closed());
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn closed_store_is_replaced() {
        let connector = Arc::new(InMemoryConnector::new());
        let pool = ConnectionPool::new(config(), connector.clone());
        pool.store().unwrap().close().unwrap();
        assert!(!pool.is_connected());
        assert!(!pool.store().unwrap().is_closed());
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn status_calls_wait_at_most_init_timeout_during_connect() {
        let config = ClientConfigBuilder::new("memory://local", "test")
            .init_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let connector = Arc::new(SlowConnector::new(Duration::from_millis(800)));
        let pool = ConnectionPool::new(config, connector);

        let connecting = {
            let pool = pool.clone();
            thread::spawn(move || pool.store().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(150));

        let started = Instant::now();
        assert!(!pool.is_connected());
        let err = pool.disconnect().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConnectionFailure);
        assert!(started.elapsed() < Duration::from_millis(500));

        connecting.join().unwrap().unwrap();
        assert!(pool.is_connected());
    }
}
