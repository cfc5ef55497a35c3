use crate::client_config::ClientConfig;
use crate::collection::Collection;
use crate::errors::DocScanResult;
use std::ops::Deref;
use std::sync::Arc;

/// A connected document store.
pub trait StoreProvider: Send + Sync {
    /// Returns a handle on collection `name` of database `db`.
    fn collection(&self, db: &str, name: &str) -> DocScanResult<Collection>;

    /// Releases the connection. Every later call on the store, or on the
    /// collections it handed out, fails with `StoreClosed`.
    fn close(&self) -> DocScanResult<()>;

    fn is_closed(&self) -> bool;
}

/// Cloneable handle on a [`StoreProvider`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StoreProvider>,
}

impl Store {
    pub fn new<T: StoreProvider + 'static>(inner: T) -> Self {
        Store {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Store {
    type Target = Arc<dyn StoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Opens a [`Store`] from a [`ClientConfig`].
pub trait StoreConnector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> DocScanResult<Store>;
}
