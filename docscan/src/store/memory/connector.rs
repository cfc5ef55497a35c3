use super::InMemoryStore;
use crate::client_config::ClientConfig;
use crate::errors::DocScanResult;
use crate::store::{Store, StoreConnector};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Connects to a fresh [`InMemoryStore`] on every call.
///
/// The number of connects made is kept, which lets callers observe how often
/// a pool actually connected.
#[derive(Default)]
pub struct InMemoryConnector {
    connects: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new() -> InMemoryConnector {
        InMemoryConnector::default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl StoreConnector for InMemoryConnector {
    fn connect(&self, config: &ClientConfig) -> DocScanResult<Store> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "Opening in-memory store for database {} (connect #{})",
            config.db_name(),
            attempt
        );
        Ok(Store::new(InMemoryStore::new()))
    }
}
