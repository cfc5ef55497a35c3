use super::InMemoryCollection;
use crate::collection::Collection;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::store::StoreProvider;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A document store held entirely in process memory.
///
/// Collections are created on first access and keyed by `db.name`. Closing
/// the store drops every collection; handles obtained earlier then fail with
/// `StoreClosed`.
///
/// ```rust
/// use bson::doc;
/// use docscan::store::memory::InMemoryStore;
/// use docscan::collection::CollectionProvider;
/// use docscan::store::StoreProvider;
///
/// let store = InMemoryStore::new();
/// let users = store.collection("test", "user").unwrap();
/// users.insert_one(doc! { "username": "zhangsan" }).unwrap();
/// assert_eq!(users.count(&doc! {}).unwrap(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    /// Names (`db.name`) of the collections opened so far, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// The in-memory collection behind `db.name`, created when missing.
    pub fn memory_collection(&self, db: &str, name: &str) -> DocScanResult<InMemoryCollection> {
        self.inner.memory_collection(db, name)
    }
}

impl StoreProvider for InMemoryStore {
    fn collection(&self, db: &str, name: &str) -> DocScanResult<Collection> {
        let collection = self.inner.memory_collection(db, name)?;
        Ok(Collection::new(collection))
    }

    fn close(&self) -> DocScanResult<()> {
        self.inner.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct InMemoryStoreInner {
    closed: Arc<AtomicBool>,
    collections: DashMap<String, InMemoryCollection>,
}

impl InMemoryStoreInner {
    fn memory_collection(&self, db: &str, name: &str) -> DocScanResult<InMemoryCollection> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("Store is closed, cannot open collection {}.{}", db, name);
            return Err(DocScanError::new(
                "Store is closed",
                ErrorKind::StoreClosed,
            ));
        }

        if db.is_empty() || name.is_empty() {
            log::error!("Invalid collection name '{}.{}'", db, name);
            return Err(DocScanError::new(
                "Database and collection names cannot be empty",
                ErrorKind::InvalidArgument,
            ));
        }

        let key = format!("{}.{}", db, name);
        let collection = self
            .collections
            .entry(key)
            .or_insert_with(|| InMemoryCollection::new(name, self.closed.clone()))
            .clone();
        Ok(collection)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::Relaxed) {
            return;
        }
        self.collections.clear();
        log::debug!("In-memory store closed");
    }
}
