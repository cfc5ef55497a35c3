use super::{DeleteResult, FindOptions, IndexSpec, InsertManyResult, InsertOneResult, UpdateResult};
use crate::cursor::DocumentCursor;
use crate::errors::DocScanResult;
use bson::Document;
use std::ops::Deref;
use std::sync::Arc;

/// A collection of a document store.
///
/// Implementations are the external collaborator of docscan: every call may
/// block on the store and may fail. They must be safe to share between
/// threads; docscan itself never calls one concurrently with itself.
pub trait CollectionProvider: Send + Sync {
    /// Counts the documents matching `filter`.
    fn count(&self, filter: &Document) -> DocScanResult<u64>;

    /// Opens a cursor over the documents matching `filter`.
    ///
    /// The cursor honours the projection, sort and `(skip, limit)` of
    /// `options`.
    fn find(&self, filter: &Document, options: &FindOptions) -> DocScanResult<DocumentCursor>;

    /// Returns the first document matching `filter`, if any.
    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> DocScanResult<Option<Document>>;

    /// Inserts a document, generating its `_id` when absent.
    fn insert_one(&self, document: Document) -> DocScanResult<InsertOneResult>;

    /// Inserts several documents in order.
    fn insert_many(&self, documents: Vec<Document>) -> DocScanResult<InsertManyResult>;

    /// Replaces the first document matching `filter`. With `upsert`, inserts
    /// `replacement` when nothing matches.
    fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> DocScanResult<UpdateResult>;

    /// Applies an update document (`$set`, `$unset`, `$inc`, ...) to the first match.
    fn update_one(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult>;

    /// Applies an update document to every match.
    fn update_many(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult>;

    /// Deletes the first document matching `filter`.
    fn delete_one(&self, filter: &Document) -> DocScanResult<DeleteResult>;

    /// Deletes every document matching `filter`.
    fn delete_many(&self, filter: &Document) -> DocScanResult<DeleteResult>;

    /// Creates an index on this collection.
    fn create_index(&self, index: &IndexSpec) -> DocScanResult<()>;

    /// Name of this collection.
    fn name(&self) -> String;
}

/// Cloneable handle on a [`CollectionProvider`].
#[derive(Clone)]
pub struct Collection {
    inner: Arc<dyn CollectionProvider>,
}

impl Collection {
    pub fn new<T: CollectionProvider + 'static>(inner: T) -> Self {
        Collection {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Collection {
    type Target = Arc<dyn CollectionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
