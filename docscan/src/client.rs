use crate::collection::{
    in_window, Collection, CollectionProvider, DeleteResult, FindOptions, IndexSpec,
    InsertManyResult, InsertOneResult, UpdateResult,
};
use crate::common::{SortOrder, SortableFields};
use crate::cursor::{DecodingCursor, DocumentCursor};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::scan::{empty_result, fetch_page, BatchScanner, Page, ScanSummary, ScanWindow};
use bson::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Cursor decoding the documents of one window into `T`.
pub type DecodedCursor<T> = DecodingCursor<T, DocumentCursor>;

/// What to read: a filter, an optional projection and a sort order.
///
/// Windows of a scan are only consistent with each other when the order of
/// the result set is; give a sort when the store's natural order may change
/// during a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Document,
    projection: Option<Document>,
    sort: SortableFields,
}

impl Query {
    pub fn new(filter: Document) -> Query {
        Query {
            filter,
            ..Query::default()
        }
    }

    /// A query matching every document.
    pub fn all() -> Query {
        Query::default()
    }

    pub fn projection(mut self, projection: Document) -> Query {
        self.projection = Some(projection);
        self
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> Query {
        self.sort = self.sort.add_sorted_field(field_name.to_string(), sort_order);
        self
    }

    pub fn filter_document(&self) -> &Document {
        &self.filter
    }

    pub fn projection_document(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort_fields(&self) -> &SortableFields {
        &self.sort
    }

    /// Find options reading `window` of this query.
    pub fn find_options(&self, window: ScanWindow) -> FindOptions {
        let options = in_window(window).sortable_fields(self.sort.clone());
        match &self.projection {
            Some(projection) => options.projection(projection.clone()),
            None => options,
        }
    }
}

impl From<Document> for Query {
    fn from(filter: Document) -> Self {
        Query::new(filter)
    }
}

/// One page of decoded documents together with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub page: Page,
    pub items: Vec<T>,
}

/// Typed access to one collection.
///
/// Values are encoded to and decoded from BSON with serde. Multi-document
/// reads go through a [`BatchScanner`], so they never hold more than one
/// window of documents open at a time.
#[derive(Clone)]
pub struct DocClient {
    collection: Collection,
    scanner: BatchScanner,
    page_size: u64,
}

impl DocClient {
    /// Creates a client reading `batch_size` documents per window and using
    /// `page_size` for paged reads that do not give one.
    pub fn new(
        collection: Collection,
        batch_size: u64,
        page_size: u64,
    ) -> DocScanResult<DocClient> {
        Ok(DocClient {
            collection,
            scanner: BatchScanner::new(batch_size)?,
            page_size,
        })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn batch_size(&self) -> u64 {
        self.scanner.batch_size()
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn insert_one<T: Serialize>(&self, value: &T) -> DocScanResult<InsertOneResult> {
        let document = bson::to_document(value)?;
        self.collection.insert_one(document)
    }

    pub fn insert_many<T: Serialize>(&self, values: &[T]) -> DocScanResult<InsertManyResult> {
        let documents = values
            .iter()
            .map(bson::to_document)
            .collect::<Result<Vec<Document>, _>>()?;
        self.collection.insert_many(documents)
    }

    /// Replaces the first document matching `filter` with `value`, inserting
    /// it when nothing matches.
    pub fn insert_or_replace<T: Serialize>(
        &self,
        filter: &Document,
        value: &T,
    ) -> DocScanResult<UpdateResult> {
        let document = bson::to_document(value)?;
        self.collection.replace_one(filter, document, true)
    }

    pub fn update_one(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.collection.update_one(filter, update)
    }

    pub fn update_many(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.collection.update_many(filter, update)
    }

    pub fn delete_one(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.collection.delete_one(filter)
    }

    pub fn delete_many(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.collection.delete_many(filter)
    }

    pub fn count(&self, filter: &Document) -> DocScanResult<u64> {
        self.collection.count(filter)
    }

    pub fn create_index(&self, index: &IndexSpec) -> DocScanResult<()> {
        index.validate()?;
        self.collection.create_index(index)
    }

    /// Reads the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResult` when nothing matches and `DecodeFailure` when the
    /// document does not decode into `T`.
    pub fn query_one<T: DeserializeOwned>(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> DocScanResult<T> {
        let document = self
            .collection
            .find_one(filter, projection)?
            .ok_or_else(empty_result)?;
        Ok(bson::from_document(document)?)
    }

    /// Visits every document matching `query`, one window at a time.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResult` when nothing matches; otherwise the first
    /// failure, with every document before it already visited.
    pub fn query_by_cursor<T, V>(&self, query: &Query, visit: V) -> DocScanResult<ScanSummary>
    where
        T: DeserializeOwned,
        V: FnMut(T) -> DocScanResult<()>,
    {
        let total_count = self.collection.count(query.filter_document())?;
        self.scanner
            .scan(total_count, |window| self.open::<T>(query, window), visit)
    }

    /// Lazily iterates over every document matching `query`.
    ///
    /// See [`BatchScanner::iter`] for how failures end the iteration.
    pub fn query_iter<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> DocScanResult<impl FusedIterator<Item = DocScanResult<T>>> {
        let total_count = self.collection.count(query.filter_document())?;
        let collection = self.collection.clone();
        let query = query.clone();
        self.scanner.iter::<T, _, _>(total_count, move |window| {
            let cursor = collection.find(query.filter_document(), &query.find_options(window))?;
            Ok(DecodedCursor::<T>::new(cursor))
        })
    }

    /// Collects every document matching `query`, across all windows.
    pub fn query_all<T: DeserializeOwned>(&self, query: &Query) -> DocScanResult<Vec<T>> {
        let mut items = Vec::new();
        self.query_by_cursor(query, |item: T| {
            items.push(item);
            Ok(())
        })?;
        Ok(items)
    }

    /// Visits page `page_no` (1-based) of `query` and describes it.
    ///
    /// A `page_size` of zero uses the client's page size.
    pub fn query_with_page<T, V>(
        &self,
        query: &Query,
        page_no: u64,
        page_size: u64,
        visit: V,
    ) -> DocScanResult<Page>
    where
        T: DeserializeOwned,
        V: FnMut(T) -> DocScanResult<()>,
    {
        if page_no == 0 {
            log::error!("Page numbers start at 1");
            return Err(DocScanError::new(
                "Page numbers start at 1",
                ErrorKind::InvalidArgument,
            ));
        }

        let page_size = if page_size == 0 {
            self.page_size
        } else {
            page_size
        };
        let total_count = self.collection.count(query.filter_document())?;
        fetch_page(
            total_count,
            page_no,
            page_size,
            |window| self.open::<T>(query, window),
            visit,
        )
    }

    /// Reads page `page_no` (1-based) of `query` into memory.
    pub fn query_page<T: DeserializeOwned>(
        &self,
        query: &Query,
        page_no: u64,
        page_size: u64,
    ) -> DocScanResult<PagedResult<T>> {
        let mut items = Vec::new();
        let page = self.query_with_page(query, page_no, page_size, |item: T| {
            items.push(item);
            Ok(())
        })?;
        Ok(PagedResult { page, items })
    }

    fn open<T: DeserializeOwned>(
        &self,
        query: &Query,
        window: ScanWindow,
    ) -> DocScanResult<DecodedCursor<T>> {
        let cursor = self
            .collection
            .find(query.filter_document(), &query.find_options(window))?;
        Ok(DecodingCursor::new(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::StoreProvider;
    use bson::doc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        username: String,
        age: i32,
    }

    fn user(i: i32) -> User {
        User {
            username: format!("user{:02}", i),
            age: i,
        }
    }

    fn create_client(batch_size: u64, users: i32) -> DocClient {
        let store = InMemoryStore::new();
        let collection = store.collection("test", "user").unwrap();
        let client = DocClient::new(collection, batch_size, 5).unwrap();
        if users > 0 {
            let values: Vec<User> = (0..users).map(user).collect();
            client.insert_many(&values).unwrap();
        }
        client
    }

    #[test]
    fn query_find_options_cover_window_projection_and_sort() {
        let query = Query::new(doc! { "age": { "$gt": 1 } })
            .projection(doc! { "_id": 0 })
            .sort_by("age", SortOrder::Descending);
        let options = query.find_options(ScanWindow::new(10, 5));
        assert_eq!(options.skip_value(), 10);
        assert_eq!(options.limit_value(), Some(5));
        assert_eq!(options.projection_document(), Some(&doc! { "_id": 0 }));
        assert_eq!(
            options.sort_fields().map(|fields| fields.to_document()),
            Some(doc! { "age": -1 })
        );

        assert!(Query::all().find_options(ScanWindow::new(0, 1)).sort_fields().is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let store = InMemoryStore::new();
        let collection = store.collection("test", "user").unwrap();
        let err = DocClient::new(collection, 0, 5).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn query_one_decodes_or_reports_empty() {
        let client = create_client(10, 3);
        let found: User = client.query_one(&doc! { "age": 2 }, None).unwrap();
        assert_eq!(found, user(2));

        let err = client.query_one::<User>(&doc! { "age": 99 }, None).unwrap_err();
        assert!(err.is_empty_result());

        let err = client
            .query_one::<User>(&doc! { "age": 1 }, Some(&doc! { "username": 1 }))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DecodeFailure);
    }

    #[test]
    fn query_by_cursor_visits_in_windows() {
        let client = create_client(4, 10);
        let mut ages = Vec::new();
        let summary = client
            .query_by_cursor(&Query::all(), |item: User| {
                ages.push(item.age);
                Ok(())
            })
            .unwrap();
        assert_eq!(summary, ScanSummary { windows: 3, visited: 10 });
        assert_eq!(ages, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn query_by_cursor_on_no_match_is_empty_result() {
        let client = create_client(4, 10);
        let err = client
            .query_by_cursor(&Query::new(doc! { "age": 99 }), |_: User| Ok(()))
            .unwrap_err();
        assert!(err.is_empty_result());
    }

    #[test]
    fn query_all_accumulates_every_window() {
        let client = create_client(3, 10);
        let query = Query::new(doc! { "age": { "$gte": 2 } }).sort_by("age", SortOrder::Descending);
        let users: Vec<User> = client.query_all(&query).unwrap();
        assert_eq!(users.len(), 8);
        assert_eq!(users.first(), Some(&user(9)));
        assert_eq!(users.last(), Some(&user(2)));
    }

    #[test]
    fn query_iter_is_lazy_and_complete() {
        let client = create_client(4, 10);
        let first_two: Vec<User> = client
            .query_iter::<User>(&Query::all())
            .unwrap()
            .take(2)
            .collect::<DocScanResult<_>>()
            .unwrap();
        assert_eq!(first_two, vec![user(0), user(1)]);

        let count = client.query_iter::<User>(&Query::all()).unwrap().count();
        assert_eq!(count, 10);
    }

    #[test]
    fn query_page_describes_and_reads_page() {
        let client = create_client(4, 12);
        let query = Query::all().sort_by("age", SortOrder::Ascending);

        let result: PagedResult<User> = client.query_page(&query, 3, 5).unwrap();
        assert_eq!(result.page.page_no(), 3);
        assert_eq!(result.page.total_pages(), 3);
        assert!(result.page.is_last_page());
        assert_eq!(result.items, vec![user(10), user(11)]);

        let result: PagedResult<User> = client.query_page(&query, 4, 5).unwrap();
        assert!(result.items.is_empty());
        assert!(!result.page.is_in_range());
    }

    #[test]
    fn zero_page_size_uses_client_page_size() {
        let client = create_client(4, 12);
        let result: PagedResult<User> = client.query_page(&Query::all(), 1, 0).unwrap();
        assert_eq!(result.page.page_size(), 5);
        assert_eq!(result.items.len(), 5);
    }

    #[test]
    fn page_zero_is_rejected_before_counting() {
        let client = create_client(4, 0);
        let err = client.query_page::<User>(&Query::all(), 0, 5).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

        let err = client.query_page::<User>(&Query::all(), 1, 5).unwrap_err();
        assert!(err.is_empty_result());
    }

    #[test]
    fn writes_round_trip_through_serde() {
        let client = create_client(4, 0);
        client.insert_one(&user(1)).unwrap();

        let replacement = User {
            username: "user01".into(),
            age: 40,
        };
        let result = client
            .insert_or_replace(&doc! { "username": "user01" }, &replacement)
            .unwrap();
        assert_eq!(result.matched_count, 1);
        let result = client.insert_or_replace(&doc! { "username": "user02" }, &user(2)).unwrap();
        assert_eq!(result.upserted_count, 1);

        client
            .update_many(&doc! {}, &doc! { "$inc": { "age": 1 } })
            .unwrap();
        let updated: User = client.query_one(&doc! { "username": "user01" }, None).unwrap();
        assert_eq!(updated.age, 41);

        assert_eq!(client.delete_one(&doc! { "username": "user02" }).unwrap().deleted_count, 1);
        assert_eq!(client.count(&doc! {}).unwrap(), 1);
        assert_eq!(client.delete_many(&doc! {}).unwrap().deleted_count, 1);
    }

    #[test]
    fn create_index_validates_keys() {
        let client = create_client(4, 0);
        assert!(client.create_index(&IndexSpec::new("test", "user", &[])).is_err());
        client
            .create_index(&IndexSpec::new("test", "user", &["username"]).unique(true))
            .unwrap();
        client.insert_one(&user(1)).unwrap();
        let err = client.insert_one(&user(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
    }
}
