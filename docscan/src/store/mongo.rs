//! MongoDB store, built on the synchronous `mongodb` driver.

use crate::client_config::{AuthMechanism, ClientConfig};
use crate::collection::{
    Collection, CollectionProvider, DeleteResult, FindOptions, IndexSpec, InsertManyResult,
    InsertOneResult, UpdateResult,
};
use crate::cursor::{Cursor, DocumentCursor};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::store::{Store, StoreConnector, StoreProvider};
use bson::Document;
use mongodb::options::{ClientOptions, Credential, IndexOptions};
use mongodb::IndexModel;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connects to MongoDB with the settings of a [`ClientConfig`].
///
/// Credentials authenticate against the configured database with the
/// configured SCRAM mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

impl MongoConnector {
    pub fn new() -> MongoConnector {
        MongoConnector
    }
}

/// Maps a [`ClientConfig`] onto driver options without connecting.
pub fn client_options(config: &ClientConfig) -> DocScanResult<ClientOptions> {
    let mut options = ClientOptions::parse(config.url()).run()?;

    if let Some(user) = config.user() {
        let mechanism = match config.auth_mechanism() {
            AuthMechanism::ScramSha1 => mongodb::options::AuthMechanism::ScramSha1,
            AuthMechanism::ScramSha256 => mongodb::options::AuthMechanism::ScramSha256,
        };
        let credential = Credential::builder()
            .username(user.to_string())
            .password(config.password().map(str::to_string))
            .source(config.db_name().to_string())
            .mechanism(mechanism)
            .build();
        options.credential = Some(credential);
    }

    options.max_pool_size = Some(config.max_pool_size());
    options.heartbeat_freq = Some(config.heartbeat_interval());
    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.init_timeout());
    Ok(options)
}

impl StoreConnector for MongoConnector {
    fn connect(&self, config: &ClientConfig) -> DocScanResult<Store> {
        let options = client_options(config)?;
        let client = mongodb::sync::Client::with_options(options)?;
        log::debug!("Created MongoDB client for database {}", config.db_name());
        Ok(Store::new(MongoStore {
            client: Mutex::new(Some(client)),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// A MongoDB deployment reached through one driver client.
pub struct MongoStore {
    client: Mutex<Option<mongodb::sync::Client>>,
    closed: Arc<AtomicBool>,
}

impl StoreProvider for MongoStore {
    fn collection(&self, db: &str, name: &str) -> DocScanResult<Collection> {
        let guard = self.client.lock();
        let client = guard.as_ref().ok_or_else(|| store_closed(name))?;
        let collection = client.database(db).collection::<Document>(name);
        Ok(Collection::new(MongoCollection {
            name: name.to_string(),
            collection,
            closed: self.closed.clone(),
        }))
    }

    fn close(&self) -> DocScanResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        // dropping the last client handle shuts its connection pool down
        if self.client.lock().take().is_some() {
            log::debug!("MongoDB client released");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

fn store_closed(name: &str) -> DocScanError {
    log::error!("Store is closed, cannot access collection {}", name);
    DocScanError::new(
        &format!("Store is closed, cannot access collection {}", name),
        ErrorKind::StoreClosed,
    )
}

struct MongoCollection {
    name: String,
    collection: mongodb::sync::Collection<Document>,
    closed: Arc<AtomicBool>,
}

impl MongoCollection {
    fn check_opened(&self) -> DocScanResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(store_closed(&self.name));
        }
        Ok(())
    }
}

/// A driver cursor; closing drops it, which kills it on the server.
struct MongoCursor {
    cursor: Option<mongodb::sync::Cursor<Document>>,
}

impl Iterator for MongoCursor {
    type Item = DocScanResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.cursor.as_mut()?.next()?;
        Some(next.map_err(DocScanError::from))
    }
}

impl Cursor<Document> for MongoCursor {
    fn close(&mut self) -> DocScanResult<()> {
        self.cursor = None;
        Ok(())
    }
}

impl CollectionProvider for MongoCollection {
    fn count(&self, filter: &Document) -> DocScanResult<u64> {
        self.check_opened()?;
        Ok(self.collection.count_documents(filter.clone()).run()?)
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> DocScanResult<DocumentCursor> {
        self.check_opened()?;
        let mut find = self.collection.find(filter.clone()).skip(options.skip_value());
        if let Some(limit) = options.limit_value() {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(fields) = options.sort_fields() {
            find = find.sort(fields.to_document());
        }
        if let Some(projection) = options.projection_document() {
            find = find.projection(projection.clone());
        }

        let cursor = find.run()?;
        Ok(Box::new(MongoCursor {
            cursor: Some(cursor),
        }))
    }

    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> DocScanResult<Option<Document>> {
        self.check_opened()?;
        let mut find_one = self.collection.find_one(filter.clone());
        if let Some(projection) = projection {
            find_one = find_one.projection(projection.clone());
        }
        Ok(find_one.run()?)
    }

    fn insert_one(&self, document: Document) -> DocScanResult<InsertOneResult> {
        self.check_opened()?;
        let result = self.collection.insert_one(document).run()?;
        Ok(InsertOneResult {
            inserted_id: result.inserted_id,
        })
    }

    fn insert_many(&self, documents: Vec<Document>) -> DocScanResult<InsertManyResult> {
        self.check_opened()?;
        let result = self.collection.insert_many(documents).run()?;
        let mut inserted: Vec<_> = result.inserted_ids.into_iter().collect();
        inserted.sort_by_key(|(position, _)| *position);
        Ok(InsertManyResult {
            inserted_ids: inserted.into_iter().map(|(_, id)| id).collect(),
        })
    }

    fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        let result = self
            .collection
            .replace_one(filter.clone(), replacement)
            .upsert(upsert)
            .run()?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(result.upserted_id.is_some()),
            upserted_id: result.upserted_id,
        })
    }

    fn update_one(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        let result = self
            .collection
            .update_one(filter.clone(), update.clone())
            .run()?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(result.upserted_id.is_some()),
            upserted_id: result.upserted_id,
        })
    }

    fn update_many(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        let result = self
            .collection
            .update_many(filter.clone(), update.clone())
            .run()?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(result.upserted_id.is_some()),
            upserted_id: result.upserted_id,
        })
    }

    fn delete_one(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.check_opened()?;
        let result = self.collection.delete_one(filter.clone()).run()?;
        Ok(DeleteResult {
            deleted_count: result.deleted_count,
        })
    }

    fn delete_many(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.check_opened()?;
        let result = self.collection.delete_many(filter.clone()).run()?;
        Ok(DeleteResult {
            deleted_count: result.deleted_count,
        })
    }

    fn create_index(&self, index: &IndexSpec) -> DocScanResult<()> {
        index.validate()?;
        self.check_opened()?;
        let options = IndexOptions::builder()
            .name(index.name())
            .unique(index.is_unique())
            .sparse(index.is_sparse())
            .build();
        let model = IndexModel::builder()
            .keys(index.key_document())
            .options(options)
            .build();

        let created = self.collection.create_index(model).run()?;
        log::debug!("Created index {} on {}", created.index_name, self.name);
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_builder::ClientConfigBuilder;
    use std::time::Duration;

    #[test]
    fn options_carry_pool_timeouts_and_credentials() {
        let config = ClientConfigBuilder::new("mongodb://localhost:27017", "test")
            .credentials("root", "secret")
            .auth_mechanism(AuthMechanism::ScramSha256)
            .max_pool_size(20)
            .heartbeat_interval(Duration::from_secs(4))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let options = client_options(&config).unwrap();
        assert_eq!(options.max_pool_size, Some(20));
        assert_eq!(options.heartbeat_freq, Some(Duration::from_secs(4)));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(10)));

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("root"));
        assert_eq!(credential.password.as_deref(), Some("secret"));
        assert_eq!(credential.source.as_deref(), Some("test"));
        assert_eq!(
            credential.mechanism,
            Some(mongodb::options::AuthMechanism::ScramSha256)
        );
    }

    #[test]
    fn options_without_user_have_no_credential() {
        let config = ClientConfigBuilder::new("mongodb://localhost:27017", "test")
            .build()
            .unwrap();
        assert!(client_options(&config).unwrap().credential.is_none());
    }

    #[test]
    fn malformed_url_is_rejected() {
        let config = ClientConfigBuilder::new("not-a-url", "test").build().unwrap();
        assert!(client_options(&config).is_err());
    }
}
