use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use bson::Document;
use itertools::Itertools;

/// An ascending index over one or more fields of a collection.
///
/// Indexes are sparse: a document lacking every indexed field is left out of
/// the index, so several such documents never collide on a unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    db: String,
    collection: String,
    keys: Vec<String>,
    unique: bool,
}

impl IndexSpec {
    pub fn new(db: &str, collection: &str, keys: &[&str]) -> IndexSpec {
        IndexSpec {
            db: db.to_string(),
            collection: collection.to_string(),
            keys: keys.iter().map(|key| key.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> IndexSpec {
        self.unique = unique;
        self
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        true
    }

    /// Conventional index name, e.g. `username_1_age_1`.
    pub fn name(&self) -> String {
        self.keys.iter().map(|key| format!("{}_1", key)).join("_")
    }

    /// The key specification, e.g. `{ "username": 1, "age": 1 }`.
    pub fn key_document(&self) -> Document {
        let mut document = Document::new();
        for key in &self.keys {
            document.insert(key.clone(), 1i32);
        }
        document
    }

    pub(crate) fn validate(&self) -> DocScanResult<()> {
        if self.keys.is_empty() || self.keys.iter().any(|key| key.is_empty()) {
            log::error!("Index on {}.{} has no usable keys", self.db, self.collection);
            return Err(DocScanError::new(
                &format!(
                    "Index on {}.{} needs at least one non-empty key",
                    self.db, self.collection
                ),
                ErrorKind::IndexingError,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn name_and_key_document_follow_key_order() {
        let index = IndexSpec::new("test", "user", &["username", "age"]).unique(true);
        assert_eq!(index.name(), "username_1_age_1");
        assert_eq!(index.key_document(), doc! { "username": 1, "age": 1 });
        assert!(index.is_unique());
        assert!(index.is_sparse());
    }

    #[test]
    fn empty_keys_are_invalid() {
        let err = IndexSpec::new("test", "user", &[]).validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexingError);
        assert!(IndexSpec::new("test", "user", &[""]).validate().is_err());
        assert!(IndexSpec::new("test", "user", &["username"]).validate().is_ok());
    }
}
