use super::filter::matches;
use super::projection::Projection;
use super::update::{apply_update, validate_update};
use crate::collection::{
    CollectionProvider, DeleteResult, FindOptions, IndexSpec, InsertManyResult, InsertOneResult,
    UpdateResult,
};
use crate::common::document_utils::{bson_equals, canonical_key, compare_bson, get_path};
use crate::common::{SortOrder, SortableFields, DOC_ID};
use crate::cursor::{DocumentCursor, IterCursor};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// A collection held in process memory.
///
/// Documents keep their insertion order, which is also the order of an
/// unsorted find. Handles are cheap to clone and share the same data.
#[derive(Clone)]
pub struct InMemoryCollection {
    name: String,
    data: Arc<RwLock<CollectionData>>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
    // encoded `_id` of every stored document
    ids: HashSet<Vec<u8>>,
    unique: Vec<UniqueKeys>,
}

/// Entries of one unique index, from encoded key to the encoded `_id` of
/// the document holding it.
struct UniqueKeys {
    spec: IndexSpec,
    owners: HashMap<Vec<u8>, Vec<u8>>,
}

/// The encoded keys of one document, aligned with `CollectionData::unique`.
struct DocumentKeys {
    id: Option<Vec<u8>>,
    unique: Vec<Option<Vec<u8>>>,
}

impl InMemoryCollection {
    pub(crate) fn new(name: &str, closed: Arc<AtomicBool>) -> InMemoryCollection {
        InMemoryCollection {
            name: name.to_string(),
            data: Arc::new(RwLock::new(CollectionData::default())),
            closed,
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.data.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The indexes created so far.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.data.read().indexes.clone()
    }

    fn check_opened(&self) -> DocScanResult<()> {
        if self.closed.load(AtomicOrdering::Relaxed) {
            log::error!("Collection {} accessed after its store was closed", self.name);
            return Err(DocScanError::new(
                &format!("Store is closed, cannot access collection {}", self.name),
                ErrorKind::StoreClosed,
            ));
        }
        Ok(())
    }

    fn filter_positions(documents: &[Document], filter: &Document) -> DocScanResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    fn first_position(documents: &[Document], filter: &Document) -> DocScanResult<Option<usize>> {
        for (position, document) in documents.iter().enumerate() {
            if matches(document, filter)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }
}

impl CollectionData {
    fn keys_of(&self, document: &Document) -> DocScanResult<DocumentKeys> {
        let id = document.get(DOC_ID).map(encode_id).transpose()?;
        let unique = self
            .unique
            .iter()
            .map(|index| encode_index_key(&index.spec, document))
            .collect::<DocScanResult<Vec<_>>>()?;
        Ok(DocumentKeys { id, unique })
    }

    /// Fails with `DuplicateKey` when `candidate` collides with another
    /// stored document on `_id` or on a unique index. `replaced` holds the
    /// keys of the document `candidate` replaces, if any.
    fn check_unique(
        &self,
        candidate: &Document,
        keys: &DocumentKeys,
        replaced: Option<&DocumentKeys>,
    ) -> DocScanResult<()> {
        let replaced_id = replaced.and_then(|replaced| replaced.id.as_ref());

        if let Some(id) = &keys.id {
            if self.ids.contains(id) && Some(id) != replaced_id {
                let id = candidate.get(DOC_ID).unwrap_or(&Bson::Null);
                log::error!("Duplicate _id {} in collection", id);
                return Err(DocScanError::new(
                    &format!("Duplicate key error: _id {}", id),
                    ErrorKind::DuplicateKey,
                ));
            }
        }

        for (index, key) in self.unique.iter().zip(&keys.unique) {
            let owner = key.as_ref().and_then(|key| index.owners.get(key));
            if owner.is_some_and(|owner| Some(owner) != replaced_id) {
                log::error!("Duplicate key on unique index {}", index.spec.name());
                return Err(DocScanError::new(
                    &format!("Duplicate key error: index {}", index.spec.name()),
                    ErrorKind::DuplicateKey,
                ));
            }
        }
        Ok(())
    }

    fn register(&mut self, keys: DocumentKeys) {
        let Some(id) = keys.id else {
            return;
        };
        for (index, key) in self.unique.iter_mut().zip(keys.unique) {
            if let Some(key) = key {
                index.owners.insert(key, id.clone());
            }
        }
        self.ids.insert(id);
    }

    fn unregister(&mut self, keys: &DocumentKeys) {
        if let Some(id) = &keys.id {
            self.ids.remove(id);
        }
        for (index, key) in self.unique.iter_mut().zip(&keys.unique) {
            if let Some(key) = key {
                index.owners.remove(key);
            }
        }
    }

    fn push(&mut self, document: Document) -> DocScanResult<()> {
        let keys = self.keys_of(&document)?;
        self.check_unique(&document, &keys, None)?;
        self.register(keys);
        self.documents.push(document);
        Ok(())
    }

    fn replace_at(&mut self, position: usize, document: Document) -> DocScanResult<()> {
        let old_keys = self.keys_of(&self.documents[position])?;
        let new_keys = self.keys_of(&document)?;
        self.check_unique(&document, &new_keys, Some(&old_keys))?;
        self.unregister(&old_keys);
        self.register(new_keys);
        self.documents[position] = document;
        Ok(())
    }
}

fn encode(document: &Document) -> DocScanResult<Vec<u8>> {
    let mut bytes = Vec::new();
    document.to_writer(&mut bytes)?;
    Ok(bytes)
}

fn encode_id(id: &Bson) -> DocScanResult<Vec<u8>> {
    let mut key = Document::new();
    key.insert(DOC_ID, canonical_key(id));
    encode(&key)
}

/// `None` when the document holds none of the indexed fields; such
/// documents are left out of the index.
fn encode_index_key(index: &IndexSpec, document: &Document) -> DocScanResult<Option<Vec<u8>>> {
    let mut key = Document::new();
    for (position, field) in index.keys().iter().enumerate() {
        if let Some(value) = get_path(document, field) {
            key.insert(position.to_string(), canonical_key(value));
        }
    }
    if key.is_empty() {
        return Ok(None);
    }
    encode(&key).map(Some)
}

fn sort_documents(documents: &mut [Document], fields: &SortableFields) {
    let null = Bson::Null;
    documents.sort_by(|left, right| {
        for (field, order) in fields.sorting_order() {
            let left_value = get_path(left, field).unwrap_or(&null);
            let right_value = get_path(right, field).unwrap_or(&null);
            let ordering = match order {
                SortOrder::Ascending => compare_bson(left_value, right_value),
                SortOrder::Descending => compare_bson(right_value, left_value),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Puts `_id` first, generating one when absent.
fn with_id(document: Document, id: Option<Bson>) -> (Bson, Document) {
    let id = id
        .or_else(|| document.get(DOC_ID).cloned())
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut prepared = Document::new();
    prepared.insert(DOC_ID, id.clone());
    for (key, value) in document {
        if key != DOC_ID {
            prepared.insert(key, value);
        }
    }
    (id, prepared)
}

fn validate_replacement(replacement: &Document) -> DocScanResult<()> {
    if let Some(field) = replacement.keys().find(|key| key.starts_with('$')) {
        log::error!("Replacement document contains operator {}", field);
        return Err(DocScanError::new(
            &format!("Replacement document cannot contain update operator {}", field),
            ErrorKind::InvalidArgument,
        ));
    }
    Ok(())
}

/// The `_id` an upsert takes from an equality filter such as `{ "_id": 5 }`.
fn id_from_filter(filter: &Document) -> Option<Bson> {
    match filter.get(DOC_ID)? {
        Bson::Document(condition) if condition.keys().any(|key| key.starts_with('$')) => {
            condition.get("$eq").cloned()
        }
        id => Some(id.clone()),
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl CollectionProvider for InMemoryCollection {
    fn count(&self, filter: &Document) -> DocScanResult<u64> {
        self.check_opened()?;
        let data = self.data.read();
        let positions = Self::filter_positions(&data.documents, filter)?;
        Ok(positions.len() as u64)
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> DocScanResult<DocumentCursor> {
        self.check_opened()?;
        let projection = options
            .projection_document()
            .map(Projection::parse)
            .transpose()?;

        let mut matched = {
            let data = self.data.read();
            let mut matched = Vec::new();
            for document in &data.documents {
                if matches(document, filter)? {
                    matched.push(document.clone());
                }
            }
            matched
        };

        if let Some(fields) = options.sort_fields() {
            sort_documents(&mut matched, fields);
        }

        let limit = options.limit_value().map(to_usize).unwrap_or(usize::MAX);
        let window = matched
            .into_iter()
            .skip(to_usize(options.skip_value()))
            .take(limit);

        let results: Vec<DocScanResult<Document>> = match &projection {
            Some(projection) => window.map(|document| projection.apply(&document)).collect(),
            None => window.map(Ok).collect(),
        };

        log::debug!(
            "Opened cursor on {} with {} documents (skip {}, limit {:?})",
            self.name,
            results.len(),
            options.skip_value(),
            options.limit_value()
        );
        Ok(Box::new(IterCursor::new(results.into_iter())))
    }

    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> DocScanResult<Option<Document>> {
        self.check_opened()?;
        let projection = projection.map(Projection::parse).transpose()?;

        let data = self.data.read();
        let found = match Self::first_position(&data.documents, filter)? {
            Some(position) => &data.documents[position],
            None => return Ok(None),
        };

        match projection {
            Some(projection) => projection.apply(found).map(Some),
            None => Ok(Some(found.clone())),
        }
    }

    fn insert_one(&self, document: Document) -> DocScanResult<InsertOneResult> {
        self.check_opened()?;
        let (inserted_id, document) = with_id(document, None);

        self.data.write().push(document)?;
        Ok(InsertOneResult { inserted_id })
    }

    fn insert_many(&self, documents: Vec<Document>) -> DocScanResult<InsertManyResult> {
        self.check_opened()?;
        if documents.is_empty() {
            log::error!("insert_many called with no documents on {}", self.name);
            return Err(DocScanError::new(
                "Cannot insert an empty list of documents",
                ErrorKind::InvalidArgument,
            ));
        }

        // ordered insert: documents before a failing one stay inserted
        let mut data = self.data.write();
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            let (inserted_id, document) = with_id(document, None);
            data.push(document)?;
            inserted_ids.push(inserted_id);
        }
        Ok(InsertManyResult { inserted_ids })
    }

    fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        validate_replacement(&replacement)?;

        let mut data = self.data.write();
        match Self::first_position(&data.documents, filter)? {
            Some(position) => {
                let existing_id = data.documents[position].get(DOC_ID).cloned();
                if let (Some(existing), Some(requested)) = (&existing_id, replacement.get(DOC_ID)) {
                    if !bson_equals(existing, requested) {
                        log::error!("Replacement would change _id {} to {}", existing, requested);
                        return Err(DocScanError::new(
                            "The _id field is immutable",
                            ErrorKind::InvalidOperation,
                        ));
                    }
                }

                let (_, replacement) = with_id(replacement, existing_id);
                let modified = data.documents[position] != replacement;
                data.replace_at(position, replacement)?;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    ..UpdateResult::default()
                })
            }
            None if upsert => {
                let requested = replacement.get(DOC_ID).cloned().or_else(|| id_from_filter(filter));
                let (upserted_id, replacement) = with_id(replacement, requested);
                data.push(replacement)?;
                Ok(UpdateResult {
                    upserted_count: 1,
                    upserted_id: Some(upserted_id),
                    ..UpdateResult::default()
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn update_one(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        validate_update(update)?;

        let mut data = self.data.write();
        let position = match Self::first_position(&data.documents, filter)? {
            Some(position) => position,
            None => return Ok(UpdateResult::default()),
        };

        let mut updated = data.documents[position].clone();
        let modified = apply_update(&mut updated, update)?;
        if modified {
            data.replace_at(position, updated)?;
        }
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: u64::from(modified),
            ..UpdateResult::default()
        })
    }

    fn update_many(&self, filter: &Document, update: &Document) -> DocScanResult<UpdateResult> {
        self.check_opened()?;
        validate_update(update)?;

        let mut data = self.data.write();
        let positions = Self::filter_positions(&data.documents, filter)?;

        let mut result = UpdateResult {
            matched_count: positions.len() as u64,
            ..UpdateResult::default()
        };
        for position in positions {
            let mut updated = data.documents[position].clone();
            if apply_update(&mut updated, update)? {
                data.replace_at(position, updated)?;
                result.modified_count += 1;
            }
        }
        Ok(result)
    }

    fn delete_one(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.check_opened()?;
        let mut data = self.data.write();
        match Self::first_position(&data.documents, filter)? {
            Some(position) => {
                let keys = data.keys_of(&data.documents[position])?;
                data.unregister(&keys);
                data.documents.remove(position);
                Ok(DeleteResult { deleted_count: 1 })
            }
            None => Ok(DeleteResult::default()),
        }
    }

    fn delete_many(&self, filter: &Document) -> DocScanResult<DeleteResult> {
        self.check_opened()?;
        let mut data = self.data.write();
        let doomed = data
            .documents
            .iter()
            .map(|document| matches(document, filter))
            .collect::<DocScanResult<Vec<bool>>>()?;

        let mut doomed_keys = Vec::new();
        for (document, _) in data.documents.iter().zip(&doomed).filter(|(_, doomed)| **doomed) {
            doomed_keys.push(data.keys_of(document)?);
        }
        for keys in &doomed_keys {
            data.unregister(keys);
        }

        let before = data.documents.len();
        let mut doomed = doomed.into_iter();
        data.documents.retain(|_| !doomed.next().unwrap_or(false));
        Ok(DeleteResult {
            deleted_count: (before - data.documents.len()) as u64,
        })
    }

    fn create_index(&self, index: &IndexSpec) -> DocScanResult<()> {
        index.validate()?;
        self.check_opened()?;

        let mut data = self.data.write();
        let existing = data.indexes.iter().find(|existing| existing.keys() == index.keys());
        if let Some(existing) = existing {
            if existing.is_unique() == index.is_unique() {
                return Ok(());
            }
            log::error!("Index {} already exists with other options", index.name());
            return Err(DocScanError::new(
                &format!("Index {} already exists with different options", index.name()),
                ErrorKind::IndexingError,
            ));
        }

        if index.is_unique() {
            let mut owners = HashMap::with_capacity(data.documents.len());
            for document in &data.documents {
                let (Some(key), Some(id)) = (
                    encode_index_key(index, document)?,
                    document.get(DOC_ID).map(encode_id).transpose()?,
                ) else {
                    continue;
                };
                if owners.insert(key, id).is_some() {
                    log::error!("Cannot build unique index {} over duplicate keys", index.name());
                    return Err(DocScanError::new(
                        &format!("Duplicate key error while building index {}", index.name()),
                        ErrorKind::DuplicateKey,
                    ));
                }
            }
            data.unique.push(UniqueKeys {
                spec: index.clone(),
                owners,
            });
        }

        log::debug!("Created index {} on {}", index.name(), self.name);
        data.indexes.push(index.clone());
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
