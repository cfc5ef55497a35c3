use crate::common::{SortOrder, SortableFields};
use crate::scan::ScanWindow;
use bson::Document;

/// Options for a find: projection, sorting and the `(skip, limit)` window.
///
/// A `limit` of zero, like an absent limit, means no limit.
///
/// # Examples
///
/// ```rust
/// use bson::doc;
/// use docscan::collection::FindOptions;
/// use docscan::common::SortOrder;
///
/// let options = FindOptions::new()
///     .projection(doc! { "name": 1 })
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
///
/// assert_eq!(options.skip_value(), 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) projection: Option<Document>,
    pub(crate) sort_by: Option<SortableFields>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

/// Creates `FindOptions` sorted by a field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Creates `FindOptions` covering a single scan window.
pub fn in_window(window: ScanWindow) -> FindOptions {
    FindOptions::new().window(window)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Sets both skip and limit from a window.
    pub fn window(self, window: ScanWindow) -> FindOptions {
        self.skip(window.skip()).limit(window.limit())
    }

    pub fn projection(mut self, projection: Document) -> FindOptions {
        self.projection = Some(projection);
        self
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        let fields = self.sort_by.take().unwrap_or_default();
        self.sort_by = Some(fields.add_sorted_field(field_name.to_string(), sort_order));
        self
    }

    pub fn sortable_fields(mut self, fields: SortableFields) -> FindOptions {
        self.sort_by = if fields.is_empty() { None } else { Some(fields) };
        self
    }

    pub fn projection_document(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort_fields(&self) -> Option<&SortableFields> {
        self.sort_by.as_ref()
    }

    pub fn skip_value(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    /// The limit, with zero normalised to `None`.
    pub fn limit_value(&self) -> Option<u64> {
        self.limit.filter(|limit| *limit > 0)
    }
}
