use bson::Document;

/// Specifies the direction for sorting documents.
///
/// Used with [`SortableFields`] and the `sort_by` helpers of
/// [`FindOptions`](crate::collection::FindOptions) and
/// [`Query`](crate::client::Query).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest to largest
    Ascending,
    /// Largest to smallest
    Descending,
}

impl SortOrder {
    /// The numeric direction a document database expects in a sort spec.
    pub fn direction(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// An ordered list of fields to sort by.
///
/// Field order matters: the first field is the primary key, later fields break
/// ties. Scans over large collections should end with a unique field such as
/// `_id` so that windows never overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortableFields {
    sorting_order: Vec<(String, SortOrder)>,
}

impl SortableFields {
    pub fn new() -> SortableFields {
        SortableFields {
            sorting_order: Vec::new(),
        }
    }

    /// Appends a field; a field already present keeps its first position and
    /// takes the new order.
    pub fn add_sorted_field(mut self, field_name: String, sort_order: SortOrder) -> SortableFields {
        match self
            .sorting_order
            .iter_mut()
            .find(|(name, _)| *name == field_name)
        {
            Some(existing) => existing.1 = sort_order,
            None => self.sorting_order.push((field_name, sort_order)),
        }
        self
    }

    pub fn sorting_order(&self) -> &[(String, SortOrder)] {
        &self.sorting_order
    }

    pub fn is_empty(&self) -> bool {
        self.sorting_order.is_empty()
    }

    /// Renders the fields as a sort document, e.g. `{ "age": -1, "_id": 1 }`.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        for (field, order) in &self.sorting_order {
            document.insert(field.clone(), order.direction());
        }
        document
    }
}
