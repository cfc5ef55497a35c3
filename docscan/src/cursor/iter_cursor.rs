use crate::cursor::Cursor;
use crate::errors::DocScanResult;

/// A cursor over an in-process iterator.
///
/// Closing drops the iterator, so a closed `IterCursor` yields nothing.
pub struct IterCursor<I> {
    underlying: Option<I>,
}

impl<I> IterCursor<I> {
    pub fn new(iter: I) -> Self {
        IterCursor {
            underlying: Some(iter),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.underlying.is_none()
    }
}

impl<T> IterCursor<std::vec::IntoIter<DocScanResult<T>>> {
    /// Builds a cursor over already materialized documents.
    pub fn from_items(items: Vec<T>) -> Self {
        let results: Vec<DocScanResult<T>> = items.into_iter().map(Ok).collect();
        IterCursor::new(results.into_iter())
    }
}

impl<T, I: Iterator<Item = DocScanResult<T>>> Iterator for IterCursor<I> {
    type Item = DocScanResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let iter = self.underlying.as_mut()?;
        match iter.next() {
            Some(item) => Some(item),
            None => {
                self.underlying = None;
                None
            }
        }
    }
}

impl<T, I: Iterator<Item = DocScanResult<T>>> Cursor<T> for IterCursor<I> {
    fn close(&mut self) -> DocScanResult<()> {
        self.underlying = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DocScanError, ErrorKind};

    #[test]
    fn yields_items_in_order() {
        let cursor = IterCursor::from_items(vec![1, 2, 3]);
        let items: Vec<i32> = cursor.map(|it| it.unwrap()).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn passes_errors_through() {
        let items: Vec<DocScanResult<i32>> = vec![
            Ok(1),
            Err(DocScanError::new("broken", ErrorKind::FetchFailure)),
        ];
        let mut cursor = IterCursor::new(items.into_iter());
        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn close_after_partial_iteration() {
        let mut cursor = IterCursor::from_items(vec!["a", "b"]);
        assert_eq!(cursor.next().unwrap().unwrap(), "a");
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert!(cursor.is_closed());
        assert!(cursor.next().is_none());
    }
}
