use crate::cursor::Cursor;
use crate::errors::DocScanResult;
use bson::Document;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Maps every document of a store cursor into the caller's type.
///
/// A document that does not fit `T` is reported as a `DecodeFailure` item;
/// failures of the underlying cursor pass through untouched.
pub struct DecodingCursor<T, C> {
    cursor: C,
    _target: PhantomData<fn() -> T>,
}

impl<T, C> DecodingCursor<T, C> {
    pub fn new(cursor: C) -> Self {
        DecodingCursor {
            cursor,
            _target: PhantomData,
        }
    }
}

impl<T: DeserializeOwned, C: Cursor<Document>> Iterator for DecodingCursor<T, C> {
    type Item = DocScanResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next().map(|item| {
            item.and_then(|document| {
                bson::from_document::<T>(document).map_err(|err| {
                    log::debug!("Document does not fit target type: {}", err);
                    err.into()
                })
            })
        })
    }
}

impl<T: DeserializeOwned, C: Cursor<Document>> Cursor<T> for DecodingCursor<T, C> {
    fn close(&mut self) -> DocScanResult<()> {
        self.cursor.close()
    }
}
