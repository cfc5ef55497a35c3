//! Cursors: lazily consumed, explicitly closed iteration handles.
//!
//! A [`Cursor`] is what a store hands back from `find`. It is an [`Iterator`]
//! of `DocScanResult<T>` plus an idempotent [`Cursor::close`]. The scanner
//! never touches a raw cursor directly; it wraps it in a [`ScopedCursor`] so
//! the cursor is released on every exit path of its window.

mod decoding_cursor;
mod iter_cursor;
mod scoped_cursor;

pub use decoding_cursor::*;
pub use iter_cursor::*;
pub use scoped_cursor::*;

use crate::errors::DocScanResult;
use bson::Document;

/// A server-side iteration handle over the documents of one query.
pub trait Cursor<T>: Iterator<Item = DocScanResult<T>> {
    /// Releases the cursor. Calling it more than once, or after a partial
    /// iteration, is allowed and must not fail for that reason.
    fn close(&mut self) -> DocScanResult<()>;
}

impl<T, C: Cursor<T> + ?Sized> Cursor<T> for Box<C> {
    fn close(&mut self) -> DocScanResult<()> {
        (**self).close()
    }
}

/// The cursor type every store backend returns from `find`.
pub type DocumentCursor = Box<dyn Cursor<Document> + Send>;
