use crate::cursor::Cursor;
use crate::errors::DocScanResult;
use std::marker::PhantomData;

/// Owns a cursor for the lifetime of one window or page.
///
/// [`ScopedCursor::close`] releases the cursor and reports a close failure.
/// If the guard is dropped without being closed (an error or early return
/// left the window), the cursor is closed on drop and a failure is logged.
pub struct ScopedCursor<T, C: Cursor<T>> {
    cursor: C,
    closed: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T, C: Cursor<T>> ScopedCursor<T, C> {
    pub fn new(cursor: C) -> Self {
        ScopedCursor {
            cursor,
            closed: false,
            _item: PhantomData,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the underlying cursor once; later calls are no-ops.
    pub fn close(&mut self) -> DocScanResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor.close()
    }
}

impl<T, C: Cursor<T>> Iterator for ScopedCursor<T, C> {
    type Item = DocScanResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.cursor.next()
    }
}

impl<T, C: Cursor<T>> Drop for ScopedCursor<T, C> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.cursor.close() {
                log::warn!("Failed to close abandoned cursor: {}", err);
            }
        }
    }
}
