use std::iter::FusedIterator;

/// A single bounded `(skip, limit)` fetch against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanWindow {
    skip: u64,
    limit: u64,
}

impl ScanWindow {
    pub fn new(skip: u64, limit: u64) -> Self {
        ScanWindow { skip, limit }
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Number of windows of `batch_size` documents needed to cover `total_count`.
/// A zero `batch_size` counts as one.
pub(crate) fn window_count(total_count: u64, batch_size: u64) -> u64 {
    total_count.div_ceil(batch_size.max(1))
}

/// The windows covering a result set, in increasing `skip` order.
///
/// Every window carries the full batch size as its limit, including the last
/// one; the store simply returns fewer documents near the end.
#[derive(Debug, Clone)]
pub struct ScanWindows {
    batch_size: u64,
    next_index: u64,
    count: u64,
}

impl ScanWindows {
    /// A zero `batch_size` counts as one.
    pub(crate) fn new(total_count: u64, batch_size: u64) -> Self {
        let batch_size = batch_size.max(1);
        ScanWindows {
            batch_size,
            next_index: 0,
            count: window_count(total_count, batch_size),
        }
    }
}

impl Iterator for ScanWindows {
    type Item = ScanWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.count {
            return None;
        }
        let window = ScanWindow::new(self.next_index * self.batch_size, self.batch_size);
        self.next_index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.count - self.next_index).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ScanWindows {}

impl FusedIterator for ScanWindows {}
