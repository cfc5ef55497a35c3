use crate::common::DEFAULT_BATCH_SIZE;
use crate::cursor::{Cursor, ScopedCursor};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::scan::{empty_result, ScanWindow, ScanWindows};
use std::iter::FusedIterator;

/// Counters reported by a completed [`BatchScanner::scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of windows fetched
    pub windows: u64,
    /// Number of documents handed to the visitor
    pub visited: u64,
}

/// Visits every document of a result set through fixed size windows.
///
/// The scanner holds no state besides its batch size; one instance can drive
/// any number of scans, from any number of threads.
///
/// # Examples
///
/// ```rust
/// use docscan::cursor::IterCursor;
/// use docscan::scan::BatchScanner;
///
/// let data: Vec<u64> = (0..10).collect();
/// let scanner = BatchScanner::new(4).unwrap();
/// let mut seen = Vec::new();
///
/// let summary = scanner
///     .scan(
///         data.len() as u64,
///         |window| {
///             let start = window.skip() as usize;
///             let end = (start + window.limit() as usize).min(data.len());
///             Ok(IterCursor::from_items(data[start..end].to_vec()))
///         },
///         |item| {
///             seen.push(item);
///             Ok(())
///         },
///     )
///     .unwrap();
///
/// assert_eq!(summary.windows, 3);
/// assert_eq!(seen, data);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScanner {
    batch_size: u64,
}

impl Default for BatchScanner {
    fn default() -> Self {
        BatchScanner {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchScanner {
    /// Creates a scanner fetching `batch_size` documents per window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `batch_size` is zero.
    pub fn new(batch_size: u64) -> DocScanResult<Self> {
        if batch_size == 0 {
            log::error!("Batch size must be positive");
            return Err(DocScanError::new(
                "Batch size must be positive",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(BatchScanner { batch_size })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// The windows a scan over `total_count` documents fetches, in order.
    pub fn windows(&self, total_count: u64) -> ScanWindows {
        ScanWindows::new(total_count, self.batch_size)
    }

    /// Fetches every window of `total_count` documents and hands each
    /// document to `visit`, window by window.
    ///
    /// Each window's cursor is closed before the next window is fetched, and
    /// on every early exit. The first error (from `fetch`, from the cursor, or
    /// from `visit`) stops the scan and is returned unchanged; documents
    /// visited before it stay visited.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResult` without fetching when `total_count` is zero.
    pub fn scan<T, C, F, V>(
        &self,
        total_count: u64,
        mut fetch: F,
        mut visit: V,
    ) -> DocScanResult<ScanSummary>
    where
        C: Cursor<T>,
        F: FnMut(ScanWindow) -> DocScanResult<C>,
        V: FnMut(T) -> DocScanResult<()>,
    {
        if total_count == 0 {
            log::debug!("Nothing to scan");
            return Err(empty_result());
        }

        let mut summary = ScanSummary::default();
        for window in self.windows(total_count) {
            log::debug!(
                "Scanning window skip={} limit={} of {} documents",
                window.skip(),
                window.limit(),
                total_count
            );

            let cursor = fetch(window).map_err(|err| {
                log::error!("Fetch of window at skip {} failed: {}", window.skip(), err);
                err
            })?;
            let mut cursor = ScopedCursor::new(cursor);
            summary.windows += 1;

            for item in cursor.by_ref() {
                visit(item?)?;
                summary.visited += 1;
            }
            cursor.close()?;
        }
        Ok(summary)
    }

    /// Lazily iterates over every document of `total_count` documents.
    ///
    /// Windows are fetched on demand as the iterator advances. A fetch or
    /// cursor failure is yielded once and ends the iteration. A
    /// `DecodeFailure` abandons the rest of its window only: the caller may
    /// stop there, or keep pulling to continue with the next window.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResult` without fetching when `total_count` is zero.
    pub fn iter<T, C, F>(&self, total_count: u64, fetch: F) -> DocScanResult<ScanIter<T, C, F>>
    where
        C: Cursor<T>,
        F: FnMut(ScanWindow) -> DocScanResult<C>,
    {
        if total_count == 0 {
            log::debug!("Nothing to scan");
            return Err(empty_result());
        }
        Ok(ScanIter {
            windows: self.windows(total_count),
            fetch,
            current: None,
            finished: false,
        })
    }
}

/// Scans `total_count` documents in windows of `batch_size`.
///
/// Shorthand for [`BatchScanner::new`] followed by [`BatchScanner::scan`].
pub fn scan<T, C, F, V>(
    total_count: u64,
    batch_size: u64,
    fetch: F,
    visit: V,
) -> DocScanResult<ScanSummary>
where
    C: Cursor<T>,
    F: FnMut(ScanWindow) -> DocScanResult<C>,
    V: FnMut(T) -> DocScanResult<()>,
{
    BatchScanner::new(batch_size)?.scan(total_count, fetch, visit)
}

/// Lazy sequence over every document of a batched scan.
///
/// Created by [`BatchScanner::iter`]. Finite and not restartable; dropping it
/// mid-window closes the open cursor.
pub struct ScanIter<T, C: Cursor<T>, F> {
    windows: ScanWindows,
    fetch: F,
    current: Option<ScopedCursor<T, C>>,
    finished: bool,
}

impl<T, C, F> Iterator for ScanIter<T, C, F>
where
    C: Cursor<T>,
    F: FnMut(ScanWindow) -> DocScanResult<C>,
{
    type Item = DocScanResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            match self.current.as_mut().map(|cursor| cursor.next()) {
                Some(Some(Ok(item))) => return Some(Ok(item)),
                Some(Some(Err(err))) => {
                    // dropping the guard closes the abandoned window
                    self.current = None;
                    if err.kind() != &ErrorKind::DecodeFailure {
                        self.finished = true;
                    }
                    return Some(Err(err));
                }
                Some(None) => {
                    if let Some(mut cursor) = self.current.take() {
                        if let Err(err) = cursor.close() {
                            self.finished = true;
                            return Some(Err(err));
                        }
                    }
                }
                None => {}
            }

            let window = match self.windows.next() {
                Some(window) => window,
                None => {
                    self.finished = true;
                    return None;
                }
            };

            log::debug!("Scanning window skip={} limit={}", window.skip(), window.limit());
            match (self.fetch)(window) {
                Ok(cursor) => self.current = Some(ScopedCursor::new(cursor)),
                Err(err) => {
                    log::error!("Fetch of window at skip {} failed: {}", window.skip(), err);
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<T, C, F> FusedIterator for ScanIter<T, C, F>
where
    C: Cursor<T>,
    F: FnMut(ScanWindow) -> DocScanResult<C>,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::IterCursor;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Cursor over a slice of a fake collection that records its close calls.
    struct TrackedCursor {
        items: std::vec::IntoIter<DocScanResult<u64>>,
        log: Rc<RefCell<Vec<String>>>,
        skip: u64,
    }

    impl Iterator for TrackedCursor {
        type Item = DocScanResult<u64>;

        fn next(&mut self) -> Option<Self::Item> {
            self.items.next()
        }
    }

    impl Cursor<u64> for TrackedCursor {
        fn close(&mut self) -> DocScanResult<()> {
            self.log.borrow_mut().push(format!("close {}", self.skip));
            Ok(())
        }
    }

    struct FakeCollection {
        total: u64,
        log: Rc<RefCell<Vec<String>>>,
        fail_at_skip: Option<u64>,
        corrupt: Option<u64>,
    }

    impl FakeCollection {
        fn new(total: u64) -> Self {
            FakeCollection {
                total,
                log: Rc::new(RefCell::new(Vec::new())),
                fail_at_skip: None,
                corrupt: None,
            }
        }

        fn fetch(&self, window: ScanWindow) -> DocScanResult<TrackedCursor> {
            self.log.borrow_mut().push(format!("fetch {}", window.skip()));
            if self.fail_at_skip == Some(window.skip()) {
                return Err(DocScanError::new("network down", ErrorKind::FetchFailure));
            }
            let end = (window.skip() + window.limit()).min(self.total);
            let items = (window.skip()..end)
                .map(|i| {
                    if self.corrupt == Some(i) {
                        Err(DocScanError::new("bad document", ErrorKind::DecodeFailure))
                    } else {
                        Ok(i)
                    }
                })
                .collect::<Vec<_>>();
            Ok(TrackedCursor {
                items: items.into_iter(),
                log: self.log.clone(),
                skip: window.skip(),
            })
        }

        fn events(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = BatchScanner::new(0).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn default_uses_default_batch_size() {
        assert_eq!(BatchScanner::default().batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn empty_result_does_not_fetch() {
        let collection = FakeCollection::new(0);
        let scanner = BatchScanner::new(10).unwrap();
        let err = scanner
            .scan(0, |w| collection.fetch(w), |_| Ok(()))
            .unwrap_err();

        assert!(err.is_empty_result());
        assert!(collection.events().is_empty());
    }

    #[test]
    fn scan_visits_every_document_once_in_order() {
        let collection = FakeCollection::new(9000);
        let scanner = BatchScanner::new(4096).unwrap();
        let mut visited = Vec::new();

        let summary = scanner
            .scan(
                9000,
                |w| collection.fetch(w),
                |item: u64| {
                    visited.push(item);
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(summary, ScanSummary { windows: 3, visited: 9000 });
        assert_eq!(visited, (0..9000).collect::<Vec<u64>>());
        assert_eq!(
            collection.events(),
            vec!["fetch 0", "close 0", "fetch 4096", "close 4096", "fetch 8192", "close 8192"]
        );
    }

    #[test]
    fn fetch_failure_aborts_after_first_window() {
        let mut collection = FakeCollection::new(25);
        collection.fail_at_skip = Some(10);
        let scanner = BatchScanner::new(10).unwrap();
        let mut visited = Vec::new();

        let err = scanner
            .scan(
                25,
                |w| collection.fetch(w),
                |item: u64| {
                    visited.push(item);
                    Ok(())
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::FetchFailure);
        assert_eq!(err.message(), "network down");
        assert_eq!(visited, (0..10).collect::<Vec<u64>>());
        assert_eq!(collection.events(), vec!["fetch 0", "close 0", "fetch 10"]);
    }

    #[test]
    fn visitor_failure_closes_the_window() {
        let collection = FakeCollection::new(25);
        let scanner = BatchScanner::new(10).unwrap();

        let err = scanner
            .scan(
                25,
                |w| collection.fetch(w),
                |item: u64| {
                    if item == 13 {
                        Err(DocScanError::new("stop", ErrorKind::InvalidOperation))
                    } else {
                        Ok(())
                    }
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert_eq!(
            collection.events(),
            vec!["fetch 0", "close 0", "fetch 10", "close 10"]
        );
    }

    #[test]
    fn decode_failure_aborts_callback_scan() {
        let mut collection = FakeCollection::new(25);
        collection.corrupt = Some(12);
        let scanner = BatchScanner::new(10).unwrap();
        let mut visited = 0;

        let err = scanner
            .scan(
                25,
                |w| collection.fetch(w),
                |_| {
                    visited += 1;
                    Ok(())
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::DecodeFailure);
        assert_eq!(visited, 12);
        assert_eq!(collection.events().last().map(String::as_str), Some("close 10"));
    }

    #[test]
    fn free_function_matches_scanner() {
        let data: Vec<u64> = (0..7).collect();
        let mut seen = Vec::new();
        let summary = scan(
            7,
            3,
            |w| {
                let start = w.skip() as usize;
                let end = (start + w.limit() as usize).min(data.len());
                Ok(IterCursor::from_items(data[start..end].to_vec()))
            },
            |item| {
                seen.push(item);
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(summary.windows, 3);
        assert_eq!(seen, data);
        assert!(scan(7, 0, |_| Ok(IterCursor::from_items(Vec::<u64>::new())), |_| Ok(())).is_err());
    }

    #[test]
    fn iter_yields_lazily() {
        let collection = FakeCollection::new(25);
        let scanner = BatchScanner::new(10).unwrap();
        let mut iter = scanner.iter::<u64, _, _>(25, |w| collection.fetch(w)).unwrap();

        assert!(collection.events().is_empty());
        assert_eq!(iter.next().unwrap().unwrap(), 0);
        assert_eq!(collection.events(), vec!["fetch 0"]);

        let rest: Vec<u64> = iter.map(|it| it.unwrap()).collect();
        assert_eq!(rest, (1..25).collect::<Vec<u64>>());
        assert_eq!(
            collection.events(),
            vec!["fetch 0", "close 0", "fetch 10", "close 10", "fetch 20", "close 20"]
        );
    }

    #[test]
    fn iter_on_empty_result_fails_upfront() {
        let collection = FakeCollection::new(0);
        let scanner = BatchScanner::new(10).unwrap();
        let result = scanner.iter::<u64, _, _>(0, |w| collection.fetch(w));
        assert!(matches!(result, Err(ref err) if err.is_empty_result()));
    }

    #[test]
    fn iter_stops_after_fetch_failure() {
        let mut collection = FakeCollection::new(25);
        collection.fail_at_skip = Some(10);
        let scanner = BatchScanner::new(10).unwrap();

        let results: Vec<DocScanResult<u64>> =
            scanner.iter::<u64, _, _>(25, |w| collection.fetch(w)).unwrap().collect();

        assert_eq!(results.len(), 11);
        assert!(results[..10].iter().all(|r| r.is_ok()));
        assert_eq!(results[10].as_ref().unwrap_err().kind(), &ErrorKind::FetchFailure);
    }

    #[test]
    fn iter_skips_rest_of_window_after_decode_failure() {
        let mut collection = FakeCollection::new(25);
        collection.corrupt = Some(12);
        let scanner = BatchScanner::new(10).unwrap();

        let results: Vec<DocScanResult<u64>> =
            scanner.iter::<u64, _, _>(25, |w| collection.fetch(w)).unwrap().collect();

        let ok: Vec<u64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        let mut expected: Vec<u64> = (0..12).collect();
        expected.extend(20..25);
        assert_eq!(ok, expected);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert!(collection.events().contains(&"close 10".to_string()));
    }

    #[test]
    fn dropping_iter_closes_open_window() {
        let collection = FakeCollection::new(25);
        let scanner = BatchScanner::new(10).unwrap();
        {
            let mut iter = scanner.iter::<u64, _, _>(25, |w| collection.fetch(w)).unwrap();
            iter.next();
            iter.next();
        }
        assert_eq!(collection.events(), vec!["fetch 0", "close 0"]);
    }
}
