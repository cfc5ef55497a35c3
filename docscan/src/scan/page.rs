use crate::common::DEFAULT_PAGE_SIZE;
use crate::cursor::{Cursor, ScopedCursor};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::scan::{empty_result, ScanWindow};
use serde::{Deserialize, Serialize};

/// Metadata describing one page of a result set.
///
/// A `Page` is computed by [`paginate`] and never changes afterwards. It does
/// not check that `page_no` lies within `1..=total_pages`; a page past the end
/// is described as such (`is_last_page` is then false) and it is up to the
/// caller to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    page_no: u64,
    page_size: u64,
    #[serde(rename = "total_page")]
    total_pages: u64,
    total_count: u64,
    #[serde(rename = "first_page")]
    is_first_page: bool,
    #[serde(rename = "last_page")]
    is_last_page: bool,
}

impl Page {
    pub fn page_no(&self) -> u64 {
        self.page_no
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn is_first_page(&self) -> bool {
        self.is_first_page
    }

    pub fn is_last_page(&self) -> bool {
        self.is_last_page
    }

    /// Whether `page_no` points at an existing page.
    pub fn is_in_range(&self) -> bool {
        self.page_no >= 1 && self.page_no <= self.total_pages
    }

    /// The single window holding this page's documents.
    ///
    /// Returns `None` when the offset does not fit in a `u64`.
    pub fn window(&self) -> Option<ScanWindow> {
        let skip = self.page_no.saturating_sub(1).checked_mul(self.page_size)?;
        Some(ScanWindow::new(skip, self.page_size))
    }
}

/// Describes page `page_no` of `total_count` documents split in pages of
/// `page_size`.
///
/// A `page_size` of zero falls back to [`DEFAULT_PAGE_SIZE`]. An empty result
/// has exactly one (empty) page, so page 1 of nothing is both the first and
/// the last page.
///
/// # Examples
///
/// ```rust
/// use docscan::scan::paginate;
///
/// let page = paginate(12, 3, 5);
/// assert_eq!(page.total_pages(), 3);
/// assert!(page.is_last_page());
/// ```
pub fn paginate(total_count: u64, page_no: u64, page_size: u64) -> Page {
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };

    let total_pages = if total_count == 0 {
        1
    } else {
        total_count.div_ceil(page_size)
    };

    Page {
        page_no,
        page_size,
        total_pages,
        total_count,
        is_first_page: page_no == 1,
        is_last_page: page_no == total_pages,
    }
}

/// Fetches the single window of page `page_no` and hands each document to
/// `visit`.
///
/// The returned page is computed from `total_count` as counted before the
/// fetch; concurrent writes between the count and the fetch are not
/// reflected. The cursor is closed on every exit.
///
/// # Errors
///
/// * `InvalidArgument` when `page_no` is zero or the page offset overflows.
/// * `EmptyResult` without fetching when `total_count` is zero.
/// * Any error of `fetch`, of the cursor or of `visit`, unchanged.
pub fn fetch_page<T, C, F, V>(
    total_count: u64,
    page_no: u64,
    page_size: u64,
    fetch: F,
    mut visit: V,
) -> DocScanResult<Page>
where
    C: Cursor<T>,
    F: FnOnce(ScanWindow) -> DocScanResult<C>,
    V: FnMut(T) -> DocScanResult<()>,
{
    if page_no == 0 {
        log::error!("Page numbers start at 1");
        return Err(DocScanError::new(
            "Page numbers start at 1",
            ErrorKind::InvalidArgument,
        ));
    }

    if total_count == 0 {
        log::debug!("Nothing to page through");
        return Err(empty_result());
    }

    let page = paginate(total_count, page_no, page_size);
    let window = page.window().ok_or_else(|| {
        log::error!("Offset of page {} overflows", page_no);
        DocScanError::new(
            &format!("Offset of page {} with size {} overflows", page_no, page.page_size()),
            ErrorKind::InvalidArgument,
        )
    })?;

    if !page.is_in_range() {
        log::debug!("Page {} is past the last page {}", page_no, page.total_pages());
    }

    let mut cursor = ScopedCursor::new(fetch(window)?);
    for item in cursor.by_ref() {
        visit(item?)?;
    }
    cursor.close()?;

    Ok(page)
}
