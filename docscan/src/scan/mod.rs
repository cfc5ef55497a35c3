//! Batched scanning and offset pagination.
//!
//! Both are pure integer arithmetic over `(skip, limit)` windows plus a fetch
//! function supplied by the caller:
//!
//! - [`BatchScanner`] splits `total_count` documents into fixed size windows
//!   and visits every document of every window, in increasing `skip` order.
//! - [`paginate`] describes one page of a result set, and [`fetch_page`] runs
//!   the single window of that page.
//!
//! Skip/limit paging is only consistent across windows when the fetch sorts on
//! a stable key and the collection is not written to during the scan.

mod page;
mod scanner;
mod window;

pub use page::*;
pub use scanner::*;
pub use window::*;

use crate::errors::{DocScanError, ErrorKind};

pub(crate) fn empty_result() -> DocScanError {
    DocScanError::new("No documents found", ErrorKind::EmptyResult)
}
