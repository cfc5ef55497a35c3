//! # docscan - batched reads over document stores
//!
//! docscan reads large result sets from a document store in fixed size
//! windows, so no single request asks for more than one batch of documents,
//! and describes paged reads with a [`Page`](scan::Page) record.
//!
//! ## Quick Start
//!
//! ```rust
//! use bson::doc;
//! use docscan::client::Query;
//! use docscan::client_builder::ClientConfigBuilder;
//! use docscan::pool::ConnectionPool;
//! use docscan::store::memory::InMemoryConnector;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     username: String,
//!     age: i32,
//! }
//!
//! let config = ClientConfigBuilder::new("memory://local", "app")
//!     .batch_size(2)
//!     .build()
//!     .unwrap();
//! let pool = ConnectionPool::new(config, Arc::new(InMemoryConnector::new()));
//! let users = pool.default_client("user").unwrap();
//!
//! for age in 0..5 {
//!     users.insert_one(&User { username: format!("user{}", age), age }).unwrap();
//! }
//!
//! // three windows of at most two documents each
//! let mut visited = 0;
//! let summary = users
//!     .query_by_cursor(&Query::all(), |_: User| {
//!         visited += 1;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!((summary.windows, visited), (3, 5));
//!
//! let page = users.query_page::<User>(&Query::all(), 2, 2).unwrap();
//! assert_eq!(page.page.total_pages(), 3);
//! assert_eq!(page.items.len(), 2);
//! ```
//!
//! ## Module Organization
//!
//! - [`scan`] - Batch scanning, windows and pagination
//! - [`cursor`] - Cursors over one window of documents
//! - [`collection`] - The collection seam, find options and write results
//! - [`store`] - Stores and connectors (in-memory, and MongoDB behind the
//!   `mongodb` feature)
//! - [`client`] - Typed per-collection client
//! - [`client_config`] / [`client_builder`] - Connection and scan settings
//! - [`pool`] - Lazily connected shared store
//! - [`errors`] - Error types and result definitions
//! - [`common`] - Constants and sort orders

pub mod client;
pub mod client_builder;
pub mod client_config;
pub mod collection;
pub mod common;
pub mod cursor;
pub mod errors;
pub mod pool;
pub mod scan;
pub mod store;

pub use client::{DocClient, PagedResult, Query};
pub use common::DEFAULT_BATCH_SIZE;
pub use errors::{DocScanError, DocScanResult, ErrorKind};
pub use scan::{fetch_page, paginate, scan, BatchScanner, Page};
