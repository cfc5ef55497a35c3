//! In-memory store.
//!
//! Keeps every collection in process memory, in insertion order. It
//! understands the subset of the document query language docscan's own
//! operations need: equality and comparison filters, sorting, projection,
//! `$set`/`$unset`/`$inc` updates and sparse unique indexes. Nothing survives
//! the process.

mod collection;
mod connector;
mod filter;
mod projection;
mod store;
mod update;

pub use collection::*;
pub use connector::*;
pub use store::*;
