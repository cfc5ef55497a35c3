//! Store backends.
//!
//! A store hands out [`Collection`](crate::collection::Collection) handles and
//! owns the connection they share. Backends are pluggable through
//! [`StoreProvider`] and are opened by a [`StoreConnector`]:
//!
//! - **In-memory**: [`memory::InMemoryConnector`], for tests and embedded use
//! - **MongoDB**: `mongo::MongoConnector`, behind the `mongodb` feature

mod document_store;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use document_store::*;
