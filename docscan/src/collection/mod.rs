//! Collections: the seam between docscan and a document store.
//!
//! A [`CollectionProvider`] is the external collaborator every higher level
//! operation delegates to. It counts and finds documents, hands out cursors
//! and applies writes. [`Collection`] is the cheap, cloneable handle wrapping a
//! provider.
//!
//! ```rust,ignore
//! use bson::doc;
//! use docscan::collection::FindOptions;
//!
//! let users = store.collection("app", "users")?;
//! let total = users.count(&doc! { "age": { "$gte": 18 } })?;
//! let cursor = users.find(&doc! {}, &FindOptions::new().skip(10).limit(10))?;
//! ```

mod find_options;
mod index;
mod provider;
mod results;

pub use find_options::*;
pub use index::*;
pub use provider::*;
pub use results::*;
