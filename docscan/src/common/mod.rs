//! Common types, constants and document helpers shared across the crate.

mod constants;
mod sort_order;
pub(crate) mod document_utils;

pub use constants::*;
pub use sort_order::*;
