//! Supplement catalog: orchestration over storage, price extraction and the
//! listing cache.

mod cache;
mod service;

pub use cache::SupplementCache;
pub use service::{CatalogError, CatalogService};
