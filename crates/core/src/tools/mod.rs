//! Tool placement: platform identification and the on-disk tool cache.
//!
//! - [`Platform`], [`Os`], [`Arch`] - Platform identification types
//! - [`ToolCache`] - Lookup and registration keyed by (tool, version)
//! - [`DirToolCache`] - Runner-compatible directory implementation

mod cache;
mod platform;

pub use cache::{DirToolCache, ToolCache, default_cache_root};
pub use platform::{Arch, Os, Platform};
