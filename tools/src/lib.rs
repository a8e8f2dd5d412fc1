//! Typed client for the external enrichment/search service, and the
//! normalizer that turns its loosely shaped responses into
//! [`juleha_types::NormalizedItem`] records.

mod client;
mod normalize;

pub use client::{ToolsClient, ToolsError};
pub use normalize::{DEFAULT_MAX_SOURCES, WORKER_MAX_SOURCES, normalize_items};
