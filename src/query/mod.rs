//! Keyed query cache for data fetching, in the spirit of TanStack Query.
//!
//! A [`QueryClient`] owns one cache entry per [`QueryKey`]. Views declare
//! queries and read snapshots from the returned handles on each tick; the
//! client deduplicates concurrent requests, retries transient failures, serves
//! fresh data without a request and evicts entries nobody observes.
//!
//! # Example
//!
//! ```ignore
//! let api = catalog.clone();
//! let handle = queries.query(
//!     QueryKey::detail("25"),
//!     move || {
//!         let api = api.clone();
//!         async move { api.fetch_detail("25").await }
//!     },
//!     config.queries.detail_options(),
//! );
//!
//! // In render
//! let state = handle.state();
//! if state.is_loading() {
//!     render_skeleton();
//! } else if let Some(detail) = state.data {
//!     render_detail(&detail);
//! }
//! ```

mod client;
mod handle;
mod infinite;
mod key;

pub use client::{EntryStatus, QueryClient, QueryOptions};
pub use handle::{QueryHandle, QueryState};
pub use infinite::{InfiniteData, InfiniteQueryHandle, InfiniteState};
pub use key::QueryKey;
