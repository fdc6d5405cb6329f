//! Remote data client for the PokéAPI.

pub mod api_types;
pub mod client;
pub mod format;
pub mod types;

pub use client::CatalogClient;
pub use types::{CategoryTag, ItemDetail, ItemRef, ListingPage, PageData};
