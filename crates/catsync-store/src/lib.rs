//! Read-only client for the source store's paginated product API.

mod client;
mod error;

pub use client::StoreClient;
pub use error::StoreError;
