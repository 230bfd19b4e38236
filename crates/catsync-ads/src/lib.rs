//! Client for the ad catalog's batch upsert and enumeration API.

mod client;
mod error;
mod types;

pub use client::{AdsClient, BATCH_LIMIT, DEFAULT_FIELDS};
pub use error::AdsError;
pub use types::{
    ApiErrorBody, BatchItem, BatchMethod, BatchResponse, RemoteItem, ValidationMessage,
    ValidationStatus,
};
