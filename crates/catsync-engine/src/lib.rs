//! Replication engine, event processor, and feed generator.
//!
//! Everything here sits between the source-store client, the ad-catalog
//! client, and the cache: the bulk and targeted replication paths, webhook
//! ingestion with per-product serialization, and the two CSV feed modes.

mod error;
mod events;
mod feed;
mod locks;
mod outcome;
mod report;
mod sync;

pub use error::EngineError;
pub use events::{
    AcceptedEvent, EventAction, WebhookError, WebhookHeaders, WebhookProcessor, WebhookRejection,
};
pub use feed::FeedArtifacts;
pub use locks::ProductLocks;
pub use report::SyncReport;
pub use sync::{SyncEngine, TargetedOutcome};
