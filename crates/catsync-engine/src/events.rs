//! Push-notification (webhook) processing.
//!
//! The HTTP layer hands the raw body and headers here. Validation is
//! fail-fast; an accepted event is recorded with its stock delta and
//! answered immediately, while the actual replication work runs in a
//! spawned task that reports its outcome back onto the event row. Work is
//! serialized per source product id so concurrent deliveries for the same
//! product cannot race on the cache.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use catsync_core::{retailer, SourceProduct, StockStatus};
use catsync_db::{events as db_events, products, sync_status, variations, NewEvent};

use crate::error::EngineError;
use crate::locks::ProductLocks;
use crate::sync::SyncEngine;

type HmacSha256 = Hmac<Sha256>;

/// Webhook actions carried in the `product.<action>` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
    Restored,
}

impl EventAction {
    #[must_use]
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic.strip_prefix("product.")? {
            "created" => Some(EventAction::Created),
            "updated" => Some(EventAction::Updated),
            "deleted" => Some(EventAction::Deleted),
            "restored" => Some(EventAction::Restored),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Created => "created",
            EventAction::Updated => "updated",
            EventAction::Deleted => "deleted",
            EventAction::Restored => "restored",
        }
    }
}

/// Why a webhook was rejected at the boundary, with the HTTP status the
/// endpoint must answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRejection {
    /// Missing or unrecognized topic header → 400.
    BadTopic,
    /// Source URL hostname does not match the configured store → 403.
    ForbiddenSource,
    /// Signature header does not match the body HMAC → 401.
    InvalidSignature,
    /// Body is not a valid JSON product payload → 400.
    InvalidPayload,
}

impl WebhookRejection {
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            WebhookRejection::BadTopic | WebhookRejection::InvalidPayload => 400,
            WebhookRejection::ForbiddenSource => 403,
            WebhookRejection::InvalidSignature => 401,
        }
    }
}

/// Webhook handling error: a boundary rejection or an internal failure.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook rejected: {0:?}")]
    Rejected(WebhookRejection),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<catsync_db::DbError> for WebhookError {
    fn from(e: catsync_db::DbError) -> Self {
        WebhookError::Engine(e.into())
    }
}

/// Raw header values from the push request.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub topic: Option<String>,
    pub signature: Option<String>,
    pub source: Option<String>,
    pub delivery_id: Option<String>,
}

/// An accepted event, ready for asynchronous processing.
#[derive(Debug, Clone)]
pub struct AcceptedEvent {
    pub event_id: i64,
    pub action: EventAction,
    pub product: SourceProduct,
}

/// Validates, records, and dispatches push notifications.
#[derive(Clone)]
pub struct WebhookProcessor {
    engine: Arc<SyncEngine>,
    secret: String,
    store_host: Option<String>,
    locks: ProductLocks,
}

impl WebhookProcessor {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>, secret: String, store_host: Option<String>) -> Self {
        Self {
            engine,
            secret,
            store_host,
            locks: ProductLocks::new(),
        }
    }

    /// The fail-fast validation pipeline. Nothing is persisted for a
    /// rejected delivery.
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`WebhookRejection`].
    pub fn validate(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<(EventAction, SourceProduct), WebhookRejection> {
        let topic = headers.topic.as_deref().ok_or(WebhookRejection::BadTopic)?;
        let action = EventAction::from_topic(topic).ok_or(WebhookRejection::BadTopic)?;

        let source_host = headers
            .source
            .as_deref()
            .and_then(|s| url::Url::parse(s).ok())
            .and_then(|u| u.host_str().map(str::to_owned));
        if source_host.as_deref() != self.store_host.as_deref() {
            return Err(WebhookRejection::ForbiddenSource);
        }

        let signature = headers
            .signature
            .as_deref()
            .ok_or(WebhookRejection::InvalidSignature)?;
        self.verify_signature(signature, body)?;

        let product: SourceProduct =
            serde_json::from_slice(body).map_err(|_| WebhookRejection::InvalidPayload)?;

        Ok((action, product))
    }

    /// Constant-time HMAC-SHA-256 verification of the raw body against the
    /// base64 signature header.
    fn verify_signature(&self, signature: &str, body: &[u8]) -> Result<(), WebhookRejection> {
        let expected = BASE64_STANDARD
            .decode(signature)
            .map_err(|_| WebhookRejection::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookRejection::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookRejection::InvalidSignature)
    }

    /// Validates a delivery, computes the stock delta against the cache,
    /// and inserts the event record. Returns the accepted event for the
    /// asynchronous processing step.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Rejected`] on boundary failures (nothing
    /// persisted) or [`WebhookError::Engine`] on cache failures.
    pub async fn ingest(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<AcceptedEvent, WebhookError> {
        let (action, product) = self
            .validate(headers, body)
            .map_err(WebhookError::Rejected)?;

        let old = self.cached_stock(&product).await?;
        let new_quantity = product.stock_quantity;
        let stock_delta = match (old.as_ref().and_then(|o| o.1), new_quantity) {
            (Some(old_qty), Some(new_qty)) => Some(new_qty - old_qty),
            _ => None,
        };

        let record = NewEvent {
            topic: headers.topic.clone().unwrap_or_default(),
            action: action.as_str().to_string(),
            product_id: product.id,
            payload: String::from_utf8_lossy(body).into_owned(),
            signature: headers.signature.clone().unwrap_or_default(),
            name: product.name.clone(),
            kind: product.kind.as_str().to_string(),
            old_stock_status: old.as_ref().map(|o| o.0.as_str().to_string()),
            new_stock_status: Some(product.stock_status.as_str().to_string()),
            old_stock_quantity: old.as_ref().and_then(|o| o.1),
            new_stock_quantity: new_quantity,
            stock_delta,
            retailer_id: Some(retailer::retailer_id_for(&product)),
        };
        let event_id = db_events::insert_event(self.engine.pool(), &record).await?;

        tracing::info!(
            event_id,
            product_id = product.id,
            action = action.as_str(),
            delivery_id = headers.delivery_id.as_deref().unwrap_or(""),
            "webhook accepted"
        );

        Ok(AcceptedEvent {
            event_id,
            action,
            product,
        })
    }

    /// Full entry point for the HTTP handler: ingest, answer immediately,
    /// and process in a spawned task.
    ///
    /// # Errors
    ///
    /// Propagates ingest failures; processing failures are recorded on the
    /// event row instead.
    pub async fn handle(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<i64, WebhookError> {
        let accepted = self.ingest(headers, body).await?;
        let event_id = accepted.event_id;
        let processor = self.clone();
        tokio::spawn(async move {
            processor.process(accepted).await;
        });
        Ok(event_id)
    }

    /// Runs the replication work for an accepted event and marks the event
    /// row processed or errored. Serialized per product id (normalized to
    /// the parent for variations).
    pub async fn process(&self, accepted: AcceptedEvent) {
        let key = if accepted.product.is_variation() {
            accepted.product.parent_id
        } else {
            accepted.product.id
        };
        let _guard = self.locks.lock(key).await;

        let result = self.dispatch(accepted.action, &accepted.product).await;
        let pool = self.engine.pool();
        let mark = match result {
            Ok(()) => db_events::mark_event_processed(pool, accepted.event_id).await,
            Err(e) => {
                tracing::error!(
                    event_id = accepted.event_id,
                    product_id = accepted.product.id,
                    error = %e,
                    "event processing failed"
                );
                db_events::mark_event_error(pool, accepted.event_id, &e.to_string()).await
            }
        };
        if let Err(e) = mark {
            tracing::error!(event_id = accepted.event_id, error = %e, "failed to mark event row");
        }
    }

    async fn dispatch(
        &self,
        action: EventAction,
        product: &SourceProduct,
    ) -> Result<(), EngineError> {
        let pool = self.engine.pool();
        match action {
            EventAction::Created | EventAction::Restored => {
                if product.is_variable() {
                    self.engine.sync_variable(product).await?;
                } else if product.is_variation() {
                    let parent = self.parent_for(product).await?;
                    self.engine.sync_product(product, Some(&parent)).await?;
                } else {
                    products::upsert_product(pool, product).await?;
                    if product.is_in_stock() {
                        self.engine.sync_product(product, None).await?;
                    }
                }
            }
            EventAction::Updated => {
                if product.is_variable() {
                    self.engine.sync_variable(product).await?;
                } else if product.is_variation() {
                    let parent = self.parent_for(product).await?;
                    self.engine.sync_product(product, Some(&parent)).await?;
                } else {
                    self.engine.sync_product(product, None).await?;
                }
            }
            EventAction::Deleted => {
                let retailer_id = retailer::retailer_id_for(product);
                let status = sync_status::get_sync_status(pool, &retailer_id).await?;
                if status.is_some_and(|s| s.exists_remotely) {
                    // Never DELETE: the remote row is marked out of stock
                    // and kept.
                    let response = self
                        .engine
                        .ads()
                        .update_stock(&retailer_id, retailer::AVAILABILITY_OUT_OF_STOCK, Some(0))
                        .await?;
                    if let Some(error) = response.error {
                        tracing::warn!(
                            retailer_id,
                            error = %error.message,
                            "out-of-stock update rejected during deletion"
                        );
                    }
                }
                if product.is_variation() {
                    variations::delete_variation(pool, product.id).await?;
                    sync_status::delete_sync_status(pool, &retailer_id).await?;
                } else {
                    products::delete_product(pool, product.id).await?;
                }
            }
        }
        Ok(())
    }

    /// Parent context for a variation event: the cached row when present,
    /// otherwise exactly one rehydration fetch from the source store.
    async fn parent_for(&self, variation: &SourceProduct) -> Result<SourceProduct, EngineError> {
        if let Some(row) = products::get_product(self.engine.pool(), variation.parent_id).await? {
            return Ok(row.to_source());
        }
        tracing::debug!(
            parent_id = variation.parent_id,
            "variation parent not cached; fetching from source"
        );
        let parent = self.engine.store().fetch_one(variation.parent_id).await?;
        Ok(parent)
    }

    /// Old stock observation for the delta columns, from whichever cache
    /// table holds the product.
    async fn cached_stock(
        &self,
        product: &SourceProduct,
    ) -> Result<Option<(StockStatus, Option<i64>)>, EngineError> {
        let pool = self.engine.pool();
        if product.is_variation() {
            let rows = variations::list_variations(pool, product.parent_id).await?;
            Ok(rows.iter().find(|v| v.id == product.id).map(|v| {
                (
                    StockStatus::from_wire(&v.stock_status),
                    v.stock_quantity,
                )
            }))
        } else {
            Ok(products::get_product(pool, product.id).await?.map(|row| {
                (
                    StockStatus::from_wire(&row.stock_status),
                    row.stock_quantity,
                )
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parsing_covers_all_actions() {
        assert_eq!(
            EventAction::from_topic("product.created"),
            Some(EventAction::Created)
        );
        assert_eq!(
            EventAction::from_topic("product.updated"),
            Some(EventAction::Updated)
        );
        assert_eq!(
            EventAction::from_topic("product.deleted"),
            Some(EventAction::Deleted)
        );
        assert_eq!(
            EventAction::from_topic("product.restored"),
            Some(EventAction::Restored)
        );
        assert_eq!(EventAction::from_topic("order.created"), None);
        assert_eq!(EventAction::from_topic("product.archived"), None);
        assert_eq!(EventAction::from_topic(""), None);
    }

    #[test]
    fn rejection_status_codes_match_contract() {
        assert_eq!(WebhookRejection::BadTopic.status_code(), 400);
        assert_eq!(WebhookRejection::ForbiddenSource.status_code(), 403);
        assert_eq!(WebhookRejection::InvalidSignature.status_code(), 401);
        assert_eq!(WebhookRejection::InvalidPayload.status_code(), 400);
    }
}
