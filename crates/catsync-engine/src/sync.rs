//! Replication engine: bulk and targeted paths.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use catsync_ads::{AdsClient, BatchItem, BatchMethod, BATCH_LIMIT};
use catsync_core::{map_item, retailer, FeedStyle, MapperConfig, SourceProduct};
use catsync_db::{products, sync_status, variations};
use catsync_store::StoreClient;

use crate::error::EngineError;
use crate::outcome::{apply_batch_response, PendingItem};
use crate::report::SyncReport;

/// Upstream variation fetches are fanned out this many parents at a time;
/// each group's results land in one cache transaction.
const VARIATION_FETCH_GROUP: usize = 10;

/// Outcome of the targeted path for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetedOutcome {
    /// Nothing to do: out-of-stock and unknown remotely, or stock unchanged.
    Skipped,
    /// Known remotely and now out of stock; a stock-zero UPDATE was issued.
    MarkedOutOfStock,
    /// Submitted with method CREATE.
    Created,
    /// Submitted with method UPDATE.
    Updated,
    /// Submitted but the remote reported a per-item error.
    Errored,
}

/// Orchestrates source reads, cache writes, mapping, and ad-catalog
/// mutations. Shared by the HTTP handlers and the event processor.
pub struct SyncEngine {
    store: StoreClient,
    ads: AdsClient,
    pool: SqlitePool,
    mapper: MapperConfig,
}

impl SyncEngine {
    #[must_use]
    pub fn new(store: StoreClient, ads: AdsClient, pool: SqlitePool, mapper: MapperConfig) -> Self {
        Self {
            store,
            ads,
            pool,
            mapper,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn store(&self) -> &StoreClient {
        &self.store
    }

    pub(crate) fn ads(&self) -> &AdsClient {
        &self.ads
    }

    pub(crate) fn mapper(&self) -> &MapperConfig {
        &self.mapper
    }

    /// Bulk path: replicate the in-stock subset of the source store into
    /// the ad catalog and record per-item sync status.
    ///
    /// # Errors
    ///
    /// Upstream and transport failures are fatal for the run. Per-item
    /// downstream validation failures are not; they land in sync-status
    /// and the report's `errors` counter.
    pub async fn run_initial_sync(&self) -> Result<SyncReport, EngineError> {
        let started_at = Utc::now();

        let source_products = self
            .store
            .fetch_all_products(&[("stock_status", "instock")])
            .await?;
        tracing::info!(count = source_products.len(), "fetched source products");

        products::bulk_upsert_products(&self.pool, &source_products).await?;

        let remote = self.ads.remote_state().await?;
        tracing::info!(count = remote.len(), "materialized remote catalog state");

        let variations_by_parent = self.refresh_variations(&source_products).await?;

        let mut created = 0usize;
        let mut updated = 0usize;
        let mut skipped = 0usize;
        let mut pending: Vec<(BatchItem, PendingItem)> = Vec::new();

        let mut emit = |product: &SourceProduct, parent: Option<&SourceProduct>| {
            let item = map_item(&self.mapper, product, parent, FeedStyle::Standard);
            let method = if remote.contains_key(&item.id) {
                updated += 1;
                BatchMethod::Update
            } else {
                created += 1;
                BatchMethod::Create
            };
            let status = PendingItem {
                retailer_id: item.id.clone(),
                availability: item.availability.clone(),
                inventory: item.inventory,
            };
            let data = serde_json::to_value(&item)?;
            pending.push((BatchItem::new(method, item.id, data), status));
            Ok::<(), EngineError>(())
        };

        for product in &source_products {
            if product.is_variable() {
                let children = variations_by_parent
                    .get(&product.id)
                    .map_or(&[][..], Vec::as_slice);
                for variation in children {
                    let retailer_id = retailer::retailer_id_for(variation);
                    sync_status::upsert_sync_status(&self.pool, product.id, &retailer_id)
                        .await?;
                    if variation.is_in_stock() {
                        emit(variation, Some(product))?;
                    } else {
                        skipped += 1;
                    }
                }
                // The parent itself is deliberately not emitted: variant
                // rows hold the authoritative price data, the parent only
                // groups them.
            } else if product.is_in_stock() {
                let retailer_id = retailer::retailer_id_for(product);
                sync_status::upsert_sync_status(&self.pool, product.id, &retailer_id).await?;
                emit(product, None)?;
            } else {
                skipped += 1;
            }
        }

        let in_stock = pending.len();
        let mut errors = 0usize;

        for chunk in pending.chunks(BATCH_LIMIT) {
            let items: Vec<BatchItem> = chunk.iter().map(|(item, _)| item.clone()).collect();
            let statuses: Vec<PendingItem> =
                chunk.iter().map(|(_, status)| status.clone()).collect();

            let response = self.ads.batch(items).await?;
            let outcome = apply_batch_response(&self.pool, &statuses, &response).await?;
            errors += outcome.errored;
        }

        let report = SyncReport {
            total: source_products.len(),
            in_stock,
            created,
            updated,
            errors,
            skipped,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            total = report.total,
            in_stock = report.in_stock,
            created = report.created,
            updated = report.updated,
            errors = report.errors,
            skipped = report.skipped,
            "bulk replication finished"
        );
        Ok(report)
    }

    /// Fetches and caches the variations of every variable product in the
    /// list, fanned out in groups of [`VARIATION_FETCH_GROUP`]. Each
    /// group's rows are written in one transaction so the cache never holds
    /// a half-written sibling set.
    pub(crate) async fn refresh_variations(
        &self,
        source_products: &[SourceProduct],
    ) -> Result<HashMap<i64, Vec<SourceProduct>>, EngineError> {
        let parents: Vec<&SourceProduct> =
            source_products.iter().filter(|p| p.is_variable()).collect();

        let mut by_parent: HashMap<i64, Vec<SourceProduct>> = HashMap::new();
        for group in parents.chunks(VARIATION_FETCH_GROUP) {
            let fetches = group.iter().map(|parent| self.store.fetch_variations(parent.id));
            let results = futures::future::join_all(fetches).await;

            let mut group_rows: Vec<(i64, Vec<SourceProduct>)> = Vec::new();
            for (parent, result) in group.iter().zip(results) {
                group_rows.push((parent.id, result?));
            }
            variations::bulk_upsert_variations(&self.pool, &group_rows).await?;
            by_parent.extend(group_rows);
        }
        Ok(by_parent)
    }

    /// Targeted path: reconcile one product (with optional parent context)
    /// against the ad catalog.
    ///
    /// # Errors
    ///
    /// Transport failures propagate; per-item validation failures land in
    /// sync-status and return [`TargetedOutcome::Errored`].
    pub async fn sync_product(
        &self,
        product: &SourceProduct,
        parent: Option<&SourceProduct>,
    ) -> Result<TargetedOutcome, EngineError> {
        let retailer_id = retailer::retailer_id_for(product);

        // Cache first, so the event delta and the feed fast path both see
        // the latest source state regardless of what happens downstream.
        let owner_id = if product.is_variation() {
            if let Some(parent) = parent {
                products::upsert_product(&self.pool, parent).await?;
            }
            variations::upsert_variation(&self.pool, product.parent_id, product).await?;
            product.parent_id
        } else {
            products::upsert_product(&self.pool, product).await?;
            product.id
        };
        sync_status::upsert_sync_status(&self.pool, owner_id, &retailer_id).await?;
        let status = sync_status::get_sync_status(&self.pool, &retailer_id).await?;

        let availability = retailer::availability(product.stock_status);
        let inventory = retailer::inventory(product);

        if !product.is_in_stock() {
            let exists_remotely = status.as_ref().is_some_and(|s| s.exists_remotely);
            if !exists_remotely {
                tracing::debug!(retailer_id, "out of stock and unknown remotely; nothing to do");
                return Ok(TargetedOutcome::Skipped);
            }
            let response = self
                .ads
                .update_stock(&retailer_id, retailer::AVAILABILITY_OUT_OF_STOCK, Some(0))
                .await?;
            let pending = [PendingItem {
                retailer_id: retailer_id.clone(),
                availability: retailer::AVAILABILITY_OUT_OF_STOCK.to_string(),
                inventory: Some(0),
            }];
            let outcome = apply_batch_response(&self.pool, &pending, &response).await?;
            return Ok(if outcome.errored > 0 {
                TargetedOutcome::Errored
            } else {
                TargetedOutcome::MarkedOutOfStock
            });
        }

        if let Some(status) = &status {
            if status.sync_state == sync_status::STATE_SYNCED
                && !status.stock_changed(availability, inventory)
            {
                tracing::debug!(retailer_id, "stock unchanged since last sync; skipping");
                return Ok(TargetedOutcome::Skipped);
            }
        }

        let method = match self.ads.lookup(&retailer_id).await? {
            Some(_) => {
                sync_status::set_exists_remotely(&self.pool, &retailer_id, true).await?;
                BatchMethod::Update
            }
            None => BatchMethod::Create,
        };

        let item = map_item(&self.mapper, product, parent, FeedStyle::Standard);
        let pending = [PendingItem {
            retailer_id: item.id.clone(),
            availability: item.availability.clone(),
            inventory: item.inventory,
        }];
        let data = serde_json::to_value(&item)?;
        let response = self
            .ads
            .batch(vec![BatchItem::new(method, item.id, data)])
            .await?;
        let outcome = apply_batch_response(&self.pool, &pending, &response).await?;

        Ok(if outcome.errored > 0 {
            TargetedOutcome::Errored
        } else if method == BatchMethod::Create {
            TargetedOutcome::Created
        } else {
            TargetedOutcome::Updated
        })
    }

    /// Targeted path for a variable product: fetch its variations and
    /// reconcile each one, skipping the parent row itself.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::sync_product`].
    pub async fn sync_variable(&self, parent: &SourceProduct) -> Result<(), EngineError> {
        products::upsert_product(&self.pool, parent).await?;
        let children = self.store.fetch_variations(parent.id).await?;
        tracing::debug!(parent_id = parent.id, count = children.len(), "recursing into variations");
        for variation in &children {
            self.sync_product(variation, Some(parent)).await?;
        }
        Ok(())
    }
}
