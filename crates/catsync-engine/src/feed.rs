//! CSV feed generation.
//!
//! Two modes over the same serializer: the fast path walks the cache
//! directly; the refresh path first re-fetches the in-stock subset (and
//! variations) from the source store, then runs the fast path. Output must
//! be byte-identical across modes for identical cache state.
//!
//! Unlike the replication engine, the feed emits the variable parent as a
//! catalog anchor row: the CSV consumer understands parent rows, the batch
//! API does not want them.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use catsync_core::{csv_row, map_item, CatalogItem, FeedStyle, SourceProduct, StockStatus, CSV_COLUMNS};
use catsync_db::{products, variations};

use crate::error::EngineError;
use crate::sync::SyncEngine;

/// Upper bound on mapping workers in the feed path.
const MAX_FEED_WORKERS: usize = 4;

/// Result of writing both feed files.
#[derive(Debug, Clone, Serialize)]
pub struct FeedArtifacts {
    pub paths: Vec<String>,
    pub rows: usize,
    pub elapsed_ms: u128,
}

impl SyncEngine {
    /// Fast path: build one CSV feed entirely from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on cache failures, [`EngineError::Csv`]
    /// on serialization failures.
    pub async fn generate_feed(&self, style: FeedStyle) -> Result<String, EngineError> {
        let jobs = self.collect_feed_jobs().await?;
        let items = self.map_jobs(jobs, style).await?;
        serialize_feed(&items)
    }

    /// Refresh path: re-fetch the in-stock subset and its variations from
    /// the source store, then run the fast path.
    ///
    /// # Errors
    ///
    /// Upstream failures are fatal, as in the bulk replication path.
    pub async fn generate_feed_with_refresh(
        &self,
        style: FeedStyle,
    ) -> Result<String, EngineError> {
        self.refresh_cache().await?;
        self.generate_feed(style).await
    }

    /// Bulk-path steps 1–2 plus the variation fetch, without touching the
    /// ad catalog.
    ///
    /// # Errors
    ///
    /// Propagates source-store and cache failures.
    pub async fn refresh_cache(&self) -> Result<(), EngineError> {
        let source_products = self
            .store()
            .fetch_all_products(&[("stock_status", "instock")])
            .await?;
        products::bulk_upsert_products(self.pool(), &source_products).await?;
        self.refresh_variations(&source_products).await?;
        Ok(())
    }

    /// Generates both styles (one call per style, concurrently) and writes
    /// them under the public directory.
    ///
    /// # Errors
    ///
    /// Propagates generation failures and file I/O failures.
    pub async fn write_feeds(
        &self,
        public_dir: &std::path::Path,
        refresh: bool,
    ) -> Result<FeedArtifacts, EngineError> {
        let started = Instant::now();

        if refresh {
            self.refresh_cache().await?;
        }

        let (standard, christmas) = tokio::join!(
            self.generate_feed(FeedStyle::Standard),
            self.generate_feed(FeedStyle::Christmas),
        );
        let standard = standard?;
        let christmas = christmas?;

        // Both styles have the same shape; count data rows once.
        let rows = standard.lines().count().saturating_sub(1);

        tokio::fs::create_dir_all(public_dir).await?;
        let mut paths: Vec<String> = Vec::with_capacity(2);
        for (style, csv) in [
            (FeedStyle::Standard, &standard),
            (FeedStyle::Christmas, &christmas),
        ] {
            let path: PathBuf = public_dir.join(format!("feed_{}.csv", style.as_str()));
            tokio::fs::write(&path, csv).await?;
            paths.push(path.display().to_string());
        }

        let artifacts = FeedArtifacts {
            paths,
            rows,
            elapsed_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            rows = artifacts.rows,
            elapsed_ms = artifacts.elapsed_ms,
            refresh,
            "feeds written"
        );
        Ok(artifacts)
    }

    /// Walks the cache into mapping jobs: in-stock simples, variable
    /// parents as aggregated anchor rows, and their in-stock variations.
    async fn collect_feed_jobs(
        &self,
    ) -> Result<Vec<(SourceProduct, Option<SourceProduct>)>, EngineError> {
        let mut jobs: Vec<(SourceProduct, Option<SourceProduct>)> = Vec::new();

        for row in products::list_in_stock_simple(self.pool()).await? {
            jobs.push((row.to_source(), None));
        }

        for row in products::list_in_stock_variable(self.pool()).await? {
            let parent = row.to_source();
            let children = variations::list_variations(self.pool(), parent.id).await?;

            let mut any_in_stock = false;
            let mut quantity_sum: i64 = 0;
            let mut in_stock_children: Vec<SourceProduct> = Vec::new();
            for child in &children {
                let source = child.to_source();
                if source.is_in_stock() {
                    any_in_stock = true;
                    quantity_sum += source.stock_quantity.unwrap_or(0);
                    in_stock_children.push(source);
                }
            }

            // The anchor row carries the aggregate of its children.
            let mut anchor = parent.clone();
            anchor.stock_status = if any_in_stock {
                StockStatus::InStock
            } else {
                StockStatus::OutOfStock
            };
            anchor.stock_quantity = Some(quantity_sum);
            jobs.push((anchor, None));

            for child in in_stock_children {
                jobs.push((child, Some(parent.clone())));
            }
        }

        Ok(jobs)
    }

    /// Maps jobs to catalog items over a small worker pool, preserving job
    /// order.
    async fn map_jobs(
        &self,
        jobs: Vec<(SourceProduct, Option<SourceProduct>)>,
        style: FeedStyle,
    ) -> Result<Vec<CatalogItem>, EngineError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let workers = feed_worker_count(jobs.len());
        let chunk_size = jobs.len().div_ceil(workers);
        let mapper = self.mapper().clone();

        let handles: Vec<_> = jobs
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let mapper = mapper.clone();
                tokio::task::spawn_blocking(move || {
                    chunk
                        .iter()
                        .map(|(product, parent)| {
                            map_item(&mapper, product, parent.as_ref(), style)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut items = Vec::with_capacity(jobs.len());
        for handle in handles {
            items.extend(handle.await?);
        }
        Ok(items)
    }
}

/// Worker count for the feed mapping pool: bounded by CPU count, a fixed
/// cap, and one worker per ten rows.
fn feed_worker_count(rows: usize) -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    cpus.min(MAX_FEED_WORKERS).min(rows.div_ceil(10)).max(1)
}

/// Serializes items in the fixed column order, every field quoted, with a
/// header row.
fn serialize_feed(items: &[CatalogItem]) -> Result<String, EngineError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS)?;
    for item in items {
        writer.write_record(csv_row(item))?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catsync_core::MapperConfig;

    fn mapper() -> MapperConfig {
        MapperConfig {
            brand: "Acme".to_string(),
            currency_suffix: "BAM".to_string(),
            render_base_url: "https://render.example.com/render".to_string(),
        }
    }

    #[test]
    fn worker_count_is_bounded() {
        assert_eq!(feed_worker_count(1), 1);
        assert_eq!(feed_worker_count(10), 1);
        assert!(feed_worker_count(1000) <= MAX_FEED_WORKERS);
        assert!(feed_worker_count(25) <= 3);
    }

    // The column order is a hard external contract; this is the golden
    // header line, byte for byte.
    const GOLDEN_HEADER: &str = "\"id\",\"title\",\"description\",\"rich_text_description\",\
\"availability\",\"condition\",\"price\",\"link\",\"image_link\",\"brand\",\"image[0].url\",\
\"image[0].tag[0]\",\"image[1].url\",\"image[1].tag[0]\",\"image[2].url\",\"image[2].tag[0]\",\
\"image[2].tag[1]\",\"age_group\",\"color\",\"gender\",\"item_group_id\",\
\"google_product_category\",\"product_type\",\"sale_price\",\"sale_price_effective_date\",\
\"size\",\"status\",\"inventory\"";

    #[test]
    fn header_matches_golden_line() {
        let csv = serialize_feed(&[]).expect("serialize");
        assert_eq!(csv.lines().next(), Some(GOLDEN_HEADER));
    }

    #[test]
    fn serialize_feed_emits_header_and_quotes_everything() {
        let product = SourceProduct {
            id: 42,
            name: "Shirt".into(),
            regular_price: "10.00".into(),
            stock_status: StockStatus::InStock,
            stock_quantity: Some(7),
            ..SourceProduct::default()
        };
        let item = map_item(&mapper(), &product, None, FeedStyle::Standard);
        let csv = serialize_feed(&[item]).expect("serialize");

        let mut lines = csv.lines();
        let header = lines.next().expect("header row");
        assert!(header.starts_with("\"id\",\"title\",\"description\""));
        assert_eq!(header.split(',').count(), CSV_COLUMNS.len());

        let row = lines.next().expect("data row");
        assert!(row.starts_with("\"wc_42\","));
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_feed_is_just_the_header() {
        let csv = serialize_feed(&[]).expect("serialize");
        assert_eq!(csv.lines().count(), 1);
    }
}
