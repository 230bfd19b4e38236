//! HTTP client for the source store's product API.
//!
//! Wraps `reqwest` with store-specific pagination and error handling. The
//! store authenticates reads with a static key/secret pair passed as query
//! parameters on every request (a fixed legacy choice; no bearer header).

use std::time::Duration;

use reqwest::{Client, Url};

use catsync_core::SourceProduct;

use crate::error::StoreError;

/// Page size for bulk reads. The store caps `per_page` at 100; a short page
/// terminates pagination.
const PAGE_SIZE: usize = 100;

/// Client for the source store's REST product API.
///
/// Use [`StoreClient::new`] against the configured store; tests point the
/// same constructor at a mock server.
pub struct StoreClient {
    client: Client,
    base_url: Url,
    key: String,
    secret: String,
}

impl StoreClient {
    /// Creates a client for the given store base URL (e.g.
    /// `https://shop.example.com/wp-json/wc/v3`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StoreError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(
        base_url: &str,
        key: &str,
        secret: &str,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("catsync/0.1 (catalog-replication)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalised).map_err(|e| StoreError::InvalidBaseUrl {
                base_url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            key: key.to_owned(),
            secret: secret.to_owned(),
        })
    }

    /// Fetches the full product list across pages of 100.
    ///
    /// `filters` are forwarded as query parameters; the only filter the
    /// store applies before pagination is `stock_status=instock`.
    /// Pagination terminates when a page returns fewer than 100 rows.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnexpectedStatus`] on any non-2xx response (fatal
    ///   for the current run; no retry).
    /// - [`StoreError::Http`] on network failure.
    /// - [`StoreError::Deserialize`] if a page is not a product array.
    pub async fn fetch_all_products(
        &self,
        filters: &[(&str, &str)],
    ) -> Result<Vec<SourceProduct>, StoreError> {
        let mut all: Vec<SourceProduct> = Vec::new();
        let mut page = 1usize;

        loop {
            let page_param = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let mut params: Vec<(&str, &str)> = vec![
                ("page", page_param.as_str()),
                ("per_page", per_page.as_str()),
            ];
            params.extend_from_slice(filters);

            let url = self.build_url("products", &params);
            let batch: Vec<SourceProduct> = self.request_json(url).await?;
            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Fetches the variations of one variable product.
    ///
    /// A single request of up to 100 rows; parents are assumed not to
    /// exceed that bound.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::fetch_all_products`].
    pub async fn fetch_variations(
        &self,
        parent_id: i64,
    ) -> Result<Vec<SourceProduct>, StoreError> {
        let per_page = PAGE_SIZE.to_string();
        let url = self.build_url(
            &format!("products/{parent_id}/variations"),
            &[("per_page", per_page.as_str())],
        );
        self.request_json(url).await
    }

    /// Fetches a single product by id. Used by the event processor to
    /// rehydrate a parent after receiving only a variation.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::fetch_all_products`].
    pub async fn fetch_one(&self, id: i64) -> Result<SourceProduct, StoreError> {
        let url = self.build_url(&format!("products/{id}"), &[]);
        self.request_json(url).await
    }

    /// Builds a request URL with credentials and extra query parameters,
    /// percent-encoded via [`Url::query_pairs_mut`].
    fn build_url(&self, path: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone());
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("consumer_key", &self.key);
            pairs.append_pair("consumer_secret", &self.secret);
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Sends a GET, surfaces non-2xx statuses with the body preserved, and
    /// parses the response as JSON.
    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, StoreError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact(&url),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Deserialize {
            context: redact(&url),
            source: e,
        })
    }
}

/// Strips credential query parameters from a URL before it lands in an
/// error message or a log line.
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "consumer_key" && k != "consumer_secret")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.set_query(None);
    if !kept.is_empty() {
        let mut pairs = clean.query_pairs_mut();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
    }
    clean.to_string()
}
