//! HTTP client for the ad catalog's batch-oriented product API.
//!
//! Authentication is a bearer token; the catalog id is a path component of
//! every request. The client hands raw [`BatchResponse`] values back to the
//! caller: deciding what a handles-only response means is engine policy,
//! not transport policy.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::AdsError;
use crate::types::{
    BatchItem, BatchMethod, BatchResponse, EnumeratePage, RemoteItem,
};

/// Fields the reconciler needs for existence and stock-change checks.
pub const DEFAULT_FIELDS: &str = "retailer_id,availability,inventory";

/// The batch endpoint rejects envelopes with more requests than this.
pub const BATCH_LIMIT: usize = 1000;

const DEFAULT_PAGE_SIZE: usize = 500;

/// Client for the ad-catalog REST API.
pub struct AdsClient {
    client: Client,
    base_url: Url,
    catalog_id: String,
    token: String,
}

impl AdsClient {
    /// Creates a client against the given versioned base URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AdsError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(
        base_url: &str,
        catalog_id: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<Self, AdsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("catsync/0.1 (catalog-replication)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| AdsError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            catalog_id: catalog_id.to_owned(),
            token: token.to_owned(),
        })
    }

    /// Enumerates the entire catalog, following `paging.next` cursor links
    /// until exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`AdsError::MissingConfig`] when unconfigured, otherwise the
    /// usual transport/deserialization errors.
    pub async fn enumerate(
        &self,
        fields: &str,
        page_size: usize,
    ) -> Result<Vec<RemoteItem>, AdsError> {
        self.require_config()?;

        let mut url = self.catalog_url("products")?;
        url.query_pairs_mut()
            .append_pair("fields", fields)
            .append_pair("limit", &page_size.to_string());

        let mut all: Vec<RemoteItem> = Vec::new();
        let mut next: Option<Url> = Some(url);

        while let Some(url) = next.take() {
            let page: EnumeratePage = self.get_json(url).await?;
            all.extend(page.data);

            if let Some(cursor) = page.paging.and_then(|p| p.next) {
                // The API hands back an absolute URL with the cursor baked in.
                next = Some(Url::parse(&cursor).map_err(|e| AdsError::InvalidBaseUrl {
                    base_url: cursor,
                    reason: e.to_string(),
                })?);
            }
        }

        Ok(all)
    }

    /// Materializes the remote catalog into a `{retailer_id → row}` map for
    /// O(1) existence checks during reconciliation.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::enumerate`].
    pub async fn remote_state(&self) -> Result<HashMap<String, RemoteItem>, AdsError> {
        let items = self.enumerate(DEFAULT_FIELDS, DEFAULT_PAGE_SIZE).await?;
        Ok(items
            .into_iter()
            .map(|item| (item.retailer_id.clone(), item))
            .collect())
    }

    /// Looks up the one remote row with the given retailer id.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::enumerate`].
    pub async fn lookup(&self, retailer_id: &str) -> Result<Option<RemoteItem>, AdsError> {
        self.require_config()?;

        let filter =
            serde_json::json!({ "retailer_id": { "eq": retailer_id } }).to_string();
        let mut url = self.catalog_url("products")?;
        url.query_pairs_mut()
            .append_pair("filter", &filter)
            .append_pair("fields", DEFAULT_FIELDS);

        let page: EnumeratePage = self.get_json(url).await?;
        Ok(page.data.into_iter().next())
    }

    /// Submits up to [`BATCH_LIMIT`] create/update/delete requests in one
    /// `items_batch` envelope and returns the raw response.
    ///
    /// Each item's retailer id is copied into the data block's own `id`
    /// field before sending; the remote API requires both.
    ///
    /// # Errors
    ///
    /// - [`AdsError::BatchTooLarge`] when over the limit.
    /// - Transport errors as [`AdsError::Http`]. API-level errors come back
    ///   inside [`BatchResponse::error`], not as `Err`.
    pub async fn batch(&self, items: Vec<BatchItem>) -> Result<BatchResponse, AdsError> {
        self.require_config()?;

        if items.len() > BATCH_LIMIT {
            return Err(AdsError::BatchTooLarge {
                count: items.len(),
                limit: BATCH_LIMIT,
            });
        }

        let requests: Vec<serde_json::Value> = items
            .into_iter()
            .map(|mut item| {
                if let Some(data) = item.data.as_object_mut() {
                    data.insert(
                        "id".to_string(),
                        serde_json::Value::String(item.retailer_id.clone()),
                    );
                }
                serde_json::json!({
                    "method": item.method,
                    "retailer_id": item.retailer_id,
                    "data": item.data,
                })
            })
            .collect();

        let body = serde_json::json!({
            "item_type": "PRODUCT_ITEM",
            "requests": requests,
        });

        let url = self.catalog_url("items_batch")?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        // The remote reports request-level failures inside the body's
        // `error` object (often alongside a 4xx status); surface those
        // through the parsed response rather than as transport errors.
        match serde_json::from_str::<BatchResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => Err(AdsError::Deserialize {
                context: url.to_string(),
                source: e,
            }),
            Err(_) => Err(AdsError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: text,
            }),
        }
    }

    /// Convenience wrapper: a single-item UPDATE batch that sets
    /// availability and inventory for one retailer id.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Self::batch`].
    pub async fn update_stock(
        &self,
        retailer_id: &str,
        availability: &str,
        inventory: Option<i64>,
    ) -> Result<BatchResponse, AdsError> {
        let mut data = serde_json::json!({ "availability": availability });
        if let Some(inventory) = inventory {
            data["inventory"] = serde_json::Value::from(inventory);
        }
        self.batch(vec![BatchItem::new(BatchMethod::Update, retailer_id, data)])
            .await
    }

    /// Polls an async batch handle.
    ///
    /// # Errors
    ///
    /// Propagates transport and deserialization errors.
    pub async fn poll_handle(&self, handle: &str) -> Result<serde_json::Value, AdsError> {
        self.require_config()?;
        let url = self
            .base_url
            .join(handle.trim_start_matches('/'))
            .map_err(|e| AdsError::InvalidBaseUrl {
                base_url: handle.to_string(),
                reason: e.to_string(),
            })?;
        self.get_json(url).await
    }

    /// Fetches catalog-level metadata.
    ///
    /// # Errors
    ///
    /// Propagates transport and deserialization errors.
    pub async fn catalog_metadata(&self, fields: &str) -> Result<serde_json::Value, AdsError> {
        self.require_config()?;
        let mut url = self.catalog_url("")?;
        url.query_pairs_mut().append_pair("fields", fields);
        self.get_json(url).await
    }

    fn require_config(&self) -> Result<(), AdsError> {
        if self.catalog_id.is_empty() {
            return Err(AdsError::MissingConfig("catalog id is empty"));
        }
        if self.token.is_empty() {
            return Err(AdsError::MissingConfig("access token is empty"));
        }
        Ok(())
    }

    fn catalog_url(&self, suffix: &str) -> Result<Url, AdsError> {
        let path = if suffix.is_empty() {
            self.catalog_id.clone()
        } else {
            format!("{}/{suffix}", self.catalog_id)
        };
        self.base_url
            .join(&path)
            .map_err(|e| AdsError::InvalidBaseUrl {
                base_url: path,
                reason: e.to_string(),
            })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, AdsError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdsError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AdsError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}
