use thiserror::Error;

/// Errors returned by the ad-catalog client.
///
/// API-level failures inside an otherwise well-formed batch response are
/// NOT errors here; they come back in [`crate::BatchResponse::error`] and
/// interpretation belongs to the caller.
#[derive(Debug, Error)]
pub enum AdsError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog id or access token is missing. Checked on every call so a
    /// half-configured deployment fails loudly instead of spraying 401s.
    #[error("ad-catalog configuration incomplete: {0}")]
    MissingConfig(&'static str),

    /// More items than the batch endpoint accepts in one request.
    #[error("batch of {count} items exceeds the {limit}-item limit")]
    BatchTooLarge { count: usize, limit: usize },

    /// Non-2xx response whose body could not be interpreted.
    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL is not a valid URL.
    #[error("invalid ad-catalog base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
