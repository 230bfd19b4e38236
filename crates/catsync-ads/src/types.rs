//! Wire types for the ad-catalog batch API.

use serde::{Deserialize, Serialize};

/// The minimal tuple the reconciler needs about one remote catalog row.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteItem {
    #[serde(default)]
    pub id: Option<String>,
    pub retailer_id: String,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub inventory: Option<i64>,
}

/// Batch mutation method. `Delete` exists for API completeness; the engine
/// never emits it (out-of-stock marking is preferred over deletion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchMethod {
    Create,
    Update,
    Delete,
}

/// One request inside an `items_batch` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub method: BatchMethod,
    pub retailer_id: String,
    pub data: serde_json::Value,
}

impl BatchItem {
    #[must_use]
    pub fn new(method: BatchMethod, retailer_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            method,
            retailer_id: retailer_id.into(),
            data,
        }
    }
}

/// One message attached to a per-item validation status.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationMessage {
    #[serde(default)]
    pub message: String,
}

/// Per-item validation outcome from a synchronous batch response.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationStatus {
    pub retailer_id: String,
    #[serde(default)]
    pub errors: Vec<ValidationMessage>,
    #[serde(default)]
    pub warnings: Vec<ValidationMessage>,
}

impl ValidationStatus {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All error messages joined for the sync-status row.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|m| m.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Top-level error object from the remote API. Arrives in the body, not as
/// a transport failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Raw batch response. The remote side answers in one of three shapes:
/// a top-level `error`, a per-item `validation_status` array, or bare
/// async `handles`. Interpretation is the engine's responsibility.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub handles: Option<Vec<String>>,
    #[serde(default)]
    pub validation_status: Option<Vec<ValidationStatus>>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// One page of a catalog enumeration.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EnumeratePage {
    #[serde(default)]
    pub data: Vec<RemoteItem>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}
