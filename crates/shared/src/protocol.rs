use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type DocumentFields = serde_json::Map<String, Value>;

pub const DEFAULT_COLLECTION: &str = "Customers";

pub fn documents_route() -> &'static str {
    "/v1/collections/:collection/documents"
}

pub fn document_route() -> &'static str {
    "/v1/collections/:collection/documents/:document_id"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    #[serde(default)]
    pub fields: DocumentFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<DocumentSnapshot>,
}

/// Body of create and full-replace writes. `fields` must be a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteDocumentRequest {
    pub fields: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWriteResponse {
    pub id: String,
}
