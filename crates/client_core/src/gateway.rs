use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use shared::{
    domain::{CustomerFields, Record, RecordId},
    error::ApiError,
    protocol::{DocumentWriteResponse, ListDocumentsResponse, WriteDocumentRequest},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{StoreError, StoreOperation};

/// The three remote operations the customer screen needs. Failures are returned, never retried.
#[async_trait]
pub trait RecordStoreGateway: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError>;
    /// Full replace when `id` is set, otherwise creates a record under a store-assigned id.
    async fn upsert(
        &self,
        id: Option<&RecordId>,
        fields: &CustomerFields,
    ) -> Result<RecordId, StoreError>;
    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;
}

pub struct MissingRecordStoreGateway;

#[async_trait]
impl RecordStoreGateway for MissingRecordStoreGateway {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        warn!("record store unavailable: list_all");
        Err(StoreError::new(
            StoreOperation::ListAll,
            "record store unavailable",
        ))
    }

    async fn upsert(
        &self,
        _id: Option<&RecordId>,
        _fields: &CustomerFields,
    ) -> Result<RecordId, StoreError> {
        error!("record store unavailable: upsert");
        Err(StoreError::new(
            StoreOperation::Upsert,
            "record store unavailable",
        ))
    }

    async fn delete(&self, _id: &RecordId) -> Result<(), StoreError> {
        error!("record store unavailable: delete");
        Err(StoreError::new(
            StoreOperation::Delete,
            "record store unavailable",
        ))
    }
}

/// Gateway over the document store's `/v1/collections/{collection}/documents` routes.
pub struct HttpRecordStoreGateway {
    http: Client,
    collection: String,
    documents_url: Url,
}

impl HttpRecordStoreGateway {
    pub fn new(
        store_url: &str,
        collection: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(anyhow!("collection name must not be empty"));
        }

        let mut documents_url =
            Url::parse(store_url).with_context(|| format!("invalid store url: {store_url}"))?;
        if !matches!(documents_url.scheme(), "http" | "https") {
            return Err(anyhow!("store url must start with http:// or https://"));
        }
        documents_url
            .path_segments_mut()
            .map_err(|_| anyhow!("store url cannot carry a path: {store_url}"))?
            .pop_if_empty()
            .extend(["v1", "collections", collection.as_str(), "documents"]);

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build record store http client")?;

        Ok(Self {
            http,
            collection,
            documents_url,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn document_url(&self, id: &RecordId) -> Url {
        let mut url = self.documents_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }

    async fn fetch_all(&self) -> Result<Vec<Record>, StoreError> {
        let op = StoreOperation::ListAll;
        let response = self
            .http
            .get(self.documents_url.clone())
            .send()
            .await
            .map_err(|e| StoreError::new(op, e.to_string()))?;
        let body: ListDocumentsResponse = success(op, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::new(op, format!("invalid document listing: {e}")))?;

        Ok(body
            .documents
            .into_iter()
            .map(|document| {
                Record::new(
                    RecordId(document.id),
                    CustomerFields::from_document_fields(&document.fields),
                )
            })
            .collect())
    }

    async fn write(
        &self,
        id: Option<&RecordId>,
        fields: &CustomerFields,
    ) -> Result<RecordId, StoreError> {
        let op = StoreOperation::Upsert;
        let body = WriteDocumentRequest {
            fields: Value::Object(fields.clone().into_document_fields()),
        };
        let request = match id {
            Some(id) => self.http.put(self.document_url(id)),
            None => self.http.post(self.documents_url.clone()),
        };
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::new(op, e.to_string()))?;
        let written: DocumentWriteResponse = success(op, response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::new(op, format!("invalid write response: {e}")))?;

        if written.id.is_empty() {
            return Err(StoreError::new(op, "store returned an empty document id"));
        }
        Ok(RecordId(written.id))
    }

    async fn remove(&self, id: &RecordId) -> Result<(), StoreError> {
        let op = StoreOperation::Delete;
        let response = self
            .http
            .delete(self.document_url(id))
            .send()
            .await
            .map_err(|e| StoreError::new(op, e.to_string()))?;
        success(op, response).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStoreGateway for HttpRecordStoreGateway {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        match self.fetch_all().await {
            Ok(records) => {
                debug!(
                    collection = %self.collection,
                    count = records.len(),
                    "records listed"
                );
                Ok(records)
            }
            Err(err) => {
                warn!(collection = %self.collection, error = %err, "error getting documents");
                Err(err)
            }
        }
    }

    async fn upsert(
        &self,
        id: Option<&RecordId>,
        fields: &CustomerFields,
    ) -> Result<RecordId, StoreError> {
        match self.write(id, fields).await {
            Ok(written) => {
                info!(
                    collection = %self.collection,
                    record_id = %written,
                    created = id.is_none(),
                    "record saved"
                );
                Ok(written)
            }
            Err(err) => {
                error!(
                    collection = %self.collection,
                    record_id = id.map(RecordId::as_str),
                    error = %err,
                    "error saving document"
                );
                Err(err)
            }
        }
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        match self.remove(id).await {
            Ok(()) => {
                info!(collection = %self.collection, record_id = %id, "record deleted");
                Ok(())
            }
            Err(err) => {
                error!(
                    collection = %self.collection,
                    record_id = %id,
                    error = %err,
                    "error deleting document"
                );
                Err(err)
            }
        }
    }
}

/// Passes 2xx responses through; anything else becomes a `StoreError` with the server's message.
async fn success(operation: StoreOperation, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&text) {
        Ok(api_error) => format!("HTTP {status}: {api_error}"),
        Err(_) if text.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", text.trim()),
    };
    Err(StoreError::new(operation, message))
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
