use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        DocumentFields, DocumentSnapshot, DocumentWriteResponse, ListDocumentsResponse,
        WriteDocumentRequest,
    },
};
use storage::{Storage, StoredDocument};
use tracing::{error, info};

const MAX_NAME_BYTES: usize = 256;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_documents(
    ctx: &ApiContext,
    collection: &str,
) -> Result<ListDocumentsResponse, ApiError> {
    validate_name("collection", collection)?;
    let documents = ctx
        .storage
        .list_documents(collection)
        .await
        .map_err(internal)?;
    Ok(ListDocumentsResponse {
        documents: documents.into_iter().map(snapshot).collect(),
    })
}

pub async fn get_document(
    ctx: &ApiContext,
    collection: &str,
    document_id: &str,
) -> Result<DocumentSnapshot, ApiError> {
    validate_name("collection", collection)?;
    validate_name("document id", document_id)?;
    ctx.storage
        .get_document(collection, document_id)
        .await
        .map_err(internal)?
        .map(snapshot)
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::NotFound,
                format!("document '{collection}/{document_id}' not found"),
            )
        })
}

pub async fn create_document(
    ctx: &ApiContext,
    collection: &str,
    request: WriteDocumentRequest,
) -> Result<DocumentWriteResponse, ApiError> {
    validate_name("collection", collection)?;
    let fields = object_fields(request.fields)?;
    let id = ctx
        .storage
        .create_document(collection, &fields)
        .await
        .map_err(internal)?;
    info!(collection, document_id = %id, "document created");
    Ok(DocumentWriteResponse { id })
}

pub async fn set_document(
    ctx: &ApiContext,
    collection: &str,
    document_id: &str,
    request: WriteDocumentRequest,
) -> Result<DocumentWriteResponse, ApiError> {
    validate_name("collection", collection)?;
    validate_name("document id", document_id)?;
    let fields = object_fields(request.fields)?;
    ctx.storage
        .set_document(collection, document_id, &fields)
        .await
        .map_err(internal)?;
    info!(collection, document_id, "document replaced");
    Ok(DocumentWriteResponse {
        id: document_id.to_string(),
    })
}

/// Deleting a document that does not exist succeeds.
pub async fn delete_document(
    ctx: &ApiContext,
    collection: &str,
    document_id: &str,
) -> Result<(), ApiError> {
    validate_name("collection", collection)?;
    validate_name("document id", document_id)?;
    let removed = ctx
        .storage
        .delete_document(collection, document_id)
        .await
        .map_err(internal)?;
    info!(collection, document_id, removed, "document deleted");
    Ok(())
}

fn validate_name(kind: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{kind} must not be empty"),
        ));
    }
    if value.len() > MAX_NAME_BYTES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{kind} exceeds {MAX_NAME_BYTES} bytes"),
        ));
    }
    if value.contains('/') {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{kind} must not contain '/'"),
        ));
    }
    Ok(())
}

fn object_fields(fields: Value) -> Result<DocumentFields, ApiError> {
    match fields {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::new(
            ErrorCode::Validation,
            "document fields must be a JSON object",
        )),
    }
}

fn snapshot(document: StoredDocument) -> DocumentSnapshot {
    DocumentSnapshot {
        id: document.document_id,
        fields: document.fields,
        update_time: Some(document.updated_at),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "document storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
