use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        document_route, documents_route, DocumentSnapshot, DocumentWriteResponse,
        ListDocumentsResponse, WriteDocumentRequest,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::ApiContext;
use app_state::AppState;
use config::{load_settings, prepare_database_url};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "document store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            documents_route(),
            get(http_list_documents).post(http_create_document),
        )
        .route(
            document_route(),
            get(http_get_document)
                .put(http_set_document)
                .delete(http_delete_document),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        reject(ApiError::new(
            ErrorCode::Internal,
            format!("storage unavailable: {e}"),
        ))
    })?;
    Ok("ok")
}

async fn http_list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> ApiResult<Json<ListDocumentsResponse>> {
    api::list_documents(&state.api, &collection)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_document(
    State(state): State<Arc<AppState>>,
    Path((collection, document_id)): Path<(String, String)>,
) -> ApiResult<Json<DocumentSnapshot>> {
    api::get_document(&state.api, &collection, &document_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DocumentWriteResponse>)> {
    let request = parse_write_request(&body)?;
    let response = api::create_document(&state.api, &collection, request)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn http_set_document(
    State(state): State<Arc<AppState>>,
    Path((collection, document_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<DocumentWriteResponse>> {
    let request = parse_write_request(&body)?;
    api::set_document(&state.api, &collection, &document_id, request)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_document(
    State(state): State<Arc<AppState>>,
    Path((collection, document_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    api::delete_document(&state.api, &collection, &document_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_write_request(body: &[u8]) -> ApiResult<WriteDocumentRequest> {
    serde_json::from_slice(body).map_err(|e| {
        reject(ApiError::new(
            ErrorCode::Validation,
            format!("invalid document body: {e}"),
        ))
    })
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
