// src/server/handlers.rs

//! Request handlers.

use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, IngestSession, ProductListResponse, ProductOut, ProductQuery, ProductRecord};
use crate::server::AppState;
use crate::server::error::ErrorBody;
use crate::storage::validate_key;
use crate::utils::is_pdf_filename;

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub session_id: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub expires_seconds: Option<i64>,
}

impl ListParams {
    /// Check bounds and apply defaults.
    pub fn resolve(&self, api: &ApiConfig) -> Result<(ProductQuery, Duration)> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::validation("skip must be greater than or equal to 0"));
        }
        let skip = u32::try_from(skip)
            .map_err(|_| AppError::validation("skip is too large"))?;

        let limit = self.limit.unwrap_or(i64::from(api.default_limit));
        if limit < 1 || limit > i64::from(api.max_limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {}",
                api.max_limit
            )));
        }

        let query = ProductQuery {
            q: self.q.clone(),
            session_id: self.session_id.clone(),
            skip,
            limit: limit as u32,
        };
        Ok((query, resolve_expiry(self.expires_seconds, api)?))
    }
}

/// Query string carrying only `expires_seconds`.
#[derive(Debug, Default, Deserialize)]
pub struct ExpiryParams {
    pub expires_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    pub limit: Option<u32>,
}

/// Body of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub products_created: usize,
    pub images_extracted: usize,
    pub collages_created: usize,
    pub session_id: String,
}

fn resolve_expiry(expires: Option<i64>, api: &ApiConfig) -> Result<Duration> {
    let secs = expires.unwrap_or(api.default_expires_secs as i64);
    if secs < api.min_expires_secs as i64 || secs > api.max_expires_secs as i64 {
        return Err(AppError::validation(format!(
            "expires_seconds must be between {} and {}",
            api.min_expires_secs, api.max_expires_secs
        )));
    }
    Ok(Duration::from_secs(secs as u64))
}

fn query_error(rejection: QueryRejection) -> AppError {
    AppError::validation(rejection.body_text())
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "VistaView API",
        "docs": "/docs",
        "products": "/api/products",
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[tracing::instrument(skip(state, params))]
pub async fn list_products(
    State(state): State<AppState>,
    params: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ProductListResponse>> {
    let Query(params) = params.map_err(query_error)?;
    let (query, expires) = params.resolve(&state.config.api)?;

    let (records, total) = state.products.search(&query).await?;
    let products = futures::future::join_all(
        records
            .into_iter()
            .map(|record| to_product_out(&state, record, expires)),
    )
    .await;

    tracing::debug!(total, returned = products.len(), "products listed");
    Ok(Json(ProductListResponse {
        products,
        total,
        skip: query.skip,
        limit: query.limit,
    }))
}

#[tracing::instrument(skip(state, params))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: std::result::Result<Query<ExpiryParams>, QueryRejection>,
) -> Result<Json<ProductOut>> {
    let Query(params) = params.map_err(query_error)?;
    let expires = resolve_expiry(params.expires_seconds, &state.config.api)?;

    let record = state
        .products
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(Json(to_product_out(&state, record, expires).await))
}

/// Accept a multipart PDF upload and ingest it synchronously.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let (file_name, bytes) = match read_file_field(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            return AppError::validation("Missing multipart field 'file'").into_response();
        }
        Err(e) => {
            return (e.status(), Json(ErrorBody::new(e.body_text()))).into_response();
        }
    };

    if !is_pdf_filename(&file_name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Only PDF files are supported")),
        )
            .into_response();
    }

    tracing::info!(file = %file_name, size = bytes.len(), "upload received");
    match state.ingestor.ingest(bytes.to_vec(), Some(file_name)).await {
        Ok(report) => Json(UploadResponse {
            status: "success".to_string(),
            message: format!("Processed {} pages", report.pages_processed),
            products_created: report.products_created,
            images_extracted: report.images_extracted,
            collages_created: report.collages_created,
            session_id: report.session_id,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ingest failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Read the `file` field, returning its file name (or field name) and bytes.
async fn read_file_field(
    multipart: &mut Multipart,
) -> std::result::Result<Option<(String, Bytes)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}

#[tracing::instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    params: std::result::Result<Query<SessionParams>, QueryRejection>,
) -> Result<Json<Vec<IngestSession>>> {
    let Query(params) = params.map_err(query_error)?;
    let api = &state.config.api;
    let limit = params.limit.unwrap_or(api.default_limit).clamp(1, api.max_limit);
    Ok(Json(state.sessions.list(limit).await?))
}

#[tracing::instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.products.delete_session(&id).await?;
    tracing::info!(session = %id, deleted, "session deleted");
    Ok(Json(json!({ "deleted": deleted })))
}

/// Serve a stored object. This is the URL target of the local backend.
#[tracing::instrument(skip(state))]
pub async fn get_asset(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response> {
    validate_key(&key)?;
    let bytes = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::not_found("Asset not found"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

async fn to_product_out(state: &AppState, record: ProductRecord, expires: Duration) -> ProductOut {
    let image_url = resolve_url(state, record.image_key.as_deref(), expires).await;
    let collage_url = resolve_url(state, record.collage_key.as_deref(), expires).await;
    ProductOut::from_record(record, image_url, collage_url)
}

/// URL for a stored key. A key that cannot be resolved is reported as `null`.
async fn resolve_url(state: &AppState, key: Option<&str>, expires: Duration) -> Option<String> {
    let key = key?;
    match state.store.url_for(key, expires).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(key, error = %e, "could not resolve asset URL");
            None
        }
    }
}
