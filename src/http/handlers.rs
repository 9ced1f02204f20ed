// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers.
//!
//! - GET  /health - liveness plus model/store summary
//! - POST /embed  - embed a text and store it
//! - POST /search - nearest stored texts to a query text
//! - GET  /texts  - every stored text in id order

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::ServiceError;
use crate::http::error::AppError;
use crate::http::state::AppState;

#[derive(Debug)]
pub struct EmbedRequest {
    pub text: String,
    pub filename: Option<String>,
    pub chunk_number: Option<u32>,
}

impl EmbedRequest {
    fn from_json(body: Value) -> Result<Self, ServiceError> {
        let mut fields = into_fields(body)?;
        let text = take_text(&mut fields)?;

        let filename = match fields.remove("filename") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name),
            Some(_) => {
                return Err(ServiceError::InvalidField {
                    field: "filename",
                    expected: "a string",
                })
            }
        };

        let chunk_number = match fields.remove("chunk_number") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or(ServiceError::InvalidField {
                        field: "chunk_number",
                        expected: "a non-negative integer",
                    })?,
            ),
        };

        Ok(Self {
            text,
            filename,
            chunk_number,
        })
    }
}

#[derive(Debug)]
pub struct SearchRequest {
    pub text: String,
    pub k: Option<i64>,
}

impl SearchRequest {
    fn from_json(body: Value, max_k: usize) -> Result<Self, ServiceError> {
        let mut fields = into_fields(body)?;
        let text = take_text(&mut fields)?;

        let k = match fields.remove("k") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| ServiceError::InvalidK {
                got: value.to_string(),
                max: max_k,
            })?),
        };

        Ok(Self { text, k })
    }
}

/// Non-object bodies are treated as missing `text`.
fn into_fields(body: Value) -> Result<Map<String, Value>, ServiceError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ServiceError::MissingText),
    }
}

fn take_text(fields: &mut Map<String, Value>) -> Result<String, ServiceError> {
    match fields.remove("text") {
        None | Some(Value::Null) => Err(ServiceError::MissingText),
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(ServiceError::InvalidField {
            field: "text",
            expected: "a string",
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub dimension: usize,
    pub backend: &'static str,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub message: &'static str,
    pub text: String,
    pub embedding_id: u64,
    pub embedding_dimension: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: u64,
    pub text: String,
    pub distance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct TextsResponse {
    pub texts: Vec<String>,
    pub count: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let count = state
        .run_blocking(|service| service.count())
        .await
        .map_err(|e| AppError::from_service(e, "Health check failed"))?;

    Ok(Json(HealthResponse {
        status: "healthy",
        model: state.service.model_id().to_string(),
        dimension: state.service.dimension(),
        backend: state.service.backend(),
        count,
    }))
}

/// POST /embed
pub async fn create_embedding(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<EmbedResponse>), AppError> {
    let Json(body) = body?;
    let request = EmbedRequest::from_json(body)
        .map_err(|e| AppError::from_service(e, "Failed to create embedding"))?;
    let text = request.text;

    let stored_text = text.clone();
    let stored = state
        .run_blocking(move |service| {
            service.embed_and_store(&stored_text, request.filename, request.chunk_number)
        })
        .await
        .map_err(|e| AppError::from_service(e, "Failed to create embedding"))?;

    Ok((
        StatusCode::CREATED,
        Json(EmbedResponse {
            message: "Embedding created and stored successfully",
            text,
            embedding_id: stored.id,
            embedding_dimension: stored.dimension,
        }),
    ))
}

/// POST /search
pub async fn search_similar(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(body) = body?;
    let request = SearchRequest::from_json(body, state.service.max_k())
        .map_err(|e| AppError::from_service(e, "Failed to search"))?;
    let text = request.text;

    let query = text.clone();
    let hits = state
        .run_blocking(move |service| service.search(&query, request.k))
        .await
        .map_err(|e| AppError::from_service(e, "Failed to search"))?;

    let results = hits
        .into_iter()
        .map(|hit| SearchResult {
            id: hit.record.id,
            text: hit.record.text,
            distance: hit.distance,
            filename: hit.record.metadata.filename,
            chunk_number: hit.record.metadata.chunk_number,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: text,
        results,
    }))
}

/// GET /texts
pub async fn list_texts(State(state): State<AppState>) -> Result<Json<TextsResponse>, AppError> {
    let records = state
        .run_blocking(|service| service.records())
        .await
        .map_err(|e| AppError::from_service(e, "Failed to list texts"))?;

    let texts: Vec<String> = records.into_iter().map(|r| r.text).collect();
    Ok(Json(TextsResponse {
        count: texts.len(),
        texts,
    }))
}
