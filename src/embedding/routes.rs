use aide::{
    axum::{
        routing::{get_with, post_with},
        ApiRouter,
    },
    transform::TransformOperation,
};
use axum::extract::State;
use axum_macros::debug_handler;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::server::{
    errors::{AppError, ErrorBody},
    extractors::Json,
    state::AppState,
};

use super::{
    compare_texts, embed_text, CompareRequest, CompareResponse, EmbedRequest, EmbedResponse,
    JSONModelInfo,
};

#[derive(Serialize, Deserialize, Debug, JsonSchema, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

/// Mounts the embedding endpoints under `api_base_url`.
pub fn embed_routes(state: AppState, api_base_url: &str) -> ApiRouter {
    let path = |endpoint: &str| format!("{api_base_url}{endpoint}");
    ApiRouter::new()
        .api_route(&path("/embed"), post_with(embed, embed_docs))
        .api_route(&path("/compare"), post_with(compare, compare_docs))
        .api_route(&path("/model-info"), get_with(model_info, model_info_docs))
        .api_route(&path("/health"), get_with(health, health_docs))
        .with_state(state)
}

fn model_unavailable_docs(op: TransformOperation) -> TransformOperation {
    op.response_with::<500, Json<ErrorBody>, _>(|res| {
        res.description("Model not loaded or inference failed")
    })
}

fn embed_docs(op: TransformOperation) -> TransformOperation {
    model_unavailable_docs(
        op.description("Embed a single text.")
            .tag("embedding")
            .response::<200, Json<EmbedResponse>>(),
    )
}

fn compare_docs(op: TransformOperation) -> TransformOperation {
    model_unavailable_docs(
        op.description("Score a new text against previous texts and report the best match.")
            .tag("embedding")
            .response::<200, Json<CompareResponse>>()
            .response_with::<400, Json<ErrorBody>, _>(|res| {
                res.description("new_text or old_texts missing or empty")
            }),
    )
}

fn model_info_docs(op: TransformOperation) -> TransformOperation {
    model_unavailable_docs(
        op.description("Describe the loaded model.")
            .response::<200, Json<JSONModelInfo>>(),
    )
}

fn health_docs(op: TransformOperation) -> TransformOperation {
    op.description("Liveness check; answers even when the model failed to load.")
        .response::<200, Json<HealthStatus>>()
}

pub async fn hello_world() -> &'static str {
    "Embedding Gateway"
}

#[debug_handler]
pub async fn embed(
    State(state): State<AppState>,
    Json(payload): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, AppError> {
    let model = state.model()?;
    let text = payload.into_text();
    let embedding =
        tokio::task::spawn_blocking(move || embed_text(model.as_ref(), &text)).await??;
    Ok(Json(EmbedResponse { embedding }))
}

#[debug_handler]
pub async fn compare(
    State(state): State<AppState>,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    let model = state.model()?;
    payload.validate()?;
    let result = tokio::task::spawn_blocking(move || {
        compare_texts(model.as_ref(), &payload.new_text, &payload.old_texts)
    })
    .await??;
    Ok(Json(result))
}

pub async fn model_info(State(state): State<AppState>) -> Result<Json<JSONModelInfo>, AppError> {
    Ok(Json(state.model()?.model_info()))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        model_loaded: state.model_loaded(),
    })
}
