//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub version: &'static str,
    pub providers: Providers,
    pub retrieval: RetrievalSettings,
}

#[derive(Serialize)]
pub struct Providers {
    pub embedding: String,
    pub index: String,
    pub ner: String,
    pub generation: String,
}

#[derive(Serialize)]
pub struct RetrievalSettings {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - reports the collaborators the pipeline was built with
///
/// Collaborators are constructed at startup, so a running server is ready.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let config = &state.config;
    let params = state.pipeline.retrieval_params();

    Json(ReadyResponse {
        status: "ready".to_string(),
        version: medrag_common::VERSION,
        providers: Providers {
            embedding: config.embedding.provider.clone(),
            index: config.index.provider.clone(),
            ner: config.ner.provider.clone(),
            generation: config.generation.provider.clone(),
        },
        retrieval: RetrievalSettings {
            k: params.k,
            fetch_k: params.fetch_k,
            lambda: params.lambda,
        },
    })
}
