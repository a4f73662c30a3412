//! Question answering handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use medrag_common::{
    errors::{AppError, Result},
    AnswerResult,
};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;

/// Process query request
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessQueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

/// Answer a medical question with numbered citations
pub async fn process_query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ProcessQueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation {
        message: rejection.body_text(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("text".to_string()),
    })?;

    let answer = state.pipeline.process_query(&request.text).await?;
    Ok(Json(answer))
}
