//! API error type shared by the HTTP handlers.
//!
//! Every variant maps to a status code; nothing here is ever fatal to the
//! process. Loader errors keep their full message so the builder UI can show
//! which alignment rule was violated.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::loader::ExerciseLoadError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Load(#[from] ExerciseLoadError),
  #[error("unknown {kind}: {id}")]
  NotFound { kind: &'static str, id: String },
  #[error("{0}")]
  BadRequest(String),
  #[error("upload exceeds {limit} bytes")]
  UploadTooLarge { limit: usize },
  #[error("i/o failure: {0}")]
  Io(#[from] std::io::Error),
}

impl ApiError {
  pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
    ApiError::NotFound { kind, id: id.into() }
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
