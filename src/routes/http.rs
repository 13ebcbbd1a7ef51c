//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! stores and the scoring/session core; each handler is instrumented and
//! logs parameters plus basic result info.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{response::IntoResponse, Json};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::protocol::*;
use crate::session::PendingReview;
use crate::state::{AppState, SessionSubmit};

/// Hard cap for one uploaded image.
const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// Accepts raw exercise JSON (the builders paste it as text). On a rejected
/// definition nothing is stored and the typed loader error is returned.
#[instrument(level = "info", skip(state, raw), fields(raw_len = raw.len()))]
pub async fn http_post_exercise(
  State(state): State<Arc<AppState>>,
  raw: String,
) -> Result<impl IntoResponse, ApiError> {
  let id = state.load_exercise(&raw).await?;
  Ok((StatusCode::CREATED, Json(LoadOut { id })))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_exercise(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let ex = state
    .get_exercise(&id)
    .await
    .ok_or_else(|| ApiError::not_found("exercise", &id))?;
  Ok(Json(to_out(&ex)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let list: Vec<ExerciseOut> = state.catalog().await.iter().map(to_out).collect();
  Json(list)
}

#[instrument(level = "info", skip(state), fields(%unit))]
pub async fn http_get_unit(
  State(state): State<Arc<AppState>>,
  Path(unit): Path<String>,
) -> impl IntoResponse {
  let list: Vec<ExerciseOut> = state.unit_listing(&unit).await.iter().map(to_out).collect();
  Json(list)
}

#[instrument(level = "info", skip(state, body), fields(exercise = %body.exercise_id))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionStartIn>,
) -> Result<impl IntoResponse, ApiError> {
  let session = state.create_session(&body.exercise_id).await?;
  Ok((StatusCode::CREATED, Json(session_out(&session))))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let session = state
    .get_session(&id)
    .await
    .ok_or_else(|| ApiError::not_found("session", &id))?;
  Ok(Json(session_out(&session)))
}

#[instrument(level = "info", skip(state, body), fields(session = %id, slot = %body.slot))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse, ApiError> {
  let session = match body.answer {
    Some(value) => state.record_answer(&id, body.slot, value).await?,
    None => state.clear_answer(&id, &body.slot).await?,
  };
  Ok(Json(session_out(&session)))
}

#[instrument(level = "info", skip(state), fields(session = %id))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let out = match state.submit_session(&id, Instant::now()).await? {
    SessionSubmit::Scored { outcome, max_score, celebrate } => SubmitOut::Scored {
      verdicts: outcome.verdicts,
      correct: outcome.correct,
      total: outcome.total,
      percentage: outcome.percentage,
      score: outcome.score,
      max_score,
      celebrate,
    },
    SessionSubmit::Recorded { answered } => SubmitOut::Recorded { answered },
    SessionSubmit::PendingReview { review_id } => SubmitOut::PendingReview { review_id },
  };
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(session = %id))]
pub async fn http_post_reset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let session = state.reset_session(&id).await?;
  Ok(Json(session_out(&session)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_pending_reviews(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let list: Vec<PendingReview> = state.pending_reviews().await;
  Json(list)
}

#[instrument(level = "info", skip(state, body), fields(review = %body.review_id, score = body.score))]
pub async fn http_post_resolve_review(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResolveReviewIn>,
) -> Result<impl IntoResponse, ApiError> {
  let session = state.resolve_review(&body.review_id, body.score).await?;
  Ok(Json(session_out(&session)))
}

/// Draft feedback for a pending review. Degrades to a canned suggestion when
/// OpenAI is unavailable or failing, so the review screen always renders.
#[instrument(level = "info", skip(state, body), fields(review = %body.review_id))]
pub async fn http_post_suggest_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SuggestFeedbackIn>,
) -> Result<impl IntoResponse, ApiError> {
  let review = state
    .get_review(&body.review_id)
    .await
    .ok_or_else(|| ApiError::not_found("review", &body.review_id))?;
  let instruction = state
    .get_exercise(&review.exercise_id)
    .await
    .map(|ex| ex.instruction)
    .unwrap_or_default();
  let answers_json = serde_json::to_string(&review.answers).unwrap_or_else(|_| "{}".into());

  let text = match &state.openai {
    Some(oa) => match oa.suggest_feedback(&state.prompts, &instruction, &answers_json).await {
      Ok(t) => t,
      Err(e) => {
        error!(target: "tara_backend", review = %body.review_id, error = %e, "OpenAI feedback failed; using stub.");
        crate::chat::feedback_stub()
      }
    },
    None => crate::chat::feedback_stub(),
  };
  Ok(Json(FeedbackOut { text }))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_tutor_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> impl IntoResponse {
  let text = match &state.openai {
    Some(oa) => match oa.tutor_reply(&state.prompts, &body.text).await {
      Ok(t) => t,
      Err(e) => {
        error!(target: "tara_backend", error = %e, "OpenAI tutor reply failed; using stub.");
        crate::chat::tutor_stub(&body.text)
      }
    },
    None => crate::chat::tutor_stub(&body.text),
  };
  Json(TutorOut { text })
}

/// `POST /api/v1/image/upload` — body is the raw file bytes
/// (`application/octet-stream`). The file lands under the upload dir and is
/// served back through the static file service.
#[instrument(level = "info", skip(state, body), fields(bytes = body.len()))]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  if body.is_empty() {
    return Err(ApiError::BadRequest("empty upload body".into()));
  }
  if body.len() > MAX_UPLOAD_BYTES {
    return Err(ApiError::UploadTooLarge { limit: MAX_UPLOAD_BYTES });
  }

  let name = format!("{}.{}", Uuid::new_v4(), sniff_extension(&body));
  tokio::fs::create_dir_all(&state.upload_dir).await?;
  tokio::fs::write(state.upload_dir.join(&name), &body).await?;

  info!(target: "tara_backend", %name, bytes = body.len(), "Image stored");
  Ok(Json(UploadOut { url: format!("/uploads/{name}") }))
}

/// Extension from magic bytes; uploads are raw binary with no filename.
fn sniff_extension(bytes: &[u8]) -> &'static str {
  if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
    "png"
  } else if bytes.starts_with(b"\xff\xd8\xff") {
    "jpg"
  } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
    "gif"
  } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
    "webp"
  } else {
    "bin"
  }
}
