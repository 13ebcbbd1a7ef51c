//! End-to-end tests against the real router: load -> session -> submit flows,
//! the deferred review queue, and the upload endpoint.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tara_backend::routes::build_router;
use tara_backend::state::AppState;

const BLANKS_EXERCISE: &str = r#"{
  "id": "t-blanks",
  "title": "Animal actions",
  "exercise_type": "fill_in_the_blanks",
  "exercise_content": [{"text": "The [blank] jumps.", "blanks": [{"hint": ""}]}],
  "correct_answers": [["dog"]],
  "max_score": 10
}"#;

fn app() -> Router {
    build_router(Arc::new(AppState::new()))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.expect("request failed");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body read failed");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app();
    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn load_then_fetch_redacts_the_answer_key() {
    let app = app();
    let (status, body) = send(&app, post_raw("/api/v1/exercise", BLANKS_EXERCISE)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], json!("t-blanks"));

    let (status, body) = send(&app, get("/api/v1/exercise/t-blanks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exercise_type"], json!("fill_in_the_blanks"));
    assert_eq!(body["max_score"], json!(10));
    assert!(body.get("correct_answers").is_none(), "answer key leaked: {body}");
}

#[tokio::test]
async fn malformed_json_leaves_the_store_untouched() {
    let app = app();
    let (_, before) = send(&app, get("/api/v1/catalog")).await;
    let count_before = before.as_array().unwrap().len();

    let (status, body) = send(&app, post_raw("/api/v1/exercise", "{not json")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("invalid exercise JSON"));

    let (_, after) = send(&app, get("/api/v1/catalog")).await;
    assert_eq!(after.as_array().unwrap().len(), count_before);
}

#[tokio::test]
async fn misaligned_answer_key_is_rejected() {
    let app = app();
    let raw = r#"{
      "exercise_type": "text_with_questions",
      "exercise_content": [{"question": "Where?"}, {"question": "When?"}],
      "correct_answers": ["here"]
    }"#;
    let (status, body) = send(&app, post_raw("/api/v1/exercise", raw)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("answer key"));
}

#[tokio::test]
async fn instant_submission_flow_scores_and_celebrates_once() {
    let app = app();
    send(&app, post_raw("/api/v1/exercise", BLANKS_EXERCISE)).await;

    let (status, session) =
        send(&app, post_json("/api/v1/session", json!({"exerciseId": "t-blanks"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let sid = session["id"].as_str().unwrap().to_string();

    // Trimmed + case-insensitive match.
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "0-0", "answer": {"type": "text", "value": " Dog "}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, out) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["status"], json!("scored"));
    assert_eq!(out["score"], json!(10));
    assert_eq!(out["maxScore"], json!(10));
    assert_eq!(out["celebrate"], json!(true));
    assert_eq!(out["verdicts"]["0-0"], json!("correct"));

    // Resubmission is idempotent and never re-celebrates.
    let (_, again) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(again["score"], json!(10));
    assert_eq!(again["celebrate"], json!(false));

    // Editing an answer flips the session back to ready.
    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "0-0", "answer": {"type": "text", "value": "dog"}}),
        ),
    )
    .await;
    let (_, view) = send(&app, get(&format!("/api/v1/session/{sid}"))).await;
    assert_eq!(view["submitted"], json!(false));
    assert_eq!(view["phase"], json!("ready"));

    // Identical resubmit restores the same score.
    let (_, third) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(third["score"], json!(10));
}

#[tokio::test]
async fn reset_restores_the_empty_configuration() {
    let app = app();
    send(&app, post_raw("/api/v1/exercise", BLANKS_EXERCISE)).await;
    let (_, session) =
        send(&app, post_json("/api/v1/session", json!({"exerciseId": "t-blanks"}))).await;
    let sid = session["id"].as_str().unwrap().to_string();

    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "0-0", "answer": {"type": "text", "value": "dog"}}),
        ),
    )
    .await;
    send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;

    let (status, view) = send(&app, post_json(&format!("/api/v1/session/{sid}/reset"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["answers"], json!({}));
    assert_eq!(view["score"], json!(null));
    assert_eq!(view["submitted"], json!(false));
    // The one-time celebration gate survives a reset.
    assert_eq!(view["firstSubmission"], json!(false));
}

#[tokio::test]
async fn deferred_exercise_goes_through_teacher_review() {
    let app = app();
    // Seed "seed-writing-1" is deferred (is_instant_scored = false, max 20).
    let (_, session) =
        send(&app, post_json("/api/v1/session", json!({"exerciseId": "seed-writing-1"}))).await;
    let sid = session["id"].as_str().unwrap().to_string();

    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "0", "answer": {"type": "text", "value": "I went to the park."}}),
        ),
    )
    .await;

    let (status, out) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["status"], json!("pending_review"));
    let review_id = out["reviewId"].as_str().unwrap().to_string();

    let (_, pending) = send(&app, get("/api/v1/review/pending")).await;
    assert!(pending
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["id"] == json!(review_id.clone())));

    // Feedback drafting always answers (OpenAI or canned fallback).
    let (status, fb) = send(
        &app,
        post_json("/api/v1/review/feedback", json!({"reviewId": review_id.clone()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!fb["text"].as_str().unwrap().is_empty());

    // Out-of-range score is rejected and the review stays queued.
    let (status, _) = send(
        &app,
        post_json("/api/v1/review", json!({"reviewId": review_id.clone(), "score": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, view) = send(
        &app,
        post_json("/api/v1/review", json!({"reviewId": review_id.clone(), "score": 15})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["score"], json!(15));

    // Resolving consumed the review.
    let (_, pending) = send(&app, get("/api/v1/review/pending")).await;
    assert!(pending
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["id"] != json!(review_id.clone())));
}

#[tokio::test]
async fn drag_and_drop_scores_by_area_kind() {
    let app = app();
    // Seed "seed-drag-1": multi area {apple, banana}, single area {carrot | potato}.
    let (_, session) =
        send(&app, post_json("/api/v1/session", json!({"exerciseId": "seed-drag-1"}))).await;
    let sid = session["id"].as_str().unwrap().to_string();

    // Superset into the multi area, one valid item into the single area.
    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "fruit", "answer": {"type": "placement", "items": ["apple", "banana", "carrot"]}}),
        ),
    )
    .await;
    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "one-veg", "answer": {"type": "placement", "items": ["potato"]}}),
        ),
    )
    .await;

    let (_, out) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(out["verdicts"]["fruit"], json!("incorrect"));
    assert_eq!(out["verdicts"]["one-veg"], json!("correct"));
    assert_eq!(out["score"], json!(5)); // round(1/2 * 10)

    // Fix the multi area by removing the stray item.
    send(
        &app,
        post_json(
            &format!("/api/v1/session/{sid}/answer"),
            json!({"slot": "fruit", "answer": {"type": "placement", "items": ["apple", "banana"]}}),
        ),
    )
    .await;
    let (_, out) = send(&app, post_json(&format!("/api/v1/session/{sid}/submit"), json!({}))).await;
    assert_eq!(out["score"], json!(10));
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let app = app();
    let (status, _) = send(&app, get("/api/v1/exercise/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/api/v1/session/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) =
        send(&app, post_json("/api/v1/session", json!({"exerciseId": "ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_upload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = AppState::new();
    state.upload_dir = dir.path().to_path_buf();
    let app = build_router(Arc::new(state));

    let png: &[u8] = b"\x89PNG\r\n\x1a\nfake image bytes";
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/image/upload")
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(png.to_vec()))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"), "unexpected url: {url}");
    assert!(url.ends_with(".png"));

    let name = url.strip_prefix("/uploads/").unwrap();
    let stored = std::fs::read(dir.path().join(name)).unwrap();
    assert_eq!(stored, png);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/image/upload")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tutor_message_always_answers() {
    // With no OPENAI_API_KEY the stub replies; either way the endpoint
    // returns usable text.
    let app = app();
    let (status, body) = send(
        &app,
        post_json("/api/v1/tutor/message", json!({"text": "when do I use the past tense?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["text"].as_str().unwrap().is_empty());
}
