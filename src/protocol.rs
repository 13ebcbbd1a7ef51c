//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{AnswerValue, Exercise, ExerciseBody, Variant};
use crate::scoring::Verdict;
use crate::session::{Phase, Session};

/// Messages the client can send over WebSocket (tutor chat).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ChatMessage { text: String },
    ChatCancel,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    ChatChunk { text: String },
    ChatDone,
    ChatCancelled,
    Error { message: String },
}

/// Student-facing exercise DTO. The answer key never leaves the server.
#[derive(Debug, Serialize)]
pub struct ExerciseOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub instruction: String,
    pub unit: String,
    pub order: u32,
    pub exercise_type: &'static str,
    pub is_instant_scored: bool,
    pub max_score: u32,
    pub variants: Vec<Variant>,
    pub exercise_content: Value,
    /// Draggable items for drag-and-drop exercises; null otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

/// Convert a full `Exercise` (internal, key included) to the public DTO.
pub fn to_out(ex: &Exercise) -> ExerciseOut {
    let (content, items) = match &ex.body {
        ExerciseBody::MultipleChoice { exercise_content, .. } => (to_value(exercise_content), None),
        ExerciseBody::FillInTheBlanks { exercise_content, .. } => (to_value(exercise_content), None),
        ExerciseBody::TextWithInput { exercise_content, .. } => (to_value(exercise_content), None),
        ExerciseBody::TextWithQuestions { exercise_content, .. } => (to_value(exercise_content), None),
        ExerciseBody::ImagesWithInput { exercise_content, .. } => (to_value(exercise_content), None),
        ExerciseBody::DragAndDrop { exercise_content, items, .. } => {
            (to_value(exercise_content), Some(to_value(items)))
        }
        ExerciseBody::CrosswordPuzzle { exercise_content, .. } => (to_value(exercise_content), None),
    };

    ExerciseOut {
        id: ex.id.clone(),
        title: ex.title.clone(),
        description: ex.description.clone(),
        instruction: ex.instruction.clone(),
        unit: ex.unit.clone(),
        order: ex.order,
        exercise_type: ex.body.kind(),
        is_instant_scored: ex.is_instant_scored,
        max_score: ex.max_score,
        variants: ex.variants.clone(),
        exercise_content: content,
        items,
    }
}

fn to_value<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub id: String,
    #[serde(rename = "exerciseId")]
    pub exercise_id: String,
    pub phase: Phase,
    pub submitted: bool,
    #[serde(rename = "firstSubmission")]
    pub first_submission: bool,
    pub score: Option<u32>,
    pub answers: BTreeMap<String, AnswerValue>,
}

pub fn session_out(s: &Session) -> SessionOut {
    SessionOut {
        id: s.id.clone(),
        exercise_id: s.exercise_id.clone(),
        phase: s.phase(),
        submitted: s.submitted,
        first_submission: s.first_submission,
        score: s.score,
        answers: s.answers.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct LoadOut {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionStartIn {
    #[serde(rename = "exerciseId")]
    pub exercise_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub slot: String,
    /// Missing answer clears the slot (an item dragged back out, a field
    /// emptied).
    #[serde(default)]
    pub answer: Option<AnswerValue>,
}

/// Outcome of a submit, shaped per scoring mode.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOut {
    Scored {
        verdicts: BTreeMap<String, Verdict>,
        correct: usize,
        total: usize,
        percentage: f32,
        score: u32,
        #[serde(rename = "maxScore")]
        max_score: u32,
        celebrate: bool,
    },
    Recorded {
        answered: usize,
    },
    PendingReview {
        #[serde(rename = "reviewId")]
        review_id: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct ResolveReviewIn {
    #[serde(rename = "reviewId")]
    pub review_id: String,
    pub score: u32,
}

#[derive(Debug, Deserialize)]
pub struct SuggestFeedbackIn {
    #[serde(rename = "reviewId")]
    pub review_id: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackOut {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UploadOut {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TutorIn {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TutorOut {
    pub text: String,
}
