//! Application state: in-memory stores for exercises, sessions, and pending
//! reviews, plus the prompts and the optional OpenAI client.
//!
//! Nothing in here is persisted; exercises live for the process lifetime and
//! sessions are created fresh per attempt, mirroring how the portals keep
//! submission state only while a viewer is mounted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::chat::OpenAI;
use crate::config::{load_config_from_env, Prompts};
use crate::domain::{AnswerValue, Exercise};
use crate::error::ApiError;
use crate::loader::parse_exercise;
use crate::scoring::Outcome;
use crate::seeds::seed_exercises;
use crate::session::{PendingReview, Session, SubmitResult};

#[derive(Clone)]
pub struct AppState {
    pub exercises: Arc<RwLock<HashMap<String, Exercise>>>,
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    pub reviews: Arc<RwLock<HashMap<String, PendingReview>>>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
    pub upload_dir: PathBuf,
}

/// Submit result enriched with what the handlers need to answer the client.
#[derive(Debug)]
pub enum SessionSubmit {
    Scored { outcome: Outcome, max_score: u32, celebrate: bool },
    Recorded { answered: usize },
    PendingReview { review_id: String },
}

impl AppState {
    /// Build state from env: load config, seed exercises, preload exercise
    /// files, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();
        let prompts = cfg.prompts.clone();

        let mut exercises = HashMap::<String, Exercise>::new();
        for ex in seed_exercises() {
            exercises.insert(ex.id.clone(), ex);
        }

        // Preload exercises listed in config. Bad files are skipped, never fatal.
        for path in &cfg.exercise_files {
            match std::fs::read_to_string(path) {
                Ok(raw) => match parse_exercise(&raw) {
                    Ok(ex) => {
                        info!(target: "exercise", %path, id = %ex.id, kind = ex.body.kind(), "Preloaded exercise");
                        exercises.insert(ex.id.clone(), ex);
                    }
                    Err(e) => {
                        error!(target: "exercise", %path, error = %e, "Skipping exercise file: invalid definition");
                    }
                },
                Err(e) => {
                    error!(target: "exercise", %path, error = %e, "Skipping exercise file: unreadable");
                }
            }
        }

        // Inventory summary by unit.
        let mut count_by_unit = HashMap::<String, usize>::new();
        for ex in exercises.values() {
            *count_by_unit.entry(ex.unit.clone()).or_default() += 1;
        }
        for (unit, n) in count_by_unit {
            info!(target: "exercise", %unit, exercises = n, "Startup exercise inventory");
        }

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "tara_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "tara_backend", "OpenAI disabled (no OPENAI_API_KEY). Tutor uses stub replies.");
        }

        let upload_dir = std::env::var("TARA_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./static/uploads"));

        Self {
            exercises: Arc::new(RwLock::new(exercises)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            reviews: Arc::new(RwLock::new(HashMap::new())),
            openai,
            prompts,
            upload_dir,
        }
    }

    /// Parse, validate, and store one exercise definition. The store is
    /// untouched when the definition is rejected.
    #[instrument(level = "info", skip(self, raw), fields(raw_len = raw.len()))]
    pub async fn load_exercise(&self, raw: &str) -> Result<String, ApiError> {
        let ex = parse_exercise(raw)?;
        let id = ex.id.clone();
        info!(target: "exercise", %id, kind = ex.body.kind(), unit = %ex.unit, "Exercise stored");
        self.exercises.write().await.insert(id.clone(), ex);
        Ok(id)
    }

    pub async fn get_exercise(&self, id: &str) -> Option<Exercise> {
        self.exercises.read().await.get(id).cloned()
    }

    /// All exercises, ordered by unit then position.
    pub async fn catalog(&self) -> Vec<Exercise> {
        let mut all: Vec<Exercise> = self.exercises.read().await.values().cloned().collect();
        all.sort_by(|a, b| (a.unit.as_str(), a.order, a.id.as_str()).cmp(&(b.unit.as_str(), b.order, b.id.as_str())));
        all
    }

    /// Exercises of one unit, ordered by position.
    pub async fn unit_listing(&self, unit: &str) -> Vec<Exercise> {
        let mut list: Vec<Exercise> = self
            .exercises
            .read()
            .await
            .values()
            .filter(|ex| ex.unit == unit)
            .cloned()
            .collect();
        list.sort_by(|a, b| (a.order, a.id.as_str()).cmp(&(b.order, b.id.as_str())));
        list
    }

    /// Start a fresh attempt at an exercise.
    #[instrument(level = "info", skip(self), fields(%exercise_id))]
    pub async fn create_session(&self, exercise_id: &str) -> Result<Session, ApiError> {
        if self.get_exercise(exercise_id).await.is_none() {
            return Err(ApiError::not_found("exercise", exercise_id));
        }
        let session = Session::new(exercise_id);
        info!(target: "exercise", session = %session.id, %exercise_id, "Session started");
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Record or edit one answer slot on a session.
    pub async fn record_answer(
        &self,
        session_id: &str,
        slot: String,
        value: AnswerValue,
    ) -> Result<Session, ApiError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("session", session_id))?;
        session.set_answer(slot, value);
        Ok(session.clone())
    }

    /// Remove one answer slot on a session.
    pub async fn clear_answer(&self, session_id: &str, slot: &str) -> Result<Session, ApiError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("session", session_id))?;
        session.clear_answer(slot);
        Ok(session.clone())
    }

    /// Submit a session: score instantly, record practice answers, or queue a
    /// teacher review for deferred exercises.
    #[instrument(level = "info", skip(self, now), fields(%session_id))]
    pub async fn submit_session(
        &self,
        session_id: &str,
        now: Instant,
    ) -> Result<SessionSubmit, ApiError> {
        let exercise = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| ApiError::not_found("session", session_id))?;
            self.get_exercise(&session.exercise_id)
                .await
                .ok_or_else(|| ApiError::not_found("exercise", session.exercise_id.clone()))?
        };

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("session", session_id))?;

        match session.submit(&exercise, now) {
            SubmitResult::Scored { outcome, celebrate } => {
                info!(target: "exercise", session = %session_id, score = outcome.score, max = exercise.max_score, celebrate, "Submission scored");
                Ok(SessionSubmit::Scored { outcome, max_score: exercise.max_score, celebrate })
            }
            SubmitResult::Recorded => {
                info!(target: "exercise", session = %session_id, answered = session.answers.len(), "Practice submission recorded");
                Ok(SessionSubmit::Recorded { answered: session.answers.len() })
            }
            SubmitResult::PendingReview => {
                let review = PendingReview::for_session(session);
                let review_id = review.id.clone();
                let mut reviews = self.reviews.write().await;
                // A resubmission replaces the session's earlier pending entry.
                reviews.retain(|_, r| r.session_id != session_id);
                reviews.insert(review_id.clone(), review);
                info!(target: "exercise", session = %session_id, %review_id, "Submission queued for teacher review");
                Ok(SessionSubmit::PendingReview { review_id })
            }
        }
    }

    /// Reset a session to its empty answer configuration.
    pub async fn reset_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("session", session_id))?;
        session.reset();
        Ok(session.clone())
    }

    pub async fn pending_reviews(&self) -> Vec<PendingReview> {
        let mut list: Vec<PendingReview> = self.reviews.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub async fn get_review(&self, review_id: &str) -> Option<PendingReview> {
        self.reviews.read().await.get(review_id).cloned()
    }

    /// Resolve a pending review with a teacher-assigned score.
    #[instrument(level = "info", skip(self), fields(%review_id, score))]
    pub async fn resolve_review(&self, review_id: &str, score: u32) -> Result<Session, ApiError> {
        let review = self
            .reviews
            .write()
            .await
            .remove(review_id)
            .ok_or_else(|| ApiError::not_found("review", review_id))?;

        let max_score = self
            .get_exercise(&review.exercise_id)
            .await
            .map(|ex| ex.max_score)
            .unwrap_or(u32::MAX);
        if score > max_score {
            // Put the review back; the score was out of range.
            let id = review.id.clone();
            self.reviews.write().await.insert(id, review);
            return Err(ApiError::BadRequest(format!(
                "score {score} exceeds max_score {max_score}"
            )));
        }

        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&review.session_id) {
            Some(session) => {
                session.apply_review(score);
                info!(target: "exercise", session = %session.id, score, "Review resolved");
                Ok(session.clone())
            }
            None => {
                warn!(target: "exercise", session = %review.session_id, "Review resolved but session is gone");
                Err(ApiError::not_found("session", review.session_id))
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
