//! Submission sessions: the state machine behind one attempt at an exercise.
//!
//! `ready` -> `submitted` -> (answer edit) -> `ready` -> `submitted` ...
//! There is no terminal state; a session can cycle indefinitely. Editing any
//! answer after a submit clears the `submitted` flag and nothing else, so an
//! explicit resubmit is required to recompute. Resubmitting identical answers
//! yields the identical score.
//!
//! The first submission that reaches a perfect score opens a 5-second
//! celebration window, exactly once per session.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{AnswerValue, Exercise};
use crate::scoring::{score_exercise, Outcome};

/// How long the perfect-score celebration stays active.
pub const CELEBRATION_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Ready,
  Submitted,
}

/// One student's attempt at one exercise. Held in memory only; sessions are
/// created fresh per attempt and discarded with the process.
#[derive(Clone, Debug)]
pub struct Session {
  pub id: String,
  pub exercise_id: String,
  pub answers: BTreeMap<String, AnswerValue>,
  pub score: Option<u32>,
  pub submitted: bool,
  pub first_submission: bool,
  celebration_until: Option<Instant>,
}

/// What a submit produced, before protocol mapping.
#[derive(Debug)]
pub enum SubmitResult {
  /// Instant-scored exercise: verdicts plus aggregate score.
  Scored { outcome: Outcome, celebrate: bool },
  /// Practice-only exercise type: answers recorded, nothing graded.
  Recorded,
  /// Deferred exercise: the caller queues a teacher review.
  PendingReview,
}

impl Session {
  pub fn new(exercise_id: &str) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      exercise_id: exercise_id.to_string(),
      answers: BTreeMap::new(),
      score: None,
      submitted: false,
      first_submission: true,
      celebration_until: None,
    }
  }

  pub fn phase(&self) -> Phase {
    if self.submitted { Phase::Submitted } else { Phase::Ready }
  }

  /// Record or edit one answer slot. Editing after a submit flips the session
  /// back to `ready`; the previous score stays visible until resubmit.
  #[instrument(level = "debug", skip(self, value), fields(session = %self.id, %slot))]
  pub fn set_answer(&mut self, slot: String, value: AnswerValue) {
    if self.submitted {
      debug!(target: "exercise", session = %self.id, "Answer edited after submit; back to ready");
      self.submitted = false;
    }
    self.answers.insert(slot, value);
  }

  /// Remove one answer slot (e.g. dragging an item back out of an area).
  pub fn clear_answer(&mut self, slot: &str) {
    if self.submitted {
      self.submitted = false;
    }
    self.answers.remove(slot);
  }

  /// Submit the current answers against the exercise.
  #[instrument(level = "info", skip(self, ex, now), fields(session = %self.id, exercise = %ex.id))]
  pub fn submit(&mut self, ex: &Exercise, now: Instant) -> SubmitResult {
    self.submitted = true;

    if !ex.is_instant_scored {
      // A resubmission invalidates any score a teacher already assigned.
      self.score = None;
      return SubmitResult::PendingReview;
    }

    match score_exercise(ex, &self.answers) {
      Some(outcome) => {
        self.score = Some(outcome.score);
        let perfect = outcome.score == ex.max_score;
        let celebrate = perfect && self.first_submission;
        if celebrate {
          self.first_submission = false;
          self.celebration_until = Some(now + CELEBRATION_WINDOW);
        }
        SubmitResult::Scored { outcome, celebrate }
      }
      None => SubmitResult::Recorded,
    }
  }

  /// Restore the empty answer configuration. Keeps `first_submission` and the
  /// loaded exercise binding.
  #[instrument(level = "debug", skip(self), fields(session = %self.id))]
  pub fn reset(&mut self) {
    self.answers.clear();
    self.score = None;
    self.submitted = false;
  }

  /// Apply a teacher-review score to a deferred submission.
  pub fn apply_review(&mut self, score: u32) {
    self.score = Some(score);
  }

  pub fn celebration_active(&self, now: Instant) -> bool {
    matches!(self.celebration_until, Some(until) if now < until)
  }
}

/// A deferred submission awaiting a teacher's score.
#[derive(Clone, Debug, Serialize)]
pub struct PendingReview {
  pub id: String,
  pub session_id: String,
  pub exercise_id: String,
  pub answers: BTreeMap<String, AnswerValue>,
}

impl PendingReview {
  pub fn for_session(s: &Session) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      session_id: s.id.clone(),
      exercise_id: s.exercise_id.clone(),
      answers: s.answers.clone(),
    }
  }
}
