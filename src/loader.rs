//! Exercise loader: raw JSON text in, validated [`Exercise`] out.
//!
//! The builder UIs paste exercise JSON by hand, so shape mistakes are common.
//! Instead of letting a misaligned answer key degrade into missing feedback at
//! scoring time, every alignment rule is checked here and violations surface
//! as a typed [`ExerciseLoadError`].

use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{Exercise, ExerciseBody};

#[derive(Debug, Error)]
pub enum ExerciseLoadError {
  #[error("invalid exercise JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("exercise has no content blocks")]
  EmptyContent,
  #[error("answer key has {found} entries but content has {expected}")]
  MisalignedKey { expected: usize, found: usize },
  #[error("passage {passage}: answer key has {found} entries for {expected} blanks")]
  MisalignedBlanks { passage: usize, expected: usize, found: usize },
  #[error("passage {passage}: text has {markers} [blank] markers for {blanks} declared blanks")]
  BlankMarkerMismatch { passage: usize, markers: usize, blanks: usize },
  #[error("question {question}: correct option {index} out of range ({options} options)")]
  BadOptionIndex { question: usize, index: usize, options: usize },
  #[error("answer key references unknown drop area '{0}'")]
  UnknownArea(String),
  #[error("area '{area}': answer key references unknown item '{item}'")]
  UnknownItem { area: String, item: String },
  #[error("drop area '{0}' has no answer key entry")]
  MissingAreaKey(String),
  #[error("area '{0}': answer key is empty")]
  EmptyAreaKey(String),
  #[error("clue {clue}: answer has {found} letters but the clue declares {expected}")]
  AnswerLengthMismatch { clue: usize, expected: usize, found: usize },
}

/// Parse and validate one exercise definition.
///
/// Nothing is stored on failure; callers keep whatever exercise they had.
#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn parse_exercise(raw: &str) -> Result<Exercise, ExerciseLoadError> {
  let ex: Exercise = serde_json::from_str(raw)?;
  validate(&ex)?;
  debug!(target: "exercise", id = %ex.id, kind = ex.body.kind(), "Exercise parsed and validated");
  Ok(ex)
}

/// Alignment rules between `exercise_content` and `correct_answers`.
pub fn validate(ex: &Exercise) -> Result<(), ExerciseLoadError> {
  match &ex.body {
    ExerciseBody::MultipleChoice { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
      for (i, (q, &key)) in exercise_content.iter().zip(correct_answers).enumerate() {
        if key >= q.options.len() {
          return Err(ExerciseLoadError::BadOptionIndex {
            question: i,
            index: key,
            options: q.options.len(),
          });
        }
      }
    }
    ExerciseBody::FillInTheBlanks { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
      for (i, (p, keys)) in exercise_content.iter().zip(correct_answers).enumerate() {
        if keys.len() != p.blanks.len() {
          return Err(ExerciseLoadError::MisalignedBlanks {
            passage: i,
            expected: p.blanks.len(),
            found: keys.len(),
          });
        }
        let markers = p.text.matches("[blank]").count();
        if markers != p.blanks.len() {
          return Err(ExerciseLoadError::BlankMarkerMismatch {
            passage: i,
            markers,
            blanks: p.blanks.len(),
          });
        }
      }
    }
    ExerciseBody::TextWithInput { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
    }
    ExerciseBody::TextWithQuestions { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
    }
    ExerciseBody::ImagesWithInput { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
    }
    ExerciseBody::DragAndDrop { exercise_content, items, correct_answers } => {
      require_content(exercise_content.len())?;
      for area in exercise_content {
        let key = correct_answers
          .get(&area.id)
          .ok_or_else(|| ExerciseLoadError::MissingAreaKey(area.id.clone()))?;
        if key.is_empty() {
          return Err(ExerciseLoadError::EmptyAreaKey(area.id.clone()));
        }
        // `single` keys may list several acceptable items; the student still
        // drops exactly one of them, so no per-kind key arity rule here.
        for item in key {
          if !items.iter().any(|it| &it.id == item) {
            return Err(ExerciseLoadError::UnknownItem {
              area: area.id.clone(),
              item: item.clone(),
            });
          }
        }
      }
      for area_id in correct_answers.keys() {
        if !exercise_content.iter().any(|a| &a.id == area_id) {
          return Err(ExerciseLoadError::UnknownArea(area_id.clone()));
        }
      }
    }
    ExerciseBody::CrosswordPuzzle { exercise_content, correct_answers } => {
      require_content(exercise_content.len())?;
      require_aligned(exercise_content.len(), correct_answers.len())?;
      for (i, (clue, answer)) in exercise_content.iter().zip(correct_answers).enumerate() {
        let letters = answer.chars().filter(|c| !c.is_whitespace()).count();
        if letters != clue.length as usize {
          return Err(ExerciseLoadError::AnswerLengthMismatch {
            clue: i,
            expected: clue.length as usize,
            found: letters,
          });
        }
      }
    }
  }
  Ok(())
}

fn require_content(len: usize) -> Result<(), ExerciseLoadError> {
  if len == 0 {
    Err(ExerciseLoadError::EmptyContent)
  } else {
    Ok(())
  }
}

fn require_aligned(expected: usize, found: usize) -> Result<(), ExerciseLoadError> {
  if expected != found {
    Err(ExerciseLoadError::MisalignedKey { expected, found })
  } else {
    Ok(())
  }
}
