//! Domain models: exercises, their typed content blocks, and answer values.
//!
//! `exercise_content` and `correct_answers` are carried per exercise type as a
//! tagged union so a mismatch between the two is impossible to represent once
//! an exercise has passed the loader.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One exercise inside a unit, as built by a teacher and solved by a student.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
  #[serde(default = "fresh_id")]
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub instruction: String,
  #[serde(default = "default_unit")]
  pub unit: String,
  /// Position within the unit.
  #[serde(default)]
  pub order: u32,
  /// When false, scoring is deferred to a teacher review.
  #[serde(default = "default_true")]
  pub is_instant_scored: bool,
  #[serde(default = "default_max_score")]
  pub max_score: u32,
  /// Alternate presentations, browsed by teachers. Never touched by scoring.
  #[serde(default)]
  pub variants: Vec<Variant>,
  #[serde(flatten)]
  pub body: ExerciseBody,
}

fn fresh_id() -> String { Uuid::new_v4().to_string() }
fn default_unit() -> String { "default".into() }
fn default_true() -> bool { true }
fn default_max_score() -> u32 { 100 }

/// Alternate presentation of the same exercise (teacher catalog metadata).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variant {
  pub name: String,
  #[serde(default)]
  pub description: String,
}

/// Type-specific content and answer key, discriminated by `exercise_type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "exercise_type", rename_all = "snake_case")]
pub enum ExerciseBody {
  MultipleChoice {
    exercise_content: Vec<ChoiceQuestion>,
    /// Index of the correct option, one per question.
    correct_answers: Vec<usize>,
  },
  FillInTheBlanks {
    exercise_content: Vec<BlankPassage>,
    /// One accepted answer per blank per passage.
    correct_answers: Vec<Vec<String>>,
  },
  TextWithInput {
    exercise_content: Vec<InputPrompt>,
    /// `None` means no key registered: the item is shown as submitted, never graded.
    correct_answers: Vec<Option<String>>,
  },
  TextWithQuestions {
    exercise_content: Vec<ContextQuestion>,
    correct_answers: Vec<String>,
  },
  ImagesWithInput {
    exercise_content: Vec<ImagePrompt>,
    correct_answers: Vec<Option<String>>,
  },
  DragAndDrop {
    exercise_content: Vec<DropArea>,
    items: Vec<DragItem>,
    /// Accepted item ids per drop area id.
    correct_answers: BTreeMap<String, BTreeSet<String>>,
  },
  CrosswordPuzzle {
    exercise_content: Vec<CrosswordClue>,
    /// One answer word per clue. Kept for teacher review; not auto-scored.
    correct_answers: Vec<String>,
  },
}

impl ExerciseBody {
  pub fn kind(&self) -> &'static str {
    match self {
      ExerciseBody::MultipleChoice { .. } => "multiple_choice",
      ExerciseBody::FillInTheBlanks { .. } => "fill_in_the_blanks",
      ExerciseBody::TextWithInput { .. } => "text_with_input",
      ExerciseBody::TextWithQuestions { .. } => "text_with_questions",
      ExerciseBody::ImagesWithInput { .. } => "images_with_input",
      ExerciseBody::DragAndDrop { .. } => "drag_and_drop",
      ExerciseBody::CrosswordPuzzle { .. } => "crossword_puzzle",
    }
  }

  /// Crossword puzzles are practice-only: answers are recorded but the
  /// backend never grades them against the key.
  pub fn auto_scored(&self) -> bool {
    !matches!(self, ExerciseBody::CrosswordPuzzle { .. })
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoiceQuestion {
  pub question: String,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlankPassage {
  /// Passage text with one `[blank]` marker per declared blank.
  pub text: String,
  pub blanks: Vec<Blank>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blank {
  #[serde(default)]
  pub hint: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputPrompt {
  #[serde(default)]
  pub context: String,
  pub prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextQuestion {
  #[serde(default)]
  pub context: String,
  pub question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagePrompt {
  pub image_url: String,
  pub prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DragItem {
  pub id: String,
  pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DropArea {
  pub id: String,
  pub label: String,
  pub kind: AreaKind,
}

/// `Single` areas accept exactly one item; `Multi` areas an exact set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
  Single,
  Multi,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrosswordClue {
  pub clue: String,
  pub row: u32,
  pub col: u32,
  pub direction: ClueDirection,
  /// Answer length in letters.
  pub length: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClueDirection {
  Across,
  Down,
}

/// A single submitted answer, keyed by slot id in the session.
///
/// Slot ids are `"{content}"` for one-input items, `"{content}-{blank}"` for
/// blanks, and the drop-area id for placements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerValue {
  Text { value: String },
  Choice { option: usize },
  Placement { items: BTreeSet<String> },
}
