//! Answer scoring shared by every exercise type.
//!
//! Matching rule for text answers: trimmed, case-insensitive exact equality.
//! Aggregate: percentage of correct scoreable items, then rounded onto the
//! exercise's `max_score` scale. The same rounding convention applies to all
//! exercise types. An exercise with zero scoreable items scores 100%.
//!
//! Crossword puzzles are practice-only and return no outcome; callers record
//! the answers and move on.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::{AnswerValue, AreaKind, Exercise, ExerciseBody};
use crate::util::normalize_answer;

/// Per-item correctness. `NotScored` covers items with no registered answer
/// key: the student sees a neutral "answer submitted" state for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Correct,
  Incorrect,
  NotScored,
}

/// Result of scoring one submission against the answer key.
#[derive(Clone, Debug, Serialize)]
pub struct Outcome {
  /// Verdict per slot id, aligned with the session's answer keys.
  pub verdicts: BTreeMap<String, Verdict>,
  pub correct: usize,
  /// Scoreable items only; `NotScored` slots are excluded.
  pub total: usize,
  pub percentage: f32,
  /// Rounded onto the `max_score` scale.
  pub score: u32,
}

/// True when the two answers match under the uniform text rule.
pub fn answers_match(user: &str, expected: &str) -> bool {
  normalize_answer(user) == normalize_answer(expected)
}

/// Score a full submission. Returns `None` for practice-only exercise types.
#[instrument(level = "debug", skip_all, fields(exercise = %ex.id, kind = ex.body.kind()))]
pub fn score_exercise(ex: &Exercise, answers: &BTreeMap<String, AnswerValue>) -> Option<Outcome> {
  if !ex.body.auto_scored() {
    return None;
  }

  let mut verdicts = BTreeMap::new();
  match &ex.body {
    ExerciseBody::MultipleChoice { exercise_content: _, correct_answers } => {
      for (i, key) in correct_answers.iter().enumerate() {
        let slot = i.to_string();
        let picked = match answers.get(&slot) {
          Some(AnswerValue::Choice { option }) => Some(*option),
          _ => None,
        };
        verdicts.insert(slot, verdict_from(picked == Some(*key)));
      }
    }
    ExerciseBody::FillInTheBlanks { exercise_content: _, correct_answers } => {
      for (i, keys) in correct_answers.iter().enumerate() {
        for (j, expected) in keys.iter().enumerate() {
          let slot = format!("{i}-{j}");
          verdicts.insert(slot.clone(), verdict_from(text_matches(answers, &slot, expected)));
        }
      }
    }
    ExerciseBody::TextWithInput { exercise_content: _, correct_answers }
    | ExerciseBody::ImagesWithInput { exercise_content: _, correct_answers } => {
      for (i, key) in correct_answers.iter().enumerate() {
        let slot = i.to_string();
        let verdict = match key {
          Some(expected) => verdict_from(text_matches(answers, &slot, expected)),
          None => Verdict::NotScored,
        };
        verdicts.insert(slot, verdict);
      }
    }
    ExerciseBody::TextWithQuestions { exercise_content: _, correct_answers } => {
      for (i, expected) in correct_answers.iter().enumerate() {
        let slot = i.to_string();
        verdicts.insert(slot.clone(), verdict_from(text_matches(answers, &slot, expected)));
      }
    }
    ExerciseBody::DragAndDrop { exercise_content, items: _, correct_answers } => {
      for area in exercise_content {
        let key = match correct_answers.get(&area.id) {
          Some(k) => k,
          // Unreachable after loader validation; degrade to incorrect.
          None => {
            verdicts.insert(area.id.clone(), Verdict::Incorrect);
            continue;
          }
        };
        let empty = BTreeSet::new();
        let dropped = match answers.get(&area.id) {
          Some(AnswerValue::Placement { items }) => items,
          _ => &empty,
        };
        let ok = match area.kind {
          AreaKind::Single => dropped.len() == 1 && dropped.iter().all(|id| key.contains(id)),
          AreaKind::Multi => dropped == key,
        };
        verdicts.insert(area.id.clone(), verdict_from(ok));
      }
    }
    ExerciseBody::CrosswordPuzzle { .. } => unreachable!("filtered by auto_scored"),
  }

  let total = verdicts.values().filter(|v| **v != Verdict::NotScored).count();
  let correct = verdicts.values().filter(|v| **v == Verdict::Correct).count();
  // Zero scoreable items counts as a full score, matching the
  // fill-in-the-blanks convention.
  let percentage = if total == 0 {
    100.0
  } else {
    correct as f32 / total as f32 * 100.0
  };
  let score = (percentage / 100.0 * ex.max_score as f32).round() as u32;

  debug!(target: "exercise", correct, total, score, "Submission scored");
  Some(Outcome { verdicts, correct, total, percentage, score })
}

fn verdict_from(ok: bool) -> Verdict {
  if ok { Verdict::Correct } else { Verdict::Incorrect }
}

fn text_matches(answers: &BTreeMap<String, AnswerValue>, slot: &str, expected: &str) -> bool {
  match answers.get(slot) {
    Some(AnswerValue::Text { value }) => answers_match(value, expected),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{
    Blank, BlankPassage, ChoiceQuestion, DragItem, DropArea, InputPrompt,
  };

  fn base(body: ExerciseBody, max_score: u32) -> Exercise {
    Exercise {
      id: "x".into(),
      title: String::new(),
      description: String::new(),
      instruction: String::new(),
      unit: "default".into(),
      order: 0,
      is_instant_scored: true,
      max_score,
      variants: vec![],
      body,
    }
  }

  fn blanks_exercise(keys: Vec<Vec<String>>, max_score: u32) -> Exercise {
    let passages = keys
      .iter()
      .map(|k| BlankPassage {
        text: "[blank] ".repeat(k.len()),
        blanks: k.iter().map(|_| Blank { hint: String::new() }).collect(),
      })
      .collect();
    base(ExerciseBody::FillInTheBlanks { exercise_content: passages, correct_answers: keys }, max_score)
  }

  fn text(value: &str) -> AnswerValue {
    AnswerValue::Text { value: value.into() }
  }

  fn placement(items: &[&str]) -> AnswerValue {
    AnswerValue::Placement { items: items.iter().map(|s| s.to_string()).collect() }
  }

  #[test]
  fn matching_is_trimmed_and_case_insensitive() {
    assert!(answers_match("  Dog ", "dog"));
    assert!(answers_match("dog", "DOG"));
    assert!(!answers_match("dogs", "dog"));
  }

  #[test]
  fn blanks_score_is_fraction_of_max() {
    // Three blanks, two correct: round(2/3 * 30) = 20.
    let ex = blanks_exercise(vec![vec!["red".into(), "green".into(), "blue".into()]], 30);
    let mut answers = BTreeMap::new();
    answers.insert("0-0".into(), text("red"));
    answers.insert("0-1".into(), text("GREEN "));
    answers.insert("0-2".into(), text("purple"));
    let out = score_exercise(&ex, &answers).unwrap();
    assert_eq!(out.correct, 2);
    assert_eq!(out.total, 3);
    assert_eq!(out.score, 20);
  }

  #[test]
  fn worked_example_from_the_builder_docs() {
    // "The [blank] jumps.", key [["dog"]], max_score 10, answer " Dog " -> 10.
    let ex = blanks_exercise(vec![vec!["dog".into()]], 10);
    let mut answers = BTreeMap::new();
    answers.insert("0-0".into(), text(" Dog "));
    let out = score_exercise(&ex, &answers).unwrap();
    assert_eq!(out.correct, 1);
    assert_eq!(out.total, 1);
    assert_eq!(out.score, 10);
  }

  #[test]
  fn zero_scoreable_items_is_a_full_score() {
    let ex = base(
      ExerciseBody::TextWithInput {
        exercise_content: vec![InputPrompt { context: String::new(), prompt: "Say anything".into() }],
        correct_answers: vec![None],
      },
      10,
    );
    let mut answers = BTreeMap::new();
    answers.insert("0".into(), text("whatever"));
    let out = score_exercise(&ex, &answers).unwrap();
    assert_eq!(out.total, 0);
    assert_eq!(out.percentage, 100.0);
    assert_eq!(out.score, 10);
    assert_eq!(out.verdicts["0"], Verdict::NotScored);
  }

  #[test]
  fn keyless_items_are_neutral_but_keyed_items_count() {
    let ex = base(
      ExerciseBody::TextWithInput {
        exercise_content: vec![
          InputPrompt { context: String::new(), prompt: "a".into() },
          InputPrompt { context: String::new(), prompt: "b".into() },
        ],
        correct_answers: vec![None, Some("two".into())],
      },
      100,
    );
    let mut answers = BTreeMap::new();
    answers.insert("0".into(), text("anything"));
    answers.insert("1".into(), text("two"));
    let out = score_exercise(&ex, &answers).unwrap();
    assert_eq!(out.verdicts["0"], Verdict::NotScored);
    assert_eq!(out.verdicts["1"], Verdict::Correct);
    assert_eq!(out.total, 1);
    assert_eq!(out.score, 100);
  }

  #[test]
  fn multiple_choice_uses_option_index() {
    let ex = base(
      ExerciseBody::MultipleChoice {
        exercise_content: vec![
          ChoiceQuestion { question: "1".into(), options: vec!["a".into(), "b".into()] },
          ChoiceQuestion { question: "2".into(), options: vec!["a".into(), "b".into()] },
        ],
        correct_answers: vec![1, 0],
      },
      10,
    );
    let mut answers = BTreeMap::new();
    answers.insert("0".into(), AnswerValue::Choice { option: 1 });
    answers.insert("1".into(), AnswerValue::Choice { option: 1 });
    let out = score_exercise(&ex, &answers).unwrap();
    assert_eq!(out.correct, 1);
    assert_eq!(out.score, 5);
  }

  fn drag_exercise(kind: AreaKind, key: &[&str]) -> Exercise {
    base(
      ExerciseBody::DragAndDrop {
        exercise_content: vec![DropArea { id: "area".into(), label: "Area".into(), kind }],
        items: ["a", "b", "c"]
          .iter()
          .map(|id| DragItem { id: id.to_string(), label: id.to_uppercase() })
          .collect(),
        correct_answers: [("area".to_string(), key.iter().map(|s| s.to_string()).collect())]
          .into_iter()
          .collect(),
      },
      100,
    )
  }

  #[test]
  fn single_area_needs_exactly_one_member_of_the_key() {
    let ex = drag_exercise(AreaKind::Single, &["a", "b"]);

    let mut answers = BTreeMap::new();
    answers.insert("area".into(), placement(&["b"]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Correct);

    // Two items, both valid individually: still incorrect.
    answers.insert("area".into(), placement(&["a", "b"]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Incorrect);

    // Empty area: incorrect.
    answers.insert("area".into(), placement(&[]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Incorrect);
  }

  #[test]
  fn multi_area_requires_exact_set_equality() {
    let ex = drag_exercise(AreaKind::Multi, &["a", "b"]);

    let mut answers = BTreeMap::new();
    answers.insert("area".into(), placement(&["b", "a"]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Correct);

    // Superset fails.
    answers.insert("area".into(), placement(&["a", "b", "c"]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Incorrect);

    // Subset fails.
    answers.insert("area".into(), placement(&["a"]));
    assert_eq!(score_exercise(&ex, &answers).unwrap().verdicts["area"], Verdict::Incorrect);
  }

  #[test]
  fn crossword_is_never_auto_scored() {
    let ex = base(
      ExerciseBody::CrosswordPuzzle {
        exercise_content: vec![crate::domain::CrosswordClue {
          clue: "Best friend".into(),
          row: 0,
          col: 0,
          direction: crate::domain::ClueDirection::Across,
          length: 3,
        }],
        correct_answers: vec!["dog".into()],
      },
      10,
    );
    let mut answers = BTreeMap::new();
    answers.insert("0".into(), text("dog"));
    assert!(score_exercise(&ex, &answers).is_none());
  }
}
