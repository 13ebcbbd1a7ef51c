//! Seed data: built-in exercises that make the app useful even without
//! external config.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
  AreaKind, Blank, BlankPassage, ChoiceQuestion, ContextQuestion, DragItem, DropArea, Exercise,
  ExerciseBody, Variant,
};

fn set(items: &[&str]) -> BTreeSet<String> {
  items.iter().map(|s| s.to_string()).collect()
}

/// Minimal set of built-in exercises, one per commonly used type.
pub fn seed_exercises() -> Vec<Exercise> {
  vec![
    Exercise {
      id: "seed-blanks-1".into(),
      title: "Animal actions".into(),
      description: "Warm-up on action verbs.".into(),
      instruction: "Fill each blank with the right animal.".into(),
      unit: "starter".into(),
      order: 1,
      is_instant_scored: true,
      max_score: 10,
      variants: vec![],
      body: ExerciseBody::FillInTheBlanks {
        exercise_content: vec![BlankPassage {
          text: "The [blank] jumps over the fence.".into(),
          blanks: vec![Blank { hint: "a common pet".into() }],
        }],
        correct_answers: vec![vec!["dog".into()]],
      },
    },
    Exercise {
      id: "seed-choice-1".into(),
      title: "Simple present".into(),
      description: String::new(),
      instruction: "Pick the correct form.".into(),
      unit: "starter".into(),
      order: 2,
      is_instant_scored: true,
      max_score: 10,
      variants: vec![Variant {
        name: "negatives".into(),
        description: "Same questions with negative forms.".into(),
      }],
      body: ExerciseBody::MultipleChoice {
        exercise_content: vec![
          ChoiceQuestion {
            question: "She ___ to school every day.".into(),
            options: vec!["go".into(), "goes".into(), "going".into()],
          },
          ChoiceQuestion {
            question: "They ___ football on Sundays.".into(),
            options: vec!["plays".into(), "play".into(), "played".into()],
          },
        ],
        correct_answers: vec![1, 1],
      },
    },
    Exercise {
      id: "seed-drag-1".into(),
      title: "Food groups".into(),
      description: String::new(),
      instruction: "Drag each word into the right basket.".into(),
      unit: "starter".into(),
      order: 3,
      is_instant_scored: true,
      max_score: 10,
      variants: vec![],
      body: ExerciseBody::DragAndDrop {
        exercise_content: vec![
          DropArea { id: "fruit".into(), label: "Fruit".into(), kind: AreaKind::Multi },
          DropArea { id: "one-veg".into(), label: "Pick one vegetable".into(), kind: AreaKind::Single },
        ],
        items: vec![
          DragItem { id: "apple".into(), label: "apple".into() },
          DragItem { id: "banana".into(), label: "banana".into() },
          DragItem { id: "carrot".into(), label: "carrot".into() },
          DragItem { id: "potato".into(), label: "potato".into() },
        ],
        correct_answers: BTreeMap::from([
          ("fruit".to_string(), set(&["apple", "banana"])),
          ("one-veg".to_string(), set(&["carrot", "potato"])),
        ]),
      },
    },
    Exercise {
      id: "seed-writing-1".into(),
      title: "My weekend".into(),
      description: "Short free writing, graded by the teacher.".into(),
      instruction: "Answer each question with a full sentence in the past tense.".into(),
      unit: "starter".into(),
      order: 4,
      is_instant_scored: false,
      max_score: 20,
      variants: vec![],
      body: ExerciseBody::TextWithQuestions {
        exercise_content: vec![
          ContextQuestion {
            context: String::new(),
            question: "Where did you go last weekend?".into(),
          },
          ContextQuestion {
            context: String::new(),
            question: "What did you eat there?".into(),
          },
        ],
        correct_answers: vec![String::new(), String::new()],
      },
    },
  ]
}
