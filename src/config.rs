//! Loading platform configuration (tutor prompts + optional exercise preload
//! list) from TOML.
//!
//! See `TaraConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TaraConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Paths to exercise JSON files loaded through the validating loader at
  /// startup. Bad files are logged and skipped.
  #[serde(default)]
  pub exercise_files: Vec<String>,
}

/// Prompts used by the OpenAI client. Defaults are sensible for an English
/// tutor. Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub tutor_system: String,
  pub tutor_user_template: String,
  pub feedback_system: String,
  pub feedback_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      tutor_system: "You are a friendly English tutor for school students. Answer grammar and vocabulary questions in 1-3 short sentences. Never reveal full exercise answers.".into(),
      tutor_user_template: "Student message: {text}".into(),
      feedback_system: "You help a teacher grade a student's free-form English answers. Suggest short, encouraging feedback and point out at most two concrete mistakes. Output plain text only.".into(),
      feedback_user_template: "Exercise instruction: {instruction}\nStudent answers (JSON): {answers_json}".into(),
    }
  }
}

/// Attempt to load `TaraConfig` from TARA_CONFIG_PATH. On any parsing/IO
/// error, returns None and the defaults apply.
pub fn load_config_from_env() -> Option<TaraConfig> {
  let path = std::env::var("TARA_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TaraConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tara_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tara_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tara_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
