//! Minimal OpenAI client for the tutor chat.
//!
//! Two call shapes: a plain request/response completion and a streaming
//! completion that forwards delta chunks through a channel. The streaming
//! path takes an explicit [`CancelToken`] and checks it at every chunk
//! boundary, so a student closing the chat aborts the transfer promptly.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::config::Prompts;
use crate::util::{fill_template, trunc_for_log};

#[derive(Debug, Error)]
pub enum ChatError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("OpenAI HTTP {status}: {message}")]
  Api { status: u16, message: String },
  #[error("bad completion payload: {0}")]
  Payload(#[from] serde_json::Error),
  #[error("stream cancelled by client")]
  Cancelled,
}

/// Cooperative cancellation flag shared between the WS handler and an
/// in-flight stream. Cancelling is sticky.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  fn request(&self, system: &str, user: &str, stream: bool) -> ChatCompletionRequest {
    ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: 0.3,
      stream,
    }
  }

  /// Plain-text chat completion. Used for the HTTP tutor endpoint and the
  /// review feedback helper.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, ChatError> {
    let url = format!("{}/chat/completions", self.base_url);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "tara-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&self.request(system, user, false))
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(ChatError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.as_ref())
      .and_then(|m| m.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    Ok(text)
  }

  /// Tutor reply to a single student message.
  #[instrument(level = "info", skip(self, prompts, text), fields(text_len = text.len()))]
  pub async fn tutor_reply(&self, prompts: &Prompts, text: &str) -> Result<String, ChatError> {
    let user = fill_template(&prompts.tutor_user_template, &[("text", text)]);
    self.chat_plain(&prompts.tutor_system, &user).await
  }

  /// Draft grading feedback for a deferred submission.
  #[instrument(level = "info", skip_all, fields(answers_len = answers_json.len()))]
  pub async fn suggest_feedback(
    &self,
    prompts: &Prompts,
    instruction: &str,
    answers_json: &str,
  ) -> Result<String, ChatError> {
    let user = fill_template(
      &prompts.feedback_user_template,
      &[("instruction", instruction), ("answers_json", answers_json)],
    );
    self.chat_plain(&prompts.feedback_system, &user).await
  }

  /// Streaming tutor reply. Delta chunks are forwarded through `tx` as they
  /// arrive; the token is checked once per chunk and again per SSE line, so
  /// cancellation lands between chunks rather than mid-request teardown.
  #[instrument(level = "info", skip(self, prompts, text, token, tx), fields(model = %self.model, text_len = text.len()))]
  pub async fn tutor_reply_stream(
    &self,
    prompts: &Prompts,
    text: &str,
    token: &CancelToken,
    tx: &mpsc::Sender<String>,
  ) -> Result<(), ChatError> {
    let url = format!("{}/chat/completions", self.base_url);
    let user = fill_template(&prompts.tutor_user_template, &[("text", text)]);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "tara-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&self.request(&prompts.tutor_system, &user, true))
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(ChatError::Api { status, message });
    }

    let mut body = res.bytes_stream();
    let mut lines = SseLines::new();
    while let Some(chunk) = body.next().await {
      if token.is_cancelled() {
        return Err(ChatError::Cancelled);
      }
      lines.push(&chunk?);

      // SSE framing: one "data: ..." payload per line, "[DONE]" terminator.
      while let Some(line) = lines.next_line() {
        let Some(payload) = line.strip_prefix("data: ") else { continue };
        if payload == "[DONE]" {
          return Ok(());
        }
        if token.is_cancelled() {
          return Err(ChatError::Cancelled);
        }
        let delta: StreamChunk = serde_json::from_str(payload)?;
        if let Some(text) = delta
          .choices
          .first()
          .and_then(|c| c.delta.as_ref())
          .and_then(|d| d.content.clone())
        {
          if tx.send(text).await.is_err() {
            // Receiver dropped (socket closed): same as a cancel.
            return Err(ChatError::Cancelled);
          }
        }
      }
    }
    debug!(target: "tara_backend", "Stream ended without [DONE] marker");
    Ok(())
  }
}

/// Incremental SSE line buffer. Raw transfer chunks go in, complete lines
/// come out. Decoding happens per line, never per chunk, so a multi-byte
/// character split across two chunks is reassembled before it reaches the
/// student.
struct SseLines {
  buf: Vec<u8>,
}

impl SseLines {
  fn new() -> Self {
    Self { buf: Vec::new() }
  }

  fn push(&mut self, bytes: &[u8]) {
    self.buf.extend_from_slice(bytes);
  }

  fn next_line(&mut self) -> Option<String> {
    let pos = self.buf.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = self.buf.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
  }
}

/// Local fallback when OpenAI is not configured: a tiny canned tutor that
/// still answers the most common grammar questions.
pub fn tutor_stub(text: &str) -> String {
  let t = text.to_lowercase();
  if t.contains("past tense") || t.contains("past simple") {
    "Use the past simple for finished actions: add -ed to regular verbs (jump -> jumped). Irregular verbs change form (go -> went).".into()
  } else if t.contains("article") || t.contains(" a or an") || t.contains("a vs an") {
    "Use 'an' before vowel sounds (an apple, an hour) and 'a' before consonant sounds (a dog, a university).".into()
  } else if t.contains("plural") {
    "Most nouns add -s (dogs). Nouns ending in -s, -x, -ch, -sh add -es (boxes). Some are irregular (child -> children).".into()
  } else {
    "Try rereading the instruction and the example sentence. Ask me about a specific word or rule for a more concrete tip.".into()
  }
}

/// Stub feedback for deferred reviews when OpenAI is disabled.
pub fn feedback_stub() -> String {
  "Good effort! Check verb tenses and sentence endings, then compare your answer with the instruction's example.".into()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  stream: bool,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  #[serde(default)] message: Option<ChatMessageResp>,
}
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct StreamChunk {
  choices: Vec<StreamChoice>,
}
#[derive(Deserialize)]
struct StreamChoice {
  #[serde(default)] delta: Option<StreamDelta>,
}
#[derive(Deserialize)]
struct StreamDelta {
  #[serde(default)] content: Option<String>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
