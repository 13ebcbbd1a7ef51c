//! WebSocket upgrade + tutor chat loop.
//!
//! One chat stream can be in flight per connection. Chunks flow through an
//! internal channel so the loop keeps reading the socket while streaming; a
//! `chat_cancel` message (or a replacement `chat_message`) trips the
//! cancellation token and the stream stops at the next chunk boundary.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::chat::{tutor_stub, CancelToken, ChatError};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "tara_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
  info!(target: "tara_backend", "WebSocket connected");
  // Split so the loop can read the socket while a stream writes to it.
  let (mut sink, mut stream) = socket.split();
  let (tx, mut rx) = mpsc::channel::<ServerWsMessage>(32);
  let mut current: Option<CancelToken> = None;

  loop {
    tokio::select! {
      incoming = stream.next() => {
        match incoming {
          Some(Ok(Message::Text(txt))) => {
            match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(ClientWsMessage::Ping) => {
                if send_json(&mut sink, &ServerWsMessage::Pong).await.is_err() {
                  break;
                }
              }
              Ok(ClientWsMessage::ChatMessage { text }) => {
                debug!(target: "tara_backend", text_len = text.len(), "WS chat message");
                // A new message replaces any stream still running.
                if let Some(token) = current.take() {
                  token.cancel();
                }
                let token = CancelToken::new();
                current = Some(token.clone());
                tokio::spawn(run_chat(state.clone(), text, token, tx.clone()));
              }
              Ok(ClientWsMessage::ChatCancel) => {
                if let Some(token) = &current {
                  info!(target: "tara_backend", "WS chat cancelled by client");
                  token.cancel();
                }
              }
              Err(e) => {
                let msg = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
                if send_json(&mut sink, &msg).await.is_err() {
                  break;
                }
              }
            }
          }
          Some(Ok(Message::Ping(payload))) => {
            let _ = sink.send(Message::Pong(payload)).await;
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => {}
          Some(Err(e)) => {
            error!(target: "tara_backend", error = %e, "WS receive error");
            break;
          }
        }
      }
      chunk = rx.recv() => {
        // Senders live as long as `tx`, so this is always Some.
        if let Some(msg) = chunk {
          if send_json(&mut sink, &msg).await.is_err() {
            break;
          }
        }
      }
    }
  }

  // Connection gone: stop any in-flight stream.
  if let Some(token) = current {
    token.cancel();
  }
  info!(target: "tara_backend", "WebSocket disconnected");
}

async fn send_json(
  sink: &mut SplitSink<WebSocket, Message>,
  msg: &ServerWsMessage,
) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  sink.send(Message::Text(out)).await
}

/// Run one tutor stream to completion, cancellation, or error.
#[instrument(level = "info", skip_all, fields(text_len = text.len()))]
async fn run_chat(
  state: Arc<AppState>,
  text: String,
  token: CancelToken,
  tx: mpsc::Sender<ServerWsMessage>,
) {
  let outcome = match &state.openai {
    Some(oa) => {
      let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
      let fwd_tx = tx.clone();
      let forwarder = tokio::spawn(async move {
        while let Some(text) = chunk_rx.recv().await {
          if fwd_tx.send(ServerWsMessage::ChatChunk { text }).await.is_err() {
            break;
          }
        }
      });
      let result = oa.tutor_reply_stream(&state.prompts, &text, &token, &chunk_tx).await;
      drop(chunk_tx);
      let _ = forwarder.await;
      result
    }
    None => stream_stub(&text, &token, &tx).await,
  };

  let done = match outcome {
    Ok(()) => ServerWsMessage::ChatDone,
    Err(ChatError::Cancelled) => ServerWsMessage::ChatCancelled,
    Err(e) => {
      error!(target: "tara_backend", error = %e, "Tutor stream failed");
      ServerWsMessage::Error { message: format!("Tutor stream failed: {}", e) }
    }
  };
  let _ = tx.send(done).await;
}

/// Word-by-word rendition of the canned tutor reply, so the streaming path
/// behaves the same with OpenAI disabled.
async fn stream_stub(
  text: &str,
  token: &CancelToken,
  tx: &mpsc::Sender<ServerWsMessage>,
) -> Result<(), ChatError> {
  let reply = tutor_stub(text);
  for word in reply.split_inclusive(' ') {
    if token.is_cancelled() {
      return Err(ChatError::Cancelled);
    }
    if tx.send(ServerWsMessage::ChatChunk { text: word.to_string() }).await.is_err() {
      return Err(ChatError::Cancelled);
    }
  }
  Ok(())
}
