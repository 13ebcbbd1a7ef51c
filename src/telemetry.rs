//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! LOG_LEVEL takes an EnvFilter directive string (e.g. "debug" or
//! "info,exercise=debug"). LOG_FORMAT picks the output shape: "json" for
//! structured logs, "compact" for one-line output, anything else gets the
//! default fmt layer. Targets stay on so the `exercise` / `tara_backend`
//! streams are easy to tell apart; the Tower HTTP TraceLayer adds its own
//! per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,exercise=debug,tara_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
  let filter =
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  // The builder changes type per format, so branch at the end.
  match std::env::var("LOG_FORMAT").as_deref() {
    Ok("json") => builder.json().init(),
    Ok("compact") => builder.compact().init(),
    _ => builder.init(),
  }
}
