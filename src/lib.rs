//! TARA · English-learning exercise backend.
//!
//! Owns the exercise model shared by the student and teacher portals:
//! validated exercise definitions, submission sessions with scoring, the
//! deferred teacher-review queue, image uploads, and the tutor chat.

pub mod chat;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod protocol;
pub mod routes;
pub mod scoring;
pub mod seeds;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod util;
