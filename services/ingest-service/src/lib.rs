//! HTTP ingest boundary (spec §4.2, §6): validates and writes a single
//! outbox row per request. Exposed as a library so integration tests
//! can drive the handlers against a real database without going
//! through the binary's `main`.

pub mod config;
pub mod handlers;

pub use handlers::AppState;
