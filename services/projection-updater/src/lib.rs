//! Projection Updater core (spec §4.5): the consumer loop, dispatch
//! registry, and last-writer-wins upsert logic. Exposed as a library so
//! the integration test suite can drive `dispatch::dispatch_and_apply`
//! against a real Postgres instance without going through the binary's
//! `main`.

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod metrics;
