//! Outbox Processor core (spec §4.4): the dispatcher/notification-
//! listener/worker-pool topology and the S0-S3 state machine that
//! drains the outbox store into the event store and event log.
//! Exposed as a library so the integration test suite can drive
//! `processor::process_entry` against a real Postgres instance without
//! going through the binary's `main`.

pub mod config;
pub mod metrics;
pub mod processor;
