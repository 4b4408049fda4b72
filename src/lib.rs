//! In-memory, multi-client file cache server (see `SPEC_FULL.md`).
//!
//! The `cache` module is the engine; `dispatcher` and `worker` run it behind
//! a Unix-socket request/reply protocol (`protocol`); `client` is the
//! matching library for talking to a running server.

pub mod cache;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod sync;
pub mod worker;
