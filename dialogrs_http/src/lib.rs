#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! JSON-over-HTTP binding of the dialog protocol.
//!
//! - [`router`]/[`serve`]: the engine side, `POST /dialogs` and `GET /test`
//! - [`HttpTransport`]: the caller side, for driving a remote engine

mod client;
mod server;

pub use client::HttpTransport;
pub use server::{ApiError, router, serve, status_for};
