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

//! Dialog runtime: tracks which dialog is active for a conversation,
//! persists each dialog instance's private state, and routes turns through
//! composable matchers. Handlers never perform side effects themselves; they
//! queue [`Task`]s that the caller executes, which lets the engine run in a
//! different process from the conversation.

mod context;
mod conversation;
mod dispatch;
mod error;
mod instance;
pub mod matcher;
pub mod protocol;
mod registry;
mod stack;
mod store;
pub mod task;

pub use context::{Match, RemoteMatch, Transition};
pub use conversation::{Conversation, DialogTransport, TaskExecutor, TurnOutcome};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{DialogError, Result};
pub use instance::{DialogData, DialogInstance};
pub use matcher::{
    Always, Best, Candidate, First, FnMatcher, Handler, Matcher, RegexMatcher, always, best, first,
    re, re_with, when,
};
pub use protocol::{DialogRequest, DialogResponse, ErrorBody, TransitionKind};
pub use registry::{
    Activation, Activator, DialogRegistry, DialogRoute, DialogRuntime, FnActivator, Turn,
    on_activate,
};
pub use stack::{ConversationState, DialogStack};
pub use store::{InstanceStore, MemoryStore};
pub use task::{Task, TaskQueue};
