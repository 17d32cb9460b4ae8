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

//! The dialogs this application ships with.

use std::sync::Arc;

use dialogrs_core::DialogRegistry;

pub mod comment;
pub mod game;

pub use comment::{Comment, CommentSource, HttpComments};
pub use game::{FixedNumber, GameArgs, GameOutcome, GameResponse, NumberSource, RandomNumbers};

/// External services the dialogs depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub numbers: Arc<dyn NumberSource>,
    pub comments: Arc<dyn CommentSource>,
}

/// Register every bundled dialog whose name is still free, so a name already
/// routed to another engine keeps that route.
pub fn register_bundled(
    registry: &mut DialogRegistry,
    collaborators: &Collaborators,
) -> dialogrs_core::Result<()> {
    if !registry.contains(game::NAME) {
        game::register(registry, Arc::clone(&collaborators.numbers))?;
    }
    if !registry.contains(comment::NAME) {
        comment::register(registry, Arc::clone(&collaborators.comments))?;
    }
    Ok(())
}

/// Registry holding every bundled dialog.
pub fn registry(collaborators: &Collaborators) -> dialogrs_core::Result<DialogRegistry> {
    let mut registry = DialogRegistry::new();
    register_bundled(&mut registry, collaborators)?;
    Ok(registry)
}
