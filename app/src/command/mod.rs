//! Static strategy pattern for CLI commands.
//!
//! Each command is its own strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;
use std::time::Duration;

use dialogrs_config::Config;
use dialogrs_core::{DialogRegistry, Dispatcher, MemoryStore};
use dialogrs_dialogs::{Collaborators, HttpComments, RandomNumbers};
use dialogrs_http::HttpTransport;
use tracing::info;

mod chat;
mod info;
mod init;
mod serve;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use serve::{ServeInput, ServeStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// The in-process engine with every bundled dialog registered.
fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let comments = HttpComments::new(
        config.comments.base_url.clone(),
        Duration::from_secs(config.dialogs.handler_timeout_secs),
    )?;
    let collaborators = Collaborators {
        numbers: Arc::new(RandomNumbers),
        comments: Arc::new(comments),
    };

    let mut registry = DialogRegistry::new();
    for (name, endpoint) in &config.dialogs.remote {
        let transport = HttpTransport::new(
            endpoint.clone(),
            Duration::from_secs(config.remote.timeout_secs),
        )?;
        registry.add_remote(name, Arc::new(transport))?;
    }
    dialogrs_dialogs::register_bundled(&mut registry, &collaborators)?;
    info!("Registered dialogs: {:?}", registry.names());

    Ok(
        Dispatcher::new(Arc::new(registry), Arc::new(MemoryStore::new()))
            .with_config(config.dialogs.dispatch()),
    )
}
