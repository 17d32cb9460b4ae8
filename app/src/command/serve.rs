use std::sync::Arc;

use dialogrs_config::Config;
use tracing::info;

use super::build_dispatcher;

#[derive(Debug, Clone)]
pub struct ServeInput {
    pub port: Option<u16>,
}

/// Runs the HTTP engine until the process is stopped.
#[derive(Debug, Clone, Copy)]
pub struct ServeStrategy;

impl super::CommandStrategy for ServeStrategy {
    type Input = ServeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(port) = input.port {
            config.server.port = port;
        }
        info!(
            "Handler timeout {}s, replace chain limit {}",
            config.dialogs.handler_timeout_secs, config.dialogs.max_replace_chain
        );

        let dispatcher = Arc::new(build_dispatcher(&config)?);
        dialogrs_http::serve(dispatcher, &config.server).await
    }
}
