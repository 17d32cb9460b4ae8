use dialogrs_config::Config;

use super::build_dispatcher;

/// Prints the effective configuration and the dialogs this build ships.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== dialogrs Configuration ===\n");
        println!("Config file: {}", Config::config_path()?.display());
        println!();

        println!("Server:");
        println!("  Address: http://{}/dialogs", config.server.address());
        println!("  CORS: {}", if config.server.cors { "any origin" } else { "off" });
        println!();

        println!("Dispatch:");
        println!("  Handler Timeout: {}s", config.dialogs.handler_timeout_secs);
        println!("  Turn Timeout: {}s", config.dialogs.turn_timeout_secs);
        println!("  Max Replace Chain: {}", config.dialogs.max_replace_chain);
        println!();

        println!("Remote:");
        println!("  Endpoint: {}", config.remote.endpoint);
        println!("  Timeout: {}s", config.remote.timeout_secs);
        println!();

        println!("Dialogs:");
        let dispatcher = build_dispatcher(&config)?;
        let registry = dispatcher.registry();
        for name in registry.names() {
            match config.dialogs.remote.get(&name) {
                Some(endpoint) if registry.is_remote(&name) => {
                    println!("  - {name} (remote: {endpoint})");
                }
                _ => println!("  - {name}"),
            }
        }
        println!(
            "  game: upper limit {}, {} guesses",
            config.game.upper_limit, config.game.max_guesses
        );
        println!("  comment: {}", config.comments.base_url);

        Ok(())
    }
}
