//! Terminal front end of a conversation.
//!
//! The root dialog runs either in-process or on a remote engine; every
//! line typed is one turn, and reply tasks are printed as they arrive.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dialogrs_config::Config;
use dialogrs_core::{
    Conversation, DialogTransport, RemoteMatch, Task, TaskExecutor, TurnOutcome,
};
use dialogrs_http::HttpTransport;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::build_dispatcher;

#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Root dialog to start
    pub dialog: String,
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// `Some(None)` selects the configured remote endpoint
    pub remote: Option<Option<String>>,
}

/// Prints `reply` tasks to stdout.
struct StdoutExecutor;

#[async_trait]
impl TaskExecutor for StdoutExecutor {
    async fn execute(&self, task: &Task) -> anyhow::Result<()> {
        match task.reply_text() {
            Some(text) => println!("{text}"),
            None => warn!("Ignoring task with unknown method {:?}", task.method),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let transport = transport(&config, input.remote)?;
        let mut conversation = Conversation::new(transport, Arc::new(StdoutExecutor));
        info!(
            "Starting conversation {} with {}",
            conversation.stack().state().id,
            input.dialog
        );

        let args = activation_args(&config, &input.dialog);
        if let Some(msg) = input.message {
            let outcome = single_message(&mut conversation, &input.dialog, &args, msg).await?;
            report(&outcome);
            return Ok(());
        }

        run_interactive(&mut conversation, &input.dialog, &args).await
    }
}

fn transport(
    config: &Config,
    remote: Option<Option<String>>,
) -> anyhow::Result<Arc<dyn DialogTransport>> {
    match remote {
        Some(endpoint) => {
            let endpoint = endpoint.unwrap_or_else(|| config.remote.endpoint.clone());
            info!("Using remote dialog engine at {endpoint}");
            Ok(Arc::new(HttpTransport::new(
                endpoint,
                Duration::from_secs(config.remote.timeout_secs),
            )?))
        }
        None => Ok(Arc::new(build_dispatcher(config)?)),
    }
}

fn activation_args(config: &Config, dialog: &str) -> Value {
    if dialog == dialogrs_dialogs::game::NAME {
        json!({
            "upperLimit": config.game.upper_limit,
            "maxGuesses": config.game.max_guesses,
        })
    } else {
        Value::Null
    }
}

/// One line of input. Without an active dialog the line starts the root
/// dialog instead of being matched.
async fn turn(
    conversation: &mut Conversation<Arc<dyn DialogTransport>>,
    dialog: &str,
    args: &Value,
    text: String,
) -> anyhow::Result<TurnOutcome> {
    if conversation.stack().is_active() {
        return Ok(conversation.handle(RemoteMatch::from_text(text)).await?);
    }
    Ok(conversation
        .begin(dialog, args.clone(), RemoteMatch::from_text(text))
        .await?)
}

/// Start the dialog, then match `text` against it as its first turn.
async fn single_message(
    conversation: &mut Conversation<Arc<dyn DialogTransport>>,
    dialog: &str,
    args: &Value,
    text: String,
) -> anyhow::Result<TurnOutcome> {
    let started = conversation
        .begin(dialog, args.clone(), RemoteMatch::default())
        .await?;
    if !conversation.stack().is_active() {
        return Ok(started);
    }
    Ok(conversation.handle(RemoteMatch::from_text(text)).await?)
}

fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Unmatched(_) => println!("(no handler matched)"),
        TurnOutcome::Ended(Some(result)) => println!("(dialog ended: {result})"),
        TurnOutcome::Ended(None) => println!("(dialog ended)"),
        TurnOutcome::Replaced(next) => info!("Now talking to {next}"),
        TurnOutcome::NoDialog | TurnOutcome::Continued(_) => {}
    }
}

async fn run_interactive(
    conversation: &mut Conversation<Arc<dyn DialogTransport>>,
    dialog: &str,
    args: &Value,
) -> anyhow::Result<()> {
    println!("=== Conversation with {dialog} ===");
    println!("Type 'exit', 'quit', or Ctrl+C to end the session.\n");

    let outcome = conversation
        .begin(dialog, args.clone(), RemoteMatch::default())
        .await?;
    report(&outcome);

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if matches!(input, "exit" | "quit" | "q") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match turn(conversation, dialog, args, input.to_string()).await {
            Ok(outcome) => report(&outcome),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}
