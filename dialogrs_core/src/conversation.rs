//! The caller's side: owns the root dialog reference, sends turns to an
//! engine (in-process or remote) and runs the tasks that come back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    ConversationState, DialogError, DialogInstance, DialogRequest, DialogResponse, DialogStack,
    Dispatcher, RemoteMatch, Result, Task, TransitionKind,
};

/// Carries a protocol request to an engine and brings back its response.
#[async_trait]
pub trait DialogTransport: Send + Sync {
    async fn send(&self, request: DialogRequest) -> Result<DialogResponse>;
}

/// Local dialogs: the engine lives in this process, no marshaling.
#[async_trait]
impl DialogTransport for Dispatcher {
    async fn send(&self, request: DialogRequest) -> Result<DialogResponse> {
        self.dispatch(request).await
    }
}

#[async_trait]
impl<T: DialogTransport + ?Sized> DialogTransport for Arc<T> {
    async fn send(&self, request: DialogRequest) -> Result<DialogResponse> {
        (**self).send(request).await
    }
}

/// Carries out tasks produced by dialog handlers.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// No dialog was active, nothing was sent.
    NoDialog,
    /// The active dialog had no handler for the message.
    Unmatched(DialogInstance),
    Continued(DialogInstance),
    Replaced(DialogInstance),
    Ended(Option<Value>),
}

pub struct Conversation<T> {
    transport: T,
    stack: DialogStack,
    executor: Arc<dyn TaskExecutor>,
}

impl<T: DialogTransport> Conversation<T> {
    pub fn new(transport: T, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            transport,
            stack: DialogStack::default(),
            executor,
        }
    }

    /// Resume from previously saved conversation state.
    #[must_use]
    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.stack = DialogStack::new(state);
        self
    }

    #[must_use]
    pub const fn stack(&self) -> &DialogStack {
        &self.stack
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Start `name` as the root dialog.
    pub async fn begin(
        &mut self,
        name: &str,
        args: Value,
        context: RemoteMatch,
    ) -> Result<TurnOutcome> {
        if let Some(root) = self.stack.root() {
            return Err(DialogError::InvalidTransition(format!(
                "cannot begin {name} while {root} is active"
            )));
        }

        let response = self
            .transport
            .send(DialogRequest::Activate {
                name: name.to_string(),
                context,
                args,
            })
            .await?;

        let outcome = match &response.instance {
            Some(instance) => {
                self.stack.activate(instance.clone())?;
                if response.transition == TransitionKind::Replace {
                    TurnOutcome::Replaced(instance.clone())
                } else {
                    TurnOutcome::Continued(instance.clone())
                }
            }
            None => TurnOutcome::Ended(response.result.clone()),
        };

        self.run_tasks(response.tasks).await?;
        Ok(outcome)
    }

    /// Route one inbound message to the active dialog.
    pub async fn handle(&mut self, context: RemoteMatch) -> Result<TurnOutcome> {
        let Some(root) = self.stack.root().cloned() else {
            debug!("No active dialog for {:?}", context.text);
            return Ok(TurnOutcome::NoDialog);
        };

        let response = self
            .transport
            .send(DialogRequest::TryMatch {
                name: root.name.clone(),
                instance: root.instance.clone(),
                context,
            })
            .await?;

        self.stack.apply(&root, &response)?;
        let outcome = Self::outcome(root, &response);
        self.run_tasks(response.tasks).await?;
        Ok(outcome)
    }

    fn outcome(root: DialogInstance, response: &DialogResponse) -> TurnOutcome {
        match (response.transition, &response.instance) {
            (TransitionKind::End, _) => TurnOutcome::Ended(response.result.clone()),
            (TransitionKind::Replace, Some(next)) => TurnOutcome::Replaced(next.clone()),
            _ if !response.matched => TurnOutcome::Unmatched(root),
            _ => TurnOutcome::Continued(root),
        }
    }

    async fn run_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        if !tasks.is_empty() {
            info!("Executing {} task(s)", tasks.len());
        }
        for task in &tasks {
            self.executor
                .execute(task)
                .await
                .map_err(DialogError::TaskFailure)?;
        }
        Ok(())
    }
}
