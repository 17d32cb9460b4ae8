//! Runs dialogs on behalf of a caller: the engine side of `activate` and
//! `tryMatch`.
//!
//! Handlers run against copies of the stored data. The store is only touched
//! once a turn (including any activations triggered by `replace`) has fully
//! succeeded, so a failed turn leaves every instance as it was.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    DialogData, DialogError, DialogInstance, DialogRegistry, DialogRequest, DialogResponse,
    DialogRoute, DialogTransport, InstanceStore, RemoteMatch, Result, TaskQueue, Transition,
    TransitionKind, Turn,
};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on a single activation or message handler run.
    pub handler_timeout: Duration,
    /// Upper bound on a whole turn, every replace hop included.
    pub turn_timeout: Duration,
    /// How many consecutive `replace` hops one turn may take.
    pub max_replace_chain: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(10),
            turn_timeout: Duration::from_secs(30),
            max_replace_chain: 8,
        }
    }
}

/// Where an activation chain came to rest.
enum Settled {
    Active {
        name: String,
        data: Option<DialogData>,
        replaced: bool,
    },
    /// Started on another engine, which already owns the instance.
    Remote {
        instance: DialogInstance,
        replaced: bool,
    },
    Ended(Value),
}

pub struct Dispatcher {
    registry: Arc<DialogRegistry>,
    store: Arc<dyn InstanceStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<DialogRegistry>, store: Arc<dyn InstanceStore>) -> Self {
        Self {
            registry,
            store,
            config: DispatchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &DialogRegistry {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn InstanceStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub async fn dispatch(&self, request: DialogRequest) -> Result<DialogResponse> {
        match request {
            DialogRequest::Activate {
                name,
                context,
                args,
            } => self.activate(&name, context, args).await,
            DialogRequest::TryMatch {
                name,
                instance,
                context,
            } => self.try_match(&name, &instance, context).await,
        }
    }

    /// Start a new instance of `name`.
    pub async fn activate(
        &self,
        name: &str,
        context: RemoteMatch,
        args: Value,
    ) -> Result<DialogResponse> {
        info!("Activating dialog: {name}");
        let deadline = self.deadline();
        let mut tasks = TaskQueue::new();
        let settled = self
            .settle(name, &context, args, &mut tasks, deadline)
            .await?;
        self.commit(settled, tasks).await
    }

    /// Run one turn of an existing instance.
    pub async fn try_match(
        &self,
        name: &str,
        instance: &str,
        context: RemoteMatch,
    ) -> Result<DialogResponse> {
        let deadline = self.deadline();
        let instance = DialogInstance::new(name, instance);
        let dialog = match self.registry.route(name)? {
            DialogRoute::Local(dialog) => dialog,
            DialogRoute::Remote(transport) => {
                debug!("Forwarding turn of {instance} to its engine");
                let request = DialogRequest::TryMatch {
                    name: instance.name,
                    instance: instance.instance,
                    context,
                };
                return self.bounded(deadline, transport.send(request)).await;
            }
        };
        let data = self.store.get_dialog_data(&instance).await?;

        debug!("Trying {instance} against {:?}", context.text);
        let turn = self
            .bounded(deadline, dialog.try_match(context.clone(), data))
            .await?;
        let Turn {
            matched,
            data,
            transition,
            mut tasks,
        } = turn;

        if !matched {
            return Ok(DialogResponse {
                tasks: tasks.into_vec(),
                instance: Some(instance),
                matched: false,
                transition: TransitionKind::Continue,
                result: None,
            });
        }

        match transition {
            Transition::Continue => {
                self.store.set_dialog_data(&instance, data).await?;
                Ok(DialogResponse {
                    tasks: tasks.into_vec(),
                    instance: Some(instance),
                    matched: true,
                    transition: TransitionKind::Continue,
                    result: None,
                })
            }
            Transition::End { result } => {
                self.store.delete_instance(&instance).await?;
                info!("{instance} ended");
                Ok(DialogResponse {
                    tasks: tasks.into_vec(),
                    instance: None,
                    matched: true,
                    transition: TransitionKind::End,
                    result: Some(result),
                })
            }
            Transition::Replace { name: next, args } => {
                info!("{instance} replaced by dialog {next}");
                let settled = self
                    .settle(&next, &context, args, &mut tasks, deadline)
                    .await?;
                let mut response = self.commit(settled, tasks).await?;
                self.store.delete_instance(&instance).await?;
                if response.instance.is_some() {
                    response.transition = TransitionKind::Replace;
                }
                Ok(response)
            }
        }
    }

    /// Activate `name`, following `replace` hops until a dialog starts or
    /// ends. Nothing is written to the local store here.
    async fn settle(
        &self,
        name: &str,
        context: &RemoteMatch,
        args: Value,
        tasks: &mut TaskQueue,
        deadline: Instant,
    ) -> Result<Settled> {
        let mut name = name.to_string();
        let mut args = args;

        for hop in 0..=self.config.max_replace_chain {
            let dialog = match self.registry.route(&name)? {
                DialogRoute::Local(dialog) => dialog,
                DialogRoute::Remote(transport) => {
                    return self
                        .settle_remote(transport.as_ref(), name, context, args, tasks, deadline)
                        .await
                        .map(|settled| match settled {
                            Settled::Remote { instance, replaced } => Settled::Remote {
                                instance,
                                replaced: replaced || hop > 0,
                            },
                            other => other,
                        });
                }
            };
            let mut turn = self
                .bounded(deadline, dialog.activate(context.clone(), args))
                .await?;
            tasks.append(&mut turn.tasks);

            match turn.transition {
                Transition::Continue => {
                    return Ok(Settled::Active {
                        name,
                        data: turn.data,
                        replaced: hop > 0,
                    });
                }
                Transition::End { result } => {
                    info!("Dialog {name} ended during activation");
                    return Ok(Settled::Ended(result));
                }
                Transition::Replace {
                    name: next,
                    args: next_args,
                } => {
                    info!("Dialog {name} replaced itself with {next} during activation");
                    name = next;
                    args = next_args;
                }
            }
        }

        warn!("Replace chain exceeded {} hops", self.config.max_replace_chain);
        Err(DialogError::InvalidTransition(format!(
            "replace chain exceeded {} hops",
            self.config.max_replace_chain
        )))
    }

    /// Hand the activation to the engine that serves `name`. Whatever it
    /// settles on (including its own replace hops) is final for this turn.
    async fn settle_remote(
        &self,
        transport: &dyn DialogTransport,
        name: String,
        context: &RemoteMatch,
        args: Value,
        tasks: &mut TaskQueue,
        deadline: Instant,
    ) -> Result<Settled> {
        info!("Activating remote dialog: {name}");
        let request = DialogRequest::Activate {
            name,
            context: context.clone(),
            args,
        };
        let response = self.bounded(deadline, transport.send(request)).await?;
        for task in response.tasks {
            tasks.push(task);
        }

        Ok(match response.instance {
            Some(instance) => Settled::Remote {
                instance,
                replaced: response.transition == TransitionKind::Replace,
            },
            None => Settled::Ended(response.result.unwrap_or(Value::Null)),
        })
    }

    async fn commit(&self, settled: Settled, tasks: TaskQueue) -> Result<DialogResponse> {
        let (instance, replaced) = match settled {
            Settled::Active {
                name,
                data,
                replaced,
            } => (self.store.new_instance(&name, data).await?, replaced),
            Settled::Remote { instance, replaced } => (instance, replaced),
            Settled::Ended(result) => {
                return Ok(DialogResponse {
                    tasks: tasks.into_vec(),
                    instance: None,
                    matched: true,
                    transition: TransitionKind::End,
                    result: Some(result),
                });
            }
        };

        info!("Dialog instance {instance} is active");
        Ok(DialogResponse {
            tasks: tasks.into_vec(),
            instance: Some(instance),
            matched: true,
            transition: if replaced {
                TransitionKind::Replace
            } else {
                TransitionKind::Continue
            },
            result: None,
        })
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.turn_timeout
    }

    /// Run one handler under the per-handler bound, cut short by whatever is
    /// left of the turn.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        run: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let limit = self.config.handler_timeout.min(remaining);
        tokio::time::timeout(limit, run).await.map_err(|_| {
            warn!("Dialog handler exceeded {}ms", limit.as_millis());
            DialogError::HandlerTimeout(limit)
        })?
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
