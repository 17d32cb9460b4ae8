//! Named dialogs: how each one starts and how it reacts to later turns.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    DialogData, DialogError, DialogTransport, Match, Matcher, RemoteMatch, Result, TaskQueue,
    Transition,
};

/// What an activation handler produced.
#[derive(Debug)]
pub enum Activation<D> {
    /// The dialog is now running with this initial state.
    Start(D),
    /// The dialog hands off (replace) or finishes (end) straight away.
    Transition(Transition),
}

#[async_trait]
pub trait Activator<A, D>: Send + Sync {
    async fn activate(&self, m: &mut Match<()>, args: A) -> anyhow::Result<Activation<D>>;
}

pub struct FnActivator<F, A, D> {
    f: F,
    _types: PhantomData<fn(A) -> D>,
}

#[async_trait]
impl<F, A, D> Activator<A, D> for FnActivator<F, A, D>
where
    A: Send + 'static,
    D: Send + 'static,
    F: Fn(&mut Match<()>, A) -> anyhow::Result<Activation<D>> + Send + Sync,
{
    async fn activate(&self, m: &mut Match<()>, args: A) -> anyhow::Result<Activation<D>> {
        (self.f)(m, args)
    }
}

/// Wrap a synchronous activation closure.
pub const fn on_activate<F, A, D>(f: F) -> FnActivator<F, A, D>
where
    F: Fn(&mut Match<()>, A) -> anyhow::Result<Activation<D>> + Send + Sync,
{
    FnActivator {
        f,
        _types: PhantomData,
    }
}

/// Result of running one handler, before anything is persisted.
#[derive(Debug, Default)]
pub struct Turn {
    /// Whether any handler applied. Always true for activation.
    pub matched: bool,
    /// State to persist; `None` when nothing changed or there is no state.
    pub data: Option<DialogData>,
    pub transition: Transition,
    pub tasks: TaskQueue,
}

/// A dialog with its argument and state types erased to JSON.
#[async_trait]
pub trait DialogRuntime: Send + Sync {
    async fn activate(&self, remote: RemoteMatch, args: Value) -> Result<Turn>;

    async fn try_match(&self, remote: RemoteMatch, data: Option<DialogData>) -> Result<Turn>;
}

struct TypedDialog<A, D> {
    name: String,
    activator: Box<dyn Activator<A, D>>,
    matcher: Box<dyn Matcher<D>>,
}

#[async_trait]
impl<A, D> DialogRuntime for TypedDialog<A, D>
where
    A: DeserializeOwned + Send + 'static,
    D: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn activate(&self, remote: RemoteMatch, args: Value) -> Result<Turn> {
        let args: A = serde_json::from_value(args).map_err(|e| {
            DialogError::InvalidRequest(format!("bad arguments for dialog {}: {e}", self.name))
        })?;

        let mut m = Match::new(remote, ());
        let activation = self
            .activator
            .activate(&mut m, args)
            .await
            .map_err(DialogError::HandlerFailure)?;
        let ((), tasks) = m.into_parts();

        match activation {
            Activation::Start(data) => Ok(Turn {
                matched: true,
                data: Some(serde_json::to_value(data)?),
                transition: Transition::Continue,
                tasks,
            }),
            Activation::Transition(Transition::Continue) => Err(DialogError::InvalidTransition(
                format!("activation of {} neither started nor left the dialog", self.name),
            )),
            Activation::Transition(transition) => Ok(Turn {
                matched: true,
                data: None,
                transition,
                tasks,
            }),
        }
    }

    async fn try_match(&self, remote: RemoteMatch, data: Option<DialogData>) -> Result<Turn> {
        let data: D = serde_json::from_value(data.unwrap_or(Value::Null))?;
        let mut m = Match::new(remote, data);

        let Some(candidate) = self.matcher.evaluate(&m) else {
            debug!("No handler of dialog {} applies to {:?}", self.name, m.text);
            return Ok(Turn::default());
        };

        let transition = candidate
            .run(&mut m)
            .await
            .map_err(DialogError::HandlerFailure)?;
        let (data, tasks) = m.into_parts();

        Ok(Turn {
            matched: true,
            data: Some(serde_json::to_value(data)?),
            transition,
            tasks,
        })
    }
}

/// Where a dialog name is served from.
#[derive(Clone)]
pub enum DialogRoute {
    /// Runs in this process; its data lives in the local store.
    Local(Arc<dyn DialogRuntime>),
    /// Runs on another engine; instances and their data live over there.
    Remote(Arc<dyn DialogTransport>),
}

/// Registrations are made at startup and only read afterwards.
#[derive(Default)]
pub struct DialogRegistry {
    dialogs: HashMap<String, DialogRoute>,
}

impl DialogRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog from its activation handler and message matcher.
    pub fn add<A, D, Ac, M>(&mut self, name: &str, activator: Ac, matcher: M) -> Result<()>
    where
        A: DeserializeOwned + Send + 'static,
        D: Serialize + DeserializeOwned + Send + Sync + 'static,
        Ac: Activator<A, D> + 'static,
        M: Matcher<D> + 'static,
    {
        let dialog = TypedDialog {
            name: name.to_string(),
            activator: Box::new(activator),
            matcher: Box::new(matcher),
        };
        self.add_runtime(name, Arc::new(dialog))
    }

    pub fn add_runtime(&mut self, name: &str, dialog: Arc<dyn DialogRuntime>) -> Result<()> {
        self.insert(name, DialogRoute::Local(dialog))?;
        info!("Registering dialog: {name}");
        Ok(())
    }

    /// Register `name` as living on another engine reached through
    /// `transport`. Activations and turns are forwarded as-is.
    pub fn add_remote(&mut self, name: &str, transport: Arc<dyn DialogTransport>) -> Result<()> {
        self.insert(name, DialogRoute::Remote(transport))?;
        info!("Registering remote dialog: {name}");
        Ok(())
    }

    fn insert(&mut self, name: &str, route: DialogRoute) -> Result<()> {
        if self.dialogs.contains_key(name) {
            return Err(DialogError::DuplicateDialog(name.to_string()));
        }
        self.dialogs.insert(name.to_string(), route);
        Ok(())
    }

    pub fn route(&self, name: &str) -> Result<DialogRoute> {
        self.dialogs
            .get(name)
            .cloned()
            .ok_or_else(|| DialogError::DialogNotFound(name.to_string()))
    }

    /// The local runtime of `name`. Remote dialogs have none.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DialogRuntime>> {
        match self.route(name)? {
            DialogRoute::Local(dialog) => Ok(dialog),
            DialogRoute::Remote(_) => Err(DialogError::DialogNotFound(format!(
                "{name} (registered as remote)"
            ))),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    #[must_use]
    pub fn is_remote(&self, name: &str) -> bool {
        matches!(self.dialogs.get(name), Some(DialogRoute::Remote(_)))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.dialogs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DialogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogRegistry")
            .field("dialogs", &self.names())
            .finish()
    }
}
