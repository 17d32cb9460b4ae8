//! The per-turn view handlers work against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Task, TaskQueue};

/// Serializable form of an inbound turn, as it crosses the wire.
///
/// `data` carries the caller's conversation/user state (including any
/// classifier results); the engine threads it through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteMatch {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub activity: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub address: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl RemoteMatch {
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// What a handler asks the stack to do once it returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Transition {
    /// Stay on the current dialog.
    #[default]
    Continue,
    /// Swap the current dialog for a fresh instance of `name`.
    Replace { name: String, args: Value },
    /// Finish the current dialog, handing `result` back to the caller.
    End { result: Value },
}

impl Transition {
    pub fn replace(name: impl Into<String>, args: impl Serialize) -> anyhow::Result<Self> {
        Ok(Self::Replace {
            name: name.into(),
            args: serde_json::to_value(args)?,
        })
    }

    pub fn end(result: impl Serialize) -> anyhow::Result<Self> {
        Ok(Self::End {
            result: serde_json::to_value(result)?,
        })
    }
}

/// Local, capability-carrying context for one turn of one dialog.
///
/// Mutations to `dialog_data` are persisted by the engine only after the
/// handler returns successfully.
#[derive(Debug)]
pub struct Match<D> {
    pub text: String,
    pub activity: Value,
    pub message: Value,
    pub address: Value,
    /// Conversation-scoped state supplied by the caller.
    pub state: Value,
    pub dialog_data: D,
    groups: Vec<Option<String>>,
    tasks: TaskQueue,
}

impl<D> Match<D> {
    #[must_use]
    pub fn new(remote: RemoteMatch, dialog_data: D) -> Self {
        Self {
            text: remote.text,
            activity: remote.activity,
            message: remote.message,
            address: remote.address,
            state: remote.data,
            dialog_data,
            groups: Vec::new(),
            tasks: TaskQueue::new(),
        }
    }

    /// Queue a `reply` task.
    pub fn reply(&mut self, message: impl Into<String>) {
        self.tasks.push(Task::reply(message));
    }

    pub fn enqueue(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Capture group `index` of the matcher that selected this handler;
    /// group 0 is the whole match.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(Option::as_deref)
    }

    #[must_use]
    pub fn groups(&self) -> &[Option<String>] {
        &self.groups
    }

    pub(crate) fn set_groups(&mut self, groups: Vec<Option<String>>) {
        self.groups = groups;
    }

    #[must_use]
    pub const fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn replace_this_dialog(
        &self,
        name: impl Into<String>,
        args: impl Serialize,
    ) -> anyhow::Result<Transition> {
        Transition::replace(name, args)
    }

    pub fn end_this_dialog(&self, result: impl Serialize) -> anyhow::Result<Transition> {
        Transition::end(result)
    }

    #[must_use]
    pub fn into_parts(self) -> (D, TaskQueue) {
        (self.dialog_data, self.tasks)
    }
}
