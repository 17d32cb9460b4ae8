use serde::{Deserialize, Serialize};
use serde_json::json;

pub const REPLY: &str = "reply";

/// A side effect requested by a handler, carried out by whoever receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub method: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Task {
    #[must_use]
    pub fn new(method: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    #[must_use]
    pub fn reply(message: impl Into<String>) -> Self {
        Self::new(REPLY, json!({ "message": message.into() }))
    }

    /// The text of a `reply` task, if this is one.
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> {
        if self.method != REPLY {
            return None;
        }
        self.args.get("message").and_then(serde_json::Value::as_str)
    }
}

/// Tasks in the order handlers requested them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

impl TaskQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push(&mut self, task: Task) {
        tracing::debug!("Enqueued task: {}", task.method);
        self.tasks.push(task);
    }

    pub fn append(&mut self, other: &mut Self) {
        self.tasks.append(&mut other.tasks);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Task> {
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_task_shape() {
        let task = Task::reply("hello");
        assert_eq!(task.method, "reply");
        assert_eq!(task.args, json!({ "message": "hello" }));
        assert_eq!(task.reply_text(), Some("hello"));
    }

    #[test]
    fn non_reply_has_no_text() {
        let task = Task::new("typing", json!({ "message": "ignored" }));
        assert_eq!(task.reply_text(), None);
    }

    #[test]
    fn queue_keeps_request_order() {
        let mut queue = TaskQueue::new();
        queue.push(Task::reply("one"));
        queue.push(Task::reply("two"));

        let mut later = TaskQueue::new();
        later.push(Task::reply("three"));
        queue.append(&mut later);

        assert!(later.is_empty());
        let texts: Vec<_> = queue.as_slice().iter().filter_map(Task::reply_text).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }
}
