//! Engine-level behaviour of activate / tryMatch: persistence, transitions
//! and failure handling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dialogrs_core::{
    Activation, Activator, Conversation, DialogError, DialogInstance, DialogRegistry,
    DispatchConfig, Dispatcher, Handler, InstanceStore, Match, Matcher, MemoryStore, RemoteMatch,
    Task, TaskExecutor, Transition, TransitionKind, TurnOutcome, first, on_activate, re, re_with,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Echo {
    count: u32,
}

struct Slow;

#[async_trait]
impl Handler<Echo> for Slow {
    async fn handle(&self, m: &mut Match<Echo>) -> anyhow::Result<Transition> {
        m.dialog_data.count = 999;
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Transition::Continue)
    }
}

/// Sleeps before activating, then either replaces itself or starts.
struct Drowsy {
    nap: Duration,
    again: bool,
}

#[async_trait]
impl Activator<(), Echo> for Drowsy {
    async fn activate(&self, m: &mut Match<()>, _args: ()) -> anyhow::Result<Activation<Echo>> {
        tokio::time::sleep(self.nap).await;
        if self.again {
            return Ok(Activation::Transition(m.replace_this_dialog("drowsy", ())?));
        }
        Ok(Activation::Start(Echo::default()))
    }
}

#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
fn registry() -> DialogRegistry {
    let mut registry = DialogRegistry::new();
    registry
        .add(
            "echo",
            on_activate(|m: &mut Match<()>, (): ()| {
                m.reply("echo ready");
                Ok(Activation::Start(Echo::default()))
            }),
            first(vec![
                re("^end$", |m: &mut Match<Echo>| {
                    m.reply("bye");
                    m.end_this_dialog(json!({ "count": m.dialog_data.count }))
                })
                .expect("valid pattern")
                .boxed(),
                re("^swap$", |m: &mut Match<Echo>| {
                    m.reply("swapping");
                    m.replace_this_dialog("other", ())
                })
                .expect("valid pattern")
                .boxed(),
                re("^hop$", |m: &mut Match<Echo>| m.replace_this_dialog("quick", ()))
                    .expect("valid pattern")
                    .boxed(),
                re_with("^slow$", Slow).expect("valid pattern").boxed(),
                re("^fail$", |m: &mut Match<Echo>| {
                    m.dialog_data.count += 100;
                    m.reply("never delivered");
                    anyhow::bail!("lookup failed")
                })
                .expect("valid pattern")
                .boxed(),
                re(r"^\w+$", |m: &mut Match<Echo>| {
                    m.dialog_data.count += 1;
                    let text = m.text.clone();
                    m.reply(text);
                    Ok(Transition::Continue)
                })
                .expect("valid pattern")
                .boxed(),
            ]),
        )
        .expect("register echo");
    registry
        .add(
            "other",
            on_activate(|m: &mut Match<()>, (): ()| {
                m.reply("other ready");
                Ok(Activation::Start(()))
            }),
            first::<()>(Vec::new()),
        )
        .expect("register other");
    registry
        .add(
            "quick",
            on_activate(|m: &mut Match<()>, (): ()| {
                m.reply("done already");
                Ok(Activation::<()>::Transition(m.end_this_dialog("quick")?))
            }),
            first::<()>(Vec::new()),
        )
        .expect("register quick");
    registry
        .add(
            "loop",
            on_activate(|m: &mut Match<()>, (): ()| {
                Ok(Activation::<()>::Transition(m.replace_this_dialog("loop", ())?))
            }),
            first::<()>(Vec::new()),
        )
        .expect("register loop");
    registry
        .add(
            "limbo",
            on_activate(|_m: &mut Match<()>, (): ()| {
                Ok(Activation::<()>::Transition(Transition::Continue))
            }),
            first::<()>(Vec::new()),
        )
        .expect("register limbo");
    registry
        .add(
            "stall",
            Drowsy {
                nap: Duration::from_secs(5),
                again: false,
            },
            first::<Echo>(Vec::new()),
        )
        .expect("register stall");
    registry
        .add(
            "drowsy",
            Drowsy {
                nap: Duration::from_millis(30),
                again: true,
            },
            first::<Echo>(Vec::new()),
        )
        .expect("register drowsy");
    registry
}

fn engine() -> (Dispatcher, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Dispatcher::new(Arc::new(registry()), store.clone()).with_config(
        DispatchConfig {
            handler_timeout: Duration::from_millis(50),
            turn_timeout: Duration::from_secs(5),
            max_replace_chain: 3,
        },
    );
    (dispatcher, store)
}

fn replies(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().filter_map(Task::reply_text).collect()
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn activate_then_match_persists_state() {
    let (engine, store) = engine();
    let started = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation");
    assert_eq!(replies(&started.tasks), ["echo ready"]);
    assert_eq!(started.transition, TransitionKind::Continue);
    let instance = started.instance.expect("instance created");

    for (text, count) in [("a", 1), ("b", 2)] {
        let response = engine
            .try_match("echo", &instance.instance, RemoteMatch::from_text(text))
            .await
            .expect("turn");
        assert!(response.matched);
        assert_eq!(response.instance.as_ref(), Some(&instance));
        assert_eq!(replies(&response.tasks), [text]);
        assert_eq!(
            store.get_dialog_data(&instance).await.expect("stored"),
            Some(json!({ "count": count }))
        );
    }
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn unmatched_turn_changes_nothing() {
    let (engine, store) = engine();
    let instance = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let response = engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("two words"))
        .await
        .expect("turn");
    assert!(!response.matched);
    assert!(response.tasks.is_empty());
    assert_eq!(response.instance, Some(instance.clone()));
    assert_eq!(
        store.get_dialog_data(&instance).await.expect("stored"),
        Some(json!({ "count": 0 }))
    );
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn end_deletes_instance_and_returns_result() {
    let (engine, store) = engine();
    let instance = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");
    engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("x"))
        .await
        .expect("turn");

    let response = engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("end"))
        .await
        .expect("turn");
    assert_eq!(response.transition, TransitionKind::End);
    assert_eq!(response.instance, None);
    assert_eq!(response.result, Some(json!({ "count": 1 })));
    assert_eq!(replies(&response.tasks), ["bye"]);

    let err = store
        .get_dialog_data(&instance)
        .await
        .expect_err("ended instance is gone");
    assert!(err.is_not_found());
    assert!(store.is_empty().await);

    let err = engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("x"))
        .await
        .expect_err("ended instance cannot take turns");
    assert!(matches!(err, DialogError::InstanceNotFound(_)));
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn replace_swaps_instances_and_keeps_old_tasks() {
    let (engine, store) = engine();
    let old = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let response = engine
        .try_match("echo", &old.instance, RemoteMatch::from_text("swap"))
        .await
        .expect("turn");

    assert_eq!(response.transition, TransitionKind::Replace);
    let new = response.instance.expect("replacement instance");
    assert_eq!(new.name, "other");
    assert_eq!(replies(&response.tasks), ["swapping", "other ready"]);

    assert!(
        store
            .get_dialog_data(&old)
            .await
            .expect_err("old instance is gone")
            .is_not_found()
    );
    assert_eq!(store.get_dialog_data(&new).await.expect("new stored"), Some(Value::Null));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn replace_into_dialog_that_ends_immediately() {
    let (engine, store) = engine();
    let old = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let response = engine
        .try_match("echo", &old.instance, RemoteMatch::from_text("hop"))
        .await
        .expect("turn");
    assert_eq!(response.transition, TransitionKind::End);
    assert_eq!(response.instance, None);
    assert_eq!(response.result, Some(json!("quick")));
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn activation_may_end_without_instance() {
    let (engine, store) = engine();
    let response = engine
        .activate("quick", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation");
    assert_eq!(response.instance, None);
    assert_eq!(response.transition, TransitionKind::End);
    assert_eq!(replies(&response.tasks), ["done already"]);
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn endless_replace_chain_is_rejected() {
    let (engine, store) = engine();
    let err = engine
        .activate("loop", RemoteMatch::default(), Value::Null)
        .await
        .expect_err("chain never settles");
    assert!(matches!(err, DialogError::InvalidTransition(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn failed_handler_commits_nothing() {
    let (engine, store) = engine();
    let instance = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let err = engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("fail"))
        .await
        .expect_err("handler fails");
    assert!(matches!(err, DialogError::HandlerFailure(_)));
    assert_eq!(
        store.get_dialog_data(&instance).await.expect("still stored"),
        Some(json!({ "count": 0 }))
    );
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn slow_handler_times_out_without_commit() {
    let (engine, store) = engine();
    let instance = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let err = engine
        .try_match("echo", &instance.instance, RemoteMatch::from_text("slow"))
        .await
        .expect_err("handler is too slow");
    assert!(matches!(err, DialogError::HandlerTimeout(_)));
    assert_eq!(
        store.get_dialog_data(&instance).await.expect("still stored"),
        Some(json!({ "count": 0 }))
    );
}

#[tokio::test]
async fn unknown_names_are_not_found() {
    let (engine, _store) = engine();
    let err = engine
        .activate("missing", RemoteMatch::default(), Value::Null)
        .await;
    assert!(matches!(err, Err(DialogError::DialogNotFound(_))));

    let err = engine
        .try_match("echo", "41", RemoteMatch::from_text("x"))
        .await;
    assert!(matches!(err, Err(DialogError::InstanceNotFound(i)) if i == DialogInstance::new("echo", "41")));
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn two_instances_stay_isolated_under_concurrency() {
    let (engine, store) = engine();
    let engine = Arc::new(engine);
    let a = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");
    let b = engine
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("activation")
        .instance
        .expect("instance");

    let mut handles = Vec::new();
    for (instance, turns) in [(a.clone(), 7), (b.clone(), 12)] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            for _ in 0..turns {
                engine
                    .try_match("echo", &instance.instance, RemoteMatch::from_text("tick"))
                    .await
                    .expect("turn");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    assert_eq!(store.get_dialog_data(&a).await.expect("a"), Some(json!({ "count": 7 })));
    assert_eq!(store.get_dialog_data(&b).await.expect("b"), Some(json!({ "count": 12 })));
}

#[derive(Default)]
struct Recorder {
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl TaskExecutor for Recorder {
    async fn execute(&self, task: &Task) -> anyhow::Result<()> {
        if let Some(text) = task.reply_text() {
            self.replies
                .lock()
                .map_err(|_| anyhow::anyhow!("recorder poisoned"))?
                .push(text.to_string());
        }
        Ok(())
    }
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn local_conversation_tracks_root_reference() {
    let (engine, _store) = engine();
    let recorder = Arc::new(Recorder::default());
    let mut conversation = Conversation::new(engine, recorder.clone());

    assert_eq!(
        conversation
            .handle(RemoteMatch::from_text("hello"))
            .await
            .expect("turn"),
        TurnOutcome::NoDialog
    );

    let outcome = conversation
        .begin("echo", Value::Null, RemoteMatch::default())
        .await
        .expect("begin");
    let TurnOutcome::Continued(first) = outcome else {
        panic!("expected a running dialog, got {outcome:?}");
    };
    assert_eq!(conversation.stack().root(), Some(&first));

    let err = conversation
        .begin("echo", Value::Null, RemoteMatch::default())
        .await
        .expect_err("already active");
    assert!(matches!(err, DialogError::InvalidTransition(_)));

    let outcome = conversation
        .handle(RemoteMatch::from_text("swap"))
        .await
        .expect("turn");
    let TurnOutcome::Replaced(second) = outcome else {
        panic!("expected a replacement, got {outcome:?}");
    };
    assert_eq!(second.name, "other");
    assert_eq!(conversation.stack().root(), Some(&second));

    let outcome = conversation
        .handle(RemoteMatch::from_text("anything"))
        .await
        .expect("turn");
    assert_eq!(outcome, TurnOutcome::Unmatched(second));

    let recorded = recorder.replies.lock().map(|r| r.clone()).unwrap_or_default();
    assert_eq!(recorded, ["echo ready", "swapping", "other ready"]);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn ended_conversation_behaves_as_no_dialog() {
    let (engine, _store) = engine();
    let mut conversation = Conversation::new(engine, Arc::new(Recorder::default()));
    conversation
        .begin("echo", Value::Null, RemoteMatch::default())
        .await
        .expect("begin");

    let outcome = conversation
        .handle(RemoteMatch::from_text("end"))
        .await
        .expect("turn");
    assert_eq!(outcome, TurnOutcome::Ended(Some(json!({ "count": 0 }))));
    assert!(!conversation.stack().is_active());
    assert_eq!(
        conversation
            .handle(RemoteMatch::from_text("x"))
            .await
            .expect("turn"),
        TurnOutcome::NoDialog
    );
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn activation_that_stays_put_is_rejected() {
    let (engine, store) = engine();
    let err = engine
        .activate("limbo", RemoteMatch::default(), Value::Null)
        .await
        .expect_err("activation must start, replace or end");
    assert!(matches!(err, DialogError::InvalidTransition(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn slow_activation_times_out_without_instance() {
    let (engine, store) = engine();
    let err = engine
        .activate("stall", RemoteMatch::default(), Value::Null)
        .await
        .expect_err("activation is too slow");
    assert!(matches!(err, DialogError::HandlerTimeout(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn whole_turn_is_bounded_across_replace_hops() {
    let store = Arc::new(MemoryStore::new());
    let engine = Dispatcher::new(Arc::new(registry()), store.clone()).with_config(DispatchConfig {
        handler_timeout: Duration::from_millis(50),
        turn_timeout: Duration::from_millis(100),
        max_replace_chain: 8,
    });

    // each hop fits the handler bound; nine of them do not fit the turn
    let started = tokio::time::Instant::now();
    let err = engine
        .activate("drowsy", RemoteMatch::default(), Value::Null)
        .await
        .expect_err("turn runs out of time");
    assert!(matches!(err, DialogError::HandlerTimeout(_)));
    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(store.is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn remote_dialog_is_forwarded_with_its_own_ids() {
    let (remote, remote_store) = engine();
    let remote = Arc::new(remote);
    remote
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("remote activation");

    let mut registry = DialogRegistry::new();
    registry
        .add_remote("echo", remote.clone())
        .expect("remote registration");
    assert!(registry.get("echo").is_err());
    let local_store = Arc::new(MemoryStore::new());
    let local = Dispatcher::new(Arc::new(registry), local_store.clone());

    let started = local
        .activate("echo", RemoteMatch::default(), Value::Null)
        .await
        .expect("forwarded activation");
    let instance = started.instance.expect("remote instance");
    assert_eq!(instance, DialogInstance::new("echo", "1"));
    assert_eq!(started.transition, TransitionKind::Continue);
    assert_eq!(replies(&started.tasks), ["echo ready"]);

    let turn = local
        .try_match("echo", &instance.instance, RemoteMatch::from_text("hello"))
        .await
        .expect("forwarded turn");
    assert_eq!(replies(&turn.tasks), ["hello"]);
    assert_eq!(
        remote_store.get_dialog_data(&instance).await.expect("remote data"),
        Some(json!({ "count": 1 }))
    );
    assert!(local_store.is_empty().await);

    let err = local
        .try_match("echo", "42", RemoteMatch::from_text("hello"))
        .await
        .expect_err("unknown remote instance");
    assert!(err.is_not_found());
}
