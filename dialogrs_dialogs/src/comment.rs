//! Comment lookup prompt: asks for a comment number and fetches it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dialogrs_core::{
    Activation, DialogRegistry, Handler, Match, Matcher, Transition, always, first, on_activate,
    re_with,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const NAME: &str = "comment";

const PROMPT: &str = "Which comment would you like to see? Type its number.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub body: String,
}

#[async_trait]
pub trait CommentSource: Send + Sync {
    /// `Ok(None)` when no comment has that id.
    async fn comment(&self, id: u64) -> anyhow::Result<Option<Comment>>;
}

/// Fetches comments from a JSON API serving `GET {base_url}/comments/{id}`.
pub struct HttpComments {
    client: reqwest::Client,
    base_url: String,
}

impl HttpComments {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CommentSource for HttpComments {
    async fn comment(&self, id: u64) -> anyhow::Result<Option<Comment>> {
        let url = format!("{}/comments/{id}", self.base_url);
        debug!("Fetching {url}");

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let comment = response.error_for_status()?.json::<Comment>().await?;
        Ok(Some(comment))
    }
}

/// Optional activation arguments; a bare `replace` passes none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentArgs {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPrompt {
    /// Numbers tried that matched no comment.
    pub misses: u32,
}

struct Lookup {
    source: Arc<dyn CommentSource>,
}

#[async_trait]
impl Handler<CommentPrompt> for Lookup {
    async fn handle(&self, m: &mut Match<CommentPrompt>) -> anyhow::Result<Transition> {
        let Some(id) = m.group(1).and_then(|digits| digits.parse::<u64>().ok()) else {
            m.reply("That is not a comment number.");
            return Ok(Transition::Continue);
        };

        match self.source.comment(id).await? {
            Some(comment) => {
                info!("Found comment {id}");
                m.reply(format!("Comment {} by {}:\n{}", comment.id, comment.email, comment.body));
                m.end_this_dialog(&comment)
            }
            None => {
                m.dialog_data.misses += 1;
                m.reply(format!("There is no comment {id}. Try another number."));
                Ok(Transition::Continue)
            }
        }
    }
}

pub fn register(
    registry: &mut DialogRegistry,
    source: Arc<dyn CommentSource>,
) -> dialogrs_core::Result<()> {
    registry.add(
        NAME,
        on_activate(|m: &mut Match<()>, args: Option<CommentArgs>| {
            let prompt = args
                .and_then(|a| a.prompt)
                .unwrap_or_else(|| PROMPT.to_string());
            m.reply(prompt);
            Ok(Activation::Start(CommentPrompt::default()))
        }),
        first(vec![
            re_with(r"^\s*(\d+)\s*$", Lookup { source })?.boxed(),
            always(|m: &mut Match<CommentPrompt>| {
                m.reply(PROMPT);
                Ok(Transition::Continue)
            })
            .boxed(),
        ]),
    )
}
