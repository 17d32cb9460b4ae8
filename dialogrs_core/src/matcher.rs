//! Composable rule matching.
//!
//! A [`Matcher`] looks at a turn and either declines or offers a
//! [`Candidate`]: a score plus the handler to run. Selection is synchronous
//! and side-effect free apart from whatever the matcher itself records; only
//! the chosen candidate's handler runs, and it may be asynchronous.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::{Match, Result, Transition};

/// Logic run once a matcher has been selected.
#[async_trait]
pub trait Handler<D>: Send + Sync {
    async fn handle(&self, m: &mut Match<D>) -> anyhow::Result<Transition>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<D, F> Handler<D> for FnHandler<F>
where
    D: Send + Sync + 'static,
    F: Fn(&mut Match<D>) -> anyhow::Result<Transition> + Send + Sync,
{
    async fn handle(&self, m: &mut Match<D>) -> anyhow::Result<Transition> {
        (self.0)(m)
    }
}

/// An applicable handler together with how well it applies.
pub struct Candidate<D> {
    score: f64,
    groups: Vec<Option<String>>,
    handler: Arc<dyn Handler<D>>,
}

impl<D: Send + Sync + 'static> Candidate<D> {
    #[must_use]
    pub fn new(score: f64, handler: Arc<dyn Handler<D>>) -> Self {
        Self {
            score,
            groups: Vec::new(),
            handler,
        }
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<Option<String>>) -> Self {
        self.groups = groups;
        self
    }

    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    pub async fn run(self, m: &mut Match<D>) -> anyhow::Result<Transition> {
        m.set_groups(self.groups);
        self.handler.handle(m).await
    }
}

impl<D> std::fmt::Debug for Candidate<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("score", &self.score)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

pub trait Matcher<D>: Send + Sync {
    /// `None` when this matcher does not apply to the turn.
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>>;

    fn boxed(self) -> Box<dyn Matcher<D>>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<D, M> Matcher<D> for Box<M>
where
    M: Matcher<D> + ?Sized,
{
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>> {
        (**self).evaluate(m)
    }
}

/// Applies when the pattern is found in the message text; scores by the
/// length of the matched text.
pub struct RegexMatcher<D> {
    regex: Regex,
    handler: Arc<dyn Handler<D>>,
}

impl<D: Send + Sync + 'static> Matcher<D> for RegexMatcher<D> {
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>> {
        let captures = self.regex.captures(&m.text)?;
        let whole = captures.get(0)?;
        let groups = captures
            .iter()
            .map(|group| group.map(|g| g.as_str().to_string()))
            .collect();

        debug!("Pattern /{}/ matched {:?}", self.regex.as_str(), whole.as_str());
        #[expect(clippy::cast_precision_loss, reason = "Message lengths fit in f64")]
        let score = whole.len() as f64;
        Some(Candidate::new(score, Arc::clone(&self.handler)).with_groups(groups))
    }
}

/// Applies to every turn with the lowest possible score.
pub struct Always<D> {
    handler: Arc<dyn Handler<D>>,
}

impl<D: Send + Sync + 'static> Matcher<D> for Always<D> {
    fn evaluate(&self, _m: &Match<D>) -> Option<Candidate<D>> {
        Some(Candidate::new(0.0, Arc::clone(&self.handler)))
    }
}

/// First applicable matcher in listed order. Later matchers are not evaluated.
pub struct First<D> {
    matchers: Vec<Box<dyn Matcher<D>>>,
}

impl<D: Send + Sync + 'static> Matcher<D> for First<D> {
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>> {
        self.matchers.iter().find_map(|matcher| matcher.evaluate(m))
    }
}

/// Highest-scoring applicable matcher; ties go to the earliest listed.
pub struct Best<D> {
    matchers: Vec<Box<dyn Matcher<D>>>,
}

impl<D: Send + Sync + 'static> Matcher<D> for Best<D> {
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>> {
        let mut best: Option<Candidate<D>> = None;
        for candidate in self.matchers.iter().filter_map(|matcher| matcher.evaluate(m)) {
            if best
                .as_ref()
                .is_none_or(|current| candidate.score > current.score)
            {
                best = Some(candidate);
            }
        }
        best
    }
}

pub fn re<D, F>(pattern: &str, handler: F) -> Result<RegexMatcher<D>>
where
    D: Send + Sync + 'static,
    F: Fn(&mut Match<D>) -> anyhow::Result<Transition> + Send + Sync + 'static,
{
    re_with(pattern, FnHandler(handler))
}

pub fn re_with<D, H>(pattern: &str, handler: H) -> Result<RegexMatcher<D>>
where
    D: Send + Sync + 'static,
    H: Handler<D> + 'static,
{
    Ok(RegexMatcher {
        regex: Regex::new(pattern)?,
        handler: Arc::new(handler),
    })
}

pub fn always<D, F>(handler: F) -> Always<D>
where
    D: Send + Sync + 'static,
    F: Fn(&mut Match<D>) -> anyhow::Result<Transition> + Send + Sync + 'static,
{
    Always {
        handler: Arc::new(FnHandler(handler)),
    }
}

#[must_use]
pub fn first<D>(matchers: Vec<Box<dyn Matcher<D>>>) -> First<D> {
    First { matchers }
}

#[must_use]
pub fn best<D>(matchers: Vec<Box<dyn Matcher<D>>>) -> Best<D> {
    Best { matchers }
}

/// A matcher built from a plain predicate and score function, mostly useful
/// for wrapping non-textual signals (e.g. a classifier result in `state`).
pub struct FnMatcher<D, P> {
    predicate: P,
    handler: Arc<dyn Handler<D>>,
    _data: PhantomData<fn(D)>,
}

impl<D, P> Matcher<D> for FnMatcher<D, P>
where
    D: Send + Sync + 'static,
    P: Fn(&Match<D>) -> Option<f64> + Send + Sync,
{
    fn evaluate(&self, m: &Match<D>) -> Option<Candidate<D>> {
        let score = (self.predicate)(m)?;
        Some(Candidate::new(score, Arc::clone(&self.handler)))
    }
}

pub fn when<D, P, F>(predicate: P, handler: F) -> FnMatcher<D, P>
where
    D: Send + Sync + 'static,
    P: Fn(&Match<D>) -> Option<f64> + Send + Sync,
    F: Fn(&mut Match<D>) -> anyhow::Result<Transition> + Send + Sync + 'static,
{
    FnMatcher {
        predicate,
        handler: Arc::new(FnHandler(handler)),
        _data: PhantomData,
    }
}
