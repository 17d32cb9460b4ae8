//! Number guessing game.

use std::sync::Arc;

use dialogrs_core::{
    Activation, DialogRegistry, Match, Matcher, Transition, first, on_activate, re,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::comment;

pub const NAME: &str = "game";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameArgs {
    pub upper_limit: u32,
    pub max_guesses: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub num: u32,
    pub guesses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Lose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResponse {
    pub result: GameOutcome,
}

/// Source of the secret number, in `[0, upper)`.
pub trait NumberSource: Send + Sync {
    fn pick(&self, upper: u32) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNumbers;

impl NumberSource for RandomNumbers {
    fn pick(&self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Always picks the same number (clamped below `upper`).
#[derive(Debug, Clone, Copy)]
pub struct FixedNumber(pub u32);

impl NumberSource for FixedNumber {
    fn pick(&self, upper: u32) -> u32 {
        self.0.min(upper.saturating_sub(1))
    }
}

fn guess(m: &mut Match<GameState>) -> anyhow::Result<Transition> {
    // anything too long to parse is certainly too high
    let guess = m
        .group(0)
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    let num = u64::from(m.dialog_data.num);

    if guess == num {
        m.reply("You're right!");
        return m.end_this_dialog(GameResponse {
            result: GameOutcome::Win,
        });
    }

    if guess < num {
        m.reply("That is too low.");
    } else {
        m.reply("That is too high.");
    }

    m.dialog_data.guesses = m.dialog_data.guesses.saturating_sub(1);
    if m.dialog_data.guesses == 0 {
        m.reply("You are out of guesses");
        return m.end_this_dialog(GameResponse {
            result: GameOutcome::Lose,
        });
    }

    let left = m.dialog_data.guesses;
    m.reply(format!("You have {left} left."));
    Ok(Transition::Continue)
}

pub fn register(
    registry: &mut DialogRegistry,
    numbers: Arc<dyn NumberSource>,
) -> dialogrs_core::Result<()> {
    registry.add(
        NAME,
        on_activate(move |m: &mut Match<()>, args: GameArgs| {
            info!("Starting game: {args:?}");
            m.reply(format!(
                "Guess a number between 0 and {}. You have {} guesses.",
                args.upper_limit, args.max_guesses
            ));
            Ok(Activation::Start(GameState {
                num: numbers.pick(args.upper_limit),
                guesses: args.max_guesses,
            }))
        }),
        first(vec![
            re("replace", |m: &mut Match<GameState>| {
                m.reply("replacing");
                m.replace_this_dialog(comment::NAME, ())
            })?
            .boxed(),
            re("help", |m: &mut Match<GameState>| {
                m.reply("game help");
                Ok(Transition::Continue)
            })?
            .boxed(),
            re("cheat", |m: &mut Match<GameState>| {
                let answer = format!("The answer is {}", m.dialog_data.num);
                m.reply(answer);
                Ok(Transition::Continue)
            })?
            .boxed(),
            re(r"\d+", guess)?.boxed(),
        ]),
    )
}
