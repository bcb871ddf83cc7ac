//! The fixed chat command vocabulary
//!
//! Commands are `!`-prefixed; a leading `?` asks for the reply in a DM.
//! Parsing lives here so the adaptor only routes; the chance commands'
//! replies are plain strings built here too.

use rand::seq::SliceRandom;
use rand::Rng;

/// A recognized command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join the requester's voice channel
    Join,
    /// Leave the guild's voice channel
    Leave,
    /// List the vocabulary
    Help,
    /// Roll a d6
    Dice,
    /// Flip a coin
    Coin,
    /// Consult the 8-ball
    EightBall,
    /// Register a reference voice sample
    SetVoice(Option<String>),
    /// Register a spoken display name
    SetNickname(Option<String>),
    /// Shut the bot down (admins only)
    Quit,
    /// Command-prefixed but not in the vocabulary; ignored silently
    Unknown,
}

/// A parsed command plus how to deliver the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// What was asked
    pub command: Command,
    /// Reply via DM instead of the channel
    pub private: bool,
}

/// Parse message text. `None` means the text is not command-shaped at all
/// and should go to the speech path instead.
pub fn parse(text: &str) -> Option<Invocation> {
    let trimmed = text.trim();
    let (private, rest) = match trimmed.strip_prefix('?') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let body = rest.strip_prefix('!')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let command = match name.as_str() {
        "join" => Command::Join,
        "leave" => Command::Leave,
        "help" | "commands" => Command::Help,
        "dice" => Command::Dice,
        "coin" => Command::Coin,
        "8ball" => Command::EightBall,
        "voice" => Command::SetVoice(arg),
        "nick" => Command::SetNickname(arg),
        "quit" => Command::Quit,
        _ => Command::Unknown,
    };
    Some(Invocation { command, private })
}

/// The `!help` reply
pub fn help_text() -> String {
    "Available commands: !join, !leave, !voice <sample>, !nick <name>, \
     !dice, !coin, !8ball <question>, !help"
        .to_string()
}

/// The `!dice` reply
pub fn roll_dice() -> String {
    let roll = rand::thread_rng().gen_range(1..=6);
    format!("Rolling a dice... you got {roll}")
}

/// The `!coin` reply
pub fn flip_coin() -> String {
    let flip = if rand::random() { "Heads" } else { "Tails" };
    format!("Flipping a coin... you got {flip}")
}

const EIGHT_BALL_ANSWERS: &[&str] = &[
    // yes's
    "Yes",
    "Unequivocally yes",
    "Count on it",
    "All signs point to yes",
    // no's
    "No",
    "Very doubtful",
    "Don't hold your breath",
    "Outlook not so good",
    // neutral
    "Ask again later",
    "The universe is still deciding",
    "Impossible to see, the future is",
    "The path ahead is unclear",
];

/// The `!8ball` reply
pub fn eight_ball() -> String {
    EIGHT_BALL_ANSWERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Ask again later")
        .to_string()
}
