//! Message-to-speech text preparation

use once_cell::sync::Lazy;
use regex::Regex;

// Discord renders mentions, emoji and channel refs as <...> markup; none of
// it should be read aloud.
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup pattern"));

/// Remove platform mention/tag markup from a message.
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").into_owned()
}

/// Compose the line handed to the synthesizer.
///
/// Links are never read aloud: if the composed line contains a link
/// indicator the whole message is replaced with a fixed phrase.
pub fn spoken_line(speaker: &str, text: &str) -> String {
    let cleaned = strip_markup(text);
    let line = format!("{} says {}", speaker, cleaned.trim());
    if line.to_lowercase().contains("http") {
        format!("{} sent a link", speaker)
    } else {
        line
    }
}
