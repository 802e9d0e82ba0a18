//! Fixed replies, templates and the persuasion prompt.

use coach_core::session::Strategy;
use coach_core::Exercise;
use regex::Regex;
use std::sync::LazyLock;

pub const SYSTEM_PROMPT: &str = "You are a friendly exercise coach chatting with someone \
who is trying to become more active. Keep replies short (two or three sentences), warm and \
specific. Never shame or pressure the user, and never give medical advice.";

pub const CONFIRMATION_REPLY: &str =
    "That's great to hear! Go for it, and let me know how it went afterwards.";

pub const GIVE_UP_REPLY: &str = "It sounds like now isn't the right time, and that's okay. \
I'll be here whenever you feel ready to get moving.";

pub const APOLOGY_REPLY: &str =
    "Sorry, something went wrong while setting up our chat. Please try again in a moment.";

pub fn opening_message(exercise: &Exercise) -> String {
    format!(
        "Hi! How about doing some {} today? {}",
        exercise.name, exercise.description
    )
}

pub fn switch_message(exercise: &Exercise) -> String {
    format!(
        "No problem, let's try something different. How about {} instead? {}",
        exercise.name, exercise.description
    )
}

/// Instruction appended after the transcript for a persuasion reply.
pub fn persuasion_prompt(
    utterance: &str,
    exercise: &str,
    strategy: Strategy,
    variant: u8,
) -> String {
    format!(
        "The user just said: \"{}\". They have not agreed to do {} yet. \
         Reply as their coach using the {} persuasion strategy: {}. \
         End with a short question inviting them to give {} a try.",
        utterance.trim(),
        exercise,
        strategy.label(),
        strategy.phrasing(variant),
        exercise
    )
}

// ============================================================================
// Output sanitization
// ============================================================================

static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip markdown the chat client does not render.
pub fn sanitize_reply(text: &str) -> String {
    let text = RE_BOLD.replace_all(text, "$1");
    let text = RE_HEADER.replace_all(&text, "");
    let text = RE_MULTI_NEWLINE.replace_all(&text, "\n\n");
    text.trim().to_string()
}
