//! Keyword-based motivation classifier.
//!
//! Maps a free-text reply to a motivation scalar: 1.0 (agrees), 0.0
//! (refuses) or 0.5 (undecided). Matching is case-insensitive and works on
//! whole words: a phrase matches a run of consecutive tokens, so "sure" never
//! fires inside "pressure" or "unsure". A positive phrase directly after
//! "not" does not count as agreement.

pub const AGREES: f64 = 1.0;
pub const NEUTRAL: f64 = 0.5;
pub const REFUSES: f64 = 0.0;

const POSITIVE: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "sure",
    "okay",
    "sounds good",
    "let's do it",
    "lets do it",
    "i'll do it",
    "i will do it",
    "i'm in",
    "alright",
    "of course",
    "absolutely",
    "definitely",
    "why not",
];

const NEGATIVE: &[&str] = &[
    "nope",
    "nah",
    "no thanks",
    "no way",
    "not really",
    "not now",
    "not interested",
    "don't",
    "dont",
    "do not",
    "can't",
    "cannot",
    "won't",
    "will not",
    "too tired",
    "too busy",
    "rather not",
    "skip",
];

/// Classify a reply. Positive phrases take precedence when both lists match.
pub fn classify_motivation(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words = tokenize(&lower);

    let positive = POSITIVE.iter().any(|p| {
        phrase_positions(&words, p).any(|start| start == 0 || words[start - 1] != "not")
    });
    let negative = NEGATIVE
        .iter()
        .any(|p| phrase_positions(&words, p).next().is_some());

    if positive {
        AGREES
    } else if negative {
        REFUSES
    } else {
        NEUTRAL
    }
}

/// Lowercased words; apostrophes stay inside a word ("don't", "i'm").
fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Start indices where every word of `phrase` appears consecutively.
fn phrase_positions<'a>(
    words: &'a [&'a str],
    phrase: &'a str,
) -> impl Iterator<Item = usize> + 'a {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    let len = needle.len();
    words
        .windows(len)
        .enumerate()
        .filter(move |(_, window)| *window == needle.as_slice())
        .map(|(start, _)| start)
}

/// Both phrase lists, for callers that need to avoid them (e.g. tests).
pub fn phrase_lists() -> (&'static [&'static str], &'static [&'static str]) {
    (POSITIVE, NEGATIVE)
}
