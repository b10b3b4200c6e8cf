//! Which crop is the farmer talking about?
//!
//! A small heuristic: look for a crop's English name or one of its Filipino
//! aliases as a whole word (a trailing plural `s` is tolerated either way).
//! When several crops appear, the first one in `Crop::ALL` order wins (rice,
//! corn, vegetables, banana), not the first one mentioned.

use agriaid_providers::Crop;

pub fn detect_crop(text: &str) -> Option<Crop> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    Crop::ALL.into_iter().find(|crop| {
        std::iter::once(crop.name())
            .chain(crop.aliases().iter().copied())
            .any(|name| words.iter().any(|w| names_word(name, w)))
    })
}

/// `word` is `name`, or differs from it only by a plural `s`.
fn names_word(name: &str, word: &str) -> bool {
    word == name || word.strip_suffix('s') == Some(name) || name.strip_suffix('s') == Some(word)
}

/// Crop hint for one turn: the most recent history entry first, then the
/// message being sent.
pub fn crop_hint(most_recent: Option<&str>, input: &str) -> Option<Crop> {
    most_recent.and_then(detect_crop).or_else(|| detect_crop(input))
}
