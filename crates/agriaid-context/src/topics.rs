//! Keyword-based topic detection.
//!
//! Matching is plain substring containment on the lowercased input, so
//! "rain" also fires on "training". That imprecision is accepted: a spurious
//! topic only costs an extra provider call.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicTag {
    Weather,
    Soil,
    Pest,
    Crop,
    News,
    Price,
    /// Nothing else matched.
    General,
}

const WEATHER: &[&str] = &[
    "weather", "temperature", "temp", "rain", "ulan", "forecast", "climate", "bagyo", "typhoon",
    "init", "lamig",
];
const SOIL: &[&str] = &["soil", "lupa", "moisture", "ph", "fertility", "nutrients", "pataba"];
const PEST: &[&str] = &[
    "pest", "insect", "kulisap", "bug", "disease", "sakit", "damage", "infestation", "peste",
];
const CROP: &[&str] = &[
    "crop", "plant", "tanim", "grow", "harvest", "ani", "yield", "palay", "mais", "gulay",
];
const NEWS: &[&str] = &["news", "balita", "article", "latest", "update", "information", "advisory"];
const PRICE: &[&str] = &["price", "presyo", "market", "sell", "cost", "value", "halaga"];

impl TopicTag {
    pub const ALL: [TopicTag; 7] = [
        TopicTag::Weather,
        TopicTag::Soil,
        TopicTag::Pest,
        TopicTag::Crop,
        TopicTag::News,
        TopicTag::Price,
        TopicTag::General,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TopicTag::Weather => "weather",
            TopicTag::Soil => "soil",
            TopicTag::Pest => "pest",
            TopicTag::Crop => "crop",
            TopicTag::News => "news",
            TopicTag::Price => "price",
            TopicTag::General => "general",
        }
    }

    /// English and Filipino trigger words, all lowercase. Empty for `General`.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            TopicTag::Weather => WEATHER,
            TopicTag::Soil => SOIL,
            TopicTag::Pest => PEST,
            TopicTag::Crop => CROP,
            TopicTag::News => NEWS,
            TopicTag::Price => PRICE,
            TopicTag::General => &[],
        }
    }
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic '{0}' (expected weather, soil, pest, crop, news, price or general)")]
pub struct UnknownTopic(pub String);

impl FromStr for TopicTag {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TopicTag::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownTopic(wanted.to_string()))
    }
}

/// Ordered, duplicate-free set of detected topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicSet(BTreeSet<TopicTag>);

impl TopicSet {
    pub fn contains(&self, tag: TopicTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = TopicTag> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TopicTag> for TopicSet {
    fn from_iter<I: IntoIterator<Item = TopicTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for TopicSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(TopicTag::name).collect();
        f.write_str(&names.join(", "))
    }
}

/// Detect which topics a message is about. Never empty.
pub fn classify(text: &str) -> TopicSet {
    let lowered = text.to_lowercase();
    let found: TopicSet = TopicTag::ALL
        .into_iter()
        .filter(|tag| tag.keywords().iter().any(|kw| lowered.contains(kw)))
        .collect();

    if found.is_empty() {
        [TopicTag::General].into_iter().collect()
    } else {
        found
    }
}
