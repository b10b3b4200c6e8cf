use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Crops with a planting calendar. Declaration order is the lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crop {
    Rice,
    Corn,
    Vegetables,
    Banana,
}

impl Crop {
    pub const ALL: [Crop; 4] = [Crop::Rice, Crop::Corn, Crop::Vegetables, Crop::Banana];

    pub fn name(self) -> &'static str {
        match self {
            Crop::Rice => "rice",
            Crop::Corn => "corn",
            Crop::Vegetables => "vegetables",
            Crop::Banana => "banana",
        }
    }

    /// Lowercase Filipino names farmers commonly use instead of the English one.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Crop::Rice => &["palay", "bigas"],
            Crop::Corn => &["mais"],
            Crop::Vegetables => &["gulay"],
            Crop::Banana => &["saging"],
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no calendar data for '{0}' (available: rice, corn, vegetables, banana)")]
pub struct UnknownCrop(pub String);

impl FromStr for Crop {
    type Err = UnknownCrop;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Crop::ALL
            .into_iter()
            .find(|c| c.name() == wanted || c.aliases().contains(&wanted.as_str()))
            .ok_or(UnknownCrop(wanted))
    }
}
