//! Planting calendars for the major Philippine crops (static).

use serde::Serialize;

use crate::crop::Crop;
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonWindow {
    pub planting: &'static str,
    pub harvesting: &'static str,
    pub duration: &'static str,
}

/// How a crop is scheduled through the year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Two cropping seasons (rice, corn).
    Seasonal {
        wet_season: SeasonWindow,
        dry_season: SeasonWindow,
    },
    /// Vegetables: which ones to grow when.
    ByVariety {
        rainy_season: &'static [&'static str],
        dry_season: &'static [&'static str],
        year_round: &'static [&'static str],
    },
    /// Perennials planted once (banana).
    Perennial {
        planting: &'static str,
        harvesting: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropCalendar {
    pub crop: Crop,
    pub schedule: Schedule,
    pub varieties: &'static [&'static str],
    pub notes: &'static str,
}

const RICE: CropCalendar = CropCalendar {
    crop: Crop::Rice,
    schedule: Schedule::Seasonal {
        wet_season: SeasonWindow {
            planting: "June-July",
            harvesting: "October-November",
            duration: "120-140 days",
        },
        dry_season: SeasonWindow {
            planting: "December-January",
            harvesting: "April-May",
            duration: "110-120 days",
        },
    },
    varieties: &["PSB Rc82", "NSIC Rc222", "NSIC Rc160"],
    notes: "Ensure adequate irrigation for dry season",
};

const CORN: CropCalendar = CropCalendar {
    crop: Crop::Corn,
    schedule: Schedule::Seasonal {
        wet_season: SeasonWindow {
            planting: "May-June",
            harvesting: "August-September",
            duration: "90-110 days",
        },
        dry_season: SeasonWindow {
            planting: "November-December",
            harvesting: "February-March",
            duration: "85-95 days",
        },
    },
    varieties: &["IPB Var 6", "Pioneer 30G97", "Dekalb 9130"],
    notes: "Yellow corn for feeds, white corn for food",
};

const VEGETABLES: CropCalendar = CropCalendar {
    crop: Crop::Vegetables,
    schedule: Schedule::ByVariety {
        rainy_season: &["kangkong", "sitaw", "talong", "ampalaya"],
        dry_season: &["tomato", "repolyo", "lettuce", "carrots"],
        year_round: &["sili", "okra", "kalabasa"],
    },
    varieties: &[],
    notes: "Timing varies by specific vegetable and region",
};

const BANANA: CropCalendar = CropCalendar {
    crop: Crop::Banana,
    schedule: Schedule::Perennial {
        planting: "Year-round, best during start of rainy season",
        harvesting: "9-12 months after planting",
    },
    varieties: &["Lakatan", "Latundan", "Saba", "Cavendish"],
    notes: "Requires consistent moisture and drainage",
};

pub fn crop_calendar(crop: Crop) -> CropCalendar {
    match crop {
        Crop::Rice => RICE,
        Crop::Corn => CORN,
        Crop::Vegetables => VEGETABLES,
        Crop::Banana => BANANA,
    }
}

/// Serves the calendar of the turn's crop hint; inapplicable without one.
pub struct CropCalendarProvider;

impl ContextProvider for CropCalendarProvider {
    fn source(&self) -> ContextSource {
        ContextSource::CropCalendar
    }

    fn is_applicable(&self, request: &FetchRequest) -> bool {
        request.crop.is_some()
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        Ok(request
            .crop
            .map(|crop| ContextPayload::CropCalendar(crop_calendar(crop))))
    }
}
