//! Render a [`ContextBag`] as the text block appended to the user's message.
//!
//! Sections follow `ContextSource` order and are skipped when their entry is
//! missing or empty. Lists are capped and long free text is cut at
//! [`MAX_TEXT_CHARS`] so the prompt stays small.

use agriaid_providers::calendar::{CropCalendar, Schedule};
use agriaid_providers::feed::FeedEntry;
use agriaid_providers::market::MarketPrices;
use agriaid_providers::news::{Advisory, NewsArticle};
use agriaid_providers::pests::{PestDatabase, PestObservation};
use agriaid_providers::soil::SoilReading;
use agriaid_providers::weather::{CycloneStatus, DetailedWeather, RegionalWeather};
use agriaid_providers::{ContextBag, ContextPayload};

pub const CONTEXT_HEADER: &str = "[REAL-TIME AGRICULTURAL DATA]";
pub const CONTEXT_FOOTER: &str = "[END OF REAL-TIME DATA]";

pub const MAX_TEXT_CHARS: usize = 200;
const ELLIPSIS: &str = "...";

const MAX_FORECASTS: usize = 3;
const MAX_BULLETINS: usize = 2;
const MAX_PESTS: usize = 2;
const MAX_OBSERVATIONS: usize = 3;
const MAX_ADVISORIES: usize = 3;
const MAX_ARTICLES: usize = 3;

/// Cut `text` to `max` characters, marking the cut with `...`.
///
/// Text that already fits is returned unchanged (no marker).
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}{ELLIPSIS}", &text[..byte]),
        None => text.to_string(),
    }
}

fn clip(text: &str) -> String {
    truncate(text.trim(), MAX_TEXT_CHARS)
}

fn value(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v}{unit}"),
        None => "N/A".to_string(),
    }
}

fn nth(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

pub fn format_context(bag: &ContextBag) -> String {
    let mut out = String::from(CONTEXT_HEADER);
    out.push('\n');

    for (_, payload) in bag.iter() {
        if payload.is_empty() {
            continue;
        }
        out.push('\n');
        match payload {
            ContextPayload::PagasaForecast(entries) => forecast_section(&mut out, entries),
            ContextPayload::RegionalWeather(w) => regional_section(&mut out, w),
            ContextPayload::TyphoonAlert(status) => typhoon_section(&mut out, status),
            ContextPayload::DetailedWeather(w) => detailed_section(&mut out, w),
            ContextPayload::Soil(s) => soil_section(&mut out, s),
            ContextPayload::PestDatabase(db) => pest_section(&mut out, db),
            ContextPayload::PestObservations(obs) => observation_section(&mut out, obs),
            ContextPayload::CropCalendar(cal) => calendar_section(&mut out, cal),
            ContextPayload::MarketPrices(p) => price_section(&mut out, p),
            ContextPayload::Advisories(a) => advisory_section(&mut out, a),
            ContextPayload::News(n) => news_section(&mut out, n),
        }
    }

    out.push('\n');
    out.push_str(CONTEXT_FOOTER);
    out
}

fn forecast_section(out: &mut String, entries: &[FeedEntry]) {
    out.push_str("PAGASA WEATHER FORECAST:\n");
    for entry in entries.iter().take(MAX_FORECASTS) {
        out.push_str(&format!("- {}\n", entry.title));
        if !entry.summary.is_empty() {
            out.push_str(&format!("  {}\n", clip(&entry.summary)));
        }
    }
}

fn regional_section(out: &mut String, w: &RegionalWeather) {
    out.push_str(&format!(
        "REGIONAL WEATHER ({} - {}):\n",
        w.region.code(),
        w.region.display_name()
    ));
    out.push_str(&format!(
        "- Now: {}, wind {}\n",
        value(Some(w.current.temperature), "°C"),
        value(Some(w.current.windspeed), " km/h")
    ));
    let f = &w.forecast;
    for (i, day) in f.time.iter().take(MAX_FORECASTS).enumerate() {
        out.push_str(&format!(
            "- {day}: {} to {}, rain {}\n",
            value(nth(&f.temperature_min, i), "°C"),
            value(nth(&f.temperature_max, i), "°C"),
            value(nth(&f.precipitation_sum, i), " mm")
        ));
    }
}

fn typhoon_section(out: &mut String, status: &CycloneStatus) {
    match status {
        CycloneStatus::Quiet(message) => {
            out.push_str(&format!("TYPHOON STATUS: {message}\n"));
        }
        CycloneStatus::Active(bulletins) => {
            out.push_str("TYPHOON ALERT:\n");
            for b in bulletins.iter().take(MAX_BULLETINS) {
                out.push_str(&format!("  {}\n", clip(&b.content)));
            }
        }
    }
}

fn detailed_section(out: &mut String, w: &DetailedWeather) {
    let c = &w.current;
    out.push_str("DETAILED CONDITIONS:\n");
    out.push_str(&format!("- Temperature: {}\n", value(c.temperature, "°C")));
    out.push_str(&format!("- Humidity: {}\n", value(c.humidity, "%")));
    out.push_str(&format!("- Wind: {}\n", value(c.windspeed, " km/h")));
    out.push_str(&format!(
        "- Precipitation: {}\n",
        value(Some(c.precipitation.unwrap_or(0.0)), " mm")
    ));
}

fn soil_section(out: &mut String, s: &SoilReading) {
    out.push_str("SOIL CONDITIONS:\n");
    out.push_str(&format!("- Temperature: {}\n", value(s.temperature_c, "°C")));
    out.push_str(&format!("- Moisture: {}\n", value(s.moisture, " m³/m³")));
}

fn pest_section(out: &mut String, db: &PestDatabase) {
    out.push_str("COMMON PHILIPPINE PESTS:\n");
    let mut listed = 0;
    for pest in db.profiles().take(MAX_PESTS) {
        out.push_str(&format!("- {}: {}\n", pest.name, pest.symptoms));
        listed += 1;
    }
    if listed == 0 {
        // Name-only sheets (vegetables).
        for sheet in &db.sheets {
            if !sheet.common_pests.is_empty() {
                out.push_str(&format!(
                    "- {} pests: {}\n",
                    sheet.crop,
                    sheet.common_pests.join(", ")
                ));
            }
            if !sheet.diseases.is_empty() {
                out.push_str(&format!(
                    "- {} diseases: {}\n",
                    sheet.crop,
                    sheet.diseases.join(", ")
                ));
            }
        }
    }
}

fn observation_section(out: &mut String, obs: &[PestObservation]) {
    out.push_str("RECENT INSECT SIGHTINGS NEARBY:\n");
    for o in obs.iter().take(MAX_OBSERVATIONS) {
        let when = o.observed_on.as_deref().unwrap_or("date unknown");
        out.push_str(&format!(
            "- {} ({}), {}, {when}\n",
            o.common_name, o.species, o.location
        ));
    }
}

fn calendar_section(out: &mut String, cal: &CropCalendar) {
    out.push_str(&format!(
        "CROP CALENDAR ({}):\n",
        cal.crop.name().to_uppercase()
    ));
    match cal.schedule {
        Schedule::Seasonal {
            wet_season,
            dry_season,
        } => {
            for (label, s) in [("Wet season", wet_season), ("Dry season", dry_season)] {
                out.push_str(&format!(
                    "- {label}: plant {}, harvest {} ({})\n",
                    s.planting, s.harvesting, s.duration
                ));
            }
        }
        Schedule::ByVariety {
            rainy_season,
            dry_season,
            year_round,
        } => {
            out.push_str(&format!("- Rainy season: {}\n", rainy_season.join(", ")));
            out.push_str(&format!("- Dry season: {}\n", dry_season.join(", ")));
            out.push_str(&format!("- Year-round: {}\n", year_round.join(", ")));
        }
        Schedule::Perennial {
            planting,
            harvesting,
        } => {
            out.push_str(&format!("- Planting: {planting}\n"));
            out.push_str(&format!("- Harvesting: {harvesting}\n"));
        }
    }
    if !cal.varieties.is_empty() {
        out.push_str(&format!("- Varieties: {}\n", cal.varieties.join(", ")));
    }
    out.push_str(&format!("- Notes: {}\n", cal.notes));
}

fn price_section(out: &mut String, prices: &MarketPrices) {
    out.push_str(&format!(
        "CURRENT MARKET PRICES (as of {}):\n",
        prices.last_updated
    ));
    for category in prices.categories {
        let items: Vec<_> = category
            .items
            .iter()
            .map(|p| format!("{} {}", p.item.replace('_', " "), p.range))
            .collect();
        out.push_str(&format!("- {}: {}\n", category.name, items.join("; ")));
    }
    out.push_str(&format!("  ({}; {})\n", prices.source, prices.note));
}

fn advisory_section(out: &mut String, advisories: &[Advisory]) {
    out.push_str("DA ADVISORIES:\n");
    for a in advisories.iter().take(MAX_ADVISORIES) {
        out.push_str(&format!("- {}\n  {}\n", clip(&a.title), a.link));
    }
}

fn news_section(out: &mut String, articles: &[NewsArticle]) {
    out.push_str("LATEST AGRICULTURAL NEWS:\n");
    for a in articles.iter().take(MAX_ARTICLES) {
        out.push_str(&format!("- {}\n  {}\n", clip(&a.title), a.url));
    }
}
