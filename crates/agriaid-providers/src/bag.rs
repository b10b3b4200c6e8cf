//! The per-turn context bag: which sources answered, and what they said.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::calendar::CropCalendar;
use crate::feed::FeedEntry;
use crate::market::MarketPrices;
use crate::news::{Advisory, NewsArticle};
use crate::pests::{PestDatabase, PestObservation};
use crate::soil::SoilReading;
use crate::weather::{CycloneStatus, DetailedWeather, RegionalWeather};

/// Bag key. Declaration order is the order sections are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    PagasaForecast,
    RegionalWeather,
    TyphoonAlert,
    DetailedWeather,
    Soil,
    PestDatabase,
    PestObservations,
    CropCalendar,
    MarketPrices,
    Advisories,
    News,
}

impl ContextSource {
    pub const ALL: [ContextSource; 11] = [
        ContextSource::PagasaForecast,
        ContextSource::RegionalWeather,
        ContextSource::TyphoonAlert,
        ContextSource::DetailedWeather,
        ContextSource::Soil,
        ContextSource::PestDatabase,
        ContextSource::PestObservations,
        ContextSource::CropCalendar,
        ContextSource::MarketPrices,
        ContextSource::Advisories,
        ContextSource::News,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ContextSource::PagasaForecast => "pagasa-forecast",
            ContextSource::RegionalWeather => "regional-weather",
            ContextSource::TyphoonAlert => "typhoon-alert",
            ContextSource::DetailedWeather => "detailed-weather",
            ContextSource::Soil => "soil",
            ContextSource::PestDatabase => "pest-database",
            ContextSource::PestObservations => "pest-observations",
            ContextSource::CropCalendar => "crop-calendar",
            ContextSource::MarketPrices => "market-prices",
            ContextSource::Advisories => "advisories",
            ContextSource::News => "news",
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown context source '{0}'")]
pub struct UnknownSource(pub String);

impl FromStr for ContextSource {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ContextSource::ALL
            .into_iter()
            .find(|src| src.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSource(wanted.to_string()))
    }
}

/// Typed payload, one variant per [`ContextSource`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "data", rename_all = "kebab-case")]
pub enum ContextPayload {
    PagasaForecast(Vec<FeedEntry>),
    RegionalWeather(RegionalWeather),
    TyphoonAlert(CycloneStatus),
    DetailedWeather(DetailedWeather),
    Soil(SoilReading),
    PestDatabase(PestDatabase),
    PestObservations(Vec<PestObservation>),
    CropCalendar(CropCalendar),
    MarketPrices(MarketPrices),
    Advisories(Vec<Advisory>),
    News(Vec<NewsArticle>),
}

impl ContextPayload {
    pub fn source(&self) -> ContextSource {
        match self {
            ContextPayload::PagasaForecast(_) => ContextSource::PagasaForecast,
            ContextPayload::RegionalWeather(_) => ContextSource::RegionalWeather,
            ContextPayload::TyphoonAlert(_) => ContextSource::TyphoonAlert,
            ContextPayload::DetailedWeather(_) => ContextSource::DetailedWeather,
            ContextPayload::Soil(_) => ContextSource::Soil,
            ContextPayload::PestDatabase(_) => ContextSource::PestDatabase,
            ContextPayload::PestObservations(_) => ContextSource::PestObservations,
            ContextPayload::CropCalendar(_) => ContextSource::CropCalendar,
            ContextPayload::MarketPrices(_) => ContextSource::MarketPrices,
            ContextPayload::Advisories(_) => ContextSource::Advisories,
            ContextPayload::News(_) => ContextSource::News,
        }
    }

    /// True when there is nothing worth rendering.
    pub fn is_empty(&self) -> bool {
        match self {
            ContextPayload::PagasaForecast(v) => v.is_empty(),
            ContextPayload::TyphoonAlert(CycloneStatus::Active(v)) => v.is_empty(),
            ContextPayload::TyphoonAlert(CycloneStatus::Quiet(msg)) => msg.trim().is_empty(),
            ContextPayload::PestDatabase(db) => db.is_empty(),
            ContextPayload::PestObservations(v) => v.is_empty(),
            ContextPayload::MarketPrices(p) => p.is_empty(),
            ContextPayload::Advisories(v) => v.is_empty(),
            ContextPayload::News(v) => v.is_empty(),
            ContextPayload::RegionalWeather(_)
            | ContextPayload::DetailedWeather(_)
            | ContextPayload::Soil(_)
            | ContextPayload::CropCalendar(_) => false,
        }
    }
}

/// Ordered map from source to payload. Built fresh for every turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextBag {
    entries: BTreeMap<ContextSource, ContextPayload>,
}

impl ContextBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload under its own source, replacing any earlier one.
    pub fn insert(&mut self, payload: ContextPayload) {
        self.entries.insert(payload.source(), payload);
    }

    pub fn get(&self, source: ContextSource) -> Option<&ContextPayload> {
        self.entries.get(&source)
    }

    pub fn contains(&self, source: ContextSource) -> bool {
        self.entries.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = ContextSource> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextSource, &ContextPayload)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}
