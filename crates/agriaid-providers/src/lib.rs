//! Provider clients for AgriAid context enrichment.
//!
//! Each upstream data source (PAGASA, Open-Meteo, Agromonitoring, iNaturalist,
//! NewsAPI, the Department of Agriculture site, plus a few static knowledge
//! tables) is wrapped behind one capability trait, [`ContextProvider`], so the
//! aggregation layer can route topics to providers without knowing any of
//! them concretely.
//!
//! Providers are **best effort**:
//! - every call is a single blocking fetch (no retries, no caching),
//! - `Ok(None)` means "nothing to report",
//! - `Err(_)` means the source was unavailable or returned something we could
//!   not understand.
//!
//! Neither outcome is fatal; callers decide whether to log and move on.

pub mod bag;
pub mod calendar;
pub mod crop;
pub mod feed;
pub mod html;
pub mod http;
pub mod location;
pub mod market;
pub mod news;
pub mod pests;
pub mod soil;
pub mod weather;

pub use bag::{ContextBag, ContextPayload, ContextSource, UnknownSource};
pub use crop::{Crop, UnknownCrop};
pub use http::{ApiKeys, HttpFetcher, ProviderSettings};
pub use location::{Coordinates, InvalidCoordinates, Location, Region, UnknownRegion, MANILA};

/// Failure modes shared by every network provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("{url} returned http status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected payload from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },
    #[error("{provider} needs an API key (set {env_var})")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What a provider hands back for one fetch.
pub type ProviderResult = Result<Option<ContextPayload>, ProviderError>;

/// Everything a provider may need for one turn.
///
/// Coordinates are already resolved (defaulted to Manila when the user gave
/// none), so all providers of a turn see the same point.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub place: String,
    pub coordinates: Coordinates,
    pub region: Option<Region>,
    pub crop: Option<Crop>,
}

impl FetchRequest {
    pub fn for_location(location: &Location) -> Self {
        Self {
            place: location.name.clone(),
            coordinates: location.resolved_coordinates(),
            region: location.region,
            crop: None,
        }
    }

    pub fn with_crop(mut self, crop: Option<Crop>) -> Self {
        self.crop = crop;
        self
    }
}

/// Common capability interface for context sources.
pub trait ContextProvider: Send + Sync {
    /// Bag key this provider populates.
    fn source(&self) -> ContextSource;

    /// Whether the request carries what this provider needs (a region, a crop).
    ///
    /// Inapplicable providers are not called at all.
    fn is_applicable(&self, _request: &FetchRequest) -> bool {
        true
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult;
}
