//! Topic → provider routing and the per-turn fan-out.
//!
//! The routing table is data: a [`ProviderRegistry`] maps each [`TopicTag`]
//! to an ordered list of providers. Aggregation walks the detected topics in
//! tag order and calls each routed provider once, one after another.
//!
//! Failure policy: a provider error or an empty answer leaves its source out
//! of the bag and never stops the remaining calls. The [`GatherReport`] keeps
//! the distinction that the bag itself does not.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agriaid_providers::calendar::CropCalendarProvider;
use agriaid_providers::feed::PagasaForecastProvider;
use agriaid_providers::market::MarketPriceProvider;
use agriaid_providers::news::{DaAdvisoryProvider, NewsApiProvider};
use agriaid_providers::pests::{INaturalistClient, PestKnowledgeProvider, PestObservationProvider};
use agriaid_providers::soil::AgroSoilProvider;
use agriaid_providers::weather::{
    CycloneBulletinProvider, DetailedWeatherProvider, OpenMeteoClient, RegionalWeatherProvider,
};
use agriaid_providers::{
    ContextBag, ContextProvider, ContextSource, FetchRequest, HttpFetcher, ProviderError,
    ProviderSettings,
};

use crate::topics::{TopicSet, TopicTag};

/// What happened to one routed provider during a gather.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Populated,
    /// Answered, but with nothing to add.
    Empty,
    /// Transport, status or decode failure.
    Failed(String),
    /// Not applicable to this request (no region, no crop hint).
    Skipped,
}

impl fmt::Display for ProviderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderOutcome::Populated => f.write_str("populated"),
            ProviderOutcome::Empty => f.write_str("empty"),
            ProviderOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            ProviderOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Per-source outcomes of one gather, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherReport {
    outcomes: Vec<(ContextSource, ProviderOutcome)>,
}

impl GatherReport {
    pub fn outcome(&self, source: ContextSource) -> Option<&ProviderOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextSource, &ProviderOutcome)> {
        self.outcomes.iter().map(|(s, o)| (*s, o))
    }

    pub fn failures(&self) -> impl Iterator<Item = (ContextSource, &str)> {
        self.outcomes.iter().filter_map(|(s, o)| match o {
            ProviderOutcome::Failed(reason) => Some((*s, reason.as_str())),
            _ => None,
        })
    }

    /// Sources that were called at all (everything but `Skipped`).
    pub fn attempted(&self) -> impl Iterator<Item = ContextSource> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o != ProviderOutcome::Skipped)
            .map(|(s, _)| *s)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Declarative routing table from topic to providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    routes: BTreeMap<TopicTag, Vec<Arc<dyn ContextProvider>>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (tag, providers) in &self.routes {
            let sources: Vec<_> = providers.iter().map(|p| p.source()).collect();
            map.entry(tag, &sources);
        }
        map.finish()
    }
}

impl ProviderRegistry {
    /// An empty table: every topic routes to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to a topic's route.
    pub fn route(mut self, topic: TopicTag, provider: Arc<dyn ContextProvider>) -> Self {
        self.routes.entry(topic).or_default().push(provider);
        self
    }

    /// The production table, wired to the real upstream services.
    pub fn standard(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let http = HttpFetcher::new(settings)?;
        let keys = &settings.api_keys;
        let meteo = OpenMeteoClient::new(http.clone());

        Ok(Self::new()
            .route(TopicTag::Weather, Arc::new(PagasaForecastProvider::new(http.clone())))
            .route(TopicTag::Weather, Arc::new(RegionalWeatherProvider::new(meteo.clone())))
            .route(TopicTag::Weather, Arc::new(CycloneBulletinProvider::new(http.clone())))
            .route(TopicTag::Weather, Arc::new(DetailedWeatherProvider::new(meteo)))
            .route(
                TopicTag::Soil,
                Arc::new(AgroSoilProvider::new(http.clone(), keys.agromonitoring.clone())),
            )
            .route(TopicTag::Pest, Arc::new(PestKnowledgeProvider))
            .route(
                TopicTag::Pest,
                Arc::new(PestObservationProvider::new(INaturalistClient::new(http.clone()))),
            )
            .route(TopicTag::Crop, Arc::new(CropCalendarProvider))
            .route(TopicTag::Price, Arc::new(MarketPriceProvider))
            .route(TopicTag::News, Arc::new(DaAdvisoryProvider::new(http.clone())))
            .route(TopicTag::News, Arc::new(NewsApiProvider::new(http, keys.news.clone()))))
    }

    pub fn providers_for(&self, topic: TopicTag) -> &[Arc<dyn ContextProvider>] {
        self.routes.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn gather(&self, topics: &TopicSet, request: &FetchRequest) -> ContextBag {
        self.gather_with_report(topics, request).0
    }

    pub fn gather_with_report(
        &self,
        topics: &TopicSet,
        request: &FetchRequest,
    ) -> (ContextBag, GatherReport) {
        let mut bag = ContextBag::new();
        let mut report = GatherReport::default();

        for topic in topics.iter() {
            for provider in self.providers_for(topic) {
                let source = provider.source();
                let outcome = if !provider.is_applicable(request) {
                    tracing::debug!(%topic, %source, "provider not applicable");
                    ProviderOutcome::Skipped
                } else {
                    match provider.fetch(request) {
                        Ok(Some(payload)) if !payload.is_empty() => {
                            tracing::info!(%topic, %source, "context populated");
                            bag.insert(payload);
                            ProviderOutcome::Populated
                        }
                        Ok(_) => {
                            tracing::info!(%topic, %source, "provider returned no data");
                            ProviderOutcome::Empty
                        }
                        Err(e) => {
                            tracing::warn!(%topic, %source, error = %e, "provider unavailable");
                            ProviderOutcome::Failed(e.to_string())
                        }
                    }
                };
                report.outcomes.push((source, outcome));
            }
        }

        (bag, report)
    }
}
