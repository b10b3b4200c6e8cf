//! `agriaid probe`: call one upstream source directly and return its payload.

use anyhow::{anyhow, Result};
use serde_json::Value;

use agriaid_context::{ProviderRegistry, TopicTag};
use agriaid_providers::feed::FarmNewsFeeds;
use agriaid_providers::pests::INaturalistClient;
use agriaid_providers::soil::{AgroFieldClient, SoilGridsClient};
use agriaid_providers::weather::{OpenWeatherClient, WeatherQuery};
use agriaid_providers::{ContextSource, Coordinates, Crop, FetchRequest, HttpFetcher, Location};

use crate::provider_settings;

pub(crate) fn run(
    target: &str,
    name: Option<&str>,
    corners: &[Coordinates],
    location: &Location,
    crop: Option<Crop>,
    http_timeout_secs: Option<u64>,
) -> Result<Value> {
    let settings = provider_settings(http_timeout_secs)?;
    let http = HttpFetcher::new(&settings)?;
    let at = location.resolved_coordinates();

    let weather_query = || match name {
        Some(city) => WeatherQuery::City(city.to_string()),
        None => WeatherQuery::At(at),
    };

    let value = match target {
        "openweather-current" => {
            let client = OpenWeatherClient::new(http, settings.api_keys.openweather.clone());
            serde_json::to_value(client.current(&weather_query())?)?
        }
        "openweather-forecast" => {
            let client = OpenWeatherClient::new(http, settings.api_keys.openweather.clone());
            serde_json::to_value(client.forecast(&weather_query())?)?
        }
        "soilgrids" => serde_json::to_value(SoilGridsClient::new(http).properties(at)?)?,
        "taxon" => {
            let name = name.ok_or_else(|| anyhow!("`probe taxon` needs --name <taxon>"))?;
            serde_json::to_value(INaturalistClient::new(http).search_taxon(name)?)?
        }
        "farm-feeds" => serde_json::to_value(FarmNewsFeeds::new(http).latest())?,
        "ndvi" => {
            let polygon = name.ok_or_else(|| anyhow!("`probe ndvi` needs --name <polygon id>"))?;
            let client = AgroFieldClient::new(http, settings.api_keys.agromonitoring.clone());
            serde_json::to_value(client.ndvi_history(polygon)?)?
        }
        "create-polygon" => {
            let field = name.ok_or_else(|| anyhow!("`probe create-polygon` needs --name <field name>"))?;
            let client = AgroFieldClient::new(http, settings.api_keys.agromonitoring.clone());
            serde_json::to_value(client.create_polygon(field, corners)?)?
        }
        other => {
            let source: ContextSource = other.parse()?;
            let request = FetchRequest::for_location(location).with_crop(crop);
            probe_source(&ProviderRegistry::standard(&settings)?, source, &request)?
        }
    };
    Ok(value)
}

fn probe_source(registry: &ProviderRegistry, source: ContextSource, request: &FetchRequest) -> Result<Value> {
    let provider = TopicTag::ALL
        .iter()
        .flat_map(|t| registry.providers_for(*t))
        .find(|p| p.source() == source)
        .ok_or_else(|| anyhow!("no provider is routed for {source}"))?;

    if !provider.is_applicable(request) {
        return Err(anyhow!(
            "{source} does not apply to this request (try --region or --crop)"
        ));
    }

    match provider.fetch(request)? {
        Some(payload) => Ok(serde_json::to_value(payload)?),
        None => Ok(Value::Null),
    }
}
