//! Soil data: Agromonitoring (temperature + moisture, field NDVI) and ISRIC
//! SoilGrids (texture and chemistry).

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::http::{require_key, AGROMONITORING_API_KEY_ENV};
use crate::location::Coordinates;
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, HttpFetcher};
use crate::{ProviderError, ProviderResult};

pub const AGROMONITORING_SOIL_URL: &str = "http://api.agromonitoring.com/agro/1.0/soil";
pub const AGROMONITORING_NDVI_HISTORY_URL: &str =
    "http://api.agromonitoring.com/agro/1.0/ndvi/history";
pub const AGROMONITORING_POLYGONS_URL: &str = "http://api.agromonitoring.com/agro/1.0/polygons";
pub const SOILGRIDS_URL: &str = "https://rest.isric.org/soilgrids/v2.0/properties/query";

const SOILGRIDS_PROPERTIES: [&str; 6] = ["clay", "sand", "silt", "phh2o", "soc", "nitrogen"];
const SOILGRIDS_DEPTHS: [&str; 2] = ["0-5cm", "5-15cm"];
const KELVIN_OFFSET: f64 = 273.15;
const NDVI_LOOKBACK_DAYS: u64 = 30;
const HTTP_CREATED: u16 = 201;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilReading {
    /// Temperature at 10 cm depth, °C.
    pub temperature_c: Option<f64>,
    /// Volumetric moisture, m³/m³.
    pub moisture: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct AgroSoil {
    dt: i64,
    #[serde(default)]
    t10: Option<f64>,
    #[serde(default)]
    moisture: Option<f64>,
}

impl From<AgroSoil> for SoilReading {
    fn from(raw: AgroSoil) -> Self {
        Self {
            temperature_c: raw.t10.map(|k| ((k - KELVIN_OFFSET) * 100.0).round() / 100.0),
            moisture: raw.moisture,
            timestamp: DateTime::from_timestamp(raw.dt, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Agromonitoring soil endpoint. Needs `AGROMONITORING_API_KEY`.
pub struct AgroSoilProvider {
    fetcher: HttpFetcher,
    api_key: String,
    url: String,
}

impl AgroSoilProvider {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            url: AGROMONITORING_SOIL_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn reading(&self, at: Coordinates) -> Result<SoilReading, ProviderError> {
        require_key(&self.api_key, "Agromonitoring", AGROMONITORING_API_KEY_ENV)?;
        let query = [
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("appid", self.api_key.clone()),
        ];
        let raw: AgroSoil = self.fetcher.get_json(&self.url, &query)?;
        Ok(raw.into())
    }
}

impl ContextProvider for AgroSoilProvider {
    fn source(&self) -> ContextSource {
        ContextSource::Soil
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        Ok(Some(ContextPayload::Soil(self.reading(request.coordinates)?)))
    }
}

/// One satellite pass over a registered field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NdviPoint {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

/// A field registered with Agromonitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPolygon {
    pub id: String,
    pub name: String,
    /// Hectares, as computed by Agromonitoring.
    pub area: f64,
}

#[derive(Debug, Deserialize)]
struct NdviStats {
    mean: f64,
    max: f64,
    min: f64,
}

#[derive(Debug, Deserialize)]
struct NdviEntry {
    dt: i64,
    data: NdviStats,
}

impl From<NdviEntry> for NdviPoint {
    fn from(raw: NdviEntry) -> Self {
        Self {
            date: DateTime::from_timestamp(raw.dt, 0)
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            mean: raw.data.mean,
            max: raw.data.max,
            min: raw.data.min,
        }
    }
}

/// GeoJSON `Feature` body for `POST /polygons`.
///
/// Corners are `[lon, lat]` pairs; the ring is closed if the caller did not
/// repeat the first corner.
fn polygon_body(name: &str, corners: &[Coordinates]) -> Result<serde_json::Value, ProviderError> {
    let mut ring: Vec<[f64; 2]> = corners.iter().map(|c| [c.longitude, c.latitude]).collect();
    if ring.first() != ring.last() {
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
    }
    // A closed ring needs three distinct corners plus the repeated first.
    if ring.len() < 4 {
        return Err(ProviderError::Config(format!(
            "a field polygon needs at least 3 corners, got {}",
            corners.len()
        )));
    }
    Ok(serde_json::json!({
        "name": name,
        "geo_json": {
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [ring],
            },
        },
    }))
}

/// Agromonitoring field endpoints: NDVI history and polygon registration.
/// Needs `AGROMONITORING_API_KEY`.
#[derive(Debug, Clone)]
pub struct AgroFieldClient {
    fetcher: HttpFetcher,
    api_key: String,
    ndvi_url: String,
    polygons_url: String,
}

impl AgroFieldClient {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            ndvi_url: AGROMONITORING_NDVI_HISTORY_URL.to_string(),
            polygons_url: AGROMONITORING_POLYGONS_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, ndvi: impl Into<String>, polygons: impl Into<String>) -> Self {
        self.ndvi_url = ndvi.into();
        self.polygons_url = polygons.into();
        self
    }

    /// NDVI statistics for `polygon_id` over the last 30 days, oldest first
    /// as Agromonitoring returns them.
    pub fn ndvi_history(&self, polygon_id: &str) -> Result<Vec<NdviPoint>, ProviderError> {
        require_key(&self.api_key, "Agromonitoring", AGROMONITORING_API_KEY_ENV)?;
        let end = Utc::now();
        let start = end
            .checked_sub_days(Days::new(NDVI_LOOKBACK_DAYS))
            .unwrap_or(end);
        let query = [
            ("polyid", polygon_id.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("appid", self.api_key.clone()),
        ];
        let raw: Vec<NdviEntry> = self.fetcher.get_json(&self.ndvi_url, &query)?;
        Ok(raw.into_iter().map(NdviPoint::from).collect())
    }

    /// Register a field outline. Agromonitoring answers `201 Created`; any
    /// other status is an error.
    pub fn create_polygon(&self, name: &str, corners: &[Coordinates]) -> Result<FieldPolygon, ProviderError> {
        require_key(&self.api_key, "Agromonitoring", AGROMONITORING_API_KEY_ENV)?;
        let body = polygon_body(name, corners)?;
        let query = [("appid", self.api_key.clone())];
        let created: FieldPolygon =
            self.fetcher
                .post_json(&self.polygons_url, &query, &body, HTTP_CREATED)?;
        tracing::info!(id = %created.id, area = created.area, "registered field polygon");
        Ok(created)
    }
}

#[derive(Debug, Deserialize)]
struct GridValues {
    #[serde(default)]
    mean: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GridDepth {
    values: GridValues,
}

#[derive(Debug, Deserialize)]
struct GridLayer {
    name: String,
    #[serde(default)]
    depths: Vec<GridDepth>,
}

#[derive(Debug, Deserialize)]
struct GridProperties {
    layers: Vec<GridLayer>,
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    properties: GridProperties,
}

/// SoilGrids property query. Free, no key.
///
/// Values are in SoilGrids' mapped units (e.g. pH × 10, g/kg × 10); they are
/// passed through untouched.
#[derive(Debug, Clone)]
pub struct SoilGridsClient {
    fetcher: HttpFetcher,
    url: String,
}

impl SoilGridsClient {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            url: SOILGRIDS_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Mean of the shallowest depth for each property.
    pub fn properties(&self, at: Coordinates) -> Result<BTreeMap<String, Option<f64>>, ProviderError> {
        let mut query = vec![
            ("lon", at.longitude.to_string()),
            ("lat", at.latitude.to_string()),
        ];
        query.extend(SOILGRIDS_PROPERTIES.iter().map(|p| ("property", p.to_string())));
        query.extend(SOILGRIDS_DEPTHS.iter().map(|d| ("depth", d.to_string())));
        query.push(("value", "mean".to_string()));

        let resp: GridResponse = self.fetcher.get_json(&self.url, &query)?;
        Ok(resp
            .properties
            .layers
            .into_iter()
            .map(|layer| {
                let mean = layer.depths.first().and_then(|d| d.values.mean);
                (layer.name, mean)
            })
            .collect())
    }
}
