//! Weather providers: Open-Meteo (detailed + regional), the PAGASA cyclone
//! bulletin page, and OpenWeatherMap (current conditions + 5 day forecast).

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::html::{element_text, selector};
use crate::http::{require_key, OPENWEATHER_API_KEY_ENV};
use crate::location::{Coordinates, Region};
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, HttpFetcher};
use crate::{ProviderError, ProviderResult};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const PAGASA_CYCLONE_URL: &str =
    "https://bagong.pagasa.dost.gov.ph/tropical-cyclone/severe-weather-bulletin";
pub const OPENWEATHER_CURRENT_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
pub const OPENWEATHER_FORECAST_URL: &str = "http://api.openweathermap.org/data/2.5/forecast";

const DETAILED_CURRENT_VARS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m";
const DETAILED_DAILY_VARS: &str =
    "temperature_2m_max,temperature_2m_min,precipitation_sum,rain_sum,windspeed_10m_max";
const REGIONAL_DAILY_VARS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum";
const FORECAST_DAYS: u32 = 7;
const MAX_BULLETINS: usize = 3;
const NO_ACTIVE_CYCLONES: &str = "No active tropical cyclones";

// ============================================================================
// Open-Meteo
// ============================================================================

/// Daily series as returned by Open-Meteo; one slot per day, `None` where the
/// model has no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default, rename = "temperature_2m_max")]
    pub temperature_max: Vec<Option<f64>>,
    #[serde(default, rename = "temperature_2m_min")]
    pub temperature_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub rain_sum: Vec<Option<f64>>,
    #[serde(default, rename = "windspeed_10m_max")]
    pub windspeed_max: Vec<Option<f64>>,
}

impl DailyForecast {
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Current conditions from the `current=` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    #[serde(default, rename = "temperature_2m")]
    pub temperature: Option<f64>,
    #[serde(default, rename = "relative_humidity_2m")]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default, rename = "wind_speed_10m")]
    pub windspeed: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedWeather {
    pub current: CurrentConditions,
    pub daily: DailyForecast,
}

/// Legacy `current_weather=true` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub windspeed: f64,
    #[serde(default)]
    pub winddirection: Option<f64>,
    #[serde(default)]
    pub weathercode: Option<u32>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalWeather {
    pub region: Region,
    pub current: CurrentWeather,
    pub forecast: DailyForecast,
}

#[derive(Debug, Deserialize)]
struct DetailedResponse {
    #[serde(default)]
    current: CurrentConditions,
    #[serde(default)]
    daily: DailyForecast,
}

#[derive(Debug, Deserialize)]
struct RegionalResponse {
    current_weather: CurrentWeather,
    #[serde(default)]
    daily: DailyForecast,
}

/// Open-Meteo forecast API. Free, no key.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    fetcher: HttpFetcher,
    url: String,
}

impl OpenMeteoClient {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            url: OPEN_METEO_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn detailed(&self, at: Coordinates) -> Result<DetailedWeather, ProviderError> {
        let query = [
            ("latitude", at.latitude.to_string()),
            ("longitude", at.longitude.to_string()),
            ("current", DETAILED_CURRENT_VARS.to_string()),
            ("daily", DETAILED_DAILY_VARS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ];
        let resp: DetailedResponse = self.fetcher.get_json(&self.url, &query)?;
        Ok(DetailedWeather {
            current: resp.current,
            daily: resp.daily,
        })
    }

    pub fn regional(&self, region: Region) -> Result<RegionalWeather, ProviderError> {
        let at = region.coordinates();
        let query = [
            ("latitude", at.latitude.to_string()),
            ("longitude", at.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("daily", REGIONAL_DAILY_VARS.to_string()),
            ("timezone", "Asia/Manila".to_string()),
        ];
        let resp: RegionalResponse = self.fetcher.get_json(&self.url, &query)?;
        Ok(RegionalWeather {
            region,
            current: resp.current_weather,
            forecast: resp.daily,
        })
    }
}

/// Current conditions and a 7 day outlook at the turn's coordinates.
pub struct DetailedWeatherProvider {
    client: OpenMeteoClient,
}

impl DetailedWeatherProvider {
    pub fn new(client: OpenMeteoClient) -> Self {
        Self { client }
    }
}

impl ContextProvider for DetailedWeatherProvider {
    fn source(&self) -> ContextSource {
        ContextSource::DetailedWeather
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        let weather = self.client.detailed(request.coordinates)?;
        Ok(Some(ContextPayload::DetailedWeather(weather)))
    }
}

/// Weather at the representative point of the user's region.
pub struct RegionalWeatherProvider {
    client: OpenMeteoClient,
}

impl RegionalWeatherProvider {
    pub fn new(client: OpenMeteoClient) -> Self {
        Self { client }
    }
}

impl ContextProvider for RegionalWeatherProvider {
    fn source(&self) -> ContextSource {
        ContextSource::RegionalWeather
    }

    fn is_applicable(&self, request: &FetchRequest) -> bool {
        request.region.is_some()
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        let Some(region) = request.region else {
            return Ok(None);
        };
        let weather = self.client.regional(region)?;
        Ok(Some(ContextPayload::RegionalWeather(weather)))
    }
}

// ============================================================================
// PAGASA tropical cyclone bulletin
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycloneBulletin {
    pub content: String,
    /// When we read the bulletin (local time), not when PAGASA issued it.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum CycloneStatus {
    /// Page fetched, no bulletin items on it.
    Quiet(String),
    Active(Vec<CycloneBulletin>),
}

/// Extract the first few `div.bulletin-item` blocks from the bulletin page.
pub fn parse_bulletins(page: &str, timestamp: &str) -> Result<CycloneStatus, ProviderError> {
    let doc = Html::parse_document(page);
    let items = selector("div.bulletin-item")?;

    let bulletins: Vec<_> = doc
        .select(&items)
        .take(MAX_BULLETINS)
        .map(|el| CycloneBulletin {
            content: element_text(&el),
            timestamp: timestamp.to_string(),
        })
        .collect();

    if bulletins.is_empty() {
        Ok(CycloneStatus::Quiet(NO_ACTIVE_CYCLONES.to_string()))
    } else {
        Ok(CycloneStatus::Active(bulletins))
    }
}

pub struct CycloneBulletinProvider {
    fetcher: HttpFetcher,
    url: String,
}

impl CycloneBulletinProvider {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            url: PAGASA_CYCLONE_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn status(&self) -> Result<CycloneStatus, ProviderError> {
        let page = self.fetcher.get_text(&self.url, &[])?;
        let now = Local::now().format("%Y-%m-%d %H:%M").to_string();
        parse_bulletins(&page, &now)
    }
}

impl ContextProvider for CycloneBulletinProvider {
    fn source(&self) -> ContextSource {
        ContextSource::TyphoonAlert
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        Ok(Some(ContextPayload::TyphoonAlert(self.status()?)))
    }
}

// ============================================================================
// OpenWeatherMap
// ============================================================================

/// Either a city name or a coordinate pair; OpenWeatherMap accepts both.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    At(Coordinates),
}

impl WeatherQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            WeatherQuery::City(city) => vec![("q", city.clone())],
            WeatherQuery::At(c) => vec![
                ("lat", c.latitude.to_string()),
                ("lon", c.longitude.to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentObservation {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub clouds: f64,
    pub visibility: Option<f64>,
    /// `HH:MM`, station local time.
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSlot {
    pub datetime: String,
    pub temp: f64,
    pub description: String,
    pub humidity: f64,
    pub rain_3h: f64,
    pub wind_speed: f64,
    pub clouds: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwClouds {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
    #[serde(default)]
    visibility: Option<f64>,
    sys: OwSys,
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Default, Deserialize)]
struct OwRain {
    #[serde(default, rename = "3h")]
    three_hours: f64,
}

#[derive(Debug, Deserialize)]
struct OwSlot {
    dt_txt: String,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
    #[serde(default)]
    rain: OwRain,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    list: Vec<OwSlot>,
}

fn first_description(conditions: &[OwCondition]) -> String {
    conditions
        .first()
        .map(|c| c.description.clone())
        .unwrap_or_default()
}

fn clock_time(unix: i64, offset_secs: i32) -> String {
    let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(unix, 0)
        .map(|t| t.with_timezone(&offset).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// OpenWeatherMap current weather and 5 day / 3 hour forecast (metric units).
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    fetcher: HttpFetcher,
    api_key: String,
    current_url: String,
    forecast_url: String,
}

impl OpenWeatherClient {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            current_url: OPENWEATHER_CURRENT_URL.to_string(),
            forecast_url: OPENWEATHER_FORECAST_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, current: impl Into<String>, forecast: impl Into<String>) -> Self {
        self.current_url = current.into();
        self.forecast_url = forecast.into();
        self
    }

    fn query(&self, what: &WeatherQuery) -> Result<Vec<(&'static str, String)>, ProviderError> {
        require_key(&self.api_key, "OpenWeatherMap", OPENWEATHER_API_KEY_ENV)?;
        let mut params = what.params();
        params.push(("appid", self.api_key.clone()));
        params.push(("units", "metric".to_string()));
        Ok(params)
    }

    pub fn current(&self, what: &WeatherQuery) -> Result<CurrentObservation, ProviderError> {
        let params = self.query(what)?;
        let data: OwCurrent = self.fetcher.get_json(&self.current_url, &params)?;
        Ok(CurrentObservation {
            temperature: data.main.temp,
            feels_like: data.main.feels_like,
            humidity: data.main.humidity,
            pressure: data.main.pressure,
            description: first_description(&data.weather),
            wind_speed: data.wind.speed,
            wind_direction: data.wind.deg,
            clouds: data.clouds.all,
            visibility: data.visibility,
            sunrise: clock_time(data.sys.sunrise, data.timezone),
            sunset: clock_time(data.sys.sunset, data.timezone),
        })
    }

    pub fn forecast(&self, what: &WeatherQuery) -> Result<Vec<ForecastSlot>, ProviderError> {
        let params = self.query(what)?;
        let data: OwForecast = self.fetcher.get_json(&self.forecast_url, &params)?;
        Ok(data
            .list
            .into_iter()
            .map(|slot| ForecastSlot {
                description: first_description(&slot.weather),
                datetime: slot.dt_txt,
                temp: slot.main.temp,
                humidity: slot.main.humidity,
                rain_3h: slot.rain.three_hours,
                wind_speed: slot.wind.speed,
                clouds: slot.clouds.all,
            })
            .collect())
    }
}
