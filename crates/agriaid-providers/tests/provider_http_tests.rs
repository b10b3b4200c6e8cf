//! Provider clients against a local canned-response HTTP server.

use agriaid_providers::feed::{FarmNewsFeeds, PagasaForecastProvider};
use agriaid_providers::news::{DaAdvisoryProvider, NewsApiProvider};
use agriaid_providers::pests::{INaturalistClient, PestObservationProvider};
use agriaid_providers::soil::{AgroFieldClient, AgroSoilProvider, SoilGridsClient};
use agriaid_providers::weather::{
    CycloneBulletinProvider, CycloneStatus, OpenMeteoClient, OpenWeatherClient,
    RegionalWeatherProvider, WeatherQuery,
};
use agriaid_providers::{
    ContextPayload, ContextProvider, ContextSource, Coordinates, FetchRequest, HttpFetcher,
    Location, ProviderError, ProviderSettings, Region, MANILA,
};
use agriaid_test_support::{serve, Canned};
use chrono::{Days, Local, NaiveDate, Utc};
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn fetcher() -> HttpFetcher {
    let settings = ProviderSettings {
        timeout: Some(Duration::from_secs(5)),
        ..ProviderSettings::default()
    };
    HttpFetcher::new(&settings).expect("http client")
}

fn manila() -> FetchRequest {
    FetchRequest::for_location(&Location::default())
}

fn rss_with_items(n: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>PAGASA</title>");
    for i in 0..n {
        xml.push_str(&format!(
            "<item><title>Forecast {i}</title><description>Partly cloudy {i}</description><link>https://pagasa/{i}</link></item>"
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

// ============================================================================
// Weather
// ============================================================================

#[test]
fn pagasa_feed_keeps_first_five_items() {
    let stub = serve(vec![Canned::ok("application/rss+xml", rss_with_items(7))]);
    let provider = PagasaForecastProvider::new(fetcher()).with_endpoint(stub.url("/rss-feed"));

    let payload = provider.fetch(&manila()).unwrap().expect("forecast payload");
    let ContextPayload::PagasaForecast(entries) = payload else {
        panic!("wrong payload variant");
    };
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].title, "Forecast 0");
    assert_eq!(entries[4].summary, "Partly cloudy 4");
    assert!(stub.next_request().line.starts_with("GET /rss-feed "));
}

#[test]
fn empty_feed_is_absent_not_an_error() {
    let stub = serve(vec![Canned::ok("application/rss+xml", rss_with_items(0))]);
    let provider = PagasaForecastProvider::new(fetcher()).with_endpoint(stub.url("/rss-feed"));
    assert!(provider.fetch(&manila()).unwrap().is_none());
}

#[test]
fn regional_weather_uses_region_coordinates() {
    let body = r#"{"latitude":16.4,"longitude":120.6,
        "current_weather":{"temperature":19.5,"windspeed":6.1,"winddirection":40,"weathercode":3,"time":"2024-11-18T10:00"},
        "daily":{"time":["2024-11-18","2024-11-19"],"temperature_2m_max":[23.0,22.5],"temperature_2m_min":[15.0,14.8],"precipitation_sum":[2.1,0.0]}}"#;
    let stub = serve(vec![Canned::ok("application/json", body)]);
    let client = OpenMeteoClient::new(fetcher()).with_endpoint(stub.url("/v1/forecast"));
    let provider = RegionalWeatherProvider::new(client);

    let request = FetchRequest::for_location(&Location::named("Baguio").with_region(Region::Car));
    assert!(provider.is_applicable(&request));
    let Some(ContextPayload::RegionalWeather(w)) = provider.fetch(&request).unwrap() else {
        panic!("expected regional weather");
    };
    assert_eq!(w.region, Region::Car);
    assert_eq!(w.current.temperature, 19.5);
    assert_eq!(w.forecast.temperature_max, vec![Some(23.0), Some(22.5)]);

    let line = stub.next_request().line;
    assert!(line.contains("latitude=16.4023"), "{line}");
    assert!(line.contains("longitude=120.596"), "{line}");
    assert!(line.contains("current_weather=true"), "{line}");
    assert!(line.contains("timezone=Asia%2FManila"), "{line}");
}

#[test]
fn regional_weather_is_not_applicable_without_region() {
    let client = OpenMeteoClient::new(fetcher()).with_endpoint("http://127.0.0.1:9/");
    let provider = RegionalWeatherProvider::new(client);
    assert!(!provider.is_applicable(&manila()));
}

#[test]
fn cyclone_page_without_bulletins_reports_quiet() {
    let stub = serve(vec![Canned::ok("text/html", "<html><body><h1>Bulletins</h1></body></html>")]);
    let provider = CycloneBulletinProvider::new(fetcher()).with_endpoint(stub.url("/tc"));
    let status = provider.status().unwrap();
    assert_eq!(
        status,
        CycloneStatus::Quiet("No active tropical cyclones".to_string())
    );
}

#[test]
fn server_error_surfaces_status_code() {
    let stub = serve(vec![Canned::status(500)]);
    let provider = CycloneBulletinProvider::new(fetcher()).with_endpoint(stub.url("/tc"));
    let err = provider.fetch(&manila()).unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 500, .. }), "{err}");
}

// ============================================================================
// Soil / pests
// ============================================================================

#[test]
fn soil_request_carries_key_and_coordinates() {
    let stub = serve(vec![Canned::ok(
        "application/json",
        r#"{"dt":1731931200,"t10":300.15,"moisture":0.28,"t0":301.2}"#,
    )]);
    let provider = AgroSoilProvider::new(fetcher(), "k-123").with_endpoint(stub.url("/agro/1.0/soil"));

    let Some(ContextPayload::Soil(reading)) = provider.fetch(&manila()).unwrap() else {
        panic!("expected soil reading");
    };
    assert_eq!(reading.temperature_c, Some(27.0));
    assert_eq!(reading.moisture, Some(0.28));

    let line = stub.next_request().line;
    assert!(line.contains("lat=14.5995"), "{line}");
    assert!(line.contains("lon=120.9842"), "{line}");
    assert!(line.contains("appid=k-123"), "{line}");
}

#[test]
fn malformed_json_is_a_decode_error() {
    let stub = serve(vec![Canned::ok("application/json", "{\"dt\": \"not a number\"")]);
    let provider = AgroSoilProvider::new(fetcher(), "k").with_endpoint(stub.url("/soil"));
    let err = provider.fetch(&manila()).unwrap_err();
    assert!(matches!(err, ProviderError::Decode { .. }), "{err}");
}

#[test]
fn observations_query_insects_near_point() {
    let body = r#"{"results":[
        {"taxon":{"name":"Nilaparvata lugens","preferred_common_name":"Brown Planthopper"},
         "observed_on":"2024-11-12","place_guess":"Laguna","photos":[]}]}"#;
    let stub = serve(vec![Canned::ok("application/json", body)]);
    let client = INaturalistClient::new(fetcher()).with_endpoints(stub.url("/obs"), stub.url("/taxa"));
    let provider = PestObservationProvider::new(client);

    let Some(ContextPayload::PestObservations(obs)) = provider.fetch(&manila()).unwrap() else {
        panic!("expected observations");
    };
    assert_eq!(obs[0].species, "Nilaparvata lugens");
    assert_eq!(obs[0].location, "Laguna");
    assert_eq!(obs[0].photo, None);

    let line = stub.next_request().line;
    assert!(line.contains("taxon_id=47158"), "{line}");
    assert!(line.contains("radius=50"), "{line}");
    assert!(line.contains("quality_grade=research"), "{line}");
    assert_eq!(provider.source(), ContextSource::PestObservations);
}

// ============================================================================
// News
// ============================================================================

#[test]
fn advisory_links_resolve_against_page_url() {
    let page = r#"<html><body>
        <article><h2>Fertilizer discount vouchers</h2><a href="/vouchers/">more</a></article>
    </body></html>"#;
    let stub = serve(vec![Canned::ok("text/html", page)]);
    let provider = DaAdvisoryProvider::new(fetcher()).with_endpoint(stub.url("/category/advisories/"));

    let found = provider.advisories().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].link, stub.url("/vouchers/"));
}

#[test]
fn one_broken_farm_feed_does_not_hide_the_others() {
    let stub = serve(vec![Canned::status(404), Canned::ok("application/rss+xml", rss_with_items(5))]);
    let feeds = FarmNewsFeeds::new(fetcher()).with_feeds(vec![stub.url("/a"), stub.url("/b")]);

    let entries = feeds.latest();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].title, "Forecast 2");
}

// ============================================================================
// Open-Meteo detailed / OpenWeatherMap
// ============================================================================

#[test]
fn detailed_weather_asks_for_current_and_seven_day_series() {
    let body = r#"{"latitude":15.5,"longitude":120.95,
        "current":{"time":"2024-11-18T10:00","temperature_2m":30.1,"relative_humidity_2m":74,"precipitation":0.2,"wind_speed_10m":11.5},
        "daily":{"time":["2024-11-18","2024-11-19"],"temperature_2m_max":[32.0,31.4],"temperature_2m_min":[24.5,24.0],
                 "precipitation_sum":[5.5,0.0],"rain_sum":[5.5,0.0],"windspeed_10m_max":[18.0,null]}}"#;
    let stub = serve(vec![Canned::json(body)]);
    let client = OpenMeteoClient::new(fetcher()).with_endpoint(stub.url("/v1/forecast"));

    let weather = client.detailed(Coordinates::new(15.4865, 120.9734)).unwrap();
    assert_eq!(weather.current.temperature, Some(30.1));
    assert_eq!(weather.current.humidity, Some(74.0));
    assert_eq!(weather.current.windspeed, Some(11.5));
    assert_eq!(weather.daily.time.len(), 2);
    assert_eq!(weather.daily.rain_sum, vec![Some(5.5), Some(0.0)]);
    assert_eq!(weather.daily.windspeed_max, vec![Some(18.0), None]);

    let request = stub.next_request();
    assert_eq!(request.path(), "/v1/forecast");
    assert_eq!(request.param("latitude").as_deref(), Some("15.4865"));
    assert_eq!(request.param("longitude").as_deref(), Some("120.9734"));
    assert_eq!(
        request.param("current").as_deref(),
        Some("temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m")
    );
    assert_eq!(
        request.param("daily").as_deref(),
        Some("temperature_2m_max,temperature_2m_min,precipitation_sum,rain_sum,windspeed_10m_max")
    );
    assert_eq!(request.param("timezone").as_deref(), Some("auto"));
    assert_eq!(request.param("forecast_days").as_deref(), Some("7"));
}

#[test]
fn openweather_current_by_city_uses_metric_units() {
    let body = r#"{"name":"Cabanatuan","timezone":28800,
        "main":{"temp":31.2,"feels_like":36.0,"humidity":70,"pressure":1008},
        "weather":[{"id":802,"main":"Clouds","description":"scattered clouds"}],
        "wind":{"speed":4.1,"deg":230},"clouds":{"all":40},"visibility":10000,
        "sys":{"country":"PH","sunrise":1731880800,"sunset":1731922200}}"#;
    let stub = serve(vec![Canned::json(body)]);
    let client = OpenWeatherClient::new(fetcher(), "ow-key")
        .with_endpoints(stub.url("/data/2.5/weather"), stub.url("/data/2.5/forecast"));

    let now = client
        .current(&WeatherQuery::City("Cabanatuan".to_string()))
        .unwrap();
    assert_eq!(now.temperature, 31.2);
    assert_eq!(now.feels_like, 36.0);
    assert_eq!(now.description, "scattered clouds");
    assert_eq!(now.wind_direction, Some(230.0));
    assert_eq!(now.clouds, 40.0);
    assert_eq!(now.visibility, Some(10000.0));
    // Station clock: UTC+8.
    assert_eq!(now.sunrise, "06:00");
    assert_eq!(now.sunset, "17:30");

    let request = stub.next_request();
    assert_eq!(request.path(), "/data/2.5/weather");
    assert_eq!(request.param("q").as_deref(), Some("Cabanatuan"));
    assert_eq!(request.param("appid").as_deref(), Some("ow-key"));
    assert_eq!(request.param("units").as_deref(), Some("metric"));
    assert_eq!(request.param("lat"), None);
}

#[test]
fn openweather_forecast_by_point_maps_three_hour_slots() {
    let body = r#"{"cod":"200","cnt":2,"list":[
        {"dt":1731931200,"dt_txt":"2024-11-18 12:00:00","main":{"temp":29.5,"humidity":80},
         "weather":[{"description":"light rain"}],"wind":{"speed":3.2},"clouds":{"all":75},"rain":{"3h":1.25}},
        {"dt":1731942000,"dt_txt":"2024-11-18 15:00:00","main":{"temp":28.0,"humidity":85},
         "weather":[],"wind":{"speed":2.0}}]}"#;
    let stub = serve(vec![Canned::json(body)]);
    let client = OpenWeatherClient::new(fetcher(), "ow-key")
        .with_endpoints(stub.url("/data/2.5/weather"), stub.url("/data/2.5/forecast"));

    let slots = client.forecast(&WeatherQuery::At(MANILA)).unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].datetime, "2024-11-18 12:00:00");
    assert_eq!(slots[0].description, "light rain");
    assert_eq!(slots[0].rain_3h, 1.25);
    assert_eq!(slots[0].clouds, 75.0);
    assert_eq!(slots[1].description, "");
    assert_eq!(slots[1].rain_3h, 0.0);
    assert_eq!(slots[1].clouds, 0.0);

    let request = stub.next_request();
    assert_eq!(request.path(), "/data/2.5/forecast");
    assert_eq!(request.param("lat").as_deref(), Some("14.5995"));
    assert_eq!(request.param("lon").as_deref(), Some("120.9842"));
    assert_eq!(request.param("appid").as_deref(), Some("ow-key"));
    assert_eq!(request.param("units").as_deref(), Some("metric"));
    assert_eq!(request.param("q"), None);
}

#[test]
fn openweather_without_key_sends_nothing() {
    let stub = serve(Vec::new());
    let client = OpenWeatherClient::new(fetcher(), "")
        .with_endpoints(stub.url("/weather"), stub.url("/forecast"));
    let err = client.current(&WeatherQuery::At(MANILA)).unwrap_err();
    assert!(
        matches!(err, ProviderError::MissingApiKey { env_var: "OPENWEATHER_API_KEY", .. }),
        "{err}"
    );
}

// ============================================================================
// SoilGrids / iNaturalist taxa
// ============================================================================

#[test]
fn soilgrids_requests_every_property_and_keeps_shallowest_mean() {
    let body = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[120.9842,14.5995]},
        "properties":{"layers":[
          {"name":"clay","unit_measure":{"mapped_units":"g/kg","conversion_factor":10},
           "depths":[{"label":"0-5cm","values":{"mean":312}},{"label":"5-15cm","values":{"mean":320}}]},
          {"name":"phh2o","depths":[{"label":"0-5cm","values":{"mean":null}}]},
          {"name":"soc","depths":[]}]}}"#;
    let stub = serve(vec![Canned::json(body)]);
    let client = SoilGridsClient::new(fetcher()).with_endpoint(stub.url("/soilgrids/v2.0/properties/query"));

    let props = client.properties(MANILA).unwrap();
    assert_eq!(props.len(), 3);
    assert_eq!(props["clay"], Some(312.0));
    assert_eq!(props["phh2o"], None);
    assert_eq!(props["soc"], None);

    let request = stub.next_request();
    assert_eq!(request.path(), "/soilgrids/v2.0/properties/query");
    assert_eq!(request.param("lat").as_deref(), Some("14.5995"));
    assert_eq!(request.param("lon").as_deref(), Some("120.9842"));
    assert_eq!(
        request.params("property"),
        vec!["clay", "sand", "silt", "phh2o", "soc", "nitrogen"]
    );
    assert_eq!(request.params("depth"), vec!["0-5cm", "5-15cm"]);
    assert_eq!(request.param("value").as_deref(), Some("mean"));
}

#[test]
fn taxon_search_takes_the_best_match() {
    let found = r#"{"total_results":2,"page":1,"results":[
        {"id":125827,"name":"Nilaparvata lugens","rank":"species","preferred_common_name":"Brown Planthopper",
         "observations_count":2451,
         "default_photo":{"url":"https://static.inaturalist.org/photos/1/square.jpg","medium_url":"https://static.inaturalist.org/photos/1/medium.jpg"},
         "wikipedia_url":"http://en.wikipedia.org/wiki/Brown_planthopper"},
        {"id":125828,"name":"Nilaparvata","rank":"genus"}]}"#;
    let stub = serve(vec![Canned::json(found), Canned::json(r#"{"total_results":0,"results":[]}"#)]);
    let client = INaturalistClient::new(fetcher()).with_endpoints(stub.url("/obs"), stub.url("/taxa"));

    let taxon = client.search_taxon("brown planthopper").unwrap().expect("a match");
    assert_eq!(taxon.name, "Nilaparvata lugens");
    assert_eq!(taxon.common_name.as_deref(), Some("Brown Planthopper"));
    assert_eq!(taxon.observations, 2451);
    assert_eq!(
        taxon.photo.as_deref(),
        Some("https://static.inaturalist.org/photos/1/medium.jpg")
    );
    assert_eq!(
        taxon.wikipedia_url.as_deref(),
        Some("http://en.wikipedia.org/wiki/Brown_planthopper")
    );

    let request = stub.next_request();
    assert_eq!(request.path(), "/taxa");
    assert_eq!(request.param("q").as_deref(), Some("brown planthopper"));
    assert_eq!(request.param("rank").as_deref(), Some("species,genus"));

    assert_eq!(client.search_taxon("zzzz").unwrap(), None);
}

// ============================================================================
// Agromonitoring fields
// ============================================================================

#[test]
fn ndvi_history_covers_the_last_thirty_days() {
    let body = r#"[
        {"dt":1731283200,"source":"s2","zoom":14,"dc":100,"cl":2.5,
         "data":{"std":0.05,"p75":0.71,"min":0.21,"max":0.83,"median":0.66,"p25":0.58,"num":1520,"mean":0.64}},
        {"dt":1731715200,"source":"l8","zoom":14,"dc":100,"cl":10.0,
         "data":{"std":0.06,"p75":0.74,"min":0.25,"max":0.86,"median":0.69,"p25":0.6,"num":1520,"mean":0.67}}]"#;
    let stub = serve(vec![Canned::json(body)]);
    let client = AgroFieldClient::new(fetcher(), "agro-key")
        .with_endpoints(stub.url("/agro/1.0/ndvi/history"), stub.url("/agro/1.0/polygons"));

    let before = Utc::now().timestamp();
    let points = client.ndvi_history("5aaa8052cbbbb5000b73ff66").unwrap();
    let after = Utc::now().timestamp();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, "2024-11-11");
    assert_eq!(points[0].mean, 0.64);
    assert_eq!(points[1].date, "2024-11-16");
    assert_eq!(points[1].max, 0.86);
    assert_eq!(points[1].min, 0.25);

    let request = stub.next_request();
    assert_eq!(request.method(), "GET");
    assert_eq!(request.path(), "/agro/1.0/ndvi/history");
    assert_eq!(request.param("polyid").as_deref(), Some("5aaa8052cbbbb5000b73ff66"));
    assert_eq!(request.param("appid").as_deref(), Some("agro-key"));
    let start: i64 = request.param("start").unwrap().parse().unwrap();
    let end: i64 = request.param("end").unwrap().parse().unwrap();
    assert!((before..=after).contains(&end), "end={end}");
    assert_eq!(end - start, 30 * 86_400);
}

#[test]
fn polygon_is_posted_as_geojson_and_created() {
    let created = r#"{"id":"5aaa8052cbbbb5000b73ff66","geo_json":{},"name":"North paddy",
        "center":[121.005,14.603],"area":1.37,"user_id":"u-1"}"#;
    let stub = serve(vec![Canned::json(created).with_status(201)]);
    let client = AgroFieldClient::new(fetcher(), "agro-key")
        .with_endpoints(stub.url("/agro/1.0/ndvi/history"), stub.url("/agro/1.0/polygons"));

    let corners = [
        Coordinates::new(14.60, 121.00),
        Coordinates::new(14.60, 121.01),
        Coordinates::new(14.61, 121.01),
    ];
    let polygon = client.create_polygon("North paddy", &corners).unwrap();
    assert_eq!(polygon.id, "5aaa8052cbbbb5000b73ff66");
    assert_eq!(polygon.name, "North paddy");
    assert_eq!(polygon.area, 1.37);

    let request = stub.next_request();
    assert_eq!(request.method(), "POST");
    assert_eq!(request.path(), "/agro/1.0/polygons");
    assert_eq!(request.param("appid").as_deref(), Some("agro-key"));
    let sent = request.json();
    assert_eq!(sent["name"], "North paddy");
    assert_eq!(sent["geo_json"]["type"], "Feature");
    assert_eq!(sent["geo_json"]["geometry"]["type"], "Polygon");
    assert_eq!(
        sent["geo_json"]["geometry"]["coordinates"],
        serde_json::json!([[[121.00, 14.60], [121.01, 14.60], [121.01, 14.61], [121.00, 14.60]]])
    );
}

#[test]
fn polygon_creation_requires_created_status() {
    let stub = serve(vec![Canned::json(r#"{"id":"x","name":"dup","area":1.0}"#)]);
    let client = AgroFieldClient::new(fetcher(), "agro-key")
        .with_endpoints(stub.url("/ndvi"), stub.url("/polygons"));
    let corners = [
        Coordinates::new(14.60, 121.00),
        Coordinates::new(14.60, 121.01),
        Coordinates::new(14.61, 121.01),
    ];
    let err = client.create_polygon("dup", &corners).unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 200, .. }), "{err}");
}

// ============================================================================
// NewsAPI
// ============================================================================

fn week_ago() -> NaiveDate {
    let today = Local::now().date_naive();
    today.checked_sub_days(Days::new(7)).unwrap()
}

#[test]
fn news_search_covers_the_past_week() {
    let body = r#"{"status":"ok","totalResults":2,"articles":[
        {"source":{"id":null,"name":"Inquirer"},"author":null,"title":"Palay prices up in Nueva Ecija",
         "description":"Farmgate prices rose.","url":"https://example.ph/palay",
         "urlToImage":null,"publishedAt":"2024-11-17T01:00:00Z","content":null},
        {"source":{"id":"bworld","name":"BusinessWorld"},"title":null,"description":null,
         "url":"https://example.ph/untitled","publishedAt":"2024-11-16T08:30:00Z"}]}"#;
    let stub = serve(vec![Canned::json(body)]);
    let provider = NewsApiProvider::new(fetcher(), "news-key").with_endpoint(stub.url("/v2/everything"));

    let first = week_ago();
    let articles = provider.search().unwrap();
    let last = week_ago();

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Palay prices up in Nueva Ecija");
    assert_eq!(articles[0].source, "Inquirer");
    assert_eq!(articles[0].image, None);
    assert_eq!(articles[1].title, "");
    assert_eq!(articles[1].source, "BusinessWorld");

    let request = stub.next_request();
    assert_eq!(request.path(), "/v2/everything");
    assert_eq!(request.param("q").as_deref(), Some("philippines agriculture"));
    assert_eq!(request.param("apiKey").as_deref(), Some("news-key"));
    assert_eq!(request.param("pageSize").as_deref(), Some("10"));
    assert_eq!(request.param("sortBy").as_deref(), Some("publishedAt"));
    assert_eq!(request.param("language").as_deref(), Some("en"));
    let from = request.param("from").unwrap();
    assert!(
        [first, last].iter().any(|d| d.format("%Y-%m-%d").to_string() == from),
        "from={from}"
    );
}

#[test]
fn news_with_no_articles_is_absent() {
    let stub = serve(vec![Canned::json(r#"{"status":"ok","totalResults":0,"articles":[]}"#)]);
    let provider = NewsApiProvider::new(fetcher(), "news-key").with_endpoint(stub.url("/v2/everything"));
    assert!(provider.fetch(&manila()).unwrap().is_none());
    assert_eq!(provider.source(), ContextSource::News);
}
