//! RSS/Atom feeds: PAGASA weather forecasts and general farm news feeds.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::html::fragment_text;
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, HttpFetcher};
use crate::{ProviderError, ProviderResult};

pub const PAGASA_FEED_URL: &str = "http://bagong.pagasa.dost.gov.ph/rss-feed";
const PAGASA_MAX_ENTRIES: usize = 5;

pub const FARM_NEWS_FEEDS: &[&str] = &[
    "https://www.agriculture.com/feed",
    "https://www.farm-equipment.com/rss",
    "http://www.fao.org/news/rss-feed/en/",
];
const FARM_FEED_ENTRIES_PER_FEED: usize = 3;

/// One feed item, RSS `<item>` or Atom `<entry>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub summary: String,
    pub published: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Summary,
    Published,
    Link,
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"description" | b"summary" | b"content" => Some(Field::Summary),
        b"pubDate" | b"published" | b"updated" => Some(Field::Published),
        b"link" => Some(Field::Link),
        _ => None,
    }
}

fn href_of(tag: &BytesStart<'_>) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"href")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn append(entry: &mut FeedEntry, field: Field, text: &str) {
    let slot = match field {
        Field::Title => &mut entry.title,
        Field::Summary => &mut entry.summary,
        Field::Link => &mut entry.link,
        Field::Published => entry.published.get_or_insert_with(String::new),
    };
    slot.push_str(text);
}

/// Parse an RSS 2.0 or Atom document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => {
                let name = tag.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        current = Some(FeedEntry::default());
                        field = None;
                    }
                    other if current.is_some() => {
                        field = field_for(other);
                        if field == Some(Field::Link) {
                            if let (Some(entry), Some(href)) = (current.as_mut(), href_of(&tag)) {
                                entry.link = href;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(tag)) => {
                // Atom: <link rel="alternate" href="..."/>
                if tag.local_name().as_ref() == b"link" {
                    if let Some(entry) = current.as_mut() {
                        if entry.link.is_empty() {
                            if let Some(href) = href_of(&tag) {
                                entry.link = href;
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = text.unescape().map_err(|e| ProviderError::Parse {
                        what: "feed",
                        message: e.to_string(),
                    })?;
                    append(entry, f, &text);
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    append(entry, f, &text);
                }
            }
            Ok(Event::End(tag)) => match tag.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(mut entry) = current.take() {
                        entry.title = fragment_text(&entry.title);
                        entry.summary = fragment_text(&entry.summary);
                        entry.link = entry.link.trim().to_string();
                        entries.push(entry);
                    }
                    field = None;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::Parse {
                    what: "feed",
                    message: format!("at byte {}: {e}", reader.buffer_position()),
                })
            }
            _ => {}
        }
    }

    Ok(entries)
}

/// PAGASA public weather forecast feed.
pub struct PagasaForecastProvider {
    fetcher: HttpFetcher,
    url: String,
}

impl PagasaForecastProvider {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            url: PAGASA_FEED_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn forecasts(&self) -> Result<Vec<FeedEntry>, ProviderError> {
        let xml = self.fetcher.get_text(&self.url, &[])?;
        let mut entries = parse_feed(&xml)?;
        entries.truncate(PAGASA_MAX_ENTRIES);
        Ok(entries)
    }
}

impl ContextProvider for PagasaForecastProvider {
    fn source(&self) -> ContextSource {
        ContextSource::PagasaForecast
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        let entries = self.forecasts()?;
        Ok((!entries.is_empty()).then_some(ContextPayload::PagasaForecast(entries)))
    }
}

/// A handful of general agriculture feeds, read one after another.
///
/// A feed that fails is logged and skipped; the rest still contribute.
pub struct FarmNewsFeeds {
    fetcher: HttpFetcher,
    feeds: Vec<String>,
}

impl FarmNewsFeeds {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            feeds: FARM_NEWS_FEEDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_feeds(mut self, feeds: Vec<String>) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn latest(&self) -> Vec<FeedEntry> {
        let mut out = Vec::new();
        for url in &self.feeds {
            match self
                .fetcher
                .get_text(url, &[])
                .and_then(|xml| parse_feed(&xml))
            {
                Ok(entries) => out.extend(entries.into_iter().take(FARM_FEED_ENTRIES_PER_FEED)),
                Err(e) => tracing::warn!(feed = %url, error = %e, "farm news feed unavailable"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>PAGASA</title>
    <item>
      <title>Public Weather Forecast</title>
      <description><![CDATA[<p>Southwest monsoon affecting <b>Luzon</b>.</p>]]></description>
      <pubDate>Mon, 18 Nov 2024 04:00:00 +0800</pubDate>
      <link>https://bagong.pagasa.dost.gov.ph/weather</link>
    </item>
    <item>
      <title>Tropical Cyclone Advisory &amp; Outlook</title>
      <description>No tropical cyclone expected.</description>
      <link>https://bagong.pagasa.dost.gov.ph/tc</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items_and_ignores_channel_title() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Public Weather Forecast");
        assert_eq!(entries[0].summary, "Southwest monsoon affecting Luzon.");
        assert_eq!(
            entries[0].published.as_deref(),
            Some("Mon, 18 Nov 2024 04:00:00 +0800")
        );
        assert_eq!(entries[1].title, "Tropical Cyclone Advisory & Outlook");
        assert_eq!(entries[1].published, None);
        assert_eq!(entries[1].link, "https://bagong.pagasa.dost.gov.ph/tc");
    }

    #[test]
    fn parses_atom_entries_with_href_links() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>FAO</title>
  <entry>
    <title>Rice outlook</title>
    <link rel="alternate" href="https://fao.org/rice"/>
    <summary>Prices steady.</summary>
    <updated>2024-11-01T00:00:00Z</updated>
  </entry>
</feed>"#;
        let entries = parse_feed(atom).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://fao.org/rice");
        assert_eq!(entries[0].summary, "Prices steady.");
        assert_eq!(entries[0].published.as_deref(), Some("2024-11-01T00:00:00Z"));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse_feed("<rss><channel><item><title>x</channel>").unwrap_err();
        assert!(matches!(err, ProviderError::Parse { what: "feed", .. }));
    }
}
