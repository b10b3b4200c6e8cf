//! News and advisories: Department of Agriculture advisories page (scraped)
//! and NewsAPI article search.

use chrono::{Days, Local};
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::html::{element_text, selector};
use crate::http::{require_key, NEWS_API_KEY_ENV};
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, HttpFetcher};
use crate::{ProviderError, ProviderResult};

pub const DA_ADVISORIES_URL: &str = "https://www.da.gov.ph/category/advisories/";
pub const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_NEWS_QUERY: &str = "philippines agriculture";

const MAX_ARTICLES_SCANNED: usize = 5;
const NEWS_LOOKBACK_DAYS: u64 = 7;
const NEWS_PAGE_SIZE: u32 = 10;
const DA_SOURCE: &str = "DA Philippines";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub title: String,
    pub link: String,
    pub source: String,
}

/// Pull advisories out of the DA category page.
///
/// Only the first few `<article>` blocks are looked at; an article without a
/// heading or a link is skipped. Relative links are resolved against `base`.
pub fn parse_advisories(page: &str, base: &str) -> Result<Vec<Advisory>, ProviderError> {
    let doc = Html::parse_document(page);
    let article = selector("article")?;
    let h2 = selector("h2")?;
    let h3 = selector("h3")?;
    let anchor = selector("a[href]")?;
    let base = Url::parse(base).ok();

    let mut out = Vec::new();
    for node in doc.select(&article).take(MAX_ARTICLES_SCANNED) {
        let title = node
            .select(&h2)
            .next()
            .or_else(|| node.select(&h3).next())
            .map(|t| element_text(&t));
        let href = node
            .select(&anchor)
            .next()
            .and_then(|a| a.value().attr("href"));

        let (Some(title), Some(href)) = (title, href) else {
            continue;
        };
        let link = match &base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };
        out.push(Advisory {
            title,
            link,
            source: DA_SOURCE.to_string(),
        });
    }
    Ok(out)
}

pub struct DaAdvisoryProvider {
    fetcher: HttpFetcher,
    url: String,
}

impl DaAdvisoryProvider {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            url: DA_ADVISORIES_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn advisories(&self) -> Result<Vec<Advisory>, ProviderError> {
        let page = self.fetcher.get_text(&self.url, &[])?;
        parse_advisories(&page, &self.url)
    }
}

impl ContextProvider for DaAdvisoryProvider {
    fn source(&self) -> ContextSource {
        ContextSource::Advisories
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        let found = self.advisories()?;
        Ok((!found.is_empty()).then_some(ContextPayload::Advisories(found)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub source: String,
    pub url: String,
    pub published: String,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    source: RawSource,
    url: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    url_to_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNews {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

impl From<RawArticle> for NewsArticle {
    fn from(raw: RawArticle) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            description: raw.description,
            source: raw.source.name.unwrap_or_default(),
            url: raw.url,
            published: raw.published_at,
            image: raw.url_to_image,
        }
    }
}

/// NewsAPI `everything` search over the last week. Needs `NEWS_API_KEY`.
pub struct NewsApiProvider {
    fetcher: HttpFetcher,
    api_key: String,
    url: String,
    query: String,
}

impl NewsApiProvider {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            url: NEWSAPI_URL.to_string(),
            query: DEFAULT_NEWS_QUERY.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn search(&self) -> Result<Vec<NewsArticle>, ProviderError> {
        require_key(&self.api_key, "NewsAPI", NEWS_API_KEY_ENV)?;
        let today = Local::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(NEWS_LOOKBACK_DAYS))
            .unwrap_or(today);
        let params = [
            ("apiKey", self.api_key.clone()),
            ("q", self.query.clone()),
            ("language", "en".to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("from", from.format("%Y-%m-%d").to_string()),
            ("pageSize", NEWS_PAGE_SIZE.to_string()),
        ];
        let raw: RawNews = self.fetcher.get_json(&self.url, &params)?;
        Ok(raw.articles.into_iter().map(NewsArticle::from).collect())
    }
}

impl ContextProvider for NewsApiProvider {
    fn source(&self) -> ContextSource {
        ContextSource::News
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        let found = self.search()?;
        Ok((!found.is_empty()).then_some(ContextPayload::News(found)))
    }
}
