//! Shared blocking HTTP plumbing and provider settings.
//!
//! Settings resolve with the usual precedence:
//! 1) explicit override,
//! 2) environment variable,
//! 3) built-in default.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::ProviderError;

pub const OPENWEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const AGROMONITORING_API_KEY_ENV: &str = "AGROMONITORING_API_KEY";
pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";
pub const AGRIAID_HTTP_TIMEOUT_SECS_ENV: &str = "AGRIAID_HTTP_TIMEOUT_SECS";
pub const AGRIAID_USER_AGENT_ENV: &str = "AGRIAID_USER_AGENT";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = concat!("agriaid/", env!("CARGO_PKG_VERSION"));

/// Credentials passed through to upstream providers as-is.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openweather: String,
    pub agromonitoring: String,
    pub news: String,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            openweather: read(OPENWEATHER_API_KEY_ENV),
            agromonitoring: read(AGROMONITORING_API_KEY_ENV),
            news: read(NEWS_API_KEY_ENV),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_keys: ApiKeys,
    /// `None` disables the transport timeout.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::default(),
            timeout: Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Result<Self, ProviderError> {
        let user_agent = std::env::var(AGRIAID_USER_AGENT_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Ok(Self {
            api_keys: ApiKeys::from_env(),
            timeout: http_timeout(None)?,
            user_agent,
        })
    }
}

/// A timeout variable that is not whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {var}={value:?} (expected integer seconds; 0 disables)")]
pub struct InvalidTimeout {
    pub var: &'static str,
    pub value: String,
}

/// Resolve a timeout knob: override, then env var `var`, then `default_secs`.
///
/// A blank variable counts as unset. `0` disables the timeout (`None`).
pub fn resolve_timeout(
    override_secs: Option<u64>,
    var: &'static str,
    default_secs: u64,
) -> Result<Option<Duration>, InvalidTimeout> {
    let secs = match override_secs {
        Some(v) => v,
        None => match std::env::var_os(var) {
            Some(raw) => parse_secs(var, &raw.to_string_lossy(), default_secs)?,
            None => default_secs,
        },
    };
    Ok((secs != 0).then(|| Duration::from_secs(secs)))
}

fn parse_secs(var: &'static str, raw: &str, default_secs: u64) -> Result<u64, InvalidTimeout> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default_secs);
    }
    raw.parse::<u64>().map_err(|_| InvalidTimeout {
        var,
        value: raw.to_string(),
    })
}

/// Provider transport timeout (`AGRIAID_HTTP_TIMEOUT_SECS`, default 10s).
pub fn http_timeout(timeout_secs_override: Option<u64>) -> Result<Option<Duration>, ProviderError> {
    resolve_timeout(
        timeout_secs_override,
        AGRIAID_HTTP_TIMEOUT_SECS_ENV,
        DEFAULT_HTTP_TIMEOUT_SECS,
    )
    .map_err(|e| ProviderError::Config(e.to_string()))
}

/// Thin wrapper over a blocking client: one request, status check, decode.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("agriaid")),
        );

        // The blocking client defaults to a 30s timeout; pass ours through
        // explicitly so `None` really disables it.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let body = self.get_text(url, query)?;
        decode(url, &body)
    }

    pub fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        tracing::debug!(url, params = query.len(), "provider GET");
        let resp = self.send(self.client.get(url).query(query), url, |s| (200..300).contains(&s))?;
        read_body(resp, url)
    }

    /// POST `body` as JSON. Only the `expected` status counts as success.
    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
        expected: u16,
    ) -> Result<T, ProviderError> {
        tracing::debug!(url, params = query.len(), expected, "provider POST");
        let request = self.client.post(url).query(query).json(body);
        let resp = self.send(request, url, |s| s == expected)?;
        decode(url, &read_body(resp, url)?)
    }

    fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        accept: impl Fn(u16) -> bool,
    ) -> Result<Response, ProviderError> {
        let resp = request.send().map_err(|e| ProviderError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status().as_u16();
        if !accept(status) {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(resp)
    }
}

fn read_body(resp: Response, url: &str) -> Result<String, ProviderError> {
    resp.text().map_err(|e| ProviderError::Http {
        url: url.to_string(),
        message: format!("failed to read body: {e}"),
    })
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn require_key(
    key: &str,
    provider: &'static str,
    env_var: &'static str,
) -> Result<(), ProviderError> {
    if key.trim().is_empty() {
        return Err(ProviderError::MissingApiKey { provider, env_var });
    }
    Ok(())
}
