//! Generation backend: Ollama's `/api/generate`, single-shot or streamed.
//!
//! Configuration precedence for every knob:
//! 1) explicit override (CLI flag),
//! 2) environment variable,
//! 3) built-in default.

use agriaid_providers::http::resolve_timeout;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";
pub const OLLAMA_MODEL_ENV: &str = "OLLAMA_MODEL";
pub const AGRIAID_LLM_TIMEOUT_SECS_ENV: &str = "AGRIAID_LLM_TIMEOUT_SECS";

const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
const DEFAULT_OLLAMA_MODEL: &str = "agriaid";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// How often a waiting stream consumer re-checks its interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("ollama http error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("ollama response has no '{0}' field")]
    MissingField(&'static str),
    #[error("malformed ollama response: {0}")]
    Malformed(String),
    #[error("failed to reach ollama at {url} (is it running?): {message}. Try `ollama serve` or set OLLAMA_HOST")]
    Transport { url: String, message: String },
    #[error("generation interrupted")]
    Interrupted,
    #[error("invalid configuration: {0}")]
    Config(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Add a scheme when missing and drop trailing slashes.
///
/// An empty host falls back to IPv4 loopback rather than `localhost`, which
/// may resolve to ::1 while Ollama only listens on 127.0.0.1.
pub fn normalize_ollama_host(host: &str) -> String {
    let mut host = host.trim().to_string();
    if host.is_empty() {
        host = DEFAULT_OLLAMA_HOST.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("http://{host}");
    }
    host.trim_end_matches('/').to_string()
}

/// Generation timeout: override, then `AGRIAID_LLM_TIMEOUT_SECS`, then 60s.
/// `0` disables the timeout (wait forever).
pub fn llm_timeout(timeout_secs_override: Option<u64>) -> Result<Option<Duration>, GenerationError> {
    resolve_timeout(
        timeout_secs_override,
        AGRIAID_LLM_TIMEOUT_SECS_ENV,
        DEFAULT_LLM_TIMEOUT_SECS,
    )
    .map_err(|e| GenerationError::Config(e.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Normalized base URL, no trailing slash.
    pub host: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn new(host: &str, model: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            host: normalize_ollama_host(host),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_env(
        host_override: Option<&str>,
        model_override: Option<&str>,
        timeout_secs_override: Option<u64>,
    ) -> Result<Self, GenerationError> {
        let host = match host_override {
            Some(h) => h.to_string(),
            None => std::env::var(OLLAMA_HOST_ENV).unwrap_or_default(),
        };
        let model = model_override
            .map(str::to_string)
            .or_else(|| std::env::var(OLLAMA_MODEL_ENV).ok())
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
        Ok(Self::new(&host, model, llm_timeout(timeout_secs_override)?))
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

// =============================================================================
// Backend trait + token stream
// =============================================================================

/// Fragments of a streamed generation, in arrival order.
///
/// Backed by a channel fed from a producer thread. Dropping the stream drops
/// the receiver; the producer notices on its next send and closes the
/// connection.
pub struct TokenStream {
    rx: Receiver<Result<String, GenerationError>>,
}

impl TokenStream {
    pub fn from_channel(rx: Receiver<Result<String, GenerationError>>) -> Self {
        Self { rx }
    }

    /// A finished stream over fixed fragments (fakes and tests).
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let (tx, rx) = mpsc::channel();
        for f in fragments {
            let _ = tx.send(Ok(f.into()));
        }
        Self { rx }
    }

    /// Next fragment, giving up with `Interrupted` as soon as `interrupt`
    /// is raised. `None` once the producer is finished.
    pub fn next_or_interrupt(
        &mut self,
        interrupt: &AtomicBool,
    ) -> Option<Result<String, GenerationError>> {
        loop {
            if interrupt.load(Ordering::SeqCst) {
                return Some(Err(GenerationError::Interrupted));
            }
            match self.rx.recv_timeout(INTERRUPT_POLL) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

impl Iterator for TokenStream {
    type Item = Result<String, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

pub trait GenerationBackend: Send {
    /// Full completion for `prompt`. May be empty; callers decide what an
    /// empty completion means.
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Incremental completion. Status errors surface here, before any
    /// fragment; later failures arrive as `Err` items.
    fn stream(&self, prompt: &str) -> Result<TokenStream, GenerationError>;

    /// Short label for logs and banners.
    fn describe(&self) -> String;
}

// =============================================================================
// Ollama
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    config: BackendConfig,
    client: Client,
}

impl OllamaBackend {
    pub fn new(config: BackendConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn post(&self, prompt: &str, stream: bool) -> Result<Response, GenerationError> {
        let url = self.config.generate_url();
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream,
        };
        tracing::debug!(%url, model = %self.config.model, stream, prompt_chars = prompt.len(), "ollama generate");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| GenerationError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }
        Ok(resp)
    }
}

/// Forward NDJSON fragments until `done`, EOF, or the consumer goes away.
fn pump(resp: Response, url: String, tx: Sender<Result<String, GenerationError>>) {
    for line in BufReader::new(resp).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = tx.send(Err(GenerationError::Transport {
                    url,
                    message: e.to_string(),
                }));
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let chunk: StreamChunk = match serde_json::from_str(&line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable stream line");
                continue;
            }
        };
        if let Some(err) = chunk.error {
            let _ = tx.send(Err(GenerationError::Malformed(format!("ollama reported: {err}"))));
            return;
        }
        if let Some(text) = chunk.response.filter(|t| !t.is_empty()) {
            if tx.send(Ok(text)).is_err() {
                tracing::debug!("stream consumer dropped; closing connection");
                return;
            }
        }
        if chunk.done {
            return;
        }
    }
}

impl GenerationBackend for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let resp = self.post(prompt, false)?;
        let text = resp
            .text()
            .map_err(|e| GenerationError::Malformed(format!("failed to read body: {e}")))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let response = value
            .get("response")
            .ok_or(GenerationError::MissingField("response"))?;
        response
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Malformed("'response' is not a string".to_string()))
    }

    fn stream(&self, prompt: &str) -> Result<TokenStream, GenerationError> {
        let resp = self.post(prompt, true)?;
        let url = self.config.generate_url();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("ollama-stream".to_string())
            .spawn(move || pump(resp, url, tx))
            .map_err(|e| GenerationError::Config(format!("failed to spawn stream reader: {e}")))?;
        Ok(TokenStream::from_channel(rx))
    }

    fn describe(&self) -> String {
        format!("ollama {} @ {}", self.config.model, self.config.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_normalization() {
        assert_eq!(normalize_ollama_host(""), "http://127.0.0.1:11434");
        assert_eq!(normalize_ollama_host("gpu-box:11434/"), "http://gpu-box:11434");
        assert_eq!(
            normalize_ollama_host(" https://ollama.example.ph// "),
            "https://ollama.example.ph"
        );
    }

    #[test]
    fn explicit_overrides_win() {
        let config = BackendConfig::from_env(Some("10.0.0.5:11434"), Some("llama3"), Some(0)).unwrap();
        assert_eq!(config.host, "http://10.0.0.5:11434");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout, None);
        assert_eq!(config.generate_url(), "http://10.0.0.5:11434/api/generate");
    }

    #[test]
    fn timeout_override_and_disable() {
        assert_eq!(llm_timeout(Some(5)).unwrap(), Some(Duration::from_secs(5)));
        assert_eq!(llm_timeout(Some(0)).unwrap(), None);
    }

    #[test]
    fn interrupt_beats_a_silent_producer() {
        let (_tx, rx) = mpsc::channel::<Result<String, GenerationError>>();
        let mut stream = TokenStream::from_channel(rx);
        let flag = AtomicBool::new(true);
        assert!(matches!(
            stream.next_or_interrupt(&flag),
            Some(Err(GenerationError::Interrupted))
        ));
    }

    #[test]
    fn fixed_fragments_then_end() {
        let mut stream = TokenStream::from_fragments(["Mag", "tanim"]);
        let flag = AtomicBool::new(false);
        assert_eq!(stream.next_or_interrupt(&flag).unwrap().unwrap(), "Mag");
        assert_eq!(stream.next_or_interrupt(&flag).unwrap().unwrap(), "tanim");
        assert!(stream.next_or_interrupt(&flag).is_none());
    }

    #[test]
    fn stream_chunk_fields_are_optional() {
        let c: StreamChunk = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(c.done && c.response.is_none());
    }
}
