use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use thiserror::Error;
use ts_core::QuoteSet;

/// Outbound request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.67",
];

/// Pick a desktop browser User-Agent at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quote api returned status {0}")]
    Status(u16),
    #[error("malformed quote response: {0}")]
    Malformed(String),
    #[error("quote response has no bars")]
    Empty,
}

impl QuoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, QuoteError::Http(e) if e.is_timeout())
    }
}

#[derive(Debug, Clone)]
pub struct QuoteSourceConfig {
    /// Prefix the asset identifier is appended to.
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl QuoteSourceConfig {
    /// Config with a User-Agent picked once, here, for the life of the client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: random_user_agent().to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Anything that can produce recent bars for an asset.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, asset: &str, timeframe: Option<&str>) -> Result<QuoteSet, QuoteError>;
}

/// Quote API over HTTP. One `reqwest::Client` is built up front and reused.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    config: QuoteSourceConfig,
    http: reqwest::Client,
}

impl HttpQuoteSource {
    pub fn new(config: QuoteSourceConfig) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &QuoteSourceConfig {
        &self.config
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self, asset: &str, timeframe: Option<&str>) -> Result<QuoteSet, QuoteError> {
        let url = quote_url(&self.config.base_url, asset, timeframe);
        tracing::debug!(%url, "fetching quotes");
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(QuoteError::Status(resp.status().as_u16()));
        }
        let body = resp.bytes().await?;
        decode_quote_set(&body)
    }
}

/// `{base}{asset}.` with `/{timeframe}` appended when one is given.
pub fn quote_url(base_url: &str, asset: &str, timeframe: Option<&str>) -> String {
    let mut url = format!("{base_url}{asset}.");
    if let Some(tf) = timeframe.map(str::trim).filter(|tf| !tf.is_empty()) {
        url.push('/');
        url.push_str(tf);
    }
    url
}

/// Decode a response body. A body that is not the expected shape, or that
/// carries no bars, is an error for this request only.
pub fn decode_quote_set(body: &[u8]) -> Result<QuoteSet, QuoteError> {
    let quotes: QuoteSet =
        serde_json::from_slice(body).map_err(|e| QuoteError::Malformed(e.to_string()))?;
    if quotes.bars.is_empty() {
        return Err(QuoteError::Empty);
    }
    Ok(quotes)
}
