use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::UserAgentGenerator;
use crate::config::Config;
use crate::error::{CrawlError, Result};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";

/// Retry and pacing knobs for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub attempts: u32,
    pub delay_range_ms: (u64, u64),
    /// Base of the exponential backoff between attempts
    pub backoff_base: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.crawl.retry_attempts.max(1),
            delay_range_ms: config.crawl.fetch_delay_ms,
            backoff_base: Duration::from_secs(1),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

/// HTTP client shared by every crawler.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agents: UserAgentGenerator,
    policy: FetchPolicy,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout()?)
            .danger_accept_invalid_certs(config.network.accept_invalid_certs);

        if let Some(proxy_url) = &config.network.proxy_url {
            let mut proxy = Proxy::all(proxy_url)
                .map_err(|e| CrawlError::ConfigError(format!("Invalid proxy '{}': {}", proxy_url, e)))?;
            if let (Some(user), Some(pass)) = (&config.network.proxy_username, &config.network.proxy_password) {
                proxy = proxy.basic_auth(user, pass);
            }
            info!("Routing requests through proxy {}", proxy_url);
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| CrawlError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agents: UserAgentGenerator::new(config.network.randomize_user_agents),
            policy: FetchPolicy::from_config(config),
        })
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a page as text.
    pub async fn fetch_text(&self, url: &str, extra_headers: &BTreeMap<String, String>) -> Result<String> {
        let headers = self.build_headers(HTML_ACCEPT, extra_headers)?;
        self.get_with_retries(url, headers).await
    }

    /// GET a JSON document. Bodies that are not JSON fail without retrying.
    pub async fn fetch_json(&self, url: &str, extra_headers: &BTreeMap<String, String>) -> Result<Value> {
        let headers = self.build_headers(JSON_ACCEPT, extra_headers)?;
        let body = self.get_with_retries(url, headers).await?;
        serde_json::from_str(&body).map_err(|e| {
            CrawlError::ParseError(format!("Response from {} is not valid JSON: {}", url, e)).into()
        })
    }

    async fn get_with_retries(&self, url: &str, headers: HeaderMap) -> Result<String> {
        self.pace().await;

        let mut last_error = String::new();
        for attempt in 0..self.policy.attempts {
            match self.get_once(url, headers.clone()).await {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) => {
                    last_error = e;
                    if attempt + 1 < self.policy.attempts {
                        let wait = self.policy.backoff(attempt);
                        warn!("Fetching {} failed (attempt {}): {}, retrying in {:?}", url, attempt + 1, last_error, wait);
                        sleep(wait).await;
                    }
                }
            }
        }

        error!("Error fetching {}: {}", url, last_error);
        Err(CrawlError::NetworkError(format!("Failed to fetch {}: {}", url, last_error)).into())
    }

    async fn get_once(&self, url: &str, headers: HeaderMap) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(format!("HTTP {}: {}", status, snippet));
        }

        response.text().await.map_err(|e| e.to_string())
    }

    /// Random pause before each request so sites are not hammered.
    async fn pace(&self) {
        let (min, max) = self.policy.delay_range_ms;
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        sleep(Duration::from_millis(delay)).await;
    }

    fn build_headers(&self, accept: &str, extra: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agents.user_agent()));
        headers.insert(ACCEPT, HeaderValue::from_str(accept).map_err(|e| CrawlError::NetworkError(e.to_string()))?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CrawlError::ConfigError(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CrawlError::ConfigError(format!("Invalid header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fast_fetcher(attempts: u32) -> HttpFetcher {
        HttpFetcher::new(&Config::default())
            .unwrap()
            .with_policy(FetchPolicy {
                attempts,
                delay_range_ms: (0, 0),
                backoff_base: Duration::from_millis(1),
            })
    }

    #[tokio::test]
    async fn test_fetch_text_sends_browser_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/blog")
                    .header_exists("user-agent")
                    .header("accept-language", "en-US,en;q=0.9")
                    .header("x-site", "demo");
                then.status(200).body("<html>ok</html>");
            })
            .await;

        let mut extra = BTreeMap::new();
        extra.insert("X-Site".to_string(), "demo".to_string());

        let body = fast_fetcher(1).fetch_text(&server.url("/blog"), &extra).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_retries_then_fails() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/down");
                then.status(503).body("unavailable");
            })
            .await;

        let err = fast_fetcher(3)
            .fetch_text(&server.url("/down"), &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Network error"));
        assert!(err.to_string().contains("503"));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api").header("accept", "application/json");
                then.status(200).json_body(serde_json::json!({"items": [1, 2]}));
            })
            .await;

        let value = fast_fetcher(1).fetch_json(&server.url("/api"), &BTreeMap::new()).await.unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_json_rejects_html() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let err = fast_fetcher(3).fetch_json(&server.url("/api"), &BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        mock.assert_hits_async(1).await;
    }

    #[test]
    fn test_invalid_extra_header_is_config_error() {
        let fetcher = fast_fetcher(1);
        let mut extra = BTreeMap::new();
        extra.insert("bad header".to_string(), "x".to_string());
        let err = fetcher.build_headers(HTML_ACCEPT, &extra).unwrap_err();
        assert!(err.to_string().contains("Invalid header name"));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = FetchPolicy {
            attempts: 3,
            delay_range_ms: (0, 0),
            backoff_base: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_proxy_config() {
        let mut config = Config::default();
        config.network.proxy_url = Some("http://proxy.example.com:8010".to_string());
        config.network.proxy_username = Some("user".to_string());
        config.network.proxy_password = Some("pass".to_string());
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
