use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{CrawlContext, Crawler};
use crate::error::{CrawlError, Result};
use crate::parser::{ApiParser, Article};
use crate::sources::SiteConfig;

/// JSON listing endpoints.
pub struct ApiCrawler {
    context: Arc<CrawlContext>,
}

impl ApiCrawler {
    pub fn new(context: Arc<CrawlContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Crawler for ApiCrawler {
    async fn get_content(&self, site: &SiteConfig) -> Result<String> {
        let value = self.context.fetcher.fetch_json(&site.url, &site.headers).await?;
        Ok(value.to_string())
    }

    fn parse_articles(&self, payload: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        let data: Value = serde_json::from_str(payload)
            .map_err(|e| CrawlError::ParseError(format!("Invalid API payload from {}: {}", site.url, e)))?;
        ApiParser::parse(&data, site, limit)
    }

    async fn get_article_content(&self, article: &Article, site: &SiteConfig) -> Result<Option<String>> {
        if let Some(content) = &article.content {
            return Ok(Some(content.clone()));
        }
        let data = self.context.fetcher.fetch_json(&article.link, &site.headers).await?;
        Ok(ApiParser::article_content(&data, site))
    }
}
