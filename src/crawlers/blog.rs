use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CrawlContext, Crawler};
use crate::error::{recovery_for, RecoveryStrategy, Result};
use crate::parser::Article;
use crate::sources::SiteConfig;

const DEFAULT_CONTENT_SELECTOR: &str = "body";

/// HTML listing pages, rendered in the browser when the site needs it.
pub struct BlogCrawler {
    context: Arc<CrawlContext>,
}

impl BlogCrawler {
    pub fn new(context: Arc<CrawlContext>) -> Self {
        Self { context }
    }

    async fn fetch_page(&self, url: &str, site: &SiteConfig) -> Result<String> {
        if let (true, Some(renderer)) = (site.needs_js, &self.context.renderer) {
            match renderer.render(url, site.wait_for.as_deref()).await {
                Ok(html) => return Ok(html),
                Err(e) if recovery_for(e.as_ref()) == Some(RecoveryStrategy::FallbackToHttp) => {
                    warn!("Rendering {} failed, falling back to HTTP: {}", url, e);
                }
                Err(e) => return Err(e),
            }
        }
        self.context.fetcher.fetch_text(url, &site.headers).await
    }
}

#[async_trait]
impl Crawler for BlogCrawler {
    async fn get_content(&self, site: &SiteConfig) -> Result<String> {
        self.fetch_page(&site.url, site).await
    }

    fn parse_articles(&self, payload: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        self.context.parser.parse_listing(payload, site, limit)
    }

    async fn get_article_content(&self, article: &Article, site: &SiteConfig) -> Result<Option<String>> {
        if let Some(content) = &article.content {
            return Ok(Some(content.clone()));
        }

        let html = self.fetch_page(&article.link, site).await?;
        let selector = if site.content_selector.trim().is_empty() {
            DEFAULT_CONTENT_SELECTOR
        } else {
            site.content_selector.as_str()
        };
        let content = self.context.parser.extract_content(&html, selector)?;
        if content.is_none() {
            debug!("No content found at {}", article.link);
        }
        Ok(content)
    }
}
