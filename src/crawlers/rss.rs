use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CrawlContext, Crawler};
use crate::error::Result;
use crate::parser::{Article, FeedParser};
use crate::sources::SiteConfig;

// content_selector names a feed field for feeds, so article pages use this
const ARTICLE_PAGE_SELECTOR: &str = "article";

pub struct RssCrawler {
    context: Arc<CrawlContext>,
}

impl RssCrawler {
    pub fn new(context: Arc<CrawlContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Crawler for RssCrawler {
    async fn get_content(&self, site: &SiteConfig) -> Result<String> {
        self.context.fetcher.fetch_text(&site.url, &site.headers).await
    }

    fn parse_articles(&self, payload: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        FeedParser::parse(payload, site, limit)
    }

    async fn get_article_content(&self, article: &Article, site: &SiteConfig) -> Result<Option<String>> {
        if site.use_rss_content {
            if let Some(content) = &article.content {
                return Ok(Some(content.clone()));
            }
        }

        let html = match self.context.fetcher.fetch_text(&article.link, &site.headers).await {
            Ok(html) => html,
            Err(e) if article.content.is_some() => {
                warn!("Could not fetch {}, using feed content: {}", article.link, e);
                return Ok(article.content.clone());
            }
            Err(e) => return Err(e),
        };

        match self.context.parser.extract_content(&html, ARTICLE_PAGE_SELECTOR)? {
            Some(content) => Ok(Some(content)),
            None => {
                debug!("No article body at {}, using feed content", article.link);
                Ok(article.content.clone())
            }
        }
    }
}
