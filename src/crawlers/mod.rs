mod api;
mod blog;
mod rss;


pub use api::ApiCrawler;
pub use blog::BlogCrawler;
pub use rss::RssCrawler;

use async_trait::async_trait;
use std::sync::Arc;

use crate::browser::PageRenderer;
use crate::error::Result;
use crate::fetcher::HttpFetcher;
use crate::parser::{Article, ListingParser};
use crate::sources::{SiteConfig, SiteKind};

/// One strategy for turning a site into articles and article bodies.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Raw listing payload: HTML, feed XML or JSON text.
    async fn get_content(&self, site: &SiteConfig) -> Result<String>;

    fn parse_articles(&self, payload: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>>;

    /// Body text of one article, `None` when the site has nothing usable.
    async fn get_article_content(&self, article: &Article, site: &SiteConfig) -> Result<Option<String>>;
}

/// Clients shared by every crawler of a run.
pub struct CrawlContext {
    pub fetcher: HttpFetcher,
    pub renderer: Option<Arc<dyn PageRenderer>>,
    pub parser: ListingParser,
}

impl CrawlContext {
    pub fn new(fetcher: HttpFetcher, renderer: Option<Arc<dyn PageRenderer>>) -> Result<Self> {
        Ok(Self {
            fetcher,
            renderer,
            parser: ListingParser::new()?,
        })
    }
}

pub fn crawler_for(kind: SiteKind, context: Arc<CrawlContext>) -> Box<dyn Crawler> {
    match kind {
        SiteKind::Blog => Box::new(BlogCrawler::new(context)),
        SiteKind::Rss => Box::new(RssCrawler::new(context)),
        SiteKind::Api => Box::new(ApiCrawler::new(context)),
    }
}
