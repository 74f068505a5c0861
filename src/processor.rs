use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::CrawlConfig;
use crate::crawlers::{crawler_for, CrawlContext};
use crate::error::recovery_for;
use crate::nlp::Digester;
use crate::parser::{Article, ProcessedArticle};
use crate::sources::SiteConfig;

/// Runs the fetch, parse, extract and summarize pipeline for sites.
pub struct SiteProcessor {
    context: Arc<CrawlContext>,
    digester: Arc<Digester>,
    articles_per_site: usize,
    article_delay_ms: (u64, u64),
    max_concurrent_sites: usize,
    show_progress: bool,
}

impl SiteProcessor {
    pub fn new(context: Arc<CrawlContext>, digester: Arc<Digester>, crawl: &CrawlConfig) -> Self {
        Self {
            context,
            digester,
            articles_per_site: crawl.articles_per_site,
            article_delay_ms: crawl.article_delay_ms,
            max_concurrent_sites: crawl.max_concurrent_sites.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Crawl one site. Failures are logged and yield fewer (or no) articles.
    pub async fn process_site(&self, name: &str, site: &SiteConfig) -> Vec<ProcessedArticle> {
        info!("Processing site: {}", name);
        let crawler = crawler_for(site.kind, self.context.clone());

        let payload = match crawler.get_content(site).await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Error processing site {}: {}", name, e);
                return Vec::new();
            }
        };

        let articles = match crawler.parse_articles(&payload, site, self.articles_per_site) {
            Ok(articles) => articles,
            Err(e) => {
                error!("Error parsing articles from {}: {}", name, e);
                return Vec::new();
            }
        };
        if articles.is_empty() {
            warn!("No articles found on {}", name);
            return Vec::new();
        }
        info!("Found {} articles on {}", articles.len(), name);

        let mut processed = Vec::new();
        for (i, article) in articles.iter().enumerate() {
            if i > 0 {
                self.pause_between_articles().await;
            }

            let content = match crawler.get_article_content(article, site).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    warn!("No content for article: {}", article.title);
                    continue;
                }
                Err(e) => {
                    error!(
                        "Error fetching article {} ({:?}): {}",
                        article.link,
                        recovery_for(e.as_ref()),
                        e
                    );
                    continue;
                }
            };

            match self.digest(name, article, &content).await {
                Some(result) => processed.push(result),
                None => debug!("Skipped article: {}", article.title),
            }
        }

        info!("Processed {} articles from {}", processed.len(), name);
        processed
    }

    async fn digest(&self, site_name: &str, article: &Article, content: &str) -> Option<ProcessedArticle> {
        match self.digester.summarize_content(content).await {
            Ok(Some(digest)) => Some(ProcessedArticle {
                id: ProcessedArticle::link_id(&article.link),
                site: site_name.to_string(),
                title: article.title.clone(),
                link: article.link.clone(),
                summary_en: digest.summary.en,
                summary_zh: digest.summary.zh,
                key_points_en: digest.key_points.en,
                key_points_zh: digest.key_points.zh,
                timestamp: Utc::now(),
            }),
            Ok(None) => {
                info!("Content too short to summarize: {}", article.title);
                None
            }
            Err(e) => {
                error!("Error summarizing {}: {}", article.link, e);
                None
            }
        }
    }

    async fn pause_between_articles(&self) {
        let (min, max) = self.article_delay_ms;
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Crawl every site with bounded concurrency. Results follow site order
    /// and an article whose link was already seen is dropped.
    pub async fn process_all(&self, sites: &[(String, SiteConfig)]) -> Vec<ProcessedArticle> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_sites));
        let progress = self.progress_bar(sites.len() as u64);

        let tasks = sites.iter().map(|(name, site)| {
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            async move {
                let _permit = semaphore.acquire().await.ok();
                let articles = self.process_site(name, site).await;
                progress.set_message(name.clone());
                progress.inc(1);
                articles
            }
        });
        let per_site = join_all(tasks).await;
        progress.finish_with_message("done");

        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for article in per_site.into_iter().flatten() {
            if seen.insert(article.link.clone()) {
                all.push(article);
            } else {
                debug!("Dropping duplicate article {}", article.link);
            }
        }

        info!("Collected {} articles from {} sites", all.len(), sites.len());
        all
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} sites {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }
}
