use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::{CrawlError, Result};
use crate::parser::Article;
use crate::sources::SiteConfig;

const SKIPPED_ANCESTORS: [&str; 4] = ["script", "style", "iframe", "nav"];

/// Pulls article links from listing pages and body text from article pages.
pub struct ListingParser {
    paragraph_selector: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            paragraph_selector: parse_selector("p")?,
        })
    }

    /// Up to `limit` articles from a listing page.
    pub fn parse_listing(&self, html: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        let article_selector = parse_selector(&site.article_selector)?;
        let title_selector = parse_selector(&site.title_selector)?;
        let link_selector = if site.links_to_self() {
            None
        } else {
            Some(parse_selector(&site.link_selector)?)
        };

        let document = Html::parse_document(html);
        let candidates: Vec<ElementRef> = document.select(&article_selector).collect();
        debug!("Found {} candidate elements at {}", candidates.len(), site.url);

        let mut articles = Vec::new();
        for element in candidates.into_iter().take(limit) {
            let title = element
                .select(&title_selector)
                .next()
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
                .unwrap_or_default();

            let href = match &link_selector {
                Some(selector) => element
                    .select(selector)
                    .next()
                    .and_then(|l| l.value().attr("href")),
                None => element.value().attr("href"),
            };

            let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) else {
                debug!("Missing link element for article in {}", site.url);
                continue;
            };
            if title.is_empty() {
                debug!("Missing title for article {} in {}", href, site.url);
                continue;
            }

            match resolve_link(site.link_base(), href) {
                Some(link) => articles.push(Article::new(title, link)),
                None => warn!("Could not resolve link '{}' against {}", href, site.link_base()),
            }
        }

        Ok(articles)
    }

    /// Paragraph text inside the first `content_selector` match.
    pub fn extract_content(&self, html: &str, content_selector: &str) -> Result<Option<String>> {
        let selector = parse_selector(content_selector)?;
        let document = Html::parse_document(html);

        let Some(container) = document.select(&selector).next() else {
            debug!("No element matches content selector '{}'", content_selector);
            return Ok(None);
        };

        let content = self.paragraph_text(container);
        Ok((!content.is_empty()).then_some(content))
    }

    fn paragraph_text(&self, container: ElementRef) -> String {
        container
            .select(&self.paragraph_selector)
            .filter(|p| !inside_skipped_element(p))
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Readable text of an HTML fragment such as feed content. Uses paragraphs
/// when the fragment has any, otherwise every text node.
pub fn html_to_text(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    if let Ok(p) = Selector::parse("p") {
        let paragraphs: Vec<String> = document
            .select(&p)
            .filter(|p| !inside_skipped_element(p))
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join(" ");
        }
    }

    let text: Vec<&str> = document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let skipped = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| SKIPPED_ANCESTORS.contains(&e.name()))
                    .unwrap_or(false)
            });
            (!skipped).then_some(&**text)
        })
        .collect();
    collapse_whitespace(&text.join(" "))
}

pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inside_skipped_element(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|e| SKIPPED_ANCESTORS.contains(&e.name()))
            .unwrap_or(false)
    })
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::ParseError(format!("Invalid selector '{}': {}", selector, e)).into())
}
