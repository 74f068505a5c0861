use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CrawlError, Result};
use crate::parser::html_parser::{collapse_whitespace, html_to_text, resolve_link};
use crate::parser::Article;
use crate::sources::SiteConfig;

/// Reads article listings from JSON APIs.
pub struct ApiParser;

impl ApiParser {
    pub fn parse(data: &Value, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        let mapping = site.api.clone().unwrap_or_default();

        let items = lookup(data, &mapping.items_field)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CrawlError::ParseError(format!(
                    "API response from {} has no '{}' array",
                    site.url, mapping.items_field
                ))
            })?;
        debug!("API listing {} returned {} items", site.url, items.len());

        let base = site.link_base().trim_end_matches('/');
        let mut articles = Vec::new();
        for item in items.iter().take(limit) {
            let title = lookup(item, &mapping.title_field)
                .and_then(Value::as_str)
                .map(collapse_whitespace)
                .unwrap_or_default();
            let value = lookup(item, &mapping.link_field)
                .and_then(scalar_to_string)
                .unwrap_or_default();

            if title.is_empty() || value.is_empty() {
                debug!("Skipping API item without title or link");
                continue;
            }

            let link = if value.starts_with("http://") || value.starts_with("https://") {
                value
            } else {
                let expanded = mapping
                    .link_template
                    .replace("{base}", base)
                    .replace("{value}", value.trim_start_matches('/'));
                resolve_link(site.link_base(), &expanded).unwrap_or(expanded)
            };

            let content = lookup(item, &mapping.content_field)
                .and_then(Value::as_str)
                .map(html_to_text);

            info!("Found article: {}", title);
            articles.push(Article::new(title, link).with_content(content));
        }

        Ok(articles)
    }

    /// Body text of a single-article API response.
    pub fn article_content(data: &Value, site: &SiteConfig) -> Option<String> {
        let mapping = site.api.clone().unwrap_or_default();
        lookup(data, &mapping.content_field)
            .and_then(Value::as_str)
            .map(html_to_text)
            .filter(|c| !c.is_empty())
    }
}

/// Dotted path lookup, e.g. `data.posts`.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ApiMapping, SiteConfig, SiteKind};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn api_site(mapping: Option<ApiMapping>) -> SiteConfig {
        SiteConfig {
            url: "https://api.example.com/v1/posts".to_string(),
            kind: SiteKind::Api,
            article_selector: String::new(),
            title_selector: String::new(),
            link_selector: String::new(),
            content_selector: String::new(),
            base_url: Some("https://example.com/blog".to_string()),
            needs_js: false,
            wait_for: None,
            use_rss_content: false,
            rss_content_field: None,
            api: mapping,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_parse_default_mapping() {
        let data = json!({
            "items": [
                {"title": "GPT update", "slug": "gpt-update", "content": "<p>Body</p>"},
                {"title": "", "slug": "empty-title"},
                {"title": "External", "slug": "https://elsewhere.example.com/post"},
            ]
        });

        let articles = ApiParser::parse(&data, &api_site(None), 10).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].link, "https://example.com/blog/gpt-update");
        assert_eq!(articles[0].content.as_deref(), Some("Body"));
        assert_eq!(articles[1].link, "https://elsewhere.example.com/post");
        assert!(articles[1].content.is_none());
    }

    #[test]
    fn test_parse_nested_mapping() {
        let data = json!({"data": {"posts": [
            {"headline": "Nested", "id": 42, "body": {"html": "text"}},
        ]}});
        let mapping = ApiMapping {
            items_field: "data.posts".to_string(),
            title_field: "headline".to_string(),
            link_field: "id".to_string(),
            link_template: "{base}/posts/{value}".to_string(),
            content_field: "body.html".to_string(),
        };

        let articles = ApiParser::parse(&data, &api_site(Some(mapping)), 10).unwrap();
        assert_eq!(articles[0].link, "https://example.com/blog/posts/42");
        assert_eq!(articles[0].content.as_deref(), Some("text"));
    }

    #[test]
    fn test_missing_items_is_parse_error() {
        let err = ApiParser::parse(&json!({"posts": []}), &api_site(None), 5).unwrap_err();
        assert!(err.to_string().contains("no 'items' array"));
    }

    #[test]
    fn test_article_content() {
        let site = api_site(None);
        assert_eq!(
            ApiParser::article_content(&json!({"content": "Hello <b>there</b>"}), &site).as_deref(),
            Some("Hello there")
        );
        assert!(ApiParser::article_content(&json!({"content": ""}), &site).is_none());
    }
}
