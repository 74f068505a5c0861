use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{CrawlError, Result};

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

pub const CUSTOM_CATEGORY: &str = "custom";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    #[default]
    Blog,
    Rss,
    Api,
}

/// How to read a JSON listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiMapping {
    pub items_field: String,
    pub title_field: String,
    pub link_field: String,
    /// `{base}` is the site base url, `{value}` the value of `link_field`
    pub link_template: String,
    pub content_field: String,
}

impl Default for ApiMapping {
    fn default() -> Self {
        Self {
            items_field: "items".to_string(),
            title_field: "title".to_string(),
            link_field: "slug".to_string(),
            link_template: "{base}/{value}".to_string(),
            content_field: "content".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    pub url: String,
    #[serde(default)]
    pub kind: SiteKind,
    #[serde(default = "default_article_selector")]
    pub article_selector: String,
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    /// `"self"` when the article element is itself the link
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default)]
    pub content_selector: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub needs_js: bool,
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default)]
    pub use_rss_content: bool,
    #[serde(default)]
    pub rss_content_field: Option<String>,
    #[serde(default)]
    pub api: Option<ApiMapping>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_article_selector() -> String {
    "article".to_string()
}

fn default_title_selector() -> String {
    "h2".to_string()
}

fn default_link_selector() -> String {
    "a".to_string()
}

impl SiteConfig {
    /// Base used to resolve relative links: `base_url` if set, else the site url.
    pub fn link_base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.url)
    }

    pub fn links_to_self(&self) -> bool {
        self.link_selector.trim() == "self"
    }

    /// Feed element holding article content, honouring `rss_content_field`.
    pub fn feed_content_field(&self) -> &str {
        match self.rss_content_field.as_deref() {
            Some(field) => field,
            None if !self.content_selector.is_empty() => self.content_selector.as_str(),
            None => "description",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogCategory {
    name: String,
    #[serde(default)]
    sites: Vec<CatalogSite>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogSite {
    name: String,
    #[serde(flatten)]
    config: SiteConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(rename = "category")]
    categories: Vec<CatalogCategory>,
}

/// Sites chosen for one crawl run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub sites: Vec<(String, SiteConfig)>,
    pub unknown: Vec<String>,
}

/// Named categories of sites, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<(String, Vec<(String, SiteConfig)>)>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| CrawlError::ConfigError(format!("Failed to parse site catalog: {}", e)))?;

        let categories = file
            .categories
            .into_iter()
            .map(|category| {
                let sites = category
                    .sites
                    .into_iter()
                    .map(|site| (site.name, site.config))
                    .collect();
                (category.name.to_lowercase(), sites)
            })
            .collect();

        Ok(Self { categories })
    }

    /// Add user-defined sites under the `custom` category.
    pub fn with_custom_sites(mut self, sites: &BTreeMap<String, SiteConfig>) -> Self {
        if sites.is_empty() {
            return self;
        }
        let custom: Vec<(String, SiteConfig)> = sites
            .iter()
            .map(|(name, site)| (name.clone(), site.clone()))
            .collect();
        self.categories.retain(|(name, _)| name != CUSTOM_CATEGORY);
        self.categories.push((CUSTOM_CATEGORY.to_string(), custom));
        self
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn sites(&self, category: &str) -> Option<&[(String, SiteConfig)]> {
        let wanted = category.trim().to_lowercase();
        self.categories
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, sites)| sites.as_slice())
    }

    /// Collect the sites of every requested category. A site listed twice
    /// keeps its first position and takes the later definition.
    pub fn select(&self, requested: &[String]) -> Selection {
        let mut selection = Selection::default();

        for raw in requested {
            let category = raw.trim();
            if category.is_empty() {
                continue;
            }
            match self.sites(category) {
                Some(sites) => {
                    debug!("Selected category '{}' with {} sites", category, sites.len());
                    for (name, site) in sites {
                        match selection.sites.iter_mut().find(|(existing, _)| existing == name) {
                            Some(entry) => entry.1 = site.clone(),
                            None => selection.sites.push((name.clone(), site.clone())),
                        }
                    }
                }
                None => {
                    warn!("Unknown category '{}', skipping", category);
                    selection.unknown.push(category.to_string());
                }
            }
        }

        selection
    }
}

/// Split a comma-separated category list as typed at the prompt.
pub fn parse_category_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}
