use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{CrawlError, Result};
use crate::parser::html_parser::{collapse_whitespace, html_to_text, resolve_link};
use crate::parser::Article;
use crate::sources::SiteConfig;

// fallback order when the configured content field is absent
const CONTENT_FIELDS: [&str; 4] = ["content:encoded", "content", "description", "summary"];

/// One `<item>` (RSS) or `<entry>` (Atom) before interpretation.
#[derive(Debug, Default)]
struct RawEntry {
    fields: HashMap<String, String>,
    /// `(rel, href)` from Atom-style `<link href=".."/>` elements
    links: Vec<(Option<String>, String)>,
}

impl RawEntry {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn link(&self) -> Option<&str> {
        if let Some(link) = self.field("link") {
            return Some(link.trim());
        }
        self.links
            .iter()
            .find(|(rel, _)| rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| self.links.first())
            .map(|(_, href)| href.as_str())
            .or_else(|| self.field("id").filter(|id| id.starts_with("http")))
    }

    fn content(&self, preferred: &str) -> Option<&str> {
        let preferred = match preferred {
            "content_encoded" | "encoded" => "content:encoded",
            other => other,
        };
        std::iter::once(preferred)
            .chain(CONTENT_FIELDS)
            .find_map(|name| self.field(name))
    }
}

/// RSS 2.0 and Atom feed reader.
pub struct FeedParser;

impl FeedParser {
    pub fn parse(xml: &str, site: &SiteConfig, limit: usize) -> Result<Vec<Article>> {
        let entries = read_entries(xml)?;
        debug!("Feed {} contains {} entries", site.url, entries.len());

        let title_field = if site.title_selector.is_empty() {
            "title"
        } else {
            site.title_selector.as_str()
        };
        let content_field = site.feed_content_field();

        let mut articles = Vec::new();
        for entry in &entries {
            if articles.len() >= limit {
                break;
            }
            let title = entry.field(title_field).map(plain_text).unwrap_or_default();
            let Some(link) = entry.link().and_then(|l| resolve_link(site.link_base(), l)) else {
                debug!("Skipping feed entry without link: {}", title);
                continue;
            };
            if title.is_empty() {
                debug!("Skipping feed entry without title: {}", link);
                continue;
            }

            let content = entry.content(content_field).map(html_to_text);
            articles.push(Article::new(title, link).with_content(content));
        }

        Ok(articles)
    }
}

fn read_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    // element depth below the open item/entry
    let mut depth = 0usize;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                let Some(entry) = current.as_mut() else {
                    if local == "item" || local == "entry" {
                        current = Some(RawEntry::default());
                        depth = 0;
                    }
                    continue;
                };
                depth += 1;
                if depth == 1 {
                    if local == "link" {
                        push_link(entry, &e);
                    }
                    field = Some(qualified_name(&e));
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    if depth == 0 && local_name(&e) == "link" {
                        push_link(entry, &e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    append_field(entry, name, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    append_field(entry, name, &text);
                }
            }
            Ok(Event::End(_)) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                        field = None;
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            field = None;
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CrawlError::ParseError(format!(
                    "Invalid feed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
                .into())
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn push_link(entry: &mut RawEntry, element: &BytesStart) {
    let mut rel = None;
    let mut href = None;
    for attr in element.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match attr.key.as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    if let Some(href) = href.filter(|h| !h.is_empty()) {
        entry.links.push((rel, href));
    }
}

fn append_field(entry: &mut RawEntry, name: &str, text: &str) {
    let value = entry.fields.entry(name.to_string()).or_default();
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(text);
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).to_string()
}

fn qualified_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).to_string()
}

fn plain_text(text: &str) -> String {
    if text.contains('<') {
        html_to_text(text)
    } else {
        collapse_whitespace(text)
    }
}
