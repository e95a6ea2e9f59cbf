//! Structured-data extraction from a fetched detail page.

use std::collections::HashMap;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::blocked;
use crate::markdown::{page_markdown, visible_text_chars};

const MARKDOWN_MAX_BYTES: usize = 3000;

/// Everything the detail fetcher pulls out of one page, computed
/// synchronously so nothing non-Send lives across an await.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub json_ld: Option<Value>,
    pub og_meta: HashMap<String, String>,
    pub markdown: String,
    pub blocked: bool,
}

/// Parse a page and extract JSON-LD, OpenGraph metadata, markdown
/// content, and the blocked classification.
pub fn analyze_page(url: &str, html: &str) -> PageAnalysis {
    let document = Html::parse_document(html);

    let json_ld = extract_event_json_ld(&document);
    let og_meta = extract_og_meta(&document);
    let markdown = page_markdown(&document, url, MARKDOWN_MAX_BYTES);

    let title_selector = Selector::parse("title").expect("valid selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    let blocked = blocked::is_blocked(
        url,
        &title,
        json_ld.is_some(),
        visible_text_chars(&document),
    );

    PageAnalysis {
        json_ld,
        og_meta,
        markdown,
        blocked,
    }
}

/// First Event-typed object across all `application/ld+json` scripts.
/// Checks a direct Event object, then `@graph` members, then top-level
/// array members. Malformed JSON is skipped silently.
pub fn extract_event_json_ld(document: &Html) -> Option<Value> {
    let selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector");

    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(event) = find_event(&data) {
            return Some(event.clone());
        }
    }

    None
}

fn find_event(data: &Value) -> Option<&Value> {
    if is_event(data) {
        return Some(data);
    }
    if let Some(graph) = data.get("@graph").and_then(Value::as_array) {
        if let Some(event) = graph.iter().find(|item| is_event(item)) {
            return Some(event);
        }
    }
    if let Some(items) = data.as_array() {
        if let Some(event) = items.iter().find(|item| is_event(item)) {
            return Some(event);
        }
    }
    None
}

fn is_event(value: &Value) -> bool {
    value.get("@type").and_then(Value::as_str) == Some("Event")
}

/// All `og:*` meta properties, property → content. Entries with empty
/// content are skipped.
pub fn extract_og_meta(document: &Html) -> HashMap<String, String> {
    let selector = Selector::parse(r#"meta[property^="og:"]"#).expect("valid selector");

    let mut meta = HashMap::new();
    for element in document.select(&selector) {
        let Some(property) = element.value().attr("property") else {
            continue;
        };
        let content = element.value().attr("content").unwrap_or_default();
        if !content.is_empty() {
            meta.insert(property.to_string(), content.to_string());
        }
    }
    meta
}
