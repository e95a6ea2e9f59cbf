use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use eventdigest_common::{truncate_to_char_boundary, EventStub};

/// Max retry attempts for the listing fetch.
const FETCH_MAX_ATTEMPTS: u32 = 3;
/// Backoff bounds for listing fetch retries. Actual delay is
/// min(1s * 2^attempt, 10s) plus random jitter (0-1s).
const FETCH_BACKOFF_MIN: Duration = Duration::from_secs(1);
const FETCH_BACKOFF_MAX: Duration = Duration::from_secs(10);

const DESCRIPTION_MAX_BYTES: usize = 500;

/// Relative listing links must start with one of these path prefixes to
/// count as event detail pages; everything else is navigation noise.
const DETAIL_PATH_PREFIXES: &[&str] = &["/event", "/events", "/akce", "/kalendar"];

// --- EventSource trait ---

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn scrape(&self) -> Result<Vec<EventStub>>;
}

/// Scrapes the configured calendar listing page into event stubs.
pub struct ListingScraper {
    url: String,
    http: reqwest::Client,
}

impl ListingScraper {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Fetch the listing page, retrying transport errors and 5xx
    /// responses with exponential backoff. A 4xx response fails fast.
    async fn fetch_page(&self) -> Result<String> {
        let mut last_err = anyhow::anyhow!("Listing fetch not attempted");

        for attempt in 0..FETCH_MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = (FETCH_BACKOFF_MIN * 2u32.pow(attempt - 1)).min(FETCH_BACKOFF_MAX);
                let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                warn!(
                    url = %self.url,
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    "Retrying listing fetch after backoff"
                );
                tokio::time::sleep(backoff + jitter).await;
            }

            match self.http.get(&self.url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.context("Failed to read listing body");
                    }
                    if status.is_server_error() {
                        last_err = anyhow::anyhow!("Listing fetch returned {status}");
                        continue;
                    }
                    anyhow::bail!("Listing fetch returned {status} for {}", self.url);
                }
                Err(e) => {
                    last_err = anyhow::Error::from(e).context("Listing fetch failed");
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl EventSource for ListingScraper {
    async fn scrape(&self) -> Result<Vec<EventStub>> {
        info!(url = %self.url, "Scraping listing page");
        let html = self.fetch_page().await?;
        let stubs = parse_listing(&html, &self.url);
        info!(count = stubs.len(), "Listing parsed");
        Ok(stubs)
    }
}

/// Parse event stubs out of listing HTML. Tries the site-specific
/// list-item strategy first, then falls back to generic card
/// containers. First non-empty result wins.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<EventStub> {
    let document = Html::parse_document(html);

    let stubs = parse_list_items(&document, base_url);
    if !stubs.is_empty() {
        return stubs;
    }
    parse_cards(&document, base_url)
}

/// Primary strategy: list items whose link sits inside a bold/emphasis
/// wrapper, with an optional parenthesized date string after the link.
fn parse_list_items(document: &Html, base_url: &str) -> Vec<EventStub> {
    let item_selector = Selector::parse("li").expect("valid selector");
    let link_selector = Selector::parse("b > a[href], strong > a[href], em > a[href]")
        .expect("valid selector");
    let date_re = regex::Regex::new(r"\(([^)]+)\)").expect("valid regex");

    let mut stubs = Vec::new();

    for item in document.select(&item_selector) {
        let Some(link) = item.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let title = element_text(&link);
        if title.is_empty() {
            continue;
        }

        let Some(url) = resolve_event_url(href, base_url) else {
            continue;
        };

        // Parenthesized text following the link holds the raw date/location.
        let item_text = element_text(&item);
        let date_text = item_text
            .split_once(&title)
            .map(|(_, rest)| rest)
            .and_then(|rest| date_re.captures(rest))
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());

        stubs.push(EventStub {
            title,
            url,
            date_text,
            description: truncate_to_char_boundary(&item_text, DESCRIPTION_MAX_BYTES).to_string(),
        });
    }

    stubs
}

/// Fallback strategy: generic card-like containers with a heading and a
/// link. Captures no date text.
fn parse_cards(document: &Html, base_url: &str) -> Vec<EventStub> {
    let card_selector = Selector::parse(
        "article, .event-card, .event-item, .tribe-events-calendar-list__event",
    )
    .expect("valid selector");
    let heading_selector = Selector::parse("h1, h2, h3, h4").expect("valid selector");
    let link_selector = Selector::parse("a[href]").expect("valid selector");

    let mut stubs = Vec::new();

    for card in document.select(&card_selector) {
        let Some(heading) = card.select(&heading_selector).next() else {
            continue;
        };
        let Some(link) = card.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let title = element_text(&heading);
        if title.is_empty() {
            continue;
        }
        let Some(url) = Url::parse(base_url).ok().and_then(|b| b.join(href).ok()) else {
            continue;
        };

        let card_text = element_text(&card);
        stubs.push(EventStub {
            title,
            url: url.to_string(),
            date_text: None,
            description: truncate_to_char_boundary(&card_text, DESCRIPTION_MAX_BYTES).to_string(),
        });
    }

    stubs
}

/// Resolve a listing href to an absolute URL, applying the navigation
/// noise filter: same-site relative links must point at an event detail
/// path; absolute off-site links always pass.
fn resolve_event_url(href: &str, base_url: &str) -> Option<String> {
    let is_relative = !href.starts_with("http://") && !href.starts_with("https://");
    let base = Url::parse(base_url).ok()?;
    let resolved = base.join(href).ok()?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    if is_relative {
        let path = resolved.path();
        if !DETAIL_PATH_PREFIXES.iter().any(|p| path.starts_with(p)) {
            return None;
        }
    }

    Some(resolved.to_string())
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://datatalk.cz/kalendar-akci/";

    #[test]
    fn test_primary_strategy_extracts_stub() {
        let html = r#"
            <html><body><ul>
                <li><strong><a href="/akce/ai-meetup-praha">AI Meetup Praha</a></strong>
                    (12. 3. 2026, Praha) Networking pro datovou komunitu.</li>
            </ul></body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "AI Meetup Praha");
        assert_eq!(stubs[0].url, "https://datatalk.cz/akce/ai-meetup-praha");
        assert_eq!(stubs[0].date_text.as_deref(), Some("12. 3. 2026, Praha"));
        assert!(stubs[0].description.contains("Networking"));
    }

    #[test]
    fn test_primary_strategy_skips_navigation_links() {
        let html = r#"
            <html><body><ul>
                <li><strong><a href="/o-nas">O nás</a></strong></li>
                <li><strong><a href="/kontakt">Kontakt</a></strong></li>
                <li><strong><a href="/akce/workshop-sql">Workshop SQL</a></strong> (1. 4. 2026)</li>
            </ul></body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "Workshop SQL");
    }

    #[test]
    fn test_primary_strategy_keeps_offsite_links() {
        let html = r#"
            <html><body><ul>
                <li><b><a href="https://konference.example.com/2026">Data Conference</a></b></li>
            </ul></body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].url, "https://konference.example.com/2026");
        assert!(stubs[0].date_text.is_none());
    }

    #[test]
    fn test_items_without_wrapped_link_are_skipped() {
        let html = r#"
            <html><body><ul>
                <li><a href="/akce/plain-link">Plain link without emphasis</a></li>
                <li>Just text, no link at all</li>
            </ul></body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        // Primary yields nothing, and no card containers exist either.
        assert!(stubs.is_empty());
    }

    #[test]
    fn test_fallback_strategy_parses_cards() {
        let html = r#"
            <html><body>
                <article>
                    <h2>Webinar: Intro to dbt</h2>
                    <p>Hands-on session for analytics engineers.</p>
                    <a href="https://datatalk.cz/akce/dbt-webinar">Detail</a>
                </article>
                <div class="event-card">
                    <h3>ML Conference</h3>
                    <a href="/akce/ml-conf">Detail</a>
                </div>
            </body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].title, "Webinar: Intro to dbt");
        assert_eq!(stubs[0].url, "https://datatalk.cz/akce/dbt-webinar");
        assert!(stubs[0].date_text.is_none());
        assert_eq!(stubs[1].url, "https://datatalk.cz/akce/ml-conf");
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        let html = r#"
            <html><body>
                <ul><li><b><a href="/akce/primary">Primary Event</a></b></li></ul>
                <article><h2>Card Event</h2><a href="/akce/card">x</a></article>
            </body></html>
        "#;
        let stubs = parse_listing(html, BASE);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "Primary Event");
    }

    #[test]
    fn test_empty_page_yields_no_stubs() {
        assert!(parse_listing("", BASE).is_empty());
        assert!(parse_listing("<html><body></body></html>", BASE).is_empty());
    }

    #[test]
    fn test_description_is_truncated() {
        let filler = "x".repeat(2000);
        let html = format!(
            r#"<html><body><ul><li><b><a href="/akce/long">Long</a></b> {filler}</li></ul></body></html>"#
        );
        let stubs = parse_listing(&html, BASE);
        assert_eq!(stubs.len(), 1);
        assert!(stubs[0].description.len() <= 500);
    }
}
