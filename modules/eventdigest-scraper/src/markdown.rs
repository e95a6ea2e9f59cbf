//! Main-content extraction and HTML → markdown conversion.

use scraper::{ElementRef, Html, Selector};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};

use eventdigest_common::truncate_to_char_boundary;

/// Subtrees dropped from the content root before conversion.
const NOISE_TAGS: &[&str] = &["nav", "footer", "header", "script", "style"];

/// Render a page's main content as markdown, truncated to `max_bytes`.
/// Content root is the first of `<main>`, `<article>`, `<body>`;
/// nav/footer/header/script/style subtrees are removed first.
pub fn page_markdown(document: &Html, url: &str, max_bytes: usize) -> String {
    let Some(root) = content_root(document) else {
        return String::new();
    };

    let mut cleaned = String::new();
    write_clean_html(root, &mut cleaned);

    let markdown = html_to_markdown(cleaned.as_bytes(), Some(url));
    truncate_to_char_boundary(markdown.trim(), max_bytes).to_string()
}

/// Visible character count of the page body with noise subtrees
/// excluded. Used by the thin-content blocked heuristic.
pub fn visible_text_chars(document: &Html) -> usize {
    let body = Selector::parse("body").expect("valid selector");
    let Some(root) = document.select(&body).next() else {
        return 0;
    };
    let mut text = String::new();
    collect_clean_text(root, &mut text);
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .count()
}

fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("main, article, body").expect("valid selector");
    for name in ["main", "article", "body"] {
        if let Some(el) = document
            .select(&selector)
            .find(|e| e.value().name() == name)
        {
            return Some(el);
        }
    }
    None
}

/// Re-serialize an element subtree, dropping noise elements.
fn write_clean_html(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if NOISE_TAGS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (key, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
    out.push('>');

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_clean_html(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&escape_text(text));
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn collect_clean_text(element: ElementRef, out: &mut String) {
    if NOISE_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_clean_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert HTML bytes to markdown.
fn html_to_markdown(html: &[u8], url: Option<&str>) -> String {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: false,
        main_content: false,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    transform_content_input(input, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://datatalk.cz/akce/test";

    #[test]
    fn test_noise_subtrees_are_stripped() {
        let html = Html::parse_document(
            r#"
            <html><body>
                <nav>NAVIGATION MENU</nav>
                <header>SITE HEADER</header>
                <main>
                    <h1>AI Meetup</h1>
                    <p>Join us for an evening of talks.</p>
                    <script>var tracking = true;</script>
                </main>
                <footer>FOOTER LINKS</footer>
            </body></html>
        "#,
        );
        let md = page_markdown(&html, URL, 3000);
        assert!(md.contains("AI Meetup"));
        assert!(md.contains("evening of talks"));
        assert!(!md.contains("NAVIGATION MENU"));
        assert!(!md.contains("SITE HEADER"));
        assert!(!md.contains("FOOTER LINKS"));
        assert!(!md.contains("tracking"));
    }

    #[test]
    fn test_prefers_main_over_body() {
        let html = Html::parse_document(
            "<html><body>OUTSIDE<main><p>Inside main</p></main></body></html>",
        );
        let md = page_markdown(&html, URL, 3000);
        assert!(md.contains("Inside main"));
        assert!(!md.contains("OUTSIDE"));
    }

    #[test]
    fn test_markdown_is_truncated() {
        let body = format!(
            "<html><body><main><p>{}</p></main></body></html>",
            "word ".repeat(2000)
        );
        let html = Html::parse_document(&body);
        let md = page_markdown(&html, URL, 3000);
        assert!(md.len() <= 3000);
        assert!(!md.is_empty());
    }

    #[test]
    fn test_visible_text_excludes_noise() {
        let html = Html::parse_document(
            r#"<html><body><nav>aaaaaaaaaaaaaaaaaaaa</nav><main>short</main></body></html>"#,
        );
        assert_eq!(visible_text_chars(&html), "short".len());
    }

    #[test]
    fn test_empty_document() {
        // html5ever synthesizes an empty <body> even for empty input.
        let html = Html::parse_document("");
        assert_eq!(page_markdown(&html, URL, 3000), "");
    }
}
