//! Blocked-page detection: login walls, captchas, thin bot-gated pages.

use url::Url;

/// Domains that never serve useful event pages to an anonymous client.
/// Matched by suffix so subdomains are covered.
const BLOCKED_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
];

/// Lowercased title fragments that mark a login/captcha interstitial.
const BLOCKED_TITLE_KEYWORDS: &[&str] = &[
    "login",
    "log in",
    "sign in",
    "captcha",
    "verify",
    "just a moment",
    "attention required",
    "přihlásit",
    "přihlášení",
    "ověření",
];

/// Pages with no Event JSON-LD and less visible text than this are
/// treated as blocked (interstitials render almost no content).
const MIN_VISIBLE_TEXT_CHARS: usize = 200;

/// Whether a URL's host is on the blocked-domain list, by suffix match.
pub fn is_blocked_domain(url: &str) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
        return false;
    };
    BLOCKED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Classify a fetched page as blocked. Checks, in order: blocked domain,
/// login/captcha title keywords, then the thin-content heuristic.
pub fn is_blocked(url: &str, title: &str, has_event_json_ld: bool, visible_text_chars: usize) -> bool {
    if is_blocked_domain(url) {
        return true;
    }

    let title = title.to_lowercase();
    if BLOCKED_TITLE_KEYWORDS.iter().any(|k| title.contains(k)) {
        return true;
    }

    !has_event_json_ld && visible_text_chars < MIN_VISIBLE_TEXT_CHARS
}
