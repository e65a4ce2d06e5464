//! Static HTTP fetches and the body checks that decide whether a static
//! response is good enough or the page needs a browser.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, UPGRADE_INSECURE_REQUESTS, USER_AGENT};

use crate::error::ScraperError;

const PRIMARY_ACCEPT: &str = "text/html,application/xhtml+xml";
const ALTERNATE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Visible text below this many characters on an app-shell page means the
/// content is rendered client-side.
const MIN_SHELL_TEXT: usize = 200;

const JS_REQUIRED_MARKERS: &[&str] = &[
    "please enable javascript",
    "you need to enable javascript",
    "javascript is required",
    "enable javascript to run this app",
    "this site requires javascript",
];

static EMPTY_APP_ROOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div[^>]+id\s*=\s*["'](?:root|app|__next)["'][^>]*>\s*</div>"#)
        .expect("valid regex")
});
static SCRIPT_OR_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(?:script|style|noscript)>")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// Which header set a static attempt sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// Desktop Chrome user agent, minimal headers.
    Primary,
    /// Firefox user agent with the navigation headers a real browser sends.
    Alternate,
}

/// GET `url` and return the body when it is a usable HTML page.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] on transport failure,
/// [`ScraperError::UnexpectedStatus`] on non-2xx, [`ScraperError::EmptyBody`]
/// or [`ScraperError::BotChallenge`] when the body is not a real page.
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
    profile: HeaderProfile,
) -> Result<String, ScraperError> {
    let mut request = client.get(url).header(USER_AGENT, user_agent);
    request = match profile {
        HeaderProfile::Primary => request.header(ACCEPT, PRIMARY_ACCEPT),
        HeaderProfile::Alternate => request
            .header(ACCEPT, ALTERNATE_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(UPGRADE_INSECURE_REQUESTS, "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header(CACHE_CONTROL, "max-age=0"),
    };

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(ScraperError::EmptyBody {
            url: url.to_owned(),
        });
    }
    if looks_like_bot_challenge(&body) {
        return Err(ScraperError::BotChallenge {
            url: url.to_owned(),
        });
    }
    tracing::debug!(url, ?profile, bytes = body.len(), "static fetch succeeded");
    Ok(body)
}

/// Fetch a plain-text resource (sitemaps, robots) with the primary user agent.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] on transport failure or
/// [`ScraperError::UnexpectedStatus`] on non-2xx.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Result<String, ScraperError> {
    let response = client.get(url).header(USER_AGENT, user_agent).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }
    Ok(response.text().await?)
}

/// Interstitials served by CDN bot protection instead of the page.
pub(crate) fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");

    has_cloudflare_banner
        || has_challenge_platform
        || (has_just_a_moment && has_cookie_gate)
        || (has_just_a_moment && has_cf_chl)
}

/// A page whose dealer content only appears after scripts run: an explicit
/// "enable JavaScript" notice, or an empty app root with almost no text.
pub(crate) fn requires_javascript(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    if JS_REQUIRED_MARKERS.iter().any(|m| lowered.contains(m)) {
        return true;
    }
    EMPTY_APP_ROOT_RE.is_match(body) && visible_text_len(body) < MIN_SHELL_TEXT
}

fn visible_text_len(body: &str) -> usize {
    let without_code = SCRIPT_OR_STYLE_RE.replace_all(body, " ");
    TAG_RE
        .replace_all(&without_code, " ")
        .split_whitespace()
        .map(str::len)
        .sum()
}
