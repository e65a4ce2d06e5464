use thiserror::Error;

/// Fetch-stage failures. Every variant except `AllStagesFailed` is
/// recoverable: the orchestrator logs it and moves to the next stage.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("bot challenge served by {url}")]
    BotChallenge { url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("all fetch stages failed for {url}: {last_error}")]
    AllStagesFailed { url: String, last_error: String },
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("page script failed: {0}")]
    Script(String),
}

/// A single strategy failing on a page. The coordinator logs it and keeps
/// running the remaining strategies.
#[derive(Debug, Error)]
#[error("strategy {strategy} failed: {reason}")]
pub struct ExtractionError {
    pub strategy: &'static str,
    pub reason: String,
}

impl ExtractionError {
    pub fn new(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}
