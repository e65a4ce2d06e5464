use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub alternate_user_agent: String,
    pub alternate_delay_ms: u64,
    pub navigation_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub browser_enabled: bool,
    pub chromium_path: Option<PathBuf>,
    pub blocked_domains: Vec<String>,
    pub max_concurrent_fetches: usize,
    pub max_directory_links: usize,
    pub sitemap_page_cap: usize,
    pub rules_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub llm_enabled: bool,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_max_chars: usize,
}

impl AppConfig {
    /// `true` when the LLM fallback is switched on and has a key to call with.
    #[must_use]
    pub fn llm_available(&self) -> bool {
        self.llm_enabled && self.openai_api_key.is_some()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("alternate_user_agent", &self.alternate_user_agent)
            .field("alternate_delay_ms", &self.alternate_delay_ms)
            .field("navigation_timeout_ms", &self.navigation_timeout_ms)
            .field("selector_timeout_ms", &self.selector_timeout_ms)
            .field("browser_enabled", &self.browser_enabled)
            .field("chromium_path", &self.chromium_path)
            .field("blocked_domains", &self.blocked_domains)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("max_directory_links", &self.max_directory_links)
            .field("sitemap_page_cap", &self.sitemap_page_cap)
            .field("rules_path", &self.rules_path)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_enabled", &self.llm_enabled)
            .field("llm_model", &self.llm_model)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_max_chars", &self.llm_max_chars)
            .finish()
    }
}
