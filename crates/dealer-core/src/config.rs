use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ALTERNATE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Dealer-group domains that reject plain HTTP clients outright.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "ancira.com",
    "albrechtauto.com",
    "allensamuels.com",
    "baliseauto.com",
    "bakermotorcompany.com",
    "bakerautogroup.com",
];

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_flag = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_bool(&or_default(var, default)).ok_or_else(|| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "expected one of true/false/1/0/yes/no".to_string(),
        })
    };

    let non_empty = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let log_level = or_default("DEALER_LOG_LEVEL", "info");

    let request_timeout_secs = parse_u64("DEALER_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("DEALER_USER_AGENT", DEFAULT_USER_AGENT);
    let alternate_user_agent =
        or_default("DEALER_ALTERNATE_USER_AGENT", DEFAULT_ALTERNATE_USER_AGENT);
    let alternate_delay_ms = parse_u64("DEALER_ALTERNATE_DELAY_MS", "1000")?;

    let navigation_timeout_ms = parse_u64("DEALER_NAVIGATION_TIMEOUT_MS", "60000")?;
    let selector_timeout_ms = parse_u64("DEALER_SELECTOR_TIMEOUT_MS", "5000")?;
    let browser_enabled = parse_flag("DEALER_BROWSER_ENABLED", "true")?;
    let chromium_path = non_empty("DEALER_CHROMIUM_PATH").map(PathBuf::from);

    let blocked_domains = match non_empty("DEALER_BLOCKED_DOMAINS") {
        Some(raw) => parse_domain_list(&raw),
        None => DEFAULT_BLOCKED_DOMAINS
            .iter()
            .map(|d| (*d).to_string())
            .collect(),
    };

    let max_concurrent_fetches = parse_usize("DEALER_MAX_CONCURRENT_FETCHES", "5")?;
    if max_concurrent_fetches == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "DEALER_MAX_CONCURRENT_FETCHES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let max_directory_links = parse_usize("DEALER_MAX_DIRECTORY_LINKS", "100")?;
    let sitemap_page_cap = parse_usize("DEALER_SITEMAP_PAGE_CAP", "500")?;

    let rules_path = PathBuf::from(or_default("DEALER_RULES_PATH", "rules.json"));

    let openai_api_key = non_empty("OPENAI_API_KEY");
    let llm_enabled = parse_flag("DEALER_LLM_ENABLED", "true")?;
    let llm_model = or_default("DEALER_LLM_MODEL", "gpt-4o-mini");
    let llm_base_url = or_default("DEALER_LLM_BASE_URL", "https://api.openai.com/v1")
        .trim_end_matches('/')
        .to_string();
    let llm_max_chars = parse_usize("DEALER_LLM_MAX_CHARS", "8000")?;

    Ok(AppConfig {
        log_level,
        request_timeout_secs,
        user_agent,
        alternate_user_agent,
        alternate_delay_ms,
        navigation_timeout_ms,
        selector_timeout_ms,
        browser_enabled,
        chromium_path,
        blocked_domains,
        max_concurrent_fetches,
        max_directory_links,
        sitemap_page_cap,
        rules_path,
        openai_api_key,
        llm_enabled,
        llm_model,
        llm_base_url,
        llm_max_chars,
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().trim_start_matches("www.").to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
