//! Learned extraction rules: CSS-selector recipes promoted from successful
//! LLM extractions and replayed by the learned-rule strategy.
//!
//! Rules live in one JSON file shaped `{ "<host>": [DomainRule, ...] }`.
//! Layout-signature rules are stored under [`PATTERN_HOST`] with the
//! signature as their `path_pattern`.

mod signature;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use signature::layout_signature;

/// Reserved host key for rules matched by layout signature.
pub const PATTERN_HOST: &str = "*pattern*";

/// Card selector stored with host rules promoted from an LLM extraction.
pub const COARSE_CARD_SELECTOR: &str = "section, div, li";

/// Card selector stored with layout-signature rules.
pub const PATTERN_CARD_SELECTOR: &str = ".location-item, .dealer-location, .store-location, \
     [class*='location'][class*='item'], [class*='dealer'][class*='card'], li.location, \
     div.location";

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("rule store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule store at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-field selectors, each relative to one card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelectors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    /// One element holding `City, ST 12345`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_state_zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl FieldSelectors {
    /// Heading/address/phone guesses that hold up on most card grids.
    #[must_use]
    pub fn coarse() -> Self {
        Self {
            name: Some("h2, h3, h4, .name, .title".to_string()),
            street: Some(".address, .street, .street-address, p".to_string()),
            city_state_zip: Some(".city-state-zip, .address, .locality, p".to_string()),
            city: None,
            state: None,
            zip: None,
            phone: Some(".phone, a[href^='tel:']".to_string()),
            website: Some("a[href^='http']".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    /// Lowercased host, or [`PATTERN_HOST`].
    pub host: String,
    /// Regex over the URL path for host rules; the layout signature for
    /// pattern rules.
    pub path_pattern: String,
    #[serde(default = "first_version")]
    pub version: u32,
    pub card_selector: String,
    #[serde(default)]
    pub fields: FieldSelectors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_signature: Option<String>,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn first_version() -> u32 {
    1
}

impl DomainRule {
    /// Host rule for exactly this path, with coarse selectors.
    #[must_use]
    pub fn for_path(host: &str, path: &str) -> Self {
        Self {
            host: host_key(host),
            path_pattern: format!("^{}$", regex::escape(path)),
            version: first_version(),
            card_selector: COARSE_CARD_SELECTOR.to_string(),
            fields: FieldSelectors::coarse(),
            dom_signature: None,
            success_count: 0,
            updated_at: Some(Utc::now()),
        }
    }

    /// Cross-domain rule keyed by a layout signature.
    #[must_use]
    pub fn for_signature(signature: &str) -> Self {
        Self {
            host: PATTERN_HOST.to_string(),
            path_pattern: signature.to_string(),
            version: first_version(),
            card_selector: PATTERN_CARD_SELECTOR.to_string(),
            fields: FieldSelectors::coarse(),
            dom_signature: Some(signature.to_string()),
            success_count: 0,
            updated_at: Some(Utc::now()),
        }
    }

    #[must_use]
    pub fn is_pattern_rule(&self) -> bool {
        self.host == PATTERN_HOST
    }
}

/// Store key for a host: lowercased, leading `www.` dropped.
#[must_use]
pub fn host_key(host: &str) -> String {
    let lowered = host.trim().to_ascii_lowercase();
    lowered
        .strip_prefix("www.")
        .map_or_else(|| lowered.clone(), str::to_string)
}

fn store_key(host: &str) -> String {
    if host == PATTERN_HOST {
        PATTERN_HOST.to_string()
    } else {
        host_key(host)
    }
}

type RuleMap = BTreeMap<String, Vec<DomainRule>>;

/// File-backed rule cache. The file is parsed once, on first use, and
/// reads are served from memory afterwards. Writes re-read the file before
/// merging so separate processes converge on each other's rules.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    cache: Mutex<Option<RuleMap>>,
}

impl RuleStore {
    /// Opening never touches the filesystem; the file is read on first use
    /// and created on the first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_cached<T>(&self, read: impl FnOnce(&RuleMap) -> T) -> Result<T, RuleStoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        Ok(read(cache.get_or_insert_with(RuleMap::new)))
    }

    /// Rules stored for `host` (normalised with [`host_key`]).
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] if the file exists but cannot be read or parsed.
    pub fn list_for_host(&self, host: &str) -> Result<Vec<DomainRule>, RuleStoreError> {
        let key = store_key(host);
        self.with_cached(|rules| rules.get(&key).cloned().unwrap_or_default())
    }

    /// Whether any rule is stored for `host`, answered from memory once the
    /// file has been loaded.
    ///
    /// # Errors
    ///
    /// Same as [`RuleStore::list_for_host`].
    pub fn has_rules_for(&self, host: &str) -> Result<bool, RuleStoreError> {
        let key = store_key(host);
        self.with_cached(|rules| rules.get(&key).is_some_and(|bucket| !bucket.is_empty()))
    }

    /// Layout-signature rules.
    ///
    /// # Errors
    ///
    /// Same as [`RuleStore::list_for_host`].
    pub fn pattern_rules(&self) -> Result<Vec<DomainRule>, RuleStoreError> {
        self.list_for_host(PATTERN_HOST)
    }

    /// Insert `rule`, or replace the stored rule with the same host and
    /// `path_pattern` when the incoming version is at least as new.
    /// Returns whether the file was written.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] on read, parse or write failure.
    pub fn upsert(&self, rule: DomainRule) -> Result<bool, RuleStoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rules = self.load()?;
        let bucket = rules.entry(rule.host.clone()).or_default();

        let written = match bucket
            .iter_mut()
            .find(|existing| existing.path_pattern == rule.path_pattern)
        {
            Some(existing) if existing.version > rule.version => {
                tracing::debug!(
                    host = %rule.host,
                    stored = existing.version,
                    incoming = rule.version,
                    "keeping newer stored rule"
                );
                false
            }
            Some(existing) => {
                *existing = rule;
                true
            }
            None => {
                bucket.push(rule);
                true
            }
        };

        if written {
            self.save(&rules)?;
        }
        *cache = Some(rules);
        Ok(written)
    }

    /// Count a successful replay of a rule and bump its version.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] on read, parse or write failure.
    pub fn record_success(&self, host: &str, path_pattern: &str) -> Result<(), RuleStoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rules = self.load()?;
        if let Some(rule) = rules
            .get_mut(&store_key(host))
            .and_then(|bucket| bucket.iter_mut().find(|r| r.path_pattern == path_pattern))
        {
            rule.success_count = rule.success_count.saturating_add(1);
            rule.version = rule.version.saturating_add(1);
            rule.updated_at = Some(Utc::now());
            self.save(&rules)?;
        }
        *cache = Some(rules);
        Ok(())
    }

    fn load(&self) -> Result<RuleMap, RuleStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RuleMap::new()),
            Err(source) => {
                return Err(RuleStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(RuleMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| RuleStoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a sibling temp file so readers never see a torn file.
    fn save(&self, rules: &RuleMap) -> Result<(), RuleStoreError> {
        let io_err = |source| RuleStoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(rules).map_err(|source| RuleStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RuleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::open(dir.path().join("nested").join("rules.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_for_host("example.com").unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn upsert_creates_file_and_normalises_host() {
        let (_dir, store) = store();
        let rule = DomainRule::for_path("WWW.Example.com", "/locations.html");
        assert_eq!(rule.host, "example.com");
        assert_eq!(rule.path_pattern, r"^/locations\.html$");
        assert!(store.upsert(rule.clone()).unwrap());

        let listed = store.list_for_host("www.example.com").unwrap();
        assert_eq!(listed, vec![rule]);
    }

    #[test]
    fn upsert_keeps_higher_stored_version() {
        let (_dir, store) = store();
        let mut newer = DomainRule::for_path("example.com", "/locations");
        newer.version = 3;
        newer.card_selector = "div.store".to_string();
        store.upsert(newer).unwrap();

        let older = DomainRule::for_path("example.com", "/locations");
        assert!(!store.upsert(older).unwrap());
        let listed = store.list_for_host("example.com").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].card_selector, "div.store");

        let mut same = DomainRule::for_path("example.com", "/locations");
        same.version = 3;
        assert!(store.upsert(same).unwrap());
        let listed = store.list_for_host("example.com").unwrap();
        assert_eq!(listed[0].card_selector, COARSE_CARD_SELECTOR);
    }

    #[test]
    fn record_success_bumps_counters() {
        let (_dir, store) = store();
        store
            .upsert(DomainRule::for_signature("layout:lists:3-9|phones:multiple"))
            .unwrap();
        store
            .record_success(PATTERN_HOST, "layout:lists:3-9|phones:multiple")
            .unwrap();

        let rules = store.pattern_rules().unwrap();
        assert_eq!(rules[0].success_count, 1);
        assert_eq!(rules[0].version, 2);
        assert!(rules[0].is_pattern_rule());
    }

    #[test]
    fn reads_are_served_from_memory_after_first_load() {
        let (dir, _) = store();
        let path = dir.path().join("rules.json");
        let writer = RuleStore::open(&path);
        writer.upsert(DomainRule::for_path("example.com", "/locations")).unwrap();

        let reader = RuleStore::open(&path);
        assert!(reader.has_rules_for("www.example.com").unwrap());
        std::fs::write(&path, "{ nope").unwrap();
        assert!(reader.has_rules_for("example.com").unwrap());
        assert_eq!(reader.list_for_host("example.com").unwrap().len(), 1);
        assert!(!reader.has_rules_for("other.com").unwrap());
    }

    #[test]
    fn writes_merge_rules_from_other_processes() {
        let (dir, _) = store();
        let path = dir.path().join("rules.json");
        let first = RuleStore::open(&path);
        let second = RuleStore::open(&path);
        assert!(!first.has_rules_for("a.com").unwrap());

        second.upsert(DomainRule::for_path("b.com", "/dealers")).unwrap();
        first.upsert(DomainRule::for_path("a.com", "/locations")).unwrap();

        assert!(first.has_rules_for("a.com").unwrap());
        assert!(first.has_rules_for("b.com").unwrap());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (dir, _) = store();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "{ nope").unwrap();
        let store = RuleStore::open(&path);
        assert!(matches!(
            store.list_for_host("example.com"),
            Err(RuleStoreError::Json { .. })
        ));
    }
}
