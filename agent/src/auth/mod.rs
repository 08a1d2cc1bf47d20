//! Time-bounded cache of connector authorization material
//!
//! Entries are keyed by agent identity plus the signature of the toolkit
//! set the agent connects to. Expiry is lazy: a `get` past the validity
//! window removes the entry and reports a miss. The whole map sits behind
//! one mutex, so every caller sees the same expiry decision for a key.
//!
//! The cache is an explicit value, created by whoever owns the process (the
//! CLI, a test fixture) and handed to agents as `Arc<AuthCache>`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod tokens;

pub use tokens::{authorize, missing_tokens, AuthError, EnvTokenSource, StaticTokenSource, TokenSource};

/// Default validity of a cached authorization
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(advanced) = chrono::Duration::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
        {
            *now = advanced;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Keys, payloads, entries
// ============================================================================

/// Agent identity + toolkit set signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthKey {
    agent: String,
    toolkits: String,
}

impl AuthKey {
    /// Toolkit names are lowercased, sorted and de-duplicated so that the
    /// same set always yields the same key.
    pub fn new<I, S>(agent: impl Into<String>, toolkits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = toolkits
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        names.sort();
        names.dedup();

        Self {
            agent: agent.into(),
            toolkits: names.join(","),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn toolkits(&self) -> impl Iterator<Item = &str> {
        self.toolkits.split(',').filter(|t| !t.is_empty())
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agent, self.toolkits)
    }
}

/// Authorization material: one token per toolkit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    tokens: BTreeMap<String, String>,
}

impl AuthPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, toolkit: impl AsRef<str>, token: impl Into<String>) -> Self {
        self.tokens
            .insert(toolkit.as_ref().to_lowercase(), token.into());
        self
    }

    pub fn token_for(&self, toolkit: &str) -> Option<&str> {
        self.tokens.get(&toolkit.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A cached authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCacheEntry {
    pub payload: AuthPayload,
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "validity_ms", with = "duration_millis")]
    pub validity: Duration,
}

impl AuthCacheEntry {
    /// Time left before expiry, `None` once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        // A clock that went backwards counts as zero elapsed time
        let elapsed = (now - self.issued_at).to_std().unwrap_or(Duration::ZERO);
        self.validity.checked_sub(elapsed).filter(|left| !left.is_zero())
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_some()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Status of one cache entry, for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    pub valid: bool,
    pub issued_at: DateTime<Utc>,
    /// `None` when expired
    pub expires_in: Option<Duration>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: AuthKey,
    #[serde(flatten)]
    entry: AuthCacheEntry,
}

// ============================================================================
// Cache
// ============================================================================

pub struct AuthCache {
    entries: Mutex<HashMap<AuthKey, AuthCacheEntry>>,
    clock: Arc<dyn Clock>,
    default_validity: Duration,
}

impl Default for AuthCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthCache {
    /// Cache on the system clock with [`DEFAULT_VALIDITY`]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DEFAULT_VALIDITY)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, default_validity: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_validity,
        }
    }

    pub fn default_validity(&self) -> Duration {
        self.default_validity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AuthKey, AuthCacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a still-valid payload; an expired entry is removed
    pub fn get(&self, key: &AuthKey) -> Option<AuthPayload> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => Some(entry.payload.clone()),
            Some(_) => {
                tracing::debug!(key = %key, "auth cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: AuthKey, payload: AuthPayload, validity: Duration) {
        let entry = AuthCacheEntry {
            payload,
            issued_at: self.clock.now(),
            validity,
        };
        tracing::debug!(key = %key, validity_secs = validity.as_secs(), "auth cache put");
        self.lock().insert(key, entry);
    }

    /// Returns whether an entry was present
    pub fn invalidate(&self, key: &AuthKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Validity of every stored entry, keyed by `agent:toolkits`.
    /// Inspection does not evict.
    pub fn status(&self) -> BTreeMap<String, AuthStatus> {
        let now = self.clock.now();
        self.lock()
            .iter()
            .map(|(key, entry)| {
                let expires_in = entry.remaining(now);
                (
                    key.to_string(),
                    AuthStatus {
                        valid: expires_in.is_some(),
                        issued_at: entry.issued_at,
                        expires_in,
                    },
                )
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write still-valid entries to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let now = self.clock.now();
        let snapshot: Vec<SnapshotEntry> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_valid(now))
            .map(|(key, entry)| SnapshotEntry {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write auth cache to {}", path.display()))?;
        Ok(())
    }

    /// Load a cache written by [`AuthCache::save`]; a missing file yields an empty cache
    pub fn load(path: &Path, clock: Arc<dyn Clock>, default_validity: Duration) -> Result<Self> {
        let cache = Self::with_clock(clock, default_validity);
        if !path.exists() {
            return Ok(cache);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read auth cache from {}", path.display()))?;
        let snapshot: Vec<SnapshotEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid auth cache file {}", path.display()))?;

        {
            let mut entries = cache.lock();
            for item in snapshot {
                entries.insert(item.key, item.entry);
            }
        }
        Ok(cache)
    }
}
