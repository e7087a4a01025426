//! GitHub statistics consumed by the `fetch_github_stats` helper
//!
//! The statistics client itself is a black box behind [`StatsSource`]. The
//! [`StatsProvider`] adds the credential check, the debug placeholder and
//! per-user memoization on top of whichever source is configured.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Environment variables holding an access token, in lookup order
pub const TOKEN_VARIABLES: &[&str] = &["PERSONAL_ACCESS_TOKEN", "GITHUB_TOKEN"];

/// Errors from statistics sources; cloneable so memoized fetches can share them
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatsError {
    #[error("failed to read statistics from '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid statistics in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no statistics for user '{0}'")]
    UnknownUser(String),

    #[error("missing github stat: '{0}'")]
    MissingStat(String),
}

/// Aggregate statistics for one GitHub user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubStats {
    pub username: String,
    pub repos: u64,
    pub contributed_repos: u64,
    pub commits: u64,
    pub stars: u64,
    pub followers: u64,
    pub lines_of_code: i64,
    pub lines_of_code_added: u64,
    pub lines_of_code_removed: u64,
}

impl GithubStats {
    /// Record used in debug builds and when no credentials are available
    pub fn placeholder(username: &str) -> Self {
        Self {
            username: username.to_string(),
            repos: 0,
            contributed_repos: 0,
            commits: 0,
            stars: 0,
            followers: 0,
            lines_of_code: 1,
            lines_of_code_added: 2,
            lines_of_code_removed: 1,
        }
    }

    /// Look up a field by its serialized name, e.g. `"linesOfCode"`
    pub fn stat(&self, name: &str) -> Result<Value, StatsError> {
        serde_json::to_value(self)
            .ok()
            .and_then(|record| record.get(name).cloned())
            .ok_or_else(|| StatsError::MissingStat(name.to_string()))
    }
}

/// A provider of user statistics
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self, username: &str) -> Result<GithubStats, StatsError>;

    /// Whether fetching needs an access token; without one the placeholder is used
    fn requires_credentials(&self) -> bool {
        true
    }
}

/// Source that always yields the placeholder record
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderStats;

#[async_trait]
impl StatsSource for PlaceholderStats {
    async fn fetch(&self, username: &str) -> Result<GithubStats, StatsError> {
        Ok(GithubStats::placeholder(username))
    }

    fn requires_credentials(&self) -> bool {
        false
    }
}

/// Snapshot of statistics loaded from a JSON object keyed by username
#[derive(Debug, Clone, Default)]
pub struct JsonFileStats {
    records: HashMap<String, GithubStats>,
}

impl JsonFileStats {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| StatsError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|message| StatsError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let records = serde_json::from_str(content).map_err(|e| e.to_string())?;
        Ok(Self { records })
    }
}

#[async_trait]
impl StatsSource for JsonFileStats {
    async fn fetch(&self, username: &str) -> Result<GithubStats, StatsError> {
        self.records
            .get(username)
            .cloned()
            .ok_or_else(|| StatsError::UnknownUser(username.to_string()))
    }

    fn requires_credentials(&self) -> bool {
        false
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<GithubStats, StatsError>>>;

/// Memoizing front for a [`StatsSource`]
pub struct StatsProvider {
    source: Arc<dyn StatsSource>,
    credentials: Option<String>,
    debug: bool,
    cache: Mutex<HashMap<String, SharedFetch>>,
}

impl StatsProvider {
    /// Wrap a source, reading credentials from the environment
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self {
            source,
            credentials: credentials_from_env(),
            debug: false,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<String>) -> Self {
        self.credentials = credentials;
        self
    }

    /// In debug mode every user gets the placeholder record
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn uses_placeholder(&self) -> bool {
        self.debug || (self.source.requires_credentials() && self.credentials.is_none())
    }

    /// Statistics for a user; concurrent callers for the same user share one fetch
    pub fn stats(&self, username: &str) -> SharedFetch {
        if self.uses_placeholder() {
            return future::ready(Ok(GithubStats::placeholder(username)))
                .boxed()
                .shared();
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(username.to_string())
            .or_insert_with(|| {
                log::debug!("fetching github statistics for '{}'", username);
                let source = Arc::clone(&self.source);
                let username = username.to_string();
                async move { source.fetch(&username).await }.boxed().shared()
            })
            .clone()
    }

    /// A single statistic for a user
    pub fn stat(&self, username: &str, stat: &str) -> BoxFuture<'static, Result<Value, StatsError>> {
        let fetch = self.stats(username);
        let stat = stat.to_string();
        async move { fetch.await?.stat(&stat) }.boxed()
    }
}

impl Default for StatsProvider {
    fn default() -> Self {
        Self::new(Arc::new(PlaceholderStats))
    }
}

/// First access token found in [`TOKEN_VARIABLES`]
pub fn credentials_from_env() -> Option<String> {
    TOKEN_VARIABLES
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|token| !token.is_empty())
}
