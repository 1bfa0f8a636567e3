//! GitHub author reputation lookup.
//!
//! The author-trust dimension is recomputed from live profile facts: account
//! age, follower count, public repo count. Lookups are the dominant latency
//! cost of an author-refresh run, so the provider is a trait with a caching
//! decorator that deduplicates lookups per run, and the concrete client
//! backs off on GitHub's throttling signal before retrying.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::scorer::AuthorReputationSnapshot;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "clawscore-security-scanner";

/// Upper bound on a single rate-limit backoff sleep.
const MAX_BACKOFF_SECS: u64 = 120;

/// Attempts per lookup before giving up on a throttled request.
const MAX_ATTEMPTS: u32 = 3;

/// Source of author reputation snapshots.
///
/// `Ok(None)` means the author does not exist; `Err` means the lookup failed
/// (network, exhausted retries). Callers apply the author-trust "unknown"
/// default in both cases but count them differently.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    async fn lookup(&self, handle: &str) -> Result<Option<AuthorReputationSnapshot>>;
}

/// GitHub `GET /users/{username}` response, the fields we score on.
#[derive(Debug, Deserialize)]
struct GitHubUser {
    created_at: DateTime<Utc>,
    #[serde(default)]
    followers: u32,
    #[serde(default)]
    public_repos: u32,
}

/// Derive a snapshot from profile facts at a given instant. `now` is
/// injected so age computation is testable.
fn snapshot_from_user(user: &GitHubUser, now: DateTime<Utc>) -> AuthorReputationSnapshot {
    let age_days = now
        .signed_duration_since(user.created_at)
        .num_days()
        .max(0) as u32;
    AuthorReputationSnapshot {
        account_age_days: age_days,
        followers: user.followers,
        public_repos: user.public_repos,
    }
}

/// Client for the GitHub users API.
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    /// Create a client against a custom API root (tests point this at a mock
    /// server).
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// Seconds to wait out a throttle, from `x-ratelimit-reset` when present,
    /// bounded by [`MAX_BACKOFF_SECS`].
    fn backoff_secs(resp: &reqwest::Response) -> u64 {
        let from_header = resp
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(|reset_epoch| (reset_epoch - Utc::now().timestamp() + 1).max(1) as u64);
        from_header.unwrap_or(60).min(MAX_BACKOFF_SECS)
    }
}

#[async_trait]
impl ReputationProvider for GitHubClient {
    async fn lookup(&self, handle: &str) -> Result<Option<AuthorReputationSnapshot>> {
        let url = format!("{}/users/{}", self.base_url, handle);

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", USER_AGENT);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Bearer {token}"));
            }

            let resp = request
                .send()
                .await
                .wrap_err_with(|| format!("GitHub lookup failed for {handle}"))?;

            match resp.status().as_u16() {
                404 => return Ok(None),
                403 | 429 => {
                    let wait = Self::backoff_secs(&resp);
                    warn!(
                        author = handle,
                        attempt,
                        wait_secs = wait,
                        "GitHub rate limited, backing off"
                    );
                    if attempt == MAX_ATTEMPTS {
                        return Err(eyre::eyre!(
                            "GitHub rate limit persisted after {MAX_ATTEMPTS} attempts for {handle}"
                        ));
                    }
                    tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                }
                _ => {
                    let user: GitHubUser = resp
                        .error_for_status()
                        .wrap_err_with(|| format!("GitHub API error for {handle}"))?
                        .json()
                        .await
                        .wrap_err("Failed to parse GitHub user JSON")?;
                    let snapshot = snapshot_from_user(&user, Utc::now());
                    debug!(
                        author = handle,
                        age_days = snapshot.account_age_days,
                        followers = snapshot.followers,
                        repos = snapshot.public_repos,
                        "fetched author profile"
                    );
                    return Ok(Some(snapshot));
                }
            }
        }
        Err(eyre::eyre!("GitHub lookup exhausted retries for {handle}"))
    }
}

/// Caching decorator: one upstream lookup per handle per run, including
/// negative (author-not-found) results.
pub struct CachedReputationProvider<P> {
    inner: P,
    cache: Mutex<HashMap<String, Option<AuthorReputationSnapshot>>>,
}

impl<P: ReputationProvider> CachedReputationProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: ReputationProvider> ReputationProvider for CachedReputationProvider<P> {
    async fn lookup(&self, handle: &str) -> Result<Option<AuthorReputationSnapshot>> {
        if let Some(cached) = self.cache.lock().await.get(handle) {
            return Ok(*cached);
        }
        let fresh = self.inner.lookup(handle).await?;
        self.cache.lock().await.insert(handle.to_string(), fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_snapshot_age_uses_injected_now() {
        let user = GitHubUser {
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            followers: 5,
            public_repos: 2,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let snap = snapshot_from_user(&user, now);
        assert_eq!(snap.account_age_days, 731); // 2024 was a leap year
        assert_eq!(snap.followers, 5);
        assert_eq!(snap.public_repos, 2);
    }

    #[test]
    fn test_snapshot_age_never_negative() {
        let user = GitHubUser {
            created_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            followers: 0,
            public_repos: 0,
        };
        let snap = snapshot_from_user(&user, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(snap.account_age_days, 0);
    }

    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReputationProvider for CountingProvider {
        async fn lookup(&self, handle: &str) -> Result<Option<AuthorReputationSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if handle == "ghost" {
                return Ok(None);
            }
            Ok(Some(AuthorReputationSnapshot {
                account_age_days: 100,
                followers: 1,
                public_repos: 1,
            }))
        }
    }

    #[tokio::test]
    async fn test_cache_deduplicates_lookups() {
        let provider = CachedReputationProvider::new(CountingProvider {
            calls: AtomicU32::new(0),
        });

        let a = provider.lookup("alice").await.unwrap();
        let b = provider.lookup("alice").await.unwrap();
        assert!(a.is_some() && b.is_some());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_stores_negative_results() {
        let provider = CachedReputationProvider::new(CountingProvider {
            calls: AtomicU32::new(0),
        });

        assert!(provider.lookup("ghost").await.unwrap().is_none());
        assert!(provider.lookup("ghost").await.unwrap().is_none());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }
}
