//! Access token lifecycle
//!
//! Holds the current access token with its absolute expiry, refreshes it from
//! the platform when stale and mirrors every refresh to a JSON file so a
//! restart can pick the token back up.

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WechatError};
use crate::types::TokenRecord;

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" in Unix milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// Access token with absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// Unix milliseconds
    pub expires_at: i64,
}

impl AccessToken {
    /// Stale once the expiry is strictly in the past
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        !self.value.is_empty() && self.expires_at >= now_millis
    }
}

impl From<TokenRecord> for AccessToken {
    fn from(record: TokenRecord) -> Self {
        Self {
            value: record.access_token,
            expires_at: record.expires_time,
        }
    }
}

impl From<&AccessToken> for TokenRecord {
    fn from(token: &AccessToken) -> Self {
        Self {
            access_token: token.value.clone(),
            expires_time: token.expires_at,
        }
    }
}

/// Token response from WeChat API
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

// =============================================================================
// Token Store
// =============================================================================

/// JSON file holding the last refreshed token
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token; a missing or unreadable file yields `None`
    pub async fn load(&self) -> Option<AccessToken> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted access token at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Failed to read access token file {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) => Some(record.into()),
            Err(e) => {
                warn!("Ignoring corrupt access token file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Overwrite the persisted token
    pub async fn save(&self, token: &AccessToken) -> Result<()> {
        let json = serde_json::to_string(&TokenRecord::from(token))
            .map_err(|e| WechatError::upstream("Failed to encode token record", e))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Application credentials for the token endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

/// Cached access token, refreshed on demand
///
/// The lock is never held across the refresh request; concurrent callers that
/// all see a stale token each refresh and the last write wins.
pub struct TokenCache {
    credentials: Credentials,
    api_base: String,
    http_client: Client,
    store: Option<TokenStore>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(
        credentials: Credentials,
        api_base: impl Into<String>,
        http_client: Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http_client,
            store: None,
            clock,
            current: RwLock::new(None),
        }
    }

    /// Persist every refreshed token to `store`
    pub fn with_store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Seed the cache, e.g. from a previously persisted token
    pub fn with_token(self, token: Option<AccessToken>) -> Self {
        *self.current.write() = token;
        self
    }

    /// Seed from the configured store, if any
    pub async fn load_persisted(self) -> Self {
        let token = match &self.store {
            Some(store) => store.load().await,
            None => None,
        };
        if let Some(ref t) = token {
            info!("Loaded persisted access token (expires at {} ms)", t.expires_at);
        }
        self.with_token(token)
    }

    /// Currently held token without any refresh
    pub fn peek(&self) -> Option<AccessToken> {
        self.current.read().clone()
    }

    /// Get a valid access token (refreshes if expired)
    pub async fn get_valid_token(&self) -> Result<AccessToken> {
        let now = self.clock.now_millis();
        {
            let guard = self.current.read();
            if let Some(ref token) = *guard
                && token.is_valid_at(now)
            {
                debug!("Using cached access token");
                return Ok(token.clone());
            }
        }

        self.refresh().await
    }

    /// Force refresh the access token
    pub async fn refresh(&self) -> Result<AccessToken> {
        debug!("Refreshing WeChat access token");

        let url = format!("{}/cgi-bin/token", self.api_base);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.credentials.app_id.as_str()),
                ("secret", self.credentials.app_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| WechatError::upstream("Failed to send token request", e))?;

        let body = response
            .text()
            .await
            .map_err(|e| WechatError::upstream("Failed to read token response", e))?;

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| WechatError::upstream("Failed to parse token response", e))?;

        let value = match parsed.access_token {
            Some(value) if !value.is_empty() => value,
            _ => {
                error!("WeChat token response carried no access token: {}", body);
                return Err(WechatError::Auth(body));
            }
        };

        let ttl_secs = parsed.expires_in.unwrap_or(0);
        let expires_at = ttl_secs
            .checked_mul(1000)
            .and_then(|ttl_ms| self.clock.now_millis().checked_add(ttl_ms))
            .ok_or_else(|| {
                WechatError::Upstream(format!("token expires_in out of range: {}", ttl_secs))
            })?;
        let token = AccessToken { value, expires_at };

        *self.current.write() = Some(token.clone());

        if let Some(store) = &self.store {
            match store.save(&token).await {
                Ok(()) => debug!("Persisted access token to {:?}", store.path()),
                Err(e) => warn!("Failed to persist access token: {}", e),
            }
        }

        info!(
            "Successfully refreshed WeChat access token (expires in {}s)",
            ttl_secs
        );
        Ok(token)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Settable clock for tests
    #[derive(Debug, Default)]
    pub(crate) struct FixedClock(pub AtomicI64);

    impl FixedClock {
        pub(crate) fn at(millis: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(millis)))
        }
    }

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn credentials() -> Credentials {
        Credentials {
            app_id: "wx_app".to_string(),
            app_secret: "s3cret".to_string(),
        }
    }

    fn cache(server: &MockServer, clock: Arc<FixedClock>) -> TokenCache {
        TokenCache::new(credentials(), server.uri(), Client::new(), clock)
    }

    async fn mount_token(server: &MockServer, token: &str, expect: u64) {
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .and(query_param("grant_type", "client_credential"))
            .and(query_param("appid", "wx_app"))
            .and(query_param("secret", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "expires_in": 7200
            })))
            .expect(expect)
            .mount(server)
            .await;
    }

    #[test]
    fn test_access_token_validity() {
        let token = AccessToken {
            value: "abc".to_string(),
            expires_at: NOW,
        };
        assert!(token.is_valid_at(NOW - 1));
        assert!(token.is_valid_at(NOW));
        assert!(!token.is_valid_at(NOW + 1));

        let empty = AccessToken {
            value: String::new(),
            expires_at: NOW + 10_000,
        };
        assert!(!empty.is_valid_at(NOW));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;

        let cache = cache(&server, FixedClock::at(NOW)).with_token(Some(AccessToken {
            value: "stale".to_string(),
            expires_at: NOW - 1,
        }));

        let token = cache.get_valid_token().await.unwrap();
        assert_eq!(token.value, "fresh");
        assert_eq!(token.expires_at, NOW + 7200 * 1000);

        // Second call is served from the cache
        let again = cache.get_valid_token().await.unwrap();
        assert_eq!(again, token);
    }

    #[tokio::test]
    async fn test_valid_token_skips_refresh() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 0).await;

        let held = AccessToken {
            value: "held".to_string(),
            expires_at: NOW + 60_000,
        };
        let cache = cache(&server, FixedClock::at(NOW)).with_token(Some(held.clone()));

        assert_eq!(cache.get_valid_token().await.unwrap(), held);
    }

    #[tokio::test]
    async fn test_absent_or_empty_token_refreshes() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 2).await;

        let absent = cache(&server, FixedClock::at(NOW));
        assert_eq!(absent.get_valid_token().await.unwrap().value, "fresh");

        let empty = cache(&server, FixedClock::at(NOW)).with_token(Some(AccessToken {
            value: String::new(),
            expires_at: NOW + 60_000,
        }));
        assert_eq!(empty.get_valid_token().await.unwrap().value, "fresh");
    }

    #[tokio::test]
    async fn test_clock_advance_triggers_refresh() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 2).await;

        let clock = FixedClock::at(NOW);
        let cache = cache(&server, clock.clone());

        let first = cache.get_valid_token().await.unwrap();
        clock.0.store(first.expires_at + 1, Ordering::SeqCst);
        let second = cache.get_valid_token().await.unwrap();
        assert_eq!(second.expires_at, first.expires_at + 1 + 7200 * 1000);
    }

    #[tokio::test]
    async fn test_missing_access_token_is_auth_error() {
        let server = MockServer::start().await;
        let body = r#"{"errcode":40013,"errmsg":"invalid appid"}"#;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let cache = cache(&server, FixedClock::at(NOW));
        match cache.get_valid_token().await {
            Err(WechatError::Auth(raw)) => assert_eq!(raw, body),
            other => panic!("expected auth error, got {:?}", other),
        }
        assert!(cache.peek().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "x",
                "expires_in": 9_223_372_036_854_775i64
            })))
            .mount(&server)
            .await;

        let cache = cache(&server, FixedClock::at(NOW));
        match cache.get_valid_token().await {
            Err(WechatError::Upstream(msg)) => assert!(msg.contains("expires_in")),
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(cache.peek().is_none());
    }

    #[tokio::test]
    async fn test_non_json_response_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let cache = cache(&server, FixedClock::at(NOW));
        assert!(matches!(
            cache.get_valid_token().await,
            Err(WechatError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_persists_token() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("access_token.json"));
        let cache = cache(&server, FixedClock::at(NOW)).with_store(store.clone());

        cache.get_valid_token().await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let record: TokenRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.access_token, "fresh");
        assert_eq!(record.expires_time, NOW + 7200 * 1000);
    }

    #[tokio::test]
    async fn test_persist_failure_still_returns_token() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("missing-dir").join("token.json"));
        let cache = cache(&server, FixedClock::at(NOW)).with_store(store);

        let token = cache.get_valid_token().await.unwrap();
        assert_eq!(token.value, "fresh");
        assert_eq!(cache.peek(), Some(token));
    }

    #[tokio::test]
    async fn test_load_persisted_seeds_cache() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 0).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_token.json");
        std::fs::write(
            &path,
            format!(r#"{{"access_token":"saved","expires_time":{}}}"#, NOW + 1000),
        )
        .unwrap();

        let cache = cache(&server, FixedClock::at(NOW))
            .with_store(TokenStore::new(&path))
            .load_persisted()
            .await;

        assert_eq!(cache.get_valid_token().await.unwrap().value, "saved");
    }

    #[tokio::test]
    async fn test_store_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.is_none());

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().await.is_none());
    }
}
