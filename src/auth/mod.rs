//! Auth controllers: credential storage, token lifecycle, request decoration.
//!
//! A controller owns the credentials and whatever token they currently map
//! to, and decorates outgoing request drafts. Auth flows (`authenticate`,
//! `logout`, `refresh`) report success as a bool rather than propagating
//! errors; failures are logged and leave the controller unauthenticated so
//! callers can decide how hard to fail.

pub mod basic;
pub mod oauth2;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{MemoryCache, TokenCache};
use crate::properties::PropertyBag;
use crate::transport::RequestDraft;

/// Prefix for credential-derived token cache keys.
pub const CACHE_KEY_PREFIX: &str = "AUTH_TOKEN_";

/// The auth flows a controller can run, each backed by its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthAction {
    Authenticate,
    Logout,
    Refresh,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Logout => "logout",
            Self::Refresh => "refresh",
        }
    }
}

/// Credential-holding, token-managing, request-decorating controller.
#[async_trait]
pub trait AuthController: Send + Sync + std::fmt::Debug {
    /// Replace the credentials wholesale. Drops any held token and rehydrates
    /// from the cache under the new credentials' key.
    fn set_credentials(&mut self, credentials: PropertyBag);

    /// Merge updates into the existing credentials, then re-key.
    fn update_credentials(&mut self, updates: Map<String, Value>);

    fn credentials(&self) -> &PropertyBag;

    fn is_authenticated(&self) -> bool;

    /// Decorate an outgoing request with this controller's auth scheme.
    fn configure_request(&self, draft: &mut RequestDraft);

    async fn authenticate(&mut self) -> bool;

    async fn logout(&mut self) -> bool;

    /// Renew the current token. Default: not supported.
    async fn refresh(&mut self) -> bool {
        debug!("refresh not supported by this controller");
        false
    }

    /// Drop the token and credentials.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// Shared credential/token/cache state embedded in concrete controllers.
#[derive(Debug)]
pub struct AuthSession {
    credentials: PropertyBag,
    token: Option<Value>,
    cache_key: Option<String>,
    cache: Arc<dyn TokenCache>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryCache::new()))
    }

    pub fn with_cache(cache: Arc<dyn TokenCache>) -> Self {
        Self {
            credentials: PropertyBag::new(),
            token: None,
            cache_key: None,
            cache,
        }
    }

    /// Deterministic cache key for a credential set: prefix plus the hex
    /// digest of the serialized credentials. Key order inside the bag is
    /// stable, so equal credentials always produce the same key.
    pub fn derive_cache_key(credentials: &PropertyBag) -> String {
        let serialized =
            serde_json::to_string(credentials.as_map()).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        let mut key = String::with_capacity(CACHE_KEY_PREFIX.len() + digest.len() * 2);
        key.push_str(CACHE_KEY_PREFIX);
        for byte in digest {
            key.push_str(&format!("{byte:02x}"));
        }
        key
    }

    pub fn set_credentials(&mut self, credentials: PropertyBag) {
        self.credentials = credentials;
        self.token = None;
        let key = Self::derive_cache_key(&self.credentials);
        // A still-valid token cached under these credentials is reused.
        if let Some(cached) = self.cache.get(&key) {
            debug!("rehydrated token from cache");
            self.token = Some(cached);
        }
        self.cache_key = Some(key);
    }

    pub fn update_credentials(&mut self, updates: Map<String, Value>) {
        let mut credentials = self.credentials.clone();
        credentials.extend(updates);
        self.set_credentials(credentials);
    }

    pub fn credentials(&self) -> &PropertyBag {
        &self.credentials
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    pub fn token(&self) -> Option<&Value> {
        self.token.as_ref()
    }

    /// Hold a token and mirror it into the cache under the credential key.
    pub fn store_token(&mut self, token: Value, ttl: Option<Duration>) {
        if let Some(key) = &self.cache_key {
            self.cache.set(key, token.clone(), ttl);
        }
        self.token = Some(token);
    }

    /// Drop the held token and its cache entry.
    pub fn clear_token(&mut self) {
        if let Some(key) = &self.cache_key {
            self.cache.delete(key);
        }
        self.token = None;
    }

    pub fn reset(&mut self) {
        self.clear_token();
        self.credentials.clear();
        self.cache_key = None;
    }
}
