//! OAuth2 controller: grant payloads, token expiry tracking, bearer
//! decoration.
//!
//! Token endpoints are registered as [`EndpointDef`]s with absolute URLs;
//! the controller runs them on its own transport, outside the client's
//! decorated execution path.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

use crate::auth::{AuthAction, AuthController, AuthSession};
use crate::cache::TokenCache;
use crate::endpoint::EndpointDef;
use crate::properties::PropertyBag;
use crate::transport::{RequestDraft, Transport};

/// Safety margin subtracted from `expires_in` so a token is treated as
/// expired slightly before the server would reject it.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// OAuth2 grant used for the authenticate flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantType {
    #[default]
    ClientCredentials,
    Password,
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password => "password",
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Expiry state of a held token.
///
/// `Unknown` (no expiry info on the token) is treated as still valid; the
/// server is the final authority and will reject a dead token anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenExpiry {
    Valid,
    Expired,
    Unknown,
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// OAuth2Controller
// ---------------------------------------------------------------------------

/// Token-based controller driving the OAuth2 grant flows.
#[derive(Debug)]
pub struct OAuth2Controller {
    session: AuthSession,
    transport: Transport,
    endpoints: HashMap<AuthAction, EndpointDef>,
    grant_type: GrantType,
    expiry_margin: Duration,
}

impl Default for OAuth2Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuth2Controller {
    pub fn new() -> Self {
        Self {
            session: AuthSession::new(),
            transport: Transport::default(),
            endpoints: HashMap::new(),
            grant_type: GrantType::default(),
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
        }
    }

    /// Use a shared token cache instead of a private in-memory one.
    pub fn with_cache(cache: Arc<dyn TokenCache>) -> Self {
        Self {
            session: AuthSession::with_cache(cache),
            ..Self::new()
        }
    }

    pub fn set_transport(&mut self, transport: Transport) -> &mut Self {
        self.transport = transport;
        self
    }

    pub fn set_grant_type(&mut self, grant_type: GrantType) -> &mut Self {
        self.grant_type = grant_type;
        self
    }

    /// Tune how early a token is considered expired before its advertised
    /// lifetime is up.
    pub fn set_expiry_margin(&mut self, margin: Duration) -> &mut Self {
        self.expiry_margin = margin;
        self
    }

    /// Register the endpoint backing one auth flow. The URL must be
    /// absolute; auth endpoints default to POST.
    pub fn set_auth_endpoint(&mut self, action: AuthAction, mut def: EndpointDef) -> &mut Self {
        if def.method.is_none() {
            def.method = Some(Method::POST);
        }
        self.endpoints.insert(action, def);
        self
    }

    pub fn token(&self) -> Option<&Value> {
        self.session.token()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .token()
            .and_then(|t| t.get("access_token"))
            .and_then(Value::as_str)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.session
            .token()
            .and_then(|t| t.get("refresh_token"))
            .and_then(Value::as_str)
    }

    /// Advertised token lifetime in seconds, as returned by the server.
    pub fn expires_in(&self) -> Option<u64> {
        self.session
            .token()
            .and_then(|t| t.get("expires_in"))
            .and_then(Value::as_u64)
    }

    /// Epoch second after which the held token counts as expired.
    pub fn expiration(&self) -> Option<u64> {
        self.session
            .token()
            .and_then(|t| t.get("expires_at"))
            .and_then(Value::as_u64)
    }

    pub fn token_expiry(&self) -> TokenExpiry {
        match self.expiration() {
            _ if self.session.token().is_none() => TokenExpiry::Expired,
            Some(expires_at) if expires_at > now_epoch() => TokenExpiry::Valid,
            Some(_) => TokenExpiry::Expired,
            None => TokenExpiry::Unknown,
        }
    }

    /// Adopt a token object from a token-endpoint response.
    ///
    /// Stamps `expires_at` from `expires_in` minus the margin and mirrors
    /// the token into the cache with a matching TTL. Returns false when the
    /// value is not a usable token.
    pub fn set_token(&mut self, token: Value) -> bool {
        let Value::Object(mut token) = token else {
            return false;
        };
        let usable = token
            .get("access_token")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        if !usable {
            return false;
        }
        let margin = self.expiry_margin.as_secs();
        let ttl = token
            .get("expires_in")
            .and_then(Value::as_u64)
            .map(|expires_in| {
                let lifetime = expires_in.saturating_sub(margin);
                token.insert("expires_at".to_string(), (now_epoch() + lifetime).into());
                Duration::from_secs(lifetime)
            });
        self.session.store_token(Value::Object(token), ttl);
        true
    }

    /// Grant payload for a flow, drawn from the credentials.
    fn grant_payload(&self, grant_type: GrantType) -> Map<String, Value> {
        let mut payload = match grant_type {
            GrantType::RefreshToken => {
                let mut payload = Map::new();
                for key in ["client_id", "client_secret"] {
                    if let Some(value) = self.session.credentials().get(key) {
                        payload.insert(key.to_string(), value.clone());
                    }
                }
                if let Some(refresh_token) = self.refresh_token() {
                    payload.insert("refresh_token".to_string(), refresh_token.into());
                }
                payload
            }
            _ => self.session.credentials().as_map().clone(),
        };
        payload.insert("grant_type".to_string(), grant_type.as_str().into());
        payload
    }

    /// Run a token-granting flow and adopt the returned token.
    async fn acquire_token(&mut self, action: AuthAction, grant_type: GrantType) -> bool {
        let Some(def) = self.endpoints.get(&action).cloned() else {
            debug!(action = action.as_str(), "no endpoint configured for auth action");
            return false;
        };
        let mut endpoint = def.build();
        endpoint.set_data(self.grant_payload(grant_type));
        if let Err(err) = endpoint.execute(&self.transport, false).await {
            error!(action = action.as_str(), "auth request failed: {err}");
            return false;
        }
        if let Some(body) = endpoint.response_body() {
            if self.set_token(body) {
                debug!(action = action.as_str(), "token acquired");
                return true;
            }
        }
        error!(
            action = action.as_str(),
            "auth response did not contain a usable token"
        );
        false
    }
}

#[async_trait]
impl AuthController for OAuth2Controller {
    fn set_credentials(&mut self, credentials: PropertyBag) {
        self.session.set_credentials(credentials);
    }

    fn update_credentials(&mut self, updates: Map<String, Value>) {
        self.session.update_credentials(updates);
    }

    fn credentials(&self) -> &PropertyBag {
        self.session.credentials()
    }

    fn is_authenticated(&self) -> bool {
        self.session.token().is_some() && self.token_expiry() != TokenExpiry::Expired
    }

    /// Bearer decoration, applied only while a live token is held.
    fn configure_request(&self, draft: &mut RequestDraft) {
        if !self.is_authenticated() {
            return;
        }
        if let Some(access_token) = self.access_token() {
            draft.set_header("Authorization", &format!("Bearer {access_token}"));
        }
    }

    async fn authenticate(&mut self) -> bool {
        self.acquire_token(AuthAction::Authenticate, self.grant_type)
            .await
    }

    async fn logout(&mut self) -> bool {
        let Some(def) = self.endpoints.get(&AuthAction::Logout).cloned() else {
            debug!("no logout endpoint configured");
            return false;
        };
        let mut endpoint = def.build();
        let mut draft = match endpoint.build_request() {
            Ok(draft) => draft,
            Err(err) => {
                error!("logout request could not be built: {err}");
                return false;
            }
        };
        // The logout call itself goes out under the current token.
        self.configure_request(&mut draft);
        match self.transport.send(&draft).await {
            Ok(response) if response.is_success() => {
                self.session.clear_token();
                true
            }
            Ok(response) => {
                error!(status = response.status, "logout rejected");
                false
            }
            Err(err) => {
                error!("logout request failed: {err}");
                false
            }
        }
    }

    async fn refresh(&mut self) -> bool {
        if self.refresh_token().is_none() {
            debug!("no refresh token held, cannot refresh");
            return false;
        }
        // A dedicated refresh endpoint wins; otherwise reuse the token URL.
        let action = if self.endpoints.contains_key(&AuthAction::Refresh) {
            AuthAction::Refresh
        } else {
            AuthAction::Authenticate
        };
        self.acquire_token(action, GrantType::RefreshToken).await
    }

    fn reset(&mut self) {
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::spawn_http_server;
    use serde_json::json;

    fn controller_with_creds() -> OAuth2Controller {
        let mut controller = OAuth2Controller::new();
        let mut creds = PropertyBag::new();
        creds.set("client_id", "cid").set("client_secret", "shh");
        controller.set_credentials(creds);
        controller
    }

    #[test]
    fn set_token_stamps_expiration_with_margin() {
        let mut controller = controller_with_creds();
        let before = now_epoch();
        assert!(controller.set_token(json!({
            "access_token": "abc",
            "expires_in": 3600,
        })));
        let expires_at = controller.expiration().unwrap();
        // 3600s lifetime minus the 10s default margin.
        assert!(expires_at >= before + 3585 && expires_at <= before + 3595);
        assert_eq!(controller.token_expiry(), TokenExpiry::Valid);
        assert!(controller.is_authenticated());
    }

    #[test]
    fn token_without_expiry_info_is_fail_open() {
        let mut controller = controller_with_creds();
        assert!(controller.set_token(json!({"access_token": "abc"})));
        assert_eq!(controller.token_expiry(), TokenExpiry::Unknown);
        assert!(controller.is_authenticated());
    }

    #[test]
    fn expired_token_deauthenticates() {
        let mut controller = controller_with_creds();
        controller.set_expiry_margin(Duration::from_secs(7200));
        // Margin exceeds the lifetime, so the token is born expired.
        assert!(controller.set_token(json!({
            "access_token": "abc",
            "expires_in": 3600,
        })));
        assert_eq!(controller.token_expiry(), TokenExpiry::Expired);
        assert!(!controller.is_authenticated());
    }

    #[test]
    fn rejects_unusable_token_values() {
        let mut controller = controller_with_creds();
        assert!(!controller.set_token(json!("just-a-string")));
        assert!(!controller.set_token(json!({"token_type": "bearer"})));
        assert!(!controller.set_token(json!({"access_token": ""})));
        assert!(!controller.is_authenticated());
    }

    #[test]
    fn bearer_decoration_uses_the_access_token() {
        let mut controller = controller_with_creds();
        controller.set_token(json!({"access_token": "abc"}));
        let mut draft = RequestDraft::new(Method::GET, "http://api.test/x");
        controller.configure_request(&mut draft);
        assert_eq!(draft.header("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn expired_tokens_do_not_decorate() {
        let mut controller = controller_with_creds();
        controller.set_expiry_margin(Duration::from_secs(7200));
        controller.set_token(json!({"access_token": "abc", "expires_in": 60}));
        let mut draft = RequestDraft::new(Method::GET, "http://api.test/x");
        controller.configure_request(&mut draft);
        assert_eq!(draft.header("authorization"), None);
    }

    #[tokio::test]
    async fn authenticate_posts_the_grant_and_adopts_the_token() {
        let (base_url, server) = spawn_http_server(vec![(
            200,
            r#"{"access_token":"granted","expires_in":3600}"#.into(),
        )])
        .await;
        let mut controller = controller_with_creds();
        controller.set_auth_endpoint(
            AuthAction::Authenticate,
            EndpointDef::new(format!("{base_url}/oauth/token")),
        );

        assert!(!controller.is_authenticated());
        assert!(controller.authenticate().await);
        assert!(controller.is_authenticated());
        assert_eq!(controller.access_token(), Some("granted"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /oauth/token"), "{}", requests[0]);
        assert!(requests[0].contains(r#""grant_type":"client_credentials""#));
        assert!(requests[0].contains(r#""client_id":"cid""#));
    }

    #[tokio::test]
    async fn authenticate_without_endpoint_is_a_clean_failure() {
        let mut controller = controller_with_creds();
        assert!(!controller.authenticate().await);
        assert!(!controller.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_grant_leaves_the_controller_unauthenticated() {
        let (base_url, server) =
            spawn_http_server(vec![(401, r#"{"error":"invalid_client"}"#.into())]).await;
        let mut controller = controller_with_creds();
        controller.set_auth_endpoint(
            AuthAction::Authenticate,
            EndpointDef::new(format!("{base_url}/oauth/token")),
        );
        assert!(!controller.authenticate().await);
        assert!(!controller.is_authenticated());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refresh_requires_a_refresh_token() {
        let mut controller = controller_with_creds();
        controller.set_token(json!({"access_token": "abc"}));
        assert!(!controller.refresh().await);
    }

    #[tokio::test]
    async fn refresh_reuses_the_token_endpoint_with_the_refresh_grant() {
        let (base_url, server) = spawn_http_server(vec![(
            200,
            r#"{"access_token":"fresh","refresh_token":"r2","expires_in":3600}"#.into(),
        )])
        .await;
        let mut controller = controller_with_creds();
        controller.set_auth_endpoint(
            AuthAction::Authenticate,
            EndpointDef::new(format!("{base_url}/oauth/token")),
        );
        controller.set_token(json!({"access_token": "old", "refresh_token": "r1"}));

        assert!(controller.refresh().await);
        assert_eq!(controller.access_token(), Some("fresh"));
        assert_eq!(controller.refresh_token(), Some("r2"));

        let requests = server.await.unwrap();
        assert!(requests[0].contains(r#""grant_type":"refresh_token""#));
        assert!(requests[0].contains(r#""refresh_token":"r1""#));
        // The client identity rides along with the refresh grant.
        assert!(requests[0].contains(r#""client_id":"cid""#));
    }

    #[tokio::test]
    async fn logout_clears_the_token_on_success() {
        let (base_url, server) = spawn_http_server(vec![(200, "{}".into())]).await;
        let mut controller = controller_with_creds();
        controller.set_auth_endpoint(
            AuthAction::Logout,
            EndpointDef::new(format!("{base_url}/oauth/logout")),
        );
        controller.set_token(json!({"access_token": "abc"}));

        assert!(controller.logout().await);
        assert!(!controller.is_authenticated());
        assert!(controller.token().is_none());

        let requests = server.await.unwrap();
        assert!(requests[0].contains("authorization: Bearer abc"), "{}", requests[0]);
    }
}
