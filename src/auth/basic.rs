//! HTTP Basic controller.
//!
//! Stateless scheme: the header is derived from the credentials on every
//! request, so "authenticated" just means a usable credential pair (or a
//! pre-formed token override) is present. An optional verification endpoint
//! can back `authenticate` with a real round trip.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, error};

use crate::auth::{AuthAction, AuthController, AuthSession};
use crate::endpoint::EndpointDef;
use crate::properties::PropertyBag;
use crate::transport::{RequestDraft, Transport};

/// Credential key holding a pre-formed `Authorization` value that bypasses
/// username/password encoding.
pub const CREDENTIAL_TOKEN: &str = "token";

#[derive(Debug, Default)]
pub struct BasicController {
    session: AuthSession,
    transport: Transport,
    endpoints: HashMap<AuthAction, EndpointDef>,
}

impl BasicController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transport(&mut self, transport: Transport) -> &mut Self {
        self.transport = transport;
        self
    }

    /// Register an endpoint backing a flow; URLs must be absolute.
    pub fn set_auth_endpoint(&mut self, action: AuthAction, def: EndpointDef) -> &mut Self {
        self.endpoints.insert(action, def);
        self
    }

    /// The `Authorization` value for the current credentials, if complete.
    pub fn header_value(&self) -> Option<String> {
        let credentials = self.session.credentials();
        if let Some(token) = credentials.get_str(CREDENTIAL_TOKEN) {
            return Some(token);
        }
        let username = credentials.get_str("username")?;
        let password = credentials.get_str("password")?;
        Some(format!(
            "Basic {}",
            BASE64.encode(format!("{username}:{password}"))
        ))
    }

    /// Run a flow endpoint with the basic header attached.
    async fn run_flow(&mut self, action: AuthAction) -> Option<bool> {
        let def = self.endpoints.get(&action)?.clone();
        let mut endpoint = def.build();
        let mut draft = match endpoint.build_request() {
            Ok(draft) => draft,
            Err(err) => {
                error!(action = action.as_str(), "auth request could not be built: {err}");
                return Some(false);
            }
        };
        self.configure_request(&mut draft);
        match self.transport.send(&draft).await {
            Ok(response) => Some(response.is_success()),
            Err(err) => {
                error!(action = action.as_str(), "auth request failed: {err}");
                Some(false)
            }
        }
    }
}

#[async_trait]
impl AuthController for BasicController {
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
        self.header_value().is_some()
    }

    fn configure_request(&self, draft: &mut RequestDraft) {
        if let Some(value) = self.header_value() {
            draft.set_header("Authorization", &value);
        }
    }

    /// Verify against the registered endpoint when there is one; otherwise
    /// the scheme is stateless and complete credentials are enough.
    async fn authenticate(&mut self) -> bool {
        match self.run_flow(AuthAction::Authenticate).await {
            Some(result) => result,
            None => self.is_authenticated(),
        }
    }

    async fn logout(&mut self) -> bool {
        match self.run_flow(AuthAction::Logout).await {
            Some(true) => {
                // A confirmed logout invalidates the held credentials.
                self.session.reset();
                true
            }
            Some(false) => false,
            None => {
                debug!("no logout endpoint configured");
                false
            }
        }
    }

    fn reset(&mut self) {
        self.session.reset();
    }
}
