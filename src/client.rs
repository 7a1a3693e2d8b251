//! The API client: transport + provider + auth controller in one place.
//!
//! A client resolves named endpoint definitions out of its provider, stamps
//! them with the API base URL, and executes them through its transport,
//! letting the auth controller decorate requests according to each
//! endpoint's auth requirement.

use semver::Version;
use tracing::debug;

use crate::auth::AuthController;
use crate::collection::{CollectionDef, CollectionEndpoint};
use crate::config::ClientConfig;
use crate::endpoint::{AuthRequirement, Endpoint};
use crate::error::{ConfigError, RestError};
use crate::model::{ModelDef, ModelEndpoint};
use crate::provider::EndpointProvider;
use crate::transport::Transport;

#[derive(Debug)]
pub struct Client {
    transport: Transport,
    server: String,
    version: Option<Version>,
    provider: EndpointProvider,
    auth: Option<Box<dyn AuthController>>,
}

impl Client {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            transport: Transport::default(),
            server: server.into(),
            version: None,
            provider: EndpointProvider::new(),
            auth: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            transport: Transport::configured(config.timeout(), config.user_agent.as_deref()),
            server: config.server.clone(),
            version: config.version()?,
            provider: EndpointProvider::new(),
            auth: None,
        })
    }

    pub fn set_version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// API base URL endpoints resolve against.
    pub fn api_url(&self) -> &str {
        &self.server
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn set_transport(&mut self, transport: Transport) -> &mut Self {
        self.transport = transport;
        self
    }

    pub fn provider(&self) -> &EndpointProvider {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut EndpointProvider {
        &mut self.provider
    }

    pub fn set_auth(&mut self, auth: Box<dyn AuthController>) -> &mut Self {
        self.auth = Some(auth);
        self
    }

    pub fn auth(&self) -> Option<&dyn AuthController> {
        self.auth.as_deref()
    }

    pub fn auth_mut(&mut self) -> Option<&mut (dyn AuthController + '_)> {
        self.auth.as_mut().map(|auth| &mut **auth as _)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.as_ref().is_some_and(|auth| auth.is_authenticated())
    }

    /// Build a live endpoint from the provider, version-gated and stamped
    /// with the API base URL.
    pub fn endpoint(&self, name: &str) -> Result<Endpoint, ConfigError> {
        let def = self.provider.get(name, self.version.as_ref())?;
        let mut endpoint = def.build();
        endpoint.set_base_url(self.api_url());
        Ok(endpoint)
    }

    /// Instantiate a model stamped with the API base URL.
    pub fn model(&self, def: &ModelDef) -> ModelEndpoint {
        let mut model = def.build();
        model.set_base_url(self.api_url());
        model
    }

    /// Instantiate a collection stamped with the API base URL.
    pub fn collection(&self, def: &CollectionDef) -> CollectionEndpoint {
        let mut collection = def.build();
        collection.set_base_url(self.api_url());
        collection
    }

    /// Execute an endpoint through this client, applying auth decoration
    /// according to its requirement.
    pub async fn execute(
        &self,
        endpoint: &mut Endpoint,
        catch_non_success: bool,
    ) -> Result<(), RestError> {
        if endpoint.base_url().is_empty() {
            endpoint.set_base_url(self.api_url());
        }
        let mut draft = endpoint.build_request()?;
        match endpoint.auth_requirement() {
            AuthRequirement::NoAuth => {}
            AuthRequirement::Either => {
                if let Some(auth) = &self.auth {
                    auth.configure_request(&mut draft);
                }
            }
            AuthRequirement::Required => match &self.auth {
                Some(auth) => auth.configure_request(&mut draft),
                None => {
                    return Err(ConfigError::Invalid(
                        "endpoint requires authentication but no auth controller is set".into(),
                    )
                    .into())
                }
            },
        }
        let response = self.transport.send(&draft).await?;
        endpoint.settle(response, catch_non_success)
    }

    /// Run the controller's authenticate flow. False when none is wired in.
    pub async fn authenticate(&mut self) -> bool {
        match &mut self.auth {
            Some(auth) => auth.authenticate().await,
            None => {
                debug!("no auth controller configured");
                false
            }
        }
    }

    pub async fn logout(&mut self) -> bool {
        match &mut self.auth {
            Some(auth) => auth.logout().await,
            None => false,
        }
    }

    pub async fn refresh(&mut self) -> bool {
        match &mut self.auth {
            Some(auth) => auth.refresh().await,
            None => false,
        }
    }
}
