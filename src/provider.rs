//! Named endpoint registry with optional version gating.
//!
//! A provider maps endpoint names to definitions. A registration may carry a
//! semver requirement; it then only serves clients whose API version matches.
//! Later registrations shadow earlier ones, so an SDK can layer overrides on
//! top of a base set.

use semver::{Version, VersionReq};
use tracing::trace;

use crate::endpoint::EndpointDef;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
struct Registration {
    name: String,
    def: EndpointDef,
    versions: Option<VersionReq>,
}

/// Ordered endpoint registry.
#[derive(Debug, Clone, Default)]
pub struct EndpointProvider {
    registry: Vec<Registration>,
}

impl EndpointProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition served regardless of client version.
    pub fn register(&mut self, name: impl Into<String>, def: EndpointDef) -> &mut Self {
        self.registry.push(Registration {
            name: name.into(),
            def,
            versions: None,
        });
        self
    }

    /// Register a definition served only to clients whose version matches
    /// the given semver requirement (e.g. `">=11, <12"`).
    pub fn register_versioned(
        &mut self,
        name: impl Into<String>,
        def: EndpointDef,
        versions: &str,
    ) -> Result<&mut Self, ConfigError> {
        let versions = VersionReq::parse(versions)
            .map_err(|_| ConfigError::InvalidVersionReq(versions.to_string()))?;
        self.registry.push(Registration {
            name: name.into(),
            def,
            versions: Some(versions),
        });
        Ok(self)
    }

    fn matches(registration: &Registration, name: &str, version: Option<&Version>) -> bool {
        if registration.name != name {
            return false;
        }
        match (&registration.versions, version) {
            (None, _) => true,
            (Some(req), Some(version)) => req.matches(version),
            // Version-gated registrations need a client version to match.
            (Some(_), None) => false,
        }
    }

    pub fn has(&self, name: &str, version: Option<&Version>) -> bool {
        self.registry
            .iter()
            .any(|r| Self::matches(r, name, version))
    }

    /// Resolve a name (and client version) to a definition. The most recent
    /// matching registration wins.
    pub fn get(&self, name: &str, version: Option<&Version>) -> Result<EndpointDef, ConfigError> {
        let found = self
            .registry
            .iter()
            .rev()
            .find(|r| Self::matches(r, name, version));
        match found {
            Some(registration) => {
                trace!(name, "resolved endpoint definition");
                Ok(registration.def.clone())
            }
            None => Err(ConfigError::UnknownEndpoint(name.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
