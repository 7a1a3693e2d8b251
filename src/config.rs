//! Client configuration, loadable from TOML.

use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::properties::PropertyBag;

fn default_timeout_secs() -> u64 {
    30
}

/// Declarative client settings.
///
/// ```toml
/// server = "https://api.example.com/rest"
/// version = "11.4.0"
/// timeout_secs = 15
///
/// [credentials]
/// client_id = "abc"
/// client_secret = "shh"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// API base URL, scheme included.
    pub server: String,
    /// API version used for endpoint version gating.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Credentials handed to the auth controller, if one is wired in.
    #[serde(default)]
    pub credentials: Option<BTreeMap<String, String>>,
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("server must not be empty".into()));
        }
        if !self.server.starts_with("http://") && !self.server.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "server must be an http(s) url: {}",
                self.server
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if let Some(version) = &self.version {
            self.parse_version_str(version)?;
        }
        Ok(())
    }

    /// Parsed API version, if configured.
    pub fn version(&self) -> Result<Option<Version>, ConfigError> {
        self.version
            .as_deref()
            .map(|v| self.parse_version_str(v))
            .transpose()
    }

    fn parse_version_str(&self, raw: &str) -> Result<Version, ConfigError> {
        // Accept shorthand like "11" or "11.4".
        let padded = match raw.matches('.').count() {
            0 => format!("{raw}.0.0"),
            1 => format!("{raw}.0"),
            _ => raw.to_string(),
        };
        Version::parse(&padded).map_err(|_| ConfigError::InvalidVersionReq(raw.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured credentials as a property bag.
    pub fn credential_bag(&self) -> Option<PropertyBag> {
        self.credentials.as_ref().map(|credentials| {
            let mut bag = PropertyBag::new();
            for (key, value) in credentials {
                bag.set(key.clone(), value.clone());
            }
            bag
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_full_config() {
        let config = ClientConfig::from_toml_str(
            r#"
            server = "https://api.example.com/rest"
            version = "11.4"
            timeout_secs = 15
            user_agent = "acme-sdk/0.1"

            [credentials]
            client_id = "abc"
            client_secret = "shh"
            "#,
        )
        .unwrap();
        assert_eq!(config.server, "https://api.example.com/rest");
        assert_eq!(config.version().unwrap(), Some(Version::new(11, 4, 0)));
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.user_agent.as_deref(), Some("acme-sdk/0.1"));
        let creds = config.credential_bag().unwrap();
        assert_eq!(creds.get("client_id"), Some(&json!("abc")));
    }

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config =
            ClientConfig::from_toml_str(r#"server = "http://localhost:8080""#).unwrap();
        assert_eq!(config.version().unwrap(), None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.credential_bag().is_none());
    }

    #[test]
    fn rejects_bad_servers_and_versions() {
        assert!(ClientConfig::from_toml_str(r#"server = """#).is_err());
        assert!(ClientConfig::from_toml_str(r#"server = "ftp://x""#).is_err());
        assert!(ClientConfig::from_toml_str(
            "server = \"https://ok\"\ntimeout_secs = 0"
        )
        .is_err());
        assert!(ClientConfig::from_toml_str(
            r#"
            server = "https://ok"
            version = "eleven"
            "#
        )
        .is_err());
    }

    #[test]
    fn shorthand_versions_are_padded() {
        let config = ClientConfig::from_toml_str(
            r#"
            server = "https://ok"
            version = "11"
            "#,
        )
        .unwrap();
        assert_eq!(config.version().unwrap(), Some(Version::new(11, 0, 0)));
    }
}
