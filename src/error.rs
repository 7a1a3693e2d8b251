//! Unified error types for the SDK framework.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Programming and configuration errors. These fail fast and loud.
#[derive(Debug)]
pub enum ConfigError {
    /// No endpoint registered under the requested name (and version).
    UnknownEndpoint(String),
    /// A version requirement string could not be parsed.
    InvalidVersionReq(String),
    /// A required URL variable was never resolved; the URL still carries a
    /// variable marker and must not be dispatched.
    InvalidUrl(String),
    /// An action name was invoked on a model without a registration for it.
    UnknownModelAction(String),
    /// `retrieve()` was called with no id argument and no id attribute set.
    MissingModelId(String),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEndpoint(name) => write!(f, "unknown endpoint: {name}"),
            Self::InvalidVersionReq(req) => write!(f, "invalid version requirement: {req}"),
            Self::InvalidUrl(url) => write!(f, "invalid url, unresolved variables remain: {url}"),
            Self::UnknownModelAction(action) => write!(f, "unknown model action: {action}"),
            Self::MissingModelId(action) => {
                write!(f, "model action `{action}` requires an id, none set")
            }
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// DataError
// ---------------------------------------------------------------------------

/// Payload validation errors, raised at the moment data is finalized.
#[derive(Debug)]
pub enum DataError {
    /// Required-field check failed. Both lists may be populated at once.
    Validation {
        missing: Vec<String>,
        invalid: Vec<String>,
    },
    /// A GET payload was neither a string nor a flat map of scalars.
    InvalidQueryPayload,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { missing, invalid } => {
                write!(f, "validation failed:")?;
                if !missing.is_empty() {
                    write!(f, " missing [{}]", missing.join(","))?;
                }
                if !invalid.is_empty() {
                    write!(f, " invalid [{}]", invalid.join(","))?;
                }
                Ok(())
            }
            Self::InvalidQueryPayload => {
                write!(f, "query payload must be a string or flat map of scalars")
            }
        }
    }
}

impl std::error::Error for DataError {}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Errors from the HTTP transport layer.
#[derive(Debug)]
pub enum TransportError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API.
    Status(u16, String),
}

impl TransportError {
    /// HTTP status code for status errors, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code, _) => Some(*code),
            Self::Http(_) => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status(code, body) => write!(f, "status {code}: {body}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// RestError — top-level
// ---------------------------------------------------------------------------

/// Top-level error type for SDK operations.
#[derive(Debug)]
pub enum RestError {
    Config(ConfigError),
    Data(DataError),
    Transport(TransportError),
}

impl RestError {
    /// HTTP status code when this wraps a transport status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status_code(),
            _ => None,
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Data(e) => write!(f, "data: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for RestError {}

impl From<ConfigError> for RestError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<DataError> for RestError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

impl From<TransportError> for RestError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}
