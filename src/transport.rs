//! HTTP wire plumbing: request drafts, captured responses, and the
//! reqwest-backed transport.
//!
//! The transport layer stays deliberately small: endpoints build a
//! [`RequestDraft`], auth controllers decorate it, and [`Transport`] turns it
//! into a reqwest call. Any HTTP response — success or failure — comes back
//! as a [`WireResponse`]; only network-level failures are errors here.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{DataError, TransportError};

/// RFC 3986 unreserved characters stay literal; everything else is encoded.
/// Notably encodes space as `%20`, not `+`.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Default timeout applied when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback invoked with the response of a detached dispatch.
pub type SuccessCallback = Box<dyn FnOnce(&WireResponse) + Send>;

/// Callback invoked when a detached dispatch fails or returns non-2xx.
pub type ErrorCallback = Box<dyn FnOnce(&TransportError) + Send>;

// ---------------------------------------------------------------------------
// RequestDraft
// ---------------------------------------------------------------------------

/// A materialized wire request, mutable until dispatch.
#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub method: Method,
    /// Absolute URL without the query string.
    pub url: String,
    pub headers: HeaderMap,
    /// Pre-encoded RFC 3986 query string, without the leading `?`.
    pub query: Option<String>,
    pub body: Option<String>,
}

impl RequestDraft {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: None,
            body: None,
        }
    }

    /// Set a header, silently skipping values that are not valid header text.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// URL with the query string attached.
    pub fn full_url(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.url, query),
            _ => self.url.clone(),
        }
    }

    /// Mark the draft as carrying JSON.
    pub fn set_json_content_type(&mut self) -> &mut Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }
}

// ---------------------------------------------------------------------------
// WireResponse
// ---------------------------------------------------------------------------

/// A captured HTTP response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. Empty or malformed bodies yield `None`
    /// rather than an error so callers stay resilient to empty responses.
    pub fn json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        match serde_json::from_str(&self.body) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("response body is not valid json: {err}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Query serialization
// ---------------------------------------------------------------------------

/// Serialize a GET payload as an RFC 3986 query string.
///
/// Strings pass through verbatim (assumed pre-formed); flat maps of scalars
/// become `key=value` pairs with null entries skipped. Anything else is a
/// fatal [`DataError::InvalidQueryPayload`].
pub fn query_string_from(payload: &Value) -> Result<String, DataError> {
    match payload {
        Value::String(raw) => Ok(raw.clone()),
        Value::Object(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => continue,
                    Value::Array(_) | Value::Object(_) => {
                        return Err(DataError::InvalidQueryPayload)
                    }
                };
                pairs.push(format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_ENCODE_SET),
                    utf8_percent_encode(&value, QUERY_ENCODE_SET)
                ));
            }
            Ok(pairs.join("&"))
        }
        _ => Err(DataError::InvalidQueryPayload),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport {
    /// Build a transport with the timeout applied.
    pub fn new(timeout: Duration) -> Self {
        Self::configured(timeout, None)
    }

    /// Build a transport with a timeout and an optional user agent.
    pub fn configured(timeout: Duration, user_agent: Option<&str>) -> Self {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        // Fall back to reqwest defaults if builder creation fails for any reason.
        let http = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    /// Wrap an already-configured client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Dispatch a draft and capture the response, whatever its status.
    pub async fn send(&self, draft: &RequestDraft) -> Result<WireResponse, TransportError> {
        let mut builder = self
            .http
            .request(draft.method.clone(), draft.full_url())
            .headers(draft.headers.clone());
        if let Some(body) = &draft.body {
            builder = builder.body(body.clone());
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }

    /// Dispatch on the runtime without blocking the caller.
    ///
    /// The returned handle resolves to the captured response (any status) or
    /// a network error. The continuations fire first: `on_success` for 2xx,
    /// `on_error` otherwise. Dropping the handle detaches the task; there is
    /// no cancellation.
    pub fn send_detached(
        &self,
        draft: RequestDraft,
        on_success: Option<SuccessCallback>,
        on_error: Option<ErrorCallback>,
    ) -> JoinHandle<Result<WireResponse, TransportError>> {
        let transport = self.clone();
        tokio::spawn(async move {
            match transport.send(&draft).await {
                Ok(response) => {
                    if response.is_success() {
                        if let Some(callback) = on_success {
                            callback(&response);
                        }
                    } else if let Some(callback) = on_error {
                        callback(&TransportError::Status(
                            response.status,
                            response.body.clone(),
                        ));
                    }
                    Ok(response)
                }
                Err(err) => {
                    if let Some(callback) = on_error {
                        callback(&err);
                    }
                    Err(err)
                }
            }
        })
    }
}
