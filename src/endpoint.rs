//! Endpoint definitions and the request lifecycle.
//!
//! An [`EndpointDef`] is the immutable registration-time description of one
//! API route: URL template, default verb, auth requirement, payload rules.
//! An [`Endpoint`] is a live instance of that definition carrying per-call
//! state: URL arguments, payload data, the last request draft and response.
//!
//! The build pipeline is fixed: resolve the verb, resolve the URL template,
//! finalize the payload, then hand the draft to the transport. Each stage
//! fires its event so models, collections and callers can hook in.

use reqwest::Method;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::data::{DataRules, EndpointData};
use crate::error::{RestError, TransportError};
use crate::events::{Event, EventStack};
use crate::properties::PropertyBag;
use crate::transport::{
    query_string_from, ErrorCallback, RequestDraft, SuccessCallback, Transport, WireResponse,
};
use crate::url::{self, UrlArgs};

/// Property key that overrides the definition's URL template per instance.
pub const PROPERTY_URL: &str = "url";

/// Whether requests to an endpoint must, may, or must not be decorated by
/// the client's auth controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthRequirement {
    /// Never decorate, even when the client is authenticated.
    NoAuth,
    /// Decorate when an authenticated controller is available.
    #[default]
    Either,
    /// Decorate always; the controller is expected to be authenticated.
    Required,
}

// ---------------------------------------------------------------------------
// EndpointDef
// ---------------------------------------------------------------------------

/// Immutable description of one API route.
#[derive(Debug, Clone, Default)]
pub struct EndpointDef {
    /// URL template relative to the API base, may carry `$var` / `$:var`
    /// segments.
    pub url: String,
    /// Default verb; `None` falls back to GET at build time.
    pub method: Option<Method>,
    pub auth: AuthRequirement,
    pub data: DataRules,
}

impl EndpointDef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn data_rules(mut self, rules: DataRules) -> Self {
        self.data = rules;
        self
    }

    /// Instantiate a live endpoint from this definition.
    pub fn build(&self) -> Endpoint {
        Endpoint::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A live endpoint instance: definition plus per-call state.
#[derive(Debug)]
pub struct Endpoint {
    def: EndpointDef,
    base_url: String,
    url_args: UrlArgs,
    data: EndpointData,
    method_override: Option<Method>,
    properties: PropertyBag,
    events: EventStack,
    request: Option<RequestDraft>,
    response: Option<WireResponse>,
}

impl Endpoint {
    pub fn new(def: EndpointDef) -> Self {
        let data = EndpointData::new(def.data.clone());
        Self {
            def,
            base_url: String::new(),
            url_args: UrlArgs::new(),
            data,
            method_override: None,
            properties: PropertyBag::new(),
            events: EventStack::new(),
            request: None,
            response: None,
        }
    }

    pub fn def(&self) -> &EndpointDef {
        &self.def
    }

    pub fn auth_requirement(&self) -> AuthRequirement {
        self.def.auth
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The URL template in effect: instance property override first, then
    /// the definition.
    pub fn url_template(&self) -> String {
        self.properties
            .get_str(PROPERTY_URL)
            .unwrap_or_else(|| self.def.url.clone())
    }

    pub fn url_args(&self) -> &UrlArgs {
        &self.url_args
    }

    pub fn url_args_mut(&mut self) -> &mut UrlArgs {
        &mut self.url_args
    }

    pub fn set_url_args(&mut self, args: UrlArgs) -> &mut Self {
        self.url_args = args;
        self
    }

    pub fn data(&self) -> &EndpointData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut EndpointData {
        &mut self.data
    }

    /// Replace the payload attributes wholesale.
    pub fn set_data(&mut self, values: serde_json::Map<String, Value>) -> &mut Self {
        self.data.replace(values);
        self
    }

    pub fn set_method_override(&mut self, method: Option<Method>) -> &mut Self {
        self.method_override = method;
        self
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    pub fn events_mut(&mut self) -> &mut EventStack {
        &mut self.events
    }

    pub fn request(&self) -> Option<&RequestDraft> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&WireResponse> {
        self.response.as_ref()
    }

    /// JSON view of the last response body, if it parsed.
    pub fn response_body(&self) -> Option<Value> {
        self.response.as_ref().and_then(WireResponse::json)
    }

    /// Resolve the verb for the next request: explicit override, then the
    /// definition, then GET. Handlers get the last word.
    pub fn method(&mut self) -> Method {
        let mut method = self
            .method_override
            .clone()
            .or_else(|| self.def.method.clone())
            .unwrap_or(Method::GET);
        self.events
            .trigger(&mut Event::ConfigureMethod {
                method: &mut method,
            });
        method
    }

    /// Build the wire request for the current state without dispatching it.
    pub fn build_request(&mut self) -> Result<RequestDraft, RestError> {
        let method = self.method();

        let mut args = self.url_args.clone();
        self.events.trigger(&mut Event::ConfigureUrl { args: &mut args });
        let path = url::resolve(&self.url_template(), &args)?;
        let full_url = join_url(&self.base_url, &path);

        self.events.trigger(&mut Event::ConfigurePayload {
            data: &mut self.data,
        });
        let payload = self.data.to_payload(None)?.map(Value::Object);

        let mut draft = RequestDraft::new(method.clone(), full_url);
        draft.set_json_content_type();
        if let Some(payload) = payload {
            if method == Method::GET {
                let query = query_string_from(&payload)?;
                if !query.is_empty() {
                    draft.query = Some(query);
                }
            } else {
                draft.body = Some(match payload {
                    // Pre-serialized string payloads go out verbatim.
                    Value::String(raw) => raw,
                    other => serde_json::to_string(&other).unwrap_or_default(),
                });
            }
        }

        self.events.trigger(&mut Event::AfterConfiguredRequest {
            request: &mut draft,
        });
        debug!(method = %draft.method, url = %draft.full_url(), "configured request");
        self.request = Some(draft.clone());
        Ok(draft)
    }

    /// Store a response on the endpoint and fire the response event.
    pub fn absorb_response(&mut self, response: WireResponse) {
        self.response = Some(response);
        if let Some(response) = &self.response {
            self.events.trigger(&mut Event::AfterResponse { response });
        }
    }

    /// Build and dispatch the request, storing whatever response comes back.
    ///
    /// Non-2xx statuses are an error unless `catch_non_success` is set; the
    /// response is retained on the endpoint either way for inspection.
    pub async fn execute(
        &mut self,
        transport: &Transport,
        catch_non_success: bool,
    ) -> Result<(), RestError> {
        let draft = self.build_request()?;
        let response = transport.send(&draft).await?;
        self.settle(response, catch_non_success)
    }

    /// Absorb a dispatched response, erroring on non-2xx unless caught.
    pub fn settle(
        &mut self,
        response: WireResponse,
        catch_non_success: bool,
    ) -> Result<(), RestError> {
        let status = response.status;
        let success = response.is_success();
        let body = if success { String::new() } else { response.body.clone() };
        self.absorb_response(response);
        if success || catch_non_success {
            Ok(())
        } else {
            Err(TransportError::Status(status, body).into())
        }
    }

    /// Build the request and dispatch it on the runtime without waiting.
    ///
    /// The endpoint does not absorb the response; the caller owns the handle
    /// and may feed the resolved response back via [`absorb_response`].
    /// Dropping the handle detaches the task.
    ///
    /// [`absorb_response`]: Endpoint::absorb_response
    pub fn execute_detached(
        &mut self,
        transport: &Transport,
        on_success: Option<SuccessCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Result<JoinHandle<Result<WireResponse, TransportError>>, RestError> {
        let draft = self.build_request()?;
        Ok(transport.send_detached(draft, on_success, on_error))
    }

    /// Back to a fresh instance of the same definition. Event handlers and
    /// the base URL survive.
    pub fn reset(&mut self) -> &mut Self {
        self.url_args.clear();
        self.data.reset();
        self.method_override = None;
        self.properties.clear();
        self.request = None;
        self.response = None;
        self
    }
}

/// Join the API base and a resolved relative path.
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{path}"),
    }
}
