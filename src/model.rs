//! Single-record CRUD endpoints.
//!
//! A model wraps an endpoint whose URL template carries an optional id
//! segment (e.g. `account/$:id`). Named actions map to verbs; the standard
//! four cover CRUD and custom actions ride an extra `$:action` URL segment.
//! Successful responses sync back into the model's attributes.

use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::client::Client;
use crate::endpoint::{Endpoint, EndpointDef};
use crate::error::{ConfigError, RestError};
use crate::properties::PropertyBag;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_RETRIEVE: &str = "retrieve";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";

/// URL argument carrying the action name for non-CRUD actions.
pub const URL_ARG_ACTION: &str = "action";

const STANDARD_ACTIONS: [&str; 4] = [
    ACTION_CREATE,
    ACTION_RETRIEVE,
    ACTION_UPDATE,
    ACTION_DELETE,
];

// ---------------------------------------------------------------------------
// ModelDef
// ---------------------------------------------------------------------------

/// Registration-time description of a model resource.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub endpoint: EndpointDef,
    /// Attribute key holding the record id, also used as the URL variable.
    pub id_key: String,
    /// Response envelope property the record lives under, if any.
    pub response_prop: Option<String>,
    pub actions: HashMap<String, Method>,
}

impl ModelDef {
    /// New definition with the standard CRUD action set.
    pub fn new(endpoint: EndpointDef) -> Self {
        let mut actions = HashMap::new();
        actions.insert(ACTION_CREATE.to_string(), Method::POST);
        actions.insert(ACTION_RETRIEVE.to_string(), Method::GET);
        actions.insert(ACTION_UPDATE.to_string(), Method::PUT);
        actions.insert(ACTION_DELETE.to_string(), Method::DELETE);
        Self {
            endpoint,
            id_key: "id".to_string(),
            response_prop: None,
            actions,
        }
    }

    pub fn id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    pub fn response_prop(mut self, prop: impl Into<String>) -> Self {
        self.response_prop = Some(prop.into());
        self
    }

    /// Add or override an action.
    pub fn action(mut self, name: impl Into<String>, method: Method) -> Self {
        self.actions.insert(name.into(), method);
        self
    }

    pub fn build(&self) -> ModelEndpoint {
        ModelEndpoint::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// ModelEndpoint
// ---------------------------------------------------------------------------

/// A live model instance: endpoint plus the current record's attributes.
#[derive(Debug)]
pub struct ModelEndpoint {
    endpoint: Endpoint,
    def: ModelDef,
    attributes: PropertyBag,
    action: Option<String>,
}

impl ModelEndpoint {
    pub fn new(def: ModelDef) -> Self {
        let endpoint = def.endpoint.build();
        Self {
            endpoint,
            def,
            attributes: PropertyBag::new(),
            action: None,
        }
    }

    pub fn def(&self) -> &ModelDef {
        &self.def
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.endpoint.set_base_url(base_url);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    pub fn attributes(&self) -> &PropertyBag {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut PropertyBag {
        &mut self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.set(key, value);
        self
    }

    /// The record id, per the definition's id key.
    pub fn id(&self) -> Option<String> {
        self.attributes.get_str(&self.def.id_key)
    }

    /// Action most recently configured on this instance.
    pub fn current_action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Fetch a record. A given `id` replaces the current one, clearing stale
    /// attributes first; with no argument the held id is used.
    pub async fn retrieve(&mut self, client: &Client, id: Option<&str>) -> Result<(), RestError> {
        match id {
            Some(id) => {
                if self.id().as_deref() != Some(id) {
                    self.attributes.clear();
                }
                let key = self.def.id_key.clone();
                self.attributes.set(key, id);
            }
            None if self.id().is_none() => {
                return Err(ConfigError::MissingModelId(ACTION_RETRIEVE.to_string()).into());
            }
            None => {}
        }
        self.run(client, ACTION_RETRIEVE).await
    }

    /// Persist the record: create when no id is held, update otherwise.
    pub async fn save(&mut self, client: &Client) -> Result<(), RestError> {
        let action = if self.id().is_some() {
            ACTION_UPDATE
        } else {
            ACTION_CREATE
        };
        self.run(client, action).await
    }

    /// Delete the record. Attributes are cleared once the server confirms.
    pub async fn delete(&mut self, client: &Client) -> Result<(), RestError> {
        if self.id().is_none() {
            return Err(ConfigError::MissingModelId(ACTION_DELETE.to_string()).into());
        }
        self.run(client, ACTION_DELETE).await
    }

    /// Run any registered action by name, custom ones included.
    pub async fn invoke(&mut self, client: &Client, action: &str) -> Result<(), RestError> {
        self.run(client, action).await
    }

    /// Fresh instance state; the definition and base URL survive.
    pub fn reset(&mut self) -> &mut Self {
        self.endpoint.reset();
        self.attributes.clear();
        self.action = None;
        self
    }

    fn configure_action(&mut self, action: &str) -> Result<(), ConfigError> {
        let method = self
            .def
            .actions
            .get(action)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownModelAction(action.to_string()))?;
        self.endpoint.set_method_override(Some(method.clone()));

        // A caller-supplied id URL argument wins and becomes the record id;
        // otherwise the attribute id is injected. An absent id leaves the
        // optional id segment to truncate away.
        let id_key = self.def.id_key.clone();
        match self.endpoint.url_args().get(&id_key) {
            Some(id) if !id.is_empty() => {
                let id = id.to_string();
                self.attributes.set(id_key, id);
            }
            _ => {
                let id = self.id().unwrap_or_default();
                self.endpoint.url_args_mut().set(id_key, id);
            }
        }
        if !STANDARD_ACTIONS.contains(&action) {
            self.endpoint.url_args_mut().set(URL_ARG_ACTION, action);
        }

        if method == Method::GET || method == Method::DELETE {
            // No body for these verbs, and no stale payload from a prior action.
            self.endpoint.data_mut().clear();
        } else {
            self.endpoint.set_data(self.attributes.as_map().clone());
        }
        self.action = Some(action.to_string());
        Ok(())
    }

    async fn run(&mut self, client: &Client, action: &str) -> Result<(), RestError> {
        self.configure_action(action)?;
        client.execute(&mut self.endpoint, false).await?;
        self.sync_from_response();
        Ok(())
    }

    /// Fold a confirmed response back into the attributes.
    fn sync_from_response(&mut self) {
        if self.action.as_deref() == Some(ACTION_DELETE) {
            self.attributes.clear();
            return;
        }
        if let Some(record) = self.parse_record() {
            self.attributes.extend(record);
        }
    }

    /// Response body as a record map, unwrapping the envelope if configured.
    fn parse_record(&self) -> Option<Map<String, Value>> {
        let body = self.endpoint.response_body()?;
        let record = match &self.def.response_prop {
            Some(prop) => body.get(prop)?.clone(),
            None => body,
        };
        match record {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::spawn_http_server;
    use serde_json::json;

    fn account_def() -> ModelDef {
        ModelDef::new(EndpointDef::new("account/$:id"))
    }

    #[tokio::test]
    async fn save_posts_new_records_and_puts_existing_ones() {
        let (base_url, server) = spawn_http_server(vec![
            (200, r#"{"id":"1","name":"widget"}"#.into()),
            (200, r#"{"id":"1","name":"gadget"}"#.into()),
        ])
        .await;
        let client = Client::new(base_url);
        let mut account = client.model(&account_def());

        account.set("name", "widget");
        account.save(&client).await.unwrap();
        assert_eq!(account.id().as_deref(), Some("1"));
        assert_eq!(account.current_action(), Some(ACTION_CREATE));

        account.set("name", "gadget");
        account.save(&client).await.unwrap();
        assert_eq!(account.get("name"), Some(&json!("gadget")));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /account HTTP"), "{}", requests[0]);
        assert!(requests[0].contains(r#"{"name":"widget"}"#));
        assert!(requests[1].starts_with("PUT /account/1 HTTP"), "{}", requests[1]);
    }

    #[tokio::test]
    async fn retrieve_swaps_in_the_requested_record() {
        let (base_url, server) = spawn_http_server(vec![(
            200,
            r#"{"id":"42","name":"answer"}"#.into(),
        )])
        .await;
        let client = Client::new(base_url);
        let mut account = client.model(&account_def());
        // Stale state from a previous record must not leak through.
        account.set("id", "7").set("leftover", true);

        account.retrieve(&client, Some("42")).await.unwrap();
        assert_eq!(account.id().as_deref(), Some("42"));
        assert_eq!(account.get("name"), Some(&json!("answer")));
        assert!(account.get("leftover").is_none());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /account/42 HTTP"), "{}", requests[0]);
    }

    #[tokio::test]
    async fn caller_supplied_url_id_wins_over_the_attribute() {
        let (base_url, server) = spawn_http_server(vec![(200, "{}".into())]).await;
        let client = Client::new(base_url);
        let mut account = client.model(&account_def());
        account.set("id", "1");
        account.endpoint_mut().url_args_mut().set("id", "77");

        account.retrieve(&client, None).await.unwrap();
        // The explicit URL argument routes the request and is adopted as
        // the record id.
        assert_eq!(account.id().as_deref(), Some("77"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /account/77 HTTP"), "{}", requests[0]);
    }

    #[tokio::test]
    async fn retrieve_without_any_id_is_an_error() {
        let client = Client::new("http://api.test");
        let mut account = client.model(&account_def());
        let err = account.retrieve(&client, None).await.unwrap_err();
        assert!(matches!(
            err,
            RestError::Config(ConfigError::MissingModelId(_))
        ));
    }

    #[tokio::test]
    async fn delete_clears_attributes_once_confirmed() {
        let (base_url, server) = spawn_http_server(vec![(200, "{}".into())]).await;
        let client = Client::new(base_url);
        let mut account = client.model(&account_def());
        account.set("id", "9").set("name", "doomed");

        account.delete(&client).await.unwrap();
        assert!(account.attributes().is_empty());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("DELETE /account/9 HTTP"), "{}", requests[0]);
    }

    #[tokio::test]
    async fn delete_without_id_is_an_error() {
        let client = Client::new("http://api.test");
        let mut account = client.model(&account_def());
        assert!(account.delete(&client).await.is_err());
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_attributes() {
        let (base_url, server) = spawn_http_server(vec![(404, "{}".into())]).await;
        let client = Client::new(base_url);
        let mut account = client.model(&account_def());
        account.set("id", "9").set("name", "survivor");

        assert!(account.delete(&client).await.is_err());
        assert_eq!(account.get("name"), Some(&json!("survivor")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn response_envelope_is_unwrapped() {
        let (base_url, server) = spawn_http_server(vec![(
            200,
            r#"{"record":{"id":"3","name":"inner"},"meta":{}}"#.into(),
        )])
        .await;
        let client = Client::new(base_url);
        let def = ModelDef::new(EndpointDef::new("account/$:id")).response_prop("record");
        let mut account = client.model(&def);

        account.retrieve(&client, Some("3")).await.unwrap();
        assert_eq!(account.get("name"), Some(&json!("inner")));
        assert!(account.get("meta").is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn custom_actions_ride_the_action_segment() {
        let (base_url, server) = spawn_http_server(vec![(200, "{}".into())]).await;
        let client = Client::new(base_url);
        let def = ModelDef::new(EndpointDef::new("account/$:id/$:action"))
            .action("archive", Method::POST);
        let mut account = client.model(&def);
        account.set("id", "5");

        account.invoke(&client, "archive").await.unwrap();
        let requests = server.await.unwrap();
        assert!(
            requests[0].starts_with("POST /account/5/archive HTTP"),
            "{}",
            requests[0]
        );
    }

    #[tokio::test]
    async fn unknown_actions_are_rejected() {
        let client = Client::new("http://api.test");
        let mut account = client.model(&account_def());
        let err = account.invoke(&client, "purge").await.unwrap_err();
        assert!(matches!(
            err,
            RestError::Config(ConfigError::UnknownModelAction(_))
        ));
    }
}
