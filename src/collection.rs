//! Multi-record endpoints: ordered, id-keyed record sets.
//!
//! A collection fetches a list response and holds the records in an ordered
//! map keyed by record id; records without an id get a positional key so
//! nothing silently collides or disappears. A collection may carry a model
//! definition, letting callers lift any held record into a live model.

use indexmap::IndexMap;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::Client;
use crate::endpoint::{Endpoint, EndpointDef};
use crate::error::RestError;
use crate::model::{ModelDef, ModelEndpoint};

/// Key of one record inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// The record's id value.
    Id(String),
    /// Position-derived key for records without an id.
    Seq(u64),
}

/// How `set` folds incoming records into the held set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Shallow-merge into an existing record with the same id instead of
    /// replacing it.
    pub merge: bool,
    /// Drop all held records first.
    pub reset: bool,
}

// ---------------------------------------------------------------------------
// CollectionDef
// ---------------------------------------------------------------------------

/// Registration-time description of a list resource.
#[derive(Debug, Clone)]
pub struct CollectionDef {
    /// May be left empty when a model is attached; the collection then
    /// inherits the model's URL template.
    pub endpoint: EndpointDef,
    pub model: Option<ModelDef>,
    /// Record field used as the collection key.
    pub id_key: String,
    /// Response envelope property the record list lives under, if any.
    pub response_prop: Option<String>,
}

impl CollectionDef {
    pub fn new(endpoint: EndpointDef) -> Self {
        Self {
            endpoint,
            model: None,
            id_key: "id".to_string(),
            response_prop: None,
        }
    }

    /// Attach the model definition backing this collection's records.
    pub fn model(mut self, model: ModelDef) -> Self {
        self.model = Some(model);
        self
    }

    pub fn id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    pub fn response_prop(mut self, prop: impl Into<String>) -> Self {
        self.response_prop = Some(prop.into());
        self
    }

    pub fn build(&self) -> CollectionEndpoint {
        CollectionEndpoint::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// CollectionEndpoint
// ---------------------------------------------------------------------------

/// A live collection instance.
#[derive(Debug)]
pub struct CollectionEndpoint {
    endpoint: Endpoint,
    def: CollectionDef,
    records: IndexMap<RecordKey, Map<String, Value>>,
    next_seq: u64,
}

impl CollectionEndpoint {
    pub fn new(def: CollectionDef) -> Self {
        let mut endpoint_def = def.endpoint.clone();
        if endpoint_def.url.is_empty() {
            // Without its own route the collection lists the model's; the
            // optional id segment truncates away on fetch.
            if let Some(model) = &def.model {
                endpoint_def.url = model.endpoint.url.clone();
            }
        }
        Self {
            endpoint: endpoint_def.build(),
            def,
            records: IndexMap::new(),
            next_seq: 0,
        }
    }

    pub fn def(&self) -> &CollectionDef {
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

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) -> &mut Self {
        self.records.clear();
        self
    }

    /// Records in response order.
    pub fn records(&self) -> impl Iterator<Item = (&RecordKey, &Map<String, Value>)> {
        self.records.iter()
    }

    /// Record by identity key.
    pub fn get(&self, id: &str) -> Option<&Map<String, Value>> {
        self.records.get(&RecordKey::Id(id.to_string()))
    }

    /// Record by position; negative indexes count from the end.
    pub fn at(&self, index: i64) -> Option<&Map<String, Value>> {
        let len = self.records.len() as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 {
            return None;
        }
        self.records.get_index(index as usize).map(|(_, v)| v)
    }

    /// Fold records into the held set per the options.
    pub fn set(&mut self, records: Vec<Map<String, Value>>, options: SetOptions) -> &mut Self {
        if options.reset {
            self.records.clear();
        }
        for record in records {
            match self.record_id(&record) {
                Some(id) => {
                    let key = RecordKey::Id(id);
                    if options.merge {
                        if let Some(existing) = self.records.get_mut(&key) {
                            for (k, v) in record {
                                existing.insert(k, v);
                            }
                            continue;
                        }
                    }
                    self.records.insert(key, record);
                }
                None => {
                    let key = RecordKey::Seq(self.next_seq);
                    self.next_seq += 1;
                    self.records.insert(key, record);
                }
            }
        }
        self
    }

    /// Fetch the list and replace the held records with the response.
    pub async fn fetch(&mut self, client: &Client) -> Result<(), RestError> {
        self.endpoint.set_method_override(Some(Method::GET));
        client.execute(&mut self.endpoint, false).await?;
        match self.parse_records() {
            Some(records) => {
                self.set(
                    records,
                    SetOptions {
                        merge: false,
                        reset: true,
                    },
                );
            }
            None => debug!("list response carried no record array"),
        }
        Ok(())
    }

    /// Lift a held record into a live model, when a model def is attached.
    /// The model inherits the collection's base URL.
    pub fn build_model(&self, id: &str) -> Option<ModelEndpoint> {
        let model_def = self.def.model.as_ref()?;
        let record = self.get(id)?;
        let mut model = model_def.build();
        model.set_base_url(self.endpoint.base_url());
        model.attributes_mut().extend(record.clone());
        Some(model)
    }

    /// Identity field for keying records: the model's id key when a model
    /// is attached, the collection's own otherwise.
    fn effective_id_key(&self) -> &str {
        match &self.def.model {
            Some(model) => &model.id_key,
            None => &self.def.id_key,
        }
    }

    fn record_id(&self, record: &Map<String, Value>) -> Option<String> {
        match record.get(self.effective_id_key()) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Response body as a record list, unwrapping the envelope if configured.
    fn parse_records(&self) -> Option<Vec<Map<String, Value>>> {
        let body = self.endpoint.response_body()?;
        let list = match &self.def.response_prop {
            Some(prop) => body.get(prop)?.clone(),
            None => body,
        };
        match list {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::spawn_http_server;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn accounts_def() -> CollectionDef {
        CollectionDef::new(EndpointDef::new("account"))
            .model(ModelDef::new(EndpointDef::new("account/$:id")))
    }

    #[test]
    fn records_key_by_id_with_positional_fallback() {
        let mut accounts = accounts_def().build();
        accounts.set(
            vec![
                obj(json!({"id": "a", "n": 1})),
                obj(json!({"n": 2})),
                obj(json!({"id": "b", "n": 3})),
            ],
            SetOptions::default(),
        );
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts.get("a"), Some(&obj(json!({"id": "a", "n": 1}))));
        assert_eq!(accounts.get("b").unwrap().get("n"), Some(&json!(3)));
        // Order follows the input, ids or not.
        assert_eq!(accounts.at(1).unwrap().get("n"), Some(&json!(2)));
    }

    #[test]
    fn attached_model_supplies_the_identity_key() {
        let def = CollectionDef::new(EndpointDef::new("contact"))
            .model(ModelDef::new(EndpointDef::new("contact/$:uid")).id_key("uid"));
        let mut contacts = def.build();
        contacts.set(vec![obj(json!({"uid": "u1", "n": 1}))], SetOptions::default());
        assert!(contacts.get("u1").is_some());
    }

    #[test]
    fn numeric_ids_key_as_strings() {
        let mut accounts = accounts_def().build();
        accounts.set(vec![obj(json!({"id": 7, "n": 1}))], SetOptions::default());
        assert!(accounts.get("7").is_some());
    }

    #[test]
    fn negative_indexes_count_from_the_end() {
        let mut accounts = accounts_def().build();
        accounts.set(
            vec![obj(json!({"id": "a"})), obj(json!({"id": "b"}))],
            SetOptions::default(),
        );
        assert_eq!(accounts.at(-1).unwrap().get("id"), Some(&json!("b")));
        assert_eq!(accounts.at(-2).unwrap().get("id"), Some(&json!("a")));
        assert!(accounts.at(-3).is_none());
        assert!(accounts.at(2).is_none());
    }

    #[test]
    fn merge_updates_in_place_and_keeps_position() {
        let mut accounts = accounts_def().build();
        accounts.set(
            vec![
                obj(json!({"id": "a", "n": 1, "keep": true})),
                obj(json!({"id": "b", "n": 2})),
            ],
            SetOptions::default(),
        );
        accounts.set(
            vec![obj(json!({"id": "a", "n": 10}))],
            SetOptions {
                merge: true,
                reset: false,
            },
        );
        let a = accounts.get("a").unwrap();
        assert_eq!(a.get("n"), Some(&json!(10)));
        assert_eq!(a.get("keep"), Some(&json!(true)));
        assert_eq!(accounts.at(0).unwrap().get("id"), Some(&json!("a")));
    }

    #[test]
    fn reset_drops_previous_records() {
        let mut accounts = accounts_def().build();
        accounts.set(vec![obj(json!({"id": "old"}))], SetOptions::default());
        accounts.set(
            vec![obj(json!({"id": "new"}))],
            SetOptions {
                merge: false,
                reset: true,
            },
        );
        assert_eq!(accounts.len(), 1);
        assert!(accounts.get("old").is_none());
        assert!(accounts.get("new").is_some());
    }

    #[test]
    fn empty_url_inherits_the_model_template() {
        let def = CollectionDef::new(EndpointDef::new(""))
            .model(ModelDef::new(EndpointDef::new("account/$:id")));
        let mut accounts = def.build();
        accounts.set_base_url("http://api.test");
        let draft = accounts.endpoint_mut().build_request().unwrap();
        // The optional id segment truncates away for the list route.
        assert_eq!(draft.url, "http://api.test/account");
    }

    #[tokio::test]
    async fn fetch_replaces_held_records_in_response_order() {
        let (base_url, server) = spawn_http_server(vec![(
            200,
            r#"{"records":[{"id":"a","n":1},{"id":"b","n":2}],"total":2}"#.into(),
        )])
        .await;
        let client = Client::new(base_url);
        let def = accounts_def().response_prop("records");
        let mut accounts = client.collection(&def);
        accounts.set(vec![obj(json!({"id": "stale"}))], SetOptions::default());

        accounts.fetch(&client).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.get("stale").is_none());
        assert_eq!(accounts.at(0).unwrap().get("id"), Some(&json!("a")));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /account HTTP"), "{}", requests[0]);
    }

    #[tokio::test]
    async fn build_model_lifts_a_record_into_a_live_model() {
        let (base_url, server) = spawn_http_server(vec![(200, "{}".into())]).await;
        let client = Client::new(base_url.clone());
        let mut accounts = client.collection(&accounts_def());
        accounts.set(
            vec![obj(json!({"id": "a", "name": "lifted"}))],
            SetOptions::default(),
        );

        let mut model = accounts.build_model("a").unwrap();
        assert_eq!(model.id().as_deref(), Some("a"));
        assert_eq!(model.get("name"), Some(&json!("lifted")));

        // The lifted model is wired to the same API.
        model.delete(&client).await.unwrap();
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("DELETE /account/a HTTP"), "{}", requests[0]);

        assert!(accounts.build_model("missing").is_none());
    }
}
